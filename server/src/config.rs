use shared::DEFAULT_PORT;
use std::time::Duration;

/// Settings the chat server is started with
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Shown to viewers in the welcome line
    pub chat_name: String,
    pub host: String,
    pub port: u16,
    /// How long a new connection may take to send its handshake
    pub handshake_timeout: Duration,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            chat_name: "Chat App".to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}
