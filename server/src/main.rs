use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat name shown to viewers when they join
    #[arg(default_value = "Chat App")]
    chat_name: String,

    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// How long a new connection may take to send its handshake
    #[arg(long, default_value = "5000")]
    handshake_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        chat_name: args.chat_name.trim().to_string(),
        host: args.host,
        port: args.port,
        handshake_timeout: Duration::from_millis(args.handshake_timeout_ms),
    };

    let server = Server::bind(config).await?;
    info!("Press Ctrl-C to shut down the server.");

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl-C, shutting down gracefully...");
        })
        .await?;

    Ok(())
}
