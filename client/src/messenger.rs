//! Messenger session: sends user input to the chat

use crate::{ClientError, SessionEnd};
use log::{debug, info};
use shared::{is_quit_command, write_frame, FrameReader, Handshake};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// How long to wait for the server to turn down our name
pub const REJECTION_GRACE: Duration = Duration::from_millis(500);

pub struct Messenger {
    name: String,
    frames: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Messenger {
    pub async fn connect(server: &str, name: &str) -> Result<Self, ClientError> {
        Self::connect_with_grace(server, name, REJECTION_GRACE).await
    }

    /// Connects and registers under `name`.
    ///
    /// The server answers a successful messenger handshake with silence and
    /// a rejected one by closing the connection, so the connection counts as
    /// accepted once `grace` passes without it being closed.
    pub async fn connect_with_grace(
        server: &str,
        name: &str,
        grace: Duration,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server)
            .await
            .map_err(|source| ClientError::Connect {
                addr: server.to_string(),
                source,
            })?;
        info!("Connected to the server at {}", stream.peer_addr()?);

        let (reader, mut writer) = stream.into_split();
        let mut frames = FrameReader::new(reader);

        let handshake = Handshake::Messenger(name.to_string());
        write_frame(&mut writer, &handshake.to_frame()).await?;

        match timeout(grace, frames.next_frame()).await {
            Err(_) => {}
            Ok(Ok(Some(line))) => debug!("Unexpected line after handshake: {}", line),
            Ok(Ok(None)) | Ok(Err(_)) => {
                return Err(ClientError::Rejected(format!(
                    "\"{}\" is probably taken",
                    name
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            frames,
            writer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends every non-empty input line until the session ends.
    pub async fn run<R, F>(mut self, input: R, shutdown: F) -> Result<SessionEnd, ClientError>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        let mut lines = input.lines();
        tokio::pin!(shutdown);

        loop {
            self.prompt();

            tokio::select! {
                _ = &mut shutdown => return Ok(SessionEnd::Interrupted),

                line = lines.next_line() => match line? {
                    None => return Ok(SessionEnd::InputClosed),
                    Some(line) if is_quit_command(&line) => {
                        println!("Disconnecting");
                        return Ok(SessionEnd::Quit);
                    }
                    Some(line) if line.is_empty() => {}
                    Some(line) => {
                        if let Err(e) = write_frame(&mut self.writer, &line).await {
                            debug!("Write failed: {}", e);
                            return Ok(SessionEnd::ServerClosed);
                        }
                    }
                },

                frame = self.frames.next_frame() => match frame {
                    Ok(Some(line)) => debug!("Ignoring line from server: {}", line),
                    Ok(None) | Err(_) => {
                        println!("Server has disconnected from us.");
                        return Ok(SessionEnd::ServerClosed);
                    }
                },
            }
        }
    }

    fn prompt(&self) {
        print!("{}> ", self.name);
        let _ = std::io::stdout().flush();
    }
}
