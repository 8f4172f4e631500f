//! Viewer session: prints everything the chat broadcasts

use crate::{ClientError, SessionEnd};
use log::info;
use shared::{write_frame, FrameReader, Handshake, MAX_BROADCAST_LEN};
use std::future::Future;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// How long to wait for the welcome line
pub const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Viewer {
    frames: FrameReader<OwnedReadHalf>,
    _writer: OwnedWriteHalf,
}

impl Viewer {
    /// Connects, registers as a viewer and returns the server's welcome line
    pub async fn connect(server: &str) -> Result<(Self, String), ClientError> {
        let stream = TcpStream::connect(server)
            .await
            .map_err(|source| ClientError::Connect {
                addr: server.to_string(),
                source,
            })?;
        info!("Connected to the server at {}", stream.peer_addr()?);

        let (reader, mut writer) = stream.into_split();
        let mut frames = FrameReader::with_max_len(reader, MAX_BROADCAST_LEN);
        write_frame(&mut writer, &Handshake::Viewer.to_frame()).await?;

        let welcome = match timeout(WELCOME_TIMEOUT, frames.next_frame()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                return Err(ClientError::Rejected(
                    "the server didn't recognise us as a Viewer".to_string(),
                ))
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ClientError::Rejected(
                    "no welcome received from the server".to_string(),
                ))
            }
        };

        Ok((
            Self {
                frames,
                _writer: writer,
            },
            welcome,
        ))
    }

    /// Next broadcast line, or `None` once the server has closed the connection
    pub async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        Ok(self.frames.next_frame().await?)
    }

    /// Hands every received line to `on_line` until the server closes or
    /// `shutdown` completes.
    pub async fn run<F, H>(mut self, shutdown: F, mut on_line: H) -> SessionEnd
    where
        F: Future<Output = ()>,
        H: FnMut(&str),
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => return SessionEnd::Interrupted,

                line = self.frames.next_frame() => match line {
                    Ok(Some(line)) => on_line(&line),
                    Ok(None) | Err(_) => {
                        println!("Server has disconnected from us.");
                        return SessionEnd::ServerClosed;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Accepts one viewer, checks its handshake, writes `lines` and hangs up
    async fn scripted_server(lines: &'static [&'static str]) -> String {
        serve_lines(lines.iter().map(|l| l.to_string()).collect()).await
    }

    async fn serve_lines(lines: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut frames = FrameReader::new(reader);

            assert_eq!(frames.next_frame().await.unwrap().as_deref(), Some("viewer"));
            for line in &lines {
                write_frame(&mut writer, line).await.unwrap();
            }
            writer.shutdown().await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_prints_lines_until_server_closes() {
        let addr = scripted_server(&["welcome", "alice has joined the chat.", "alice: hi"]).await;

        let (viewer, welcome) = Viewer::connect(&addr).await.unwrap();
        assert_eq!(welcome, "welcome");

        let mut seen = Vec::new();
        let end = viewer
            .run(std::future::pending::<()>(), |line| seen.push(line.to_string()))
            .await;

        assert_eq!(end, SessionEnd::ServerClosed);
        assert_eq!(seen, vec!["alice has joined the chat.", "alice: hi"]);
    }

    #[tokio::test]
    async fn test_next_line() {
        let addr = scripted_server(&["welcome", "bob: yo"]).await;

        let (mut viewer, _) = Viewer::connect(&addr).await.unwrap();
        assert_eq!(viewer.next_line().await.unwrap().as_deref(), Some("bob: yo"));
        assert_eq!(viewer.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_welcome_means_rejected() {
        let addr = scripted_server(&[]).await;

        let result = Viewer::connect(&addr).await;
        assert!(matches!(result, Err(ClientError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_longest_broadcast_arrives_whole() {
        let line = shared::chat_line(
            &"n".repeat(shared::MAX_NAME_LEN),
            &"t".repeat(shared::MAX_FRAME_LEN),
        );
        let addr = serve_lines(vec!["welcome".to_string(), line.clone()]).await;

        let (mut viewer, _) = Viewer::connect(&addr).await.unwrap();
        assert_eq!(viewer.next_line().await.unwrap(), Some(line));
        assert_eq!(viewer.next_line().await.unwrap(), None);
    }
}
