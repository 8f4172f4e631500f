//! Server loop: accepts connections, applies peer events and broadcasts

use crate::config::ServerConfig;
use crate::connection::{handle_connection, PeerEvent};
use crate::error::ServerError;
use crate::registry::{Departed, Peer, PeerId, PeerRegistry};
use log::{debug, error, info, warn};
use shared::{welcome_line, Handshake};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Lifecycle of a [`Server`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// The chat server. Owns the listener, the registry and every connection task.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    registry: PeerRegistry,
    phase: Phase,
    next_peer_id: PeerId,
    welcome: String,

    connections: JoinSet<()>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    events_rx: mpsc::UnboundedReceiver<PeerEvent>,
}

impl Server {
    /// Binds the listening socket. Failing to bind is fatal.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        debug!("Phase: {:?}", Phase::Starting);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(
            "Starting the \"{}\" TCP Chat Server on {}",
            config.chat_name,
            listener.local_addr()?
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            welcome: welcome_line(&config.chat_name),
            config,
            registry: PeerRegistry::new(),
            phase: Phase::Starting,
            next_peer_id: 1,
            connections: JoinSet::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    fn set_phase(&mut self, phase: Phase) {
        info!("Server phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs until `shutdown` completes, then closes every connection.
    ///
    /// Each iteration either accepts one connection or applies every peer
    /// event currently queued, and then flushes the outgoing queue to all
    /// viewers, so lines collected in one iteration are delivered before the
    /// next one begins.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.set_phase(Phase::Running);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },

                Some(event) = self.events_rx.recv() => {
                    self.apply_event(event);
                    while let Ok(event) = self.events_rx.try_recv() {
                        self.apply_event(event);
                    }
                }

                Some(finished) = self.connections.join_next() => {
                    if let Err(e) = finished {
                        error!("Connection task failed: {}", e);
                    }
                }
            }

            let flushed = self.registry.broadcast();
            if flushed > 0 {
                debug!(
                    "Broadcast {} lines to {} viewers",
                    flushed,
                    self.registry.viewer_count()
                );
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn spawn_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let id = self.next_peer_id;
        self.next_peer_id += 1;
        info!("Handling a new client from {} (peer {})", addr, id);

        let (reader, writer) = stream.into_split();
        self.connections.spawn(handle_connection(
            id,
            addr,
            reader,
            writer,
            self.events_tx.clone(),
            self.config.handshake_timeout,
        ));
    }

    fn apply_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Handshake {
                id,
                addr,
                handshake,
                outbound,
            } => {
                let peer = Peer::new(addr, outbound);
                let result = match handshake {
                    Handshake::Viewer => self.registry.add_viewer(id, peer, &self.welcome),
                    Handshake::Messenger(name) => self.registry.add_messenger(id, name, peer),
                };

                if let Err(e) = result {
                    warn!("Rejected {}: {}", addr, e);
                }
            }

            PeerEvent::Message { id, text } => {
                if !self.registry.collect(id, &text) {
                    debug!("Dropping message from unregistered peer {}", id);
                }
            }

            PeerEvent::Disconnected { id } => match self.registry.remove(id) {
                Some(Departed::Viewer(addr)) => debug!("Released viewer {}", addr),
                Some(Departed::Messenger { addr, name }) => {
                    debug!("Released messenger {} ({})", name, addr)
                }
                None => debug!("Peer {} was already released", id),
            },
        }
    }

    async fn shutdown(&mut self) {
        self.set_phase(Phase::ShuttingDown);

        let released = self.registry.close_all();
        let tasks = self.connections.len();
        self.connections.shutdown().await;
        info!(
            "Closed {} registered connections ({} connection tasks)",
            released, tasks
        );

        self.set_phase(Phase::Stopped);
        info!("Server is shut down.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        }
    }

    fn outbound() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(crate::registry::OUTBOUND_CAPACITY)
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9100".parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_starts_in_starting_phase() {
        let server = Server::bind(local_config()).await.unwrap();
        assert_eq!(server.phase(), Phase::Starting);
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = Server::bind(local_config()).await.unwrap();
        let taken = first.local_addr().unwrap().port();

        let result = Server::bind(ServerConfig {
            port: taken,
            ..local_config()
        })
        .await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_apply_handshake_and_messages() {
        let mut server = Server::bind(local_config()).await.unwrap();
        let (viewer_tx, mut viewer_rx) = outbound();
        let (alice_tx, _alice_rx) = outbound();

        server.apply_event(PeerEvent::Handshake {
            id: 1,
            addr: test_addr(),
            handshake: Handshake::Viewer,
            outbound: viewer_tx,
        });
        server.apply_event(PeerEvent::Handshake {
            id: 2,
            addr: test_addr(),
            handshake: Handshake::Messenger("alice".to_string()),
            outbound: alice_tx,
        });
        server.apply_event(PeerEvent::Message {
            id: 2,
            text: "hi".to_string(),
        });
        server.registry.broadcast();

        assert_eq!(
            viewer_rx.recv().await.as_deref(),
            Some("Welcome to the \"Chat App\" Chat Server!")
        );
        assert_eq!(
            viewer_rx.recv().await.as_deref(),
            Some("alice has joined the chat.")
        );
        assert_eq!(viewer_rx.recv().await.as_deref(), Some("alice: hi"));
    }

    #[tokio::test]
    async fn test_apply_duplicate_name_releases_connection() {
        let mut server = Server::bind(local_config()).await.unwrap();
        let (first_tx, _first_rx) = outbound();
        let (second_tx, mut second_rx) = outbound();

        for (id, tx) in [(1, first_tx), (2, second_tx)] {
            server.apply_event(PeerEvent::Handshake {
                id,
                addr: test_addr(),
                handshake: Handshake::Messenger("bob".to_string()),
                outbound: tx,
            });
        }

        assert_eq!(server.registry().messenger_count(), 1);
        assert_eq!(server.registry().queued().count(), 1);
        assert!(second_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_apply_repeated_disconnect_is_noop() {
        let mut server = Server::bind(local_config()).await.unwrap();
        let (carol_tx, _carol_rx) = outbound();

        server.apply_event(PeerEvent::Handshake {
            id: 5,
            addr: test_addr(),
            handshake: Handshake::Messenger("carol".to_string()),
            outbound: carol_tx,
        });
        server.registry.broadcast();

        server.apply_event(PeerEvent::Disconnected { id: 5 });
        server.apply_event(PeerEvent::Disconnected { id: 5 });

        assert_eq!(
            server.registry().queued().collect::<Vec<_>>(),
            vec!["carol has left the chat"]
        );
        assert!(!server.registry().is_name_taken("carol"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let server = Server::bind(local_config()).await.unwrap();
        let result = server.run(async {}).await;
        assert!(result.is_ok());
    }
}
