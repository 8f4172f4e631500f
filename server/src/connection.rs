//! Per-connection task
//!
//! Each accepted socket is owned by exactly one task running [`handle_connection`].
//! The task performs the bounded handshake read, then multiplexes between
//! frames arriving from the peer and lines the server loop wants written to it.
//! End of stream, a read error, a failed write or a write that cannot make
//! progress within [`WRITE_TIMEOUT`] are reported as
//! [`PeerEvent::Disconnected`]; the socket is closed when the task returns.

use crate::handshake::read_handshake;
use crate::registry::{Outbound, PeerId, OUTBOUND_CAPACITY};
use log::{debug, warn};
use shared::{write_frames, FrameReader, Handshake};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Longest a single socket write may block before the peer counts as gone
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Most lines written to the socket in one go
const WRITE_BATCH: usize = 64;

/// Events sent from connection tasks to the server loop
#[derive(Debug)]
pub enum PeerEvent {
    /// A connection sent a well-formed handshake and awaits registration.
    /// Dropping `outbound` without storing it rejects the connection.
    Handshake {
        id: PeerId,
        addr: SocketAddr,
        handshake: Handshake,
        outbound: Outbound,
    },
    /// A frame arrived from a messenger
    Message { id: PeerId, text: String },
    /// The peer closed its side or its socket failed
    Disconnected { id: PeerId },
}

/// Drives one connection from handshake to close.
pub async fn handle_connection<R, W>(
    id: PeerId,
    addr: SocketAddr,
    reader: R,
    mut writer: W,
    events: mpsc::UnboundedSender<PeerEvent>,
    handshake_timeout: Duration,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut frames = FrameReader::new(reader);

    let handshake = match read_handshake(&mut frames, handshake_timeout).await {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!("Wasn't able to identify {} as a Viewer or Messenger: {}", addr, e);
            return;
        }
    };

    let forwards_frames = matches!(handshake, Handshake::Messenger(_));
    let (outbound, mut lines) = mpsc::channel(OUTBOUND_CAPACITY);

    if events
        .send(PeerEvent::Handshake {
            id,
            addr,
            handshake,
            outbound,
        })
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            frame = frames.next_frame() => match frame {
                Ok(Some(text)) => {
                    if !forwards_frames {
                        debug!("Ignoring {} bytes from viewer {}", text.len(), addr);
                        continue;
                    }
                    if text.is_empty() {
                        continue;
                    }
                    if events.send(PeerEvent::Message { id, text }).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("{} closed the connection", addr);
                    let _ = events.send(PeerEvent::Disconnected { id });
                    break;
                }
                Err(e) => {
                    debug!("Read from {} failed: {}", addr, e);
                    let _ = events.send(PeerEvent::Disconnected { id });
                    break;
                }
            },

            line = lines.recv() => match line {
                Some(line) => {
                    let mut batch = vec![line];
                    while batch.len() < WRITE_BATCH {
                        match lines.try_recv() {
                            Ok(line) => batch.push(line),
                            Err(_) => break,
                        }
                    }

                    match timeout(WRITE_TIMEOUT, write_frames(&mut writer, &batch)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            debug!("Write to {} failed: {}", addr, e);
                            let _ = events.send(PeerEvent::Disconnected { id });
                            break;
                        }
                        Err(_) => {
                            warn!("Write to {} timed out", addr);
                            let _ = events.send(PeerEvent::Disconnected { id });
                            break;
                        }
                    }
                }
                // Released by the server loop: rejected, removed or shutting down
                None => break,
            },
        }
    }
}
