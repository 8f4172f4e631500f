//! First-frame classification of new connections

use shared::{FrameReader, Handshake, HandshakeError};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::timeout;

/// Reads a connection's first frame and parses it as a handshake.
///
/// The read is bounded by `limit`; a peer that stays silent, closes early or
/// sends anything other than `viewer` / `name:<name>` is rejected. Name
/// uniqueness is checked later by the registry.
pub async fn read_handshake<R>(
    frames: &mut FrameReader<R>,
    limit: Duration,
) -> Result<Handshake, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let frame = timeout(limit, frames.next_frame())
        .await
        .map_err(|_| HandshakeError::Timeout)??;

    match frame {
        Some(frame) => Handshake::parse(&frame),
        None => Err(HandshakeError::Closed),
    }
}
