//! Peer bookkeeping and the outgoing line queue
//!
//! This module holds all mutable chat state the server loop owns:
//! - The Viewer set and the Messenger set, disjoint by construction
//! - The names held by active messengers
//! - The FIFO queue of formatted lines waiting to be broadcast
//!
//! Peers are stored as the sending half of their connection's bounded
//! outbound line channel. Dropping that sender is how the registry releases a
//! connection: the owning connection task sees the channel close and drops
//! the socket. A viewer whose channel is full has stopped reading and is
//! released at the end of the broadcast that found it full.

use log::{debug, info, warn};
use shared::{chat_line, join_notice, leave_notice, HandshakeError};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier the server loop assigns to every accepted connection
pub type PeerId = u64;

/// Lines queued here are written to the peer's socket by its connection task
pub type Outbound = mpsc::Sender<String>;

/// Lines a connection may have waiting for its socket before it counts as stalled
pub const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Stalled,
    Gone,
}

/// A registered connection
#[derive(Debug)]
pub struct Peer {
    pub addr: SocketAddr,
    outbound: Outbound,
}

impl Peer {
    pub fn new(addr: SocketAddr, outbound: Outbound) -> Self {
        Self { addr, outbound }
    }

    /// Hands a line to the connection task without waiting.
    ///
    /// `Gone` means the task has already exited; the disconnect it reported
    /// on the way out takes care of removal.
    fn send(&self, line: &str) -> Delivery {
        match self.outbound.try_send(line.to_string()) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Stalled,
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }
}

#[derive(Debug)]
struct Messenger {
    peer: Peer,
    name: String,
}

/// What a removed connection had been registered as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departed {
    Viewer(SocketAddr),
    Messenger { addr: SocketAddr, name: String },
}

/// Viewer/Messenger sets, messenger names and the outgoing queue
#[derive(Debug, Default)]
pub struct PeerRegistry {
    viewers: BTreeMap<PeerId, Peer>,
    messengers: BTreeMap<PeerId, Messenger>,
    names: HashSet<String>,
    queue: VecDeque<String>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a viewer and sends it the welcome line
    pub fn add_viewer(&mut self, id: PeerId, peer: Peer, welcome: &str) -> Result<(), HandshakeError> {
        if self.contains(id) {
            return Err(HandshakeError::AlreadyRegistered);
        }

        info!("{} is a Viewer", peer.addr);
        peer.send(welcome);
        self.viewers.insert(id, peer);
        Ok(())
    }

    /// Registers a messenger under `name` and queues its join notice.
    ///
    /// Fails without touching any state if the name is empty or held by
    /// another active messenger.
    pub fn add_messenger(&mut self, id: PeerId, name: String, peer: Peer) -> Result<(), HandshakeError> {
        if self.contains(id) {
            return Err(HandshakeError::AlreadyRegistered);
        }
        if name.trim().is_empty() {
            return Err(HandshakeError::EmptyName);
        }
        if self.names.contains(&name) {
            return Err(HandshakeError::NameTaken(name));
        }

        info!("{} is a Messenger with the name {}", peer.addr, name);
        self.queue.push_back(join_notice(&name));
        self.names.insert(name.clone());
        self.messengers.insert(id, Messenger { peer, name });
        Ok(())
    }

    /// Removes a connection from whichever set holds it.
    ///
    /// A messenger's name is freed and its leave notice queued. Removing an
    /// id that is not registered is a no-op and returns `None`.
    pub fn remove(&mut self, id: PeerId) -> Option<Departed> {
        if let Some(peer) = self.viewers.remove(&id) {
            info!("Viewer {} has left", peer.addr);
            return Some(Departed::Viewer(peer.addr));
        }

        let Messenger { peer, name } = self.messengers.remove(&id)?;
        info!("Messenger {} has left", name);
        self.names.remove(&name);
        self.queue.push_back(leave_notice(&name));
        Some(Departed::Messenger {
            addr: peer.addr,
            name,
        })
    }

    /// Queues text received from a messenger as `"<name>: <text>"`.
    ///
    /// Returns false if `id` is not a registered messenger.
    pub fn collect(&mut self, id: PeerId, text: &str) -> bool {
        match self.messengers.get(&id) {
            Some(messenger) => {
                debug!(
                    "Message from {} consists of {} bytes",
                    messenger.name,
                    text.len()
                );
                self.queue.push_back(chat_line(&messenger.name, text));
                true
            }
            None => false,
        }
    }

    /// Delivers every queued line, in order, to every viewer and empties
    /// the queue. Returns the number of lines flushed.
    ///
    /// Viewers whose outbound channel is full are removed once the queue has
    /// been flushed; they receive nothing further.
    pub fn broadcast(&mut self) -> usize {
        let lines = self.queue.len();
        let mut stalled = Vec::new();

        for line in self.queue.drain(..) {
            for (id, viewer) in &self.viewers {
                if stalled.contains(id) {
                    continue;
                }
                match viewer.send(&line) {
                    Delivery::Sent => {}
                    Delivery::Stalled => {
                        warn!("Viewer {} is not reading, disconnecting it", viewer.addr);
                        stalled.push(*id);
                    }
                    Delivery::Gone => {
                        debug!("Viewer {} ({}) is gone, skipping", id, viewer.addr)
                    }
                }
            }
        }

        for id in stalled {
            self.remove(id);
        }

        lines
    }

    /// Releases every registered connection, dropping undelivered lines.
    /// Returns how many connections were released.
    pub fn close_all(&mut self) -> usize {
        let closed = self.viewers.len() + self.messengers.len();
        self.viewers.clear();
        self.messengers.clear();
        self.names.clear();
        self.queue.clear();
        closed
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.viewers.contains_key(&id) || self.messengers.contains_key(&id)
    }

    #[cfg(test)]
    pub fn is_viewer(&self, id: PeerId) -> bool {
        self.viewers.contains_key(&id)
    }

    #[cfg(test)]
    pub fn is_messenger(&self, id: PeerId) -> bool {
        self.messengers.contains_key(&id)
    }

    #[cfg(test)]
    pub fn name_of(&self, id: PeerId) -> Option<&str> {
        self.messengers.get(&id).map(|m| m.name.as_str())
    }

    #[cfg(test)]
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn messenger_count(&self) -> usize {
        self.messengers.len()
    }

    /// Lines waiting for the next broadcast, oldest first
    pub fn queued(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }
}
