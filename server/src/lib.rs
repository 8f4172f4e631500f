//! # Chat Server Library
//!
//! This library implements the central relay of the broadcast chat. It accepts
//! two kinds of TCP peers, messengers that send text under a unique display
//! name and viewers that only receive, and relays every messenger line to all
//! connected viewers in the order the server observed it.
//!
//! ## Core Responsibilities
//!
//! ### Connection Classification
//! The first line a connection sends is its handshake: `viewer`, or
//! `name:<displayname>`. The read is bounded by a timeout. Anything else, a
//! silent peer, or a name already held by an active messenger is rejected and
//! the connection is closed without touching any chat state.
//!
//! ### Disconnect Detection
//! Every connection is owned by its own task, which reacts to socket readiness
//! instead of polling. End of stream, a read error or a failed write turns into
//! a disconnect event for that peer only; the rest of the server carries on.
//!
//! ### Relay
//! Messenger lines are formatted as `"<name>: <text>"` and appended to an
//! outgoing FIFO queue together with join and leave notices. The queue is
//! flushed to every viewer at the end of each loop iteration.
//!
//! ## Architecture Design
//!
//! ### Single Owner
//! The server loop is the only code that touches the viewer set, the
//! messenger set, the name table and the outgoing queue. Connection tasks talk
//! to it through a channel of [`connection::PeerEvent`]s, so no lock is
//! needed and the registry invariants hold at every observation point.
//!
//! ### Line Framing
//! Payloads are `\n`-terminated lines (see [`shared::frame`]), so coalesced or
//! fragmented TCP reads never merge or split chat messages.
//!
//! ## Module Organization
//!
//! - `config`: server settings and their defaults
//! - `connection`: per-connection task and the events it reports
//! - `error`: fatal server errors
//! - `handshake`: bounded first-frame classification
//! - `network`: the server loop and its lifecycle phases
//! - `registry`: viewer/messenger sets, names and the outgoing queue
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     // Runs until Ctrl-C, then closes every connection
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod network;
pub mod registry;
