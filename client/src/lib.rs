//! # Chat Client Library
//!
//! Console front ends for the broadcast chat server.
//!
//! - [`messenger`]: registers under a display name and sends each line the
//!   user types until `quit`/`exit`, end of input, Ctrl-C or server close.
//! - [`viewer`]: registers as a viewer and prints every line the server
//!   broadcasts until Ctrl-C or server close.
//!
//! Both sessions take their shutdown signal as a future and, for the
//! messenger, the user's input as any buffered reader, so they run the same
//! way against a terminal and in tests.

pub mod error;
pub mod messenger;
pub mod viewer;

pub use error::ClientError;

/// Why a client session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed a quit keyword
    Quit,
    /// The local input stream ended
    InputClosed,
    /// Ctrl-C or another external shutdown signal
    Interrupted,
    /// The server closed the connection
    ServerClosed,
}
