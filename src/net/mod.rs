//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (plaintext socket)
//!     → listener.rs (accept loop, connection limits)
//!     → classify.rs (read leading bytes, pick protocol)
//!     → connection.rs (wrapper replaying the peeked bytes)
//!     → mux.rs (dispatch)
//!         → passthrough.rs (raw TCP to the SSH upstream)
//!         → handoff.rs (queue into the HTTP server's listener)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Ownership of a connection moves exactly once, to one consumer
//! - Classification failures only affect their own connection

pub mod classify;
pub mod connection;
pub mod handoff;
pub mod listener;
pub mod mux;
pub mod passthrough;

pub use classify::{Classifier, ClassifyError, Protocol};
pub use connection::{ClassifiedConnection, ConnectionId};
pub use handoff::{Handoff, ProxyListener};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use mux::Multiplexer;
pub use passthrough::{Passthrough, PassthroughStats};
