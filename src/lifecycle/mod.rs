//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     spawn events, http, https → first error cancels the group → return it
//!
//! Shutdown (shutdown.rs):
//!     Token cancelled → servers stop accepting → drain, bounded by a grace period
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel root token → clean exit
//! ```
//!
//! # Design Decisions
//! - One cancellation tree: root token from main, child token per group
//! - Passthrough sessions are outside the tree and end on their own
//! - Shutdown has a deadline: open connections are dropped after it

pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use signals::{cancel_on_signal, wait_for_signal};
pub use supervisor::Supervisor;
