//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Workload event (labels)
//!     → entry.rs (parse frontend/backend URLs)
//!     → table.rs (insert/remove under the write lock)
//!     → router.rs (compile, publish snapshot)
//!
//! Incoming Request (host, path)
//!     → table.rs (load current snapshot)
//!     → router.rs + matcher.rs (longest prefix for the host)
//!     → CompiledRoute::rewrite (backend URI)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a change builds a new one
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same table always yields the same router

pub mod entry;
pub mod matcher;
pub mod router;
pub mod table;

pub use entry::{Backend, Frontend, RouteEntry, RouteError};
pub use router::{CompiledRoute, CompiledRouter};
pub use table::{Applied, RoutingTable};
