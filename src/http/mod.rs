//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Plaintext (handoff listener)
//!     → server.rs (redirect router)
//!     → challenge middleware → redirect.rs (302 to https://)
//!
//! TLS connection
//!     → server.rs (proxy router)
//!     → request.rs (request ID)
//!     → challenge middleware
//!     → proxy.rs (route lookup, rewrite, forward)
//!     → headers.rs (hop-by-hop, X-Forwarded-*)
//!     → Send to client
//! ```

pub mod headers;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod server;

pub use proxy::{proxy_handler, ProxyState};
pub use request::X_REQUEST_ID;
pub use server::{proxy_router, redirect_router, run_http, run_https, serve_plaintext, serve_tls};
