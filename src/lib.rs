//! Protocol-sniffing reverse proxy library.
//!
//! One plaintext socket carries both SSH and HTTP: SSH is passed through to a
//! fixed upstream, HTTP is redirected to HTTPS. The TLS listener routes
//! requests by host and path prefix to backends announced by labelled
//! workloads.

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod server;
pub mod tls;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use server::Server;
