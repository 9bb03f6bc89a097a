//! Crate-level error returned by the long-running loops.

use thiserror::Error;

use crate::config::ConfigError;
use crate::events::EventSourceError;
use crate::net::ListenerError;
use crate::tls::CertificateError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("event source failed: {0}")]
    Events(#[from] EventSourceError),

    #[error("event stream ended")]
    EventStreamEnded,

    #[error("certificates unavailable: {0}")]
    Certificates(#[from] CertificateError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("task {task} failed: {message}")]
    TaskFailed { task: &'static str, message: String },
}
