//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → cloned into each long-running loop at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes come from workload events, not from here
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ClassifierConfig, DockerConfig, ListenerConfig, ObservabilityConfig, PassthroughConfig,
    ProxyConfig, RoutingConfig, TimeoutConfig, TlsConfig,
};
