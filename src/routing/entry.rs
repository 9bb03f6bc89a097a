//! Route entries parsed from workload labels.

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::config::RoutingConfig;
use crate::routing::matcher::normalize_host;

/// Why a label could not be turned into a route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("{label} is not a valid URL ({value:?}): {source}")]
    InvalidUrl {
        label: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{label} has no host ({value:?})")]
    MissingHost { label: &'static str, value: String },

    #[error("backend scheme {0:?} is not supported, expected http")]
    UnsupportedScheme(String),
}

/// Externally visible side of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontend {
    /// Lowercase hostname, no port.
    pub host: String,
    /// Path prefix without trailing slash; empty for the whole host.
    pub path_prefix: String,
}

impl Frontend {
    pub fn parse(value: &str) -> Result<Self, RouteError> {
        let url = parse_url("frontend", value)?;
        let host = url
            .host_str()
            .map(normalize_host)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RouteError::MissingHost {
                label: "frontend",
                value: value.to_string(),
            })?;

        Ok(Self {
            host,
            path_prefix: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Match key in `host/prefix/` form.
    pub fn pattern(&self) -> String {
        format!("{}{}/", self.host, self.path_prefix)
    }
}

/// Internal target of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub scheme: String,
    /// Host as it appears in an authority (IPv6 keeps its brackets).
    pub host: String,
    pub port: u16,
    /// Base path requests are joined onto.
    pub path: String,
    pub query: Option<String>,
}

impl Backend {
    pub fn parse(value: &str) -> Result<Self, RouteError> {
        let url = parse_url("backend", value)?;
        if url.scheme() != "http" {
            return Err(RouteError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RouteError::MissingHost {
                label: "backend",
                value: value.to_string(),
            })?
            .to_string();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port_or_known_default().unwrap_or(80),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
        })
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.authority(), self.path)
    }
}

/// One workload's route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Opaque workload identity, e.g. a container ID.
    pub workload: String,
    pub frontend: Frontend,
    pub backend: Backend,
}

impl RouteEntry {
    pub fn parse(workload: &str, frontend: &str, backend: &str) -> Result<Self, RouteError> {
        Ok(Self {
            workload: workload.to_string(),
            frontend: Frontend::parse(frontend)?,
            backend: Backend::parse(backend)?,
        })
    }

    /// Build an entry from a workload's labels.
    ///
    /// `Ok(None)` means the workload does not carry both labels and has not
    /// opted into proxying.
    pub fn from_labels(
        workload: &str,
        labels: &HashMap<String, String>,
        config: &RoutingConfig,
    ) -> Result<Option<Self>, RouteError> {
        match (labels.get(&config.frontend_label), labels.get(&config.backend_label)) {
            (Some(frontend), Some(backend)) => Self::parse(workload, frontend, backend).map(Some),
            _ => Ok(None),
        }
    }
}

fn parse_url(label: &'static str, value: &str) -> Result<Url, RouteError> {
    Url::parse(value.trim()).map_err(|source| RouteError::InvalidUrl {
        label,
        value: value.to_string(),
        source,
    })
}
