//! Route lookup and request rewriting.
//!
//! # Responsibilities
//! - Store compiled routes grouped by host
//! - Look up the longest matching prefix for a request
//! - Rewrite the request target onto the chosen backend
//!
//! # Design Decisions
//! - Immutable after construction; the table swaps in a fresh router on change
//! - O(1) host lookup via HashMap, then a scan ordered by prefix length
//! - Explicit `None` rather than a silent default route

use std::collections::HashMap;

use axum::http::uri::{PathAndQuery, Uri};

use crate::routing::entry::{Backend, Frontend, RouteEntry};
use crate::routing::matcher::{join_paths, normalize_host, prefix_matches, strip_prefix};

/// A route ready to serve.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub workload: String,
    pub frontend: Frontend,
    pub backend: Backend,
}

impl CompiledRoute {
    fn from_entry(entry: &RouteEntry) -> Self {
        Self {
            workload: entry.workload.clone(),
            frontend: entry.frontend.clone(),
            backend: entry.backend.clone(),
        }
    }

    /// Point `uri` at the backend.
    ///
    /// The frontend prefix is removed from the path and the remainder is
    /// joined onto the backend's base path. Backend and request queries are
    /// concatenated with `&`.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let rest = strip_prefix(&self.frontend.path_prefix, uri.path());
        let path = join_paths(&self.backend.path, rest);

        let query = match (self.backend.query.as_deref(), uri.query()) {
            (Some(base), Some(extra)) if !base.is_empty() && !extra.is_empty() => {
                Some(format!("{}&{}", base, extra))
            }
            (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
            (Some(base), Some(extra)) => Some(format!("{}{}", base, extra)),
            (None, None) => None,
        };
        let path_and_query = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path,
        };

        Uri::builder()
            .scheme(self.backend.scheme.as_str())
            .authority(self.backend.authority())
            .path_and_query(PathAndQuery::try_from(path_and_query)?)
            .build()
    }
}

/// Immutable snapshot of the routing table.
#[derive(Debug, Default)]
pub struct CompiledRouter {
    hosts: HashMap<String, Vec<CompiledRoute>>,
    len: usize,
}

impl CompiledRouter {
    /// Build from entries in write order.
    ///
    /// When two entries claim the same host and prefix, the later one wins.
    pub fn build<'a>(entries: impl IntoIterator<Item = &'a RouteEntry>) -> Self {
        let mut hosts: HashMap<String, Vec<CompiledRoute>> = HashMap::new();
        let mut len = 0;

        for entry in entries {
            let routes = hosts.entry(entry.frontend.host.clone()).or_default();
            match routes
                .iter_mut()
                .find(|r| r.frontend.path_prefix == entry.frontend.path_prefix)
            {
                Some(existing) => *existing = CompiledRoute::from_entry(entry),
                None => {
                    routes.push(CompiledRoute::from_entry(entry));
                    len += 1;
                }
            }
        }

        for routes in hosts.values_mut() {
            routes.sort_by(|a, b| b.frontend.path_prefix.len().cmp(&a.frontend.path_prefix.len()));
        }

        Self { hosts, len }
    }

    /// Find the route for a request's host and path.
    pub fn lookup(&self, host: &str, path: &str) -> Option<&CompiledRoute> {
        self.hosts
            .get(&normalize_host(host))?
            .iter()
            .find(|r| prefix_matches(&r.frontend.path_prefix, path))
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Number of distinct match keys.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
