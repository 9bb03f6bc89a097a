//! Workload routing table.
//!
//! # Responsibilities
//! - Hold at most one route per running workload
//! - Apply start/stop events from the event source
//! - Publish a fresh `CompiledRouter` after every change
//! - Ask the certificate manager to cover every routed host
//!
//! # Design Decisions
//! - Writers serialize on a `RwLock`; the router is published with
//!   `ArcSwap` inside the same write section, so a published router always
//!   matches the table that produced it
//! - Request handlers only load the `ArcSwap` and never touch the lock
//! - Labels are parsed before the lock is taken; malformed events leave the
//!   table untouched

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwap;

use crate::config::RoutingConfig;
use crate::events::{WorkloadAction, WorkloadEvent};
use crate::observability::metrics;
use crate::routing::entry::{RouteEntry, RouteError};
use crate::routing::router::CompiledRouter;
use crate::tls::CertificateManager;

/// What applying an event did to the table.
#[derive(Debug)]
pub enum Applied {
    /// A start event inserted or replaced the workload's route.
    Inserted,
    /// A stop event removed the workload's route.
    Removed,
    /// A stop event for a workload that had no route.
    Unknown,
    /// Not a start/stop event, or the workload carries no routing labels.
    Ignored,
    /// The labels did not parse; the table is unchanged.
    Rejected(RouteError),
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    entry: RouteEntry,
}

#[derive(Debug, Default)]
struct Entries {
    by_workload: HashMap<String, Slot>,
    next_seq: u64,
}

impl Entries {
    /// Entries in the order they were written.
    fn ordered(&self) -> Vec<&RouteEntry> {
        let mut slots: Vec<&Slot> = self.by_workload.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| &slot.entry).collect()
    }
}

pub struct RoutingTable {
    labels: RoutingConfig,
    certificates: Arc<dyn CertificateManager>,
    entries: RwLock<Entries>,
    router: ArcSwap<CompiledRouter>,
}

impl RoutingTable {
    pub fn new(labels: RoutingConfig, certificates: Arc<dyn CertificateManager>) -> Self {
        Self {
            labels,
            certificates,
            entries: RwLock::new(Entries::default()),
            router: ArcSwap::from_pointee(CompiledRouter::default()),
        }
    }

    /// Current router snapshot; hold it for the duration of one request.
    pub fn router(&self) -> Arc<CompiledRouter> {
        self.router.load_full()
    }

    /// Routes currently in the table, in write order.
    #[cfg(test)]
    pub(crate) fn entries(&self) -> Vec<RouteEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.ordered().into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_workload
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply one workload lifecycle event.
    pub fn apply(&self, event: &WorkloadEvent) -> Applied {
        if let WorkloadAction::Other(action) = &event.action {
            tracing::trace!(workload = %event.id, action = %action, "Ignoring event");
            return Applied::Ignored;
        }

        let entry = match RouteEntry::from_labels(&event.id, &event.labels, &self.labels) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Applied::Ignored,
            Err(e) => {
                tracing::warn!(
                    workload = %event.id,
                    error = %e,
                    "Skipping event with invalid routing labels"
                );
                return Applied::Rejected(e);
            }
        };

        let (applied, hosts) = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let applied = match event.action {
                WorkloadAction::Start => {
                    let seq = entries.next_seq;
                    entries.next_seq += 1;
                    entries.by_workload.insert(event.id.clone(), Slot { seq, entry });
                    Applied::Inserted
                }
                WorkloadAction::Stop => match entries.by_workload.remove(&event.id) {
                    Some(_) => Applied::Removed,
                    None => return Applied::Unknown,
                },
                WorkloadAction::Other(_) => return Applied::Ignored,
            };

            let router = CompiledRouter::build(entries.ordered());
            let hosts: Vec<String> = router.hostnames().map(str::to_string).collect();
            metrics::record_routes(router.len());
            self.router.store(Arc::new(router));
            (applied, hosts)
        };

        tracing::info!(
            workload = %event.id,
            action = %event.action,
            routes = hosts.len(),
            "Routing table updated"
        );
        self.ensure_certificates(hosts);
        applied
    }

    fn ensure_certificates(&self, hosts: Vec<String>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime available, skipping certificate requests");
            return;
        };
        for host in hosts {
            let pending = self.certificates.ensure_certificate(host.clone());
            runtime.spawn(async move {
                if let Err(e) = pending.await {
                    tracing::warn!(host = %host, error = %e, "Certificate request failed");
                }
            });
        }
    }
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("labels", &self.labels)
            .field("routes", &self.router.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::CertificateError;
    use axum_server::tls_rustls::RustlsConfig;
    use futures_util::future::{self, BoxFuture, FutureExt};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingCertificates {
        requested: Mutex<Vec<String>>,
    }

    impl CertificateManager for RecordingCertificates {
        fn tls_config(&self) -> RustlsConfig {
            unreachable!("routing never asks for TLS config")
        }

        fn ensure_certificate(
            &self,
            hostname: String,
        ) -> BoxFuture<'static, Result<(), CertificateError>> {
            self.requested.lock().unwrap().push(hostname.clone());
            future::ready(Err(CertificateError::Issue {
                host: hostname,
                message: "offline".into(),
            }))
            .boxed()
        }

        fn challenge_response(&self, _host: &str, _token: &str) -> Option<String> {
            None
        }
    }

    const APP: &str = "https://a.example.com/app";

    fn table() -> (Arc<RoutingTable>, Arc<RecordingCertificates>) {
        let certs = Arc::new(RecordingCertificates::default());
        let table = Arc::new(RoutingTable::new(RoutingConfig::default(), certs.clone()));
        (table, certs)
    }

    fn event(id: &str, action: WorkloadAction, frontend: &str, backend: &str) -> WorkloadEvent {
        let mut labels = HashMap::new();
        labels.insert("rproxy.frontend".to_string(), frontend.to_string());
        labels.insert("rproxy.backend".to_string(), backend.to_string());
        WorkloadEvent {
            id: id.to_string(),
            action,
            labels,
        }
    }

    #[tokio::test]
    async fn start_then_stop() {
        let (table, _) = table();

        let start = event("c1", WorkloadAction::Start, APP, "http://a:8080");
        assert!(matches!(table.apply(&start), Applied::Inserted));
        assert!(table.router().lookup("a.example.com", "/app/users").is_some());
        assert_eq!(table.len(), 1);

        let stop = event("c1", WorkloadAction::Stop, APP, "http://a:8080");
        assert!(matches!(table.apply(&stop), Applied::Removed));
        assert!(table.router().lookup("a.example.com", "/app/users").is_none());
        assert!(table.is_empty());

        assert!(matches!(table.apply(&stop), Applied::Unknown));
    }

    #[tokio::test]
    async fn malformed_labels_leave_table_unchanged() {
        let (table, _) = table();
        table.apply(&event("c1", WorkloadAction::Start, "https://a.example.com", "http://a:80"));
        let before = table.router();

        let bad = event("c2", WorkloadAction::Start, "not a url", "http://b:80");
        assert!(matches!(table.apply(&bad), Applied::Rejected(_)));
        let bad = event("c1", WorkloadAction::Start, "https://a.example.com", "ftp://b");
        assert!(matches!(table.apply(&bad), Applied::Rejected(_)));

        assert_eq!(table.len(), 1);
        assert!(Arc::ptr_eq(&before, &table.router()));
        assert_eq!(table.entries()[0].backend.host, "a");
    }

    #[tokio::test]
    async fn unlabelled_and_other_events_ignored() {
        let (table, _) = table();
        let plain = WorkloadEvent {
            id: "c1".into(),
            action: WorkloadAction::Start,
            labels: HashMap::new(),
        };
        assert!(matches!(table.apply(&plain), Applied::Ignored));

        let die = WorkloadAction::Other("die".into());
        let other = event("c1", die, "https://a.example.com", "http://a:80");
        assert!(matches!(table.apply(&other), Applied::Ignored));
        assert!(table.is_empty());
    }

    #[test]
    fn concurrent_starts_publish_whole_routers() {
        const WRITERS: usize = 64;
        let (table, _) = table();
        let done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|scope| {
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        let mut last = 0;
                        let mut loads = 0usize;
                        while !done.load(std::sync::atomic::Ordering::Acquire) || loads == 0 {
                            let router = table.router();
                            assert!(router.len() >= last, "router shrank during starts");
                            last = router.len();
                            for host in router.hostnames() {
                                let route = router.lookup(host, "/");
                                assert!(route.is_some(), "{} not routable", host);
                            }
                            loads += 1;
                        }
                        last
                    })
                })
                .collect();

            let writers: Vec<_> = (0..WRITERS)
                .map(|i| {
                    let table = &table;
                    scope.spawn(move || {
                        let frontend = format!("https://h{}.example.com", i);
                        let id = format!("c{}", i);
                        table.apply(&event(&id, WorkloadAction::Start, &frontend, "http://b:80"))
                    })
                })
                .collect();
            for writer in writers {
                assert!(matches!(writer.join().unwrap(), Applied::Inserted));
            }
            done.store(true, std::sync::atomic::Ordering::Release);

            for reader in readers {
                assert!(reader.join().unwrap() <= WRITERS);
            }
        });

        let router = table.router();
        assert_eq!(router.len(), WRITERS);
        assert_eq!(table.entries().len(), router.len());
        for i in 0..WRITERS {
            assert!(router.lookup(&format!("h{}.example.com", i), "/").is_some());
        }
    }

    #[tokio::test]
    async fn collision_is_last_write_wins() {
        let (table, _) = table();
        table.apply(&event("c1", WorkloadAction::Start, APP, "http://one:80"));
        table.apply(&event("c2", WorkloadAction::Start, APP, "http://two:80"));
        assert_eq!(table.router().lookup("a.example.com", "/app").unwrap().workload, "c2");

        // Restarting c1 makes it the latest writer.
        table.apply(&event("c1", WorkloadAction::Start, APP, "http://one:80"));
        assert_eq!(table.router().lookup("a.example.com", "/app").unwrap().workload, "c1");

        table.apply(&event("c1", WorkloadAction::Stop, APP, "http://one:80"));
        assert_eq!(table.router().lookup("a.example.com", "/app").unwrap().workload, "c2");
    }

    #[tokio::test]
    async fn certificates_requested_for_routed_hosts() {
        let (table, certs) = table();
        table.apply(&event("c1", WorkloadAction::Start, "https://a.example.com", "http://a:80"));
        table.apply(&event("c2", WorkloadAction::Start, "https://b.example.com/x", "http://b:80"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut requested = certs.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(requested, vec!["a.example.com", "a.example.com", "b.example.com"]);
    }
}
