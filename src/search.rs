//! Purpose: Coalesce concurrent searches for one query into one catalog call.
//! Exports: `SearchCoordinator`, `normalize_query`.
//! Role: Owns the single "current multiplexer" slot shared by all provider objects.
//! Invariants: At most one live multiplexer exists for the active query.
//! Invariants: Deciding and attaching happen in one critical section with no await.
//! Invariants: A replaced multiplexer is canceled; its callers still get a completion.
//! Invariants: An empty query coalesces like any other but always yields no ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::core::error::{Error, ErrorKind};
use crate::core::filter::filter;
use crate::core::multiplexer::{Multiplexer, Pending};
use crate::core::scope::ChannelScope;

type ItemIds = Vec<String>;

struct ActiveQuery {
    query: String,
    multiplexer: Multiplexer<ItemIds>,
}

pub struct SearchCoordinator {
    catalog: Arc<dyn Catalog>,
    active: Mutex<Option<ActiveQuery>>,
    upstream_calls: AtomicU64,
}

/// Joins shell search terms into the multiplexing key.
pub fn normalize_query(terms: &[String]) -> String {
    terms.join(" ")
}

impl SearchCoordinator {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            active: Mutex::new(None),
            upstream_calls: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Number of catalog searches started so far.
    pub fn upstream_calls(&self) -> u64 {
        self.upstream_calls.load(Ordering::Relaxed)
    }

    pub fn active_query(&self) -> Option<String> {
        self.slot().as_ref().map(|active| active.query.clone())
    }

    /// Runs `query` for a caller in `scope` and returns the ids that scope may see.
    pub async fn search(&self, query: &str, scope: ChannelScope) -> Result<ItemIds, Error> {
        let pending = self.join(query, scope)?;
        let scope = pending.scope().clone();
        let completion = pending.wait().await;
        let item_ids = completion.result?;
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(filter(&item_ids, &scope, &completion.exclude))
    }

    /// Attaches a caller to the multiplexer for `query`, starting one if needed.
    pub fn join(&self, query: &str, scope: ChannelScope) -> Result<Pending<ItemIds>, Error> {
        let mut slot = self.slot();

        if let Some(active) = slot.as_ref() {
            if active.query == query && !active.multiplexer.is_completed() {
                debug!(query, %scope, "joining in-flight search");
                return active.multiplexer.attach(scope);
            }
        }

        if let Some(previous) = slot.take() {
            if !previous.multiplexer.is_completed() {
                debug!(previous = %previous.query, query, "canceling superseded search");
                previous.multiplexer.cancel();
            }
        }

        let multiplexer = Multiplexer::new();
        let pending = multiplexer.attach(scope)?;
        self.start_upstream(query.to_string(), multiplexer.clone());
        *slot = Some(ActiveQuery {
            query: query.to_string(),
            multiplexer,
        });
        Ok(pending)
    }

    fn start_upstream(&self, query: String, multiplexer: Multiplexer<ItemIds>) {
        let catalog = Arc::clone(&self.catalog);
        let token = multiplexer.cancellation();
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        debug!(query = %query, "starting catalog search");
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::new(ErrorKind::Canceled)
                    .with_message("search was superseded by a newer query")),
                result = catalog.get_item_ids_for_search(&query) => result,
            };
            let pushed = match result {
                Ok(item_ids) => multiplexer.push_result(item_ids),
                Err(err) => {
                    if err.kind() != ErrorKind::Canceled {
                        warn!(query = %query, error = %err, "catalog search failed");
                    }
                    multiplexer.push_error(err)
                }
            };
            if let Err(err) = pushed {
                warn!(query = %query, error = %err, "dropping catalog search result");
            }
        });
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveQuery>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResultMeta;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Catalog that holds every search until released.
    #[derive(Default)]
    struct GatedCatalog {
        calls: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl Catalog for GatedCatalog {
        async fn get_item_ids_for_search(&self, query: &str) -> Result<Vec<String>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(vec![format!("c/{query}?a"), format!("c/{query}?b")])
        }

        async fn get_metadata_for_item_ids(
            &self,
            _item_ids: &[String],
        ) -> Result<Vec<ResultMeta>, Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn normalize_query_joins_terms_with_spaces() {
        let terms = vec!["isaac".to_string(), "newton".to_string()];
        assert_eq!(normalize_query(&terms), "isaac newton");
        assert_eq!(normalize_query(&[]), "");
    }

    #[tokio::test]
    async fn identical_queries_share_one_catalog_call() {
        let catalog = Arc::new(GatedCatalog::default());
        let coordinator = SearchCoordinator::new(catalog.clone());

        let first = coordinator.join("gravity", ChannelScope::channel("a")).expect("join");
        let second = coordinator.join("gravity", ChannelScope::channel("b")).expect("join");
        tokio::task::yield_now().await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.upstream_calls(), 1);
        assert_eq!(coordinator.active_query().as_deref(), Some("gravity"));

        catalog.release.notify_waiters();
        let first = first.wait().await.result.expect("payload");
        let second = second.wait().await.result.expect("payload");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn changed_query_cancels_previous_and_completes_its_callers() {
        let catalog = Arc::new(GatedCatalog::default());
        let coordinator = SearchCoordinator::new(catalog.clone());

        let stale = coordinator.join("grav", ChannelScope::Global).expect("join");
        tokio::task::yield_now().await;
        let fresh = coordinator.join("gravity", ChannelScope::Global).expect("join");

        let err = stale.wait().await.result.expect_err("canceled");
        assert_eq!(err.kind(), ErrorKind::Canceled);

        tokio::task::yield_now().await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.upstream_calls(), 2);
        catalog.release.notify_waiters();
        let items = fresh.wait().await.result.expect("payload");
        assert_eq!(items.as_slice(), ["c/gravity?a", "c/gravity?b"]);
    }

    #[tokio::test]
    async fn empty_query_coalesces_and_yields_no_ids() {
        let catalog = Arc::new(GatedCatalog::default());
        let coordinator = SearchCoordinator::new(catalog.clone());

        let (channel, global, ()) = tokio::join!(
            coordinator.search("", ChannelScope::channel("a")),
            coordinator.search("", ChannelScope::Global),
            async { catalog.release.notify_one() },
        );

        assert_eq!(coordinator.upstream_calls(), 1);
        assert_eq!(channel.expect("channel"), Vec::<String>::new());
        assert_eq!(global.expect("global"), Vec::<String>::new());
    }
}
