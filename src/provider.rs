//! Purpose: Implement the five search provider methods on top of the coordinator.
//! Exports: `SearchProvider`.
//! Role: One shared handler; the calling scope comes from the resolved object path.
//! Invariants: Every method resets the idle timer before doing its work.
//! Invariants: Result sets are filtered per scope; metadata lookups are not multiplexed.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{Catalog, ResultMeta};
use crate::core::error::Error;
use crate::core::scope::ChannelScope;
use crate::idle::IdleTimer;
use crate::launch::LaunchDispatcher;
use crate::search::{SearchCoordinator, normalize_query};

pub struct SearchProvider {
    coordinator: SearchCoordinator,
    launcher: LaunchDispatcher,
    idle: Arc<IdleTimer>,
}

impl SearchProvider {
    pub fn new(catalog: Arc<dyn Catalog>, launcher: LaunchDispatcher, idle: Arc<IdleTimer>) -> Self {
        Self {
            coordinator: SearchCoordinator::new(catalog),
            launcher,
            idle,
        }
    }

    pub fn coordinator(&self) -> &SearchCoordinator {
        &self.coordinator
    }

    pub fn idle(&self) -> &Arc<IdleTimer> {
        &self.idle
    }

    pub async fn get_initial_result_set(
        &self,
        scope: ChannelScope,
        terms: &[String],
    ) -> Result<Vec<String>, Error> {
        self.idle.reset();
        self.coordinator.search(&normalize_query(terms), scope).await
    }

    /// Re-queries the catalog; `previous` results are not used to narrow the search.
    pub async fn get_subsearch_result_set(
        &self,
        scope: ChannelScope,
        previous: &[String],
        terms: &[String],
    ) -> Result<Vec<String>, Error> {
        self.idle.reset();
        debug!(previous = previous.len(), %scope, "subsearch");
        self.coordinator.search(&normalize_query(terms), scope).await
    }

    pub async fn get_result_metas(&self, item_ids: &[String]) -> Result<Vec<ResultMeta>, Error> {
        self.idle.reset();
        self.coordinator
            .catalog()
            .get_metadata_for_item_ids(item_ids)
            .await
    }

    pub async fn launch_search(
        &self,
        scope: ChannelScope,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), Error> {
        self.idle.reset();
        debug!(timestamp, %scope, "launch search");
        self.launcher
            .dispatch(&scope, None, &normalize_query(terms))
            .await
            .map(drop)
    }

    pub async fn activate_result(
        &self,
        scope: ChannelScope,
        item_id: &str,
        terms: &[String],
        timestamp: u32,
    ) -> Result<(), Error> {
        self.idle.reset();
        debug!(timestamp, %scope, item_id, "activate result");
        self.launcher
            .dispatch(&scope, Some(item_id), &normalize_query(terms))
            .await
            .map(drop)
    }
}
