use std::sync::Arc;

use cataloger_core::{revisit_due, RunKind};
use engine_logging::engine_debug;

use crate::store::{CatalogStore, StoreError};

/// Per-server revisit gate plus run bookkeeping for one kind of pass.
///
/// A run that never reaches [`RevisitScheduler::end_run`] stays open. Open
/// runs still count as the last run date; they never block scheduling beyond
/// the normal interval.
#[derive(Clone)]
pub struct RevisitScheduler {
    store: Arc<CatalogStore>,
    kind: RunKind,
}

impl RevisitScheduler {
    pub fn new(store: Arc<CatalogStore>, kind: RunKind) -> Self {
        Self { store, kind }
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    pub fn should_run(&self, server_url: &str, revisit_days: u32) -> Result<bool, StoreError> {
        if revisit_days == 0 {
            return Ok(true);
        }
        let last = self.store.last_run_date(self.kind, server_url)?;
        let today = self.store.today();
        let due = revisit_due(last, today, revisit_days);
        engine_debug!(
            "{} revisit check for {}: last={:?} today={} interval={}d due={}",
            self.kind.as_str(),
            server_url,
            last,
            today,
            revisit_days,
            due
        );
        Ok(due)
    }

    pub fn start_run(&self, server_url: &str) -> Result<i64, StoreError> {
        self.store.start_run(self.kind, server_url)
    }

    pub fn end_run(&self, run_id: i64) -> Result<(), StoreError> {
        self.store.end_run(self.kind, run_id)
    }
}
