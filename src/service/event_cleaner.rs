// Event ledger garbage collection

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{CodegraphStatus, EmbeddingStatus};
use crate::error::Result;
use crate::repository::EventRepository;
use crate::utils::timestamps::cutoff_before;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_deleted: usize,
    /// Set when every remaining event had finished and the table was reset.
    pub table_cleared: bool,
}

pub struct EventCleaner {
    events: Arc<dyn EventRepository>,
}

impl EventCleaner {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        Self { events }
    }

    pub fn run_with_retention(&self, retention_hours: i64) -> Result<CleanupReport> {
        self.run(cutoff_before(Utc::now(), retention_hours))
    }

    /// Delete events not updated since `cutoff`, then reset the table when
    /// nothing unfinished is left in either pipeline.
    pub fn run(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport> {
        info!("🧹 Starting event cleanup (cutoff {})", cutoff);
        let mut report = CleanupReport::default();

        let expired = self.events.get_expired_event_ids(cutoff)?;
        if !expired.is_empty() {
            report.expired_deleted = self.events.batch_delete_events(&expired)?;
            info!("Deleted {} expired events", report.expired_deleted);
        }

        if self.all_events_succeeded()? {
            let stats = self.events.clear_table()?;
            debug!("Events table reset after removing {} rows", stats.rows_deleted);
            report.table_cleared = true;
        }

        Ok(report)
    }

    fn all_events_succeeded(&self) -> Result<bool> {
        let unfinished_embedding: Vec<EmbeddingStatus> = EmbeddingStatus::ALL
            .into_iter()
            .filter(|s| *s != EmbeddingStatus::Success)
            .collect();
        let unfinished_codegraph: Vec<CodegraphStatus> = CodegraphStatus::ALL
            .into_iter()
            .filter(|s| *s != CodegraphStatus::Success)
            .collect();

        let embedding_left =
            self.events
                .get_events_count_by_workspace_and_status(&[], &unfinished_embedding, &[])?;
        let codegraph_left =
            self.events
                .get_events_count_by_workspace_and_status(&[], &[], &unfinished_codegraph)?;

        Ok(embedding_left == 0 && codegraph_left == 0)
    }
}
