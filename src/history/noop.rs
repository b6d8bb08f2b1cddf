//! Sink that drops every record

use super::traits::HistorySink;
use crate::types::HistoryRecord;
use async_trait::async_trait;

/// History sink used when the caller does not persist history
pub struct NoOpHistorySink;

#[async_trait]
impl HistorySink for NoOpHistorySink {
    async fn record(&self, record: HistoryRecord) -> crate::Result<()> {
        tracing::trace!(id = %record.id, status = ?record.status, "History record discarded");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
