//! In-memory history sink

use super::traits::HistorySink;
use crate::types::{HistoryRecord, HistoryStatus};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Keeps every record in memory, in completion order
#[derive(Default)]
pub struct MemoryHistorySink {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All records received so far
    pub async fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().await.clone()
    }

    /// Number of records with the given status
    pub async fn count(&self, status: HistoryStatus) -> usize {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Drop all records
    pub async fn clear(&self) {
        self.records.lock().await.clear();
    }
}

#[async_trait]
impl HistorySink for MemoryHistorySink {
    async fn record(&self, record: HistoryRecord) -> crate::Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
