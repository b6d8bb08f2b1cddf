//! History sink trait

use crate::types::HistoryRecord;
use async_trait::async_trait;

/// Receives one snapshot per finished download
///
/// Called from the pipeline's event dispatcher, so implementations should return
/// quickly; slow storage belongs behind a channel of its own.
///
/// # Examples
///
/// ```
/// use video_dl::history::{HistorySink, MemoryHistorySink};
/// use std::sync::Arc;
///
/// let sink: Arc<dyn HistorySink> = Arc::new(MemoryHistorySink::new());
/// assert_eq!(sink.name(), "memory");
/// ```
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Store one record
    ///
    /// Errors are logged by the pipeline and do not affect the download queue.
    async fn record(&self, record: HistoryRecord) -> crate::Result<()>;

    /// Name of this sink for logging
    fn name(&self) -> &'static str;
}
