//! History hand-off for finished downloads
//!
//! Every task that reaches a terminal state is snapshotted into a
//! [`HistoryRecord`](crate::types::HistoryRecord) and handed to a [`HistorySink`].
//! Persisting those records is left to the sink implementation:
//!
//! - [`NoOpHistorySink`]: discards records (default)
//! - [`MemoryHistorySink`]: keeps records in memory, for embedding and tests

mod memory;
mod noop;
mod traits;

pub use memory::MemoryHistorySink;
pub use noop::NoOpHistorySink;
pub use traits::HistorySink;
