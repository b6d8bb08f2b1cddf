//! Core types and events for video-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a record came from a single-video URL or a playlist
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Standalone video
    #[default]
    Single,
    /// Member of a playlist or channel listing
    PlaylistMember,
}

/// One decodable record from the metadata dump
///
/// Produced by the streaming parser and consumed exactly once by the resolver pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// Video ID reported by the tool (never empty)
    pub id: String,
    /// Video title
    pub title: String,
    /// Page URL used for the resolve and download steps
    pub source_url: String,
    /// 1-based position within the playlist (1 for single videos)
    pub sequence_index: u32,
    /// Number of entries in the playlist (1 for single videos)
    pub total_count: u32,
    /// Single video or playlist member
    pub kind: EntryKind,
    /// Preferred format ID (empty = let the downloader pick its default)
    pub format_hint: String,
    /// Expected file extension of the preferred format
    pub extension_hint: String,
    /// Playlist title, when the record carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_title: Option<String>,
    /// Duration in seconds, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Thumbnail URL, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// A fully specified download, created by the resolver pool
///
/// Timestamps and the `finished` flag are stamped by the download queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Video ID
    pub id: String,
    /// 1-based position within the playlist
    pub sequence_index: u32,
    /// Number of entries in the playlist
    pub total_count: u32,
    /// Single video or playlist member
    pub kind: EntryKind,
    /// Video title
    pub title: String,
    /// Page URL handed to the downloader
    pub source_url: String,
    /// Format ID passed to `-f` (empty = configured fallback selector)
    pub format_id: String,
    /// Expected output extension
    pub extension: String,
    /// Directory the file is written to
    pub save_path: PathBuf,
    /// When the task was resolved
    pub resolved_at: DateTime<Utc>,
    /// When the download worker started
    pub started_at: Option<DateTime<Utc>>,
    /// When the download worker finished
    pub ended_at: Option<DateTime<Utc>>,
    /// Selected by the caller for download
    pub selected: bool,
    /// Reached a terminal state in the download queue
    pub finished: bool,
}

/// Terminal status of a download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    /// Downloader exited successfully
    Success,
    /// Downloader failed to launch, crashed or exited non-zero
    Failed,
    /// Worker was killed by pause, stop or shutdown
    Canceled,
}

/// Write-once snapshot of a finished download, handed to history persistence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Video ID
    pub id: String,
    /// Video title
    pub title: String,
    /// 1-based position within the playlist
    pub sequence_index: u32,
    /// Number of entries in the playlist
    pub total_count: u32,
    /// Single video or playlist member
    pub kind: EntryKind,
    /// Page URL that was downloaded
    pub source_url: String,
    /// Directory the file was written to
    pub save_path: PathBuf,
    /// When the download worker started
    pub started_at: Option<DateTime<Utc>>,
    /// When the download worker finished
    pub ended_at: Option<DateTime<Utc>>,
    /// Terminal status
    pub status: HistoryStatus,
    /// Failure reason for non-successful downloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryRecord {
    /// Snapshot a finished task
    pub fn from_task(task: &DownloadTask, status: HistoryStatus, error: Option<String>) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            sequence_index: task.sequence_index,
            total_count: task.total_count,
            kind: task.kind,
            source_url: task.source_url.clone(),
            save_path: task.save_path.clone(),
            started_at: task.started_at,
            ended_at: task.ended_at,
            status,
            error,
        }
    }
}

/// Download queue state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    /// Not draining; nothing running
    #[default]
    Stopped,
    /// Draining pending tasks into free slots
    Running,
    /// Not draining; running workers were asked to stop
    Paused,
}

/// Parse counters (reset on each `parse_url`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Entries received plus run-level failures
    pub total: u64,
    /// Entries resolved into download tasks
    pub success: u64,
    /// Resolve errors plus run-level failures
    pub failed: u64,
}

/// Download counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStats {
    /// Tasks ever committed to the download queue
    pub total: u64,
    /// Tasks that reached a terminal state
    pub done: u64,
    /// Terminal tasks that succeeded
    pub succeeded: u64,
    /// Terminal tasks that failed
    pub failed: u64,
    /// Terminal tasks that were killed
    pub canceled: u64,
    /// Tasks waiting for a slot
    pub pending: usize,
    /// Tasks holding a slot
    pub running: usize,
}

impl DownloadStats {
    /// Aggregate progress: done / (done + pending + running), 0.0 when idle
    pub fn progress(&self) -> f32 {
        let outstanding = (self.pending + self.running) as u64;
        let denominator = self.done + outstanding;
        if denominator == 0 {
            return 0.0;
        }
        self.done as f32 / denominator as f32
    }
}

/// Event emitted by the pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Human-readable log line from a component or tool
    Log {
        /// Message text
        message: String,
    },

    /// A record was decoded from the metadata dump
    EntryParsed {
        /// The decoded entry
        entry: ParsedEntry,
    },

    /// The metadata tool finished successfully
    ParseFinished {
        /// Entries emitted during the run
        entries: usize,
        /// Lines that could not be decoded
        skipped_lines: usize,
    },

    /// Parse counters changed
    ParseStatsUpdated {
        /// Entries received plus run-level failures
        total: u64,
        /// Entries resolved into download tasks
        success: u64,
        /// Resolve errors plus run-level failures
        failed: u64,
    },

    /// A task was resolved and can be shown before it is committed
    TaskReady {
        /// The resolved task
        task: DownloadTask,
    },

    /// A task was committed to the download queue
    TaskQueued {
        /// Video ID
        id: String,
    },

    /// A download worker started
    TaskStarted {
        /// The task, with `started_at` stamped
        task: DownloadTask,
    },

    /// Downloader progress for one task
    TaskProgress {
        /// Video ID
        id: String,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// A download reached a terminal state
    TaskFinished {
        /// The task, with `ended_at` stamped and `finished` set
        task: DownloadTask,
        /// Terminal status
        status: HistoryStatus,
    },

    /// Failure tied to one entry or task (or to the whole parse run when `id` is None)
    TaskError {
        /// Video ID of the affected unit
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Error message
        message: String,
        /// Machine-readable error code
        code: String,
    },

    /// A history snapshot was produced for a finished task
    HistoryRecorded {
        /// The snapshot
        record: HistoryRecord,
    },

    /// Aggregate download progress changed
    ProgressUpdated {
        /// done / (done + outstanding), 0.0 to 1.0
        progress: f32,
    },

    /// Pending and running sets are both empty
    AllTasksFinished,

    /// Download queue paused
    QueuePaused,

    /// Download queue resumed
    QueueResumed,

    /// Download queue stopped
    QueueStopped,

    /// Pipeline shut down
    Shutdown,
}
