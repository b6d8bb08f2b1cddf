//! Concurrency-limited download queue
//!
//! Tasks wait in FIFO order and are handed to download workers while the queue is
//! [`Running`](QueueState::Running) and a slot is free. Pause and stop kill the
//! running workers; killed tasks finish as [`HistoryStatus::Canceled`] and are not
//! put back into the queue. A drained queue falls back to
//! [`Stopped`](QueueState::Stopped), so later tasks wait for the next start.

use crate::error::{Error, ProcessError, Result};
use crate::process::{ProcessEvent, ProcessExit, ProcessKiller, RunningProcess};
use crate::types::{DownloadTask, HistoryStatus, QueueState};
use crate::ytdlp::YtDlp;
use chrono::Utc;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock};
use tokio::sync::{Mutex, mpsc};

static PROGRESS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\[download\]\s+(\d{1,3}(?:\.\d+)?)%").ok());

/// Notifications from the download queue
#[derive(Debug)]
pub enum QueueEvent {
    /// A worker took the task
    Started(DownloadTask),
    /// Downloader reported progress
    Progress {
        /// Task ID
        id: String,
        /// Percentage, 0.0 to 100.0
        percent: f32,
    },
    /// Downloader output that is not a progress line
    Log {
        /// Task ID
        id: String,
        /// The output line
        line: String,
    },
    /// A task reached a terminal state
    Finished {
        /// Task with `ended_at` stamped and `finished` set
        task: DownloadTask,
        /// Terminal status
        status: HistoryStatus,
        /// Failure reason for non-successful downloads
        error: Option<Error>,
    },
    /// Pending and running are both empty (once per drain)
    AllFinished,
}

/// Queue counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Current state
    pub state: QueueState,
    /// Current concurrency limit
    pub max_concurrent: usize,
    /// Tasks waiting for a slot
    pub pending: usize,
    /// Tasks holding a slot
    pub running: usize,
    /// Highest `running` ever observed
    pub peak_running: usize,
    /// Tasks ever enqueued
    pub submitted: u64,
    /// Tasks that finished successfully
    pub succeeded: u64,
    /// Tasks that failed
    pub failed: u64,
    /// Tasks that were killed
    pub canceled: u64,
    /// Pending tasks removed before they started
    pub removed: u64,
}

struct WorkerSlot {
    task_id: String,
    killer: ProcessKiller,
}

struct QueueInner {
    state: QueueState,
    max_concurrent: usize,
    pending: VecDeque<DownloadTask>,
    running: HashMap<u64, WorkerSlot>,
    next_slot_id: u64,
    drain_reported: bool,
    stats: QueueStats,
}

/// FIFO download queue with a bounded number of concurrent workers
#[derive(Clone)]
pub struct DownloadQueue {
    tool: Arc<YtDlp>,
    inner: Arc<Mutex<QueueInner>>,
    event_tx: mpsc::UnboundedSender<QueueEvent>,
}

impl DownloadQueue {
    /// Create a stopped queue with the given concurrency limit (minimum 1)
    pub fn new(
        tool: Arc<YtDlp>,
        max_concurrent: usize,
        event_tx: mpsc::UnboundedSender<QueueEvent>,
    ) -> Self {
        Self {
            tool,
            inner: Arc::new(Mutex::new(QueueInner {
                state: QueueState::Stopped,
                max_concurrent: max_concurrent.max(1),
                pending: VecDeque::new(),
                running: HashMap::new(),
                next_slot_id: 0,
                drain_reported: false,
                stats: QueueStats::default(),
            })),
            event_tx,
        }
    }

    /// Append a task; it starts right away if the queue is running and a slot is free
    pub async fn enqueue(&self, task: DownloadTask) {
        let mut inner = self.inner.lock().await;
        tracing::debug!(id = %task.id, pending = inner.pending.len(), "Task enqueued");
        inner.pending.push_back(task);
        inner.stats.submitted += 1;
        inner.drain_reported = false;
        if inner.state == QueueState::Running {
            self.fill_slots(&mut inner);
        }
    }

    /// Begin (or resume) draining pending tasks
    pub async fn start_queue(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != QueueState::Running {
            tracing::info!(pending = inner.pending.len(), "Download queue running");
        }
        inner.state = QueueState::Running;
        self.fill_slots(&mut inner);
        self.check_drained(&mut inner);
    }

    /// Stop draining and kill running workers; returns false unless the queue was running
    pub async fn pause_queue(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != QueueState::Running {
            return false;
        }
        inner.state = QueueState::Paused;
        Self::kill_running(&inner);
        tracing::info!(killed = inner.running.len(), "Download queue paused");
        true
    }

    /// Stop draining and kill running workers; pending tasks stay queued
    pub async fn stop_queue(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = QueueState::Stopped;
        Self::kill_running(&inner);
        tracing::info!(killed = inner.running.len(), "Download queue stopped");
    }

    /// Change the concurrency limit
    ///
    /// Running workers are never killed to honor a lower limit; the new value
    /// applies the next time a slot is filled.
    pub async fn set_max_concurrent(&self, max_concurrent: usize) -> Result<()> {
        if max_concurrent == 0 {
            return Err(Error::Config {
                message: "download queue needs at least one concurrent slot".to_string(),
                key: Some("download.max_concurrent_downloads".to_string()),
            });
        }
        let mut inner = self.inner.lock().await;
        inner.max_concurrent = max_concurrent;
        if inner.state == QueueState::Running {
            self.fill_slots(&mut inner);
        }
        Ok(())
    }

    /// Remove a pending task by ID
    pub async fn remove(&self, id: &str) -> Option<DownloadTask> {
        let mut inner = self.inner.lock().await;
        let position = inner.pending.iter().position(|t| t.id == id)?;
        let task = inner.pending.remove(position)?;
        inner.stats.removed += 1;
        if inner.state != QueueState::Stopped {
            self.check_drained(&mut inner);
        }
        Some(task)
    }

    /// Remove every pending task
    pub async fn clear_pending(&self) -> Vec<DownloadTask> {
        let mut inner = self.inner.lock().await;
        let cleared: Vec<DownloadTask> = inner.pending.drain(..).collect();
        inner.stats.removed += cleared.len() as u64;
        if inner.state != QueueState::Stopped {
            self.check_drained(&mut inner);
        }
        cleared
    }

    /// IDs of tasks holding a slot
    pub async fn running_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.running.values().map(|s| s.task_id.clone()).collect()
    }

    /// Current state
    pub async fn state(&self) -> QueueState {
        self.inner.lock().await.state
    }

    /// Snapshot of the queue counters
    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        QueueStats {
            state: inner.state,
            max_concurrent: inner.max_concurrent,
            pending: inner.pending.len(),
            running: inner.running.len(),
            ..inner.stats
        }
    }

    fn kill_running(inner: &QueueInner) {
        for slot in inner.running.values() {
            tracing::debug!(id = %slot.task_id, "Killing download worker");
            slot.killer.kill();
        }
    }

    fn fill_slots(&self, inner: &mut QueueInner) {
        while inner.state == QueueState::Running && inner.running.len() < inner.max_concurrent {
            let Some(mut task) = inner.pending.pop_front() else {
                break;
            };

            task.started_at = Some(Utc::now());
            let process = self.tool.runner().start(self.tool.download_args(&task));

            let slot_id = inner.next_slot_id;
            inner.next_slot_id += 1;
            inner.running.insert(
                slot_id,
                WorkerSlot {
                    task_id: task.id.clone(),
                    killer: process.killer(),
                },
            );
            inner.stats.peak_running = inner.stats.peak_running.max(inner.running.len());

            tracing::info!(id = %task.id, title = %task.title, running = inner.running.len(), "Download started");
            self.event_tx.send(QueueEvent::Started(task.clone())).ok();

            tokio::spawn(self.clone().run_worker(slot_id, task, process));
        }
    }

    async fn run_worker(self, slot_id: u64, task: DownloadTask, mut process: RunningProcess) {
        let mut stderr = Vec::new();
        let mut exit = ProcessExit::Crashed { signal: None };

        while let Some(event) = process.next_event().await {
            match event {
                ProcessEvent::Stdout(line) => {
                    if let Some(percent) = parse_progress(&line) {
                        self.event_tx
                            .send(QueueEvent::Progress {
                                id: task.id.clone(),
                                percent,
                            })
                            .ok();
                    } else if !line.trim().is_empty() {
                        self.event_tx
                            .send(QueueEvent::Log {
                                id: task.id.clone(),
                                line,
                            })
                            .ok();
                    }
                }
                ProcessEvent::Stderr(line) => {
                    if !line.trim().is_empty() {
                        self.event_tx
                            .send(QueueEvent::Log {
                                id: task.id.clone(),
                                line: line.clone(),
                            })
                            .ok();
                    }
                    stderr.push(line);
                }
                ProcessEvent::Exited(e) => exit = e,
            }
        }

        let error = exit
            .into_error(process.program(), &stderr.join("\n"))
            .map(Error::Process);
        self.on_worker_finished(slot_id, task, error).await;
    }

    async fn on_worker_finished(&self, slot_id: u64, mut task: DownloadTask, error: Option<Error>) {
        let mut inner = self.inner.lock().await;
        inner.running.remove(&slot_id);

        task.ended_at = Some(Utc::now());
        task.finished = true;

        let status = match &error {
            None => HistoryStatus::Success,
            Some(Error::Process(ProcessError::Killed)) => HistoryStatus::Canceled,
            Some(_) => HistoryStatus::Failed,
        };
        match status {
            HistoryStatus::Success => {
                inner.stats.succeeded += 1;
                tracing::info!(id = %task.id, "Download finished");
            }
            HistoryStatus::Failed => {
                inner.stats.failed += 1;
                if let Some(e) = &error {
                    tracing::warn!(id = %task.id, error = %e, "Download failed");
                }
            }
            HistoryStatus::Canceled => {
                inner.stats.canceled += 1;
                tracing::info!(id = %task.id, "Download canceled");
            }
        }

        self.event_tx
            .send(QueueEvent::Finished {
                task,
                status,
                error,
            })
            .ok();

        if inner.state == QueueState::Running {
            self.fill_slots(&mut inner);
        }
        self.check_drained(&mut inner);
    }

    /// With nothing pending or running, return to Stopped and report the drain once
    ///
    /// Tasks enqueued afterwards wait for the next `start_queue`.
    fn check_drained(&self, inner: &mut QueueInner) {
        if !inner.pending.is_empty() || !inner.running.is_empty() {
            return;
        }
        inner.state = QueueState::Stopped;
        if !inner.drain_reported {
            inner.drain_reported = true;
            tracing::info!("All downloads finished");
            self.event_tx.send(QueueEvent::AllFinished).ok();
        }
    }
}

/// Percentage from a `[download]  42.3% of ...` line
pub fn parse_progress(line: &str) -> Option<f32> {
    let re = PROGRESS_RE.as_ref()?;
    let caps = re.captures(line.trim_start())?;
    let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
    Some(percent.clamp(0.0, 100.0))
}
