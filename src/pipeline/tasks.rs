//! Committing resolved tasks to the download queue.

use crate::error::{Error, Result};
use crate::types::{DownloadTask, Event};
use std::sync::atomic::Ordering;

use super::Pipeline;

impl Pipeline {
    /// Commit a resolved task to the download queue
    ///
    /// The task is marked selected. If the queue is running it may start at once.
    pub async fn add_task(&self, task: DownloadTask) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.commit(task).await;
        Ok(())
    }

    /// Commit several tasks in order; returns how many were queued
    pub async fn add_tasks(&self, tasks: Vec<DownloadTask>) -> Result<usize> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let count = tasks.len();
        for task in tasks {
            self.commit(task).await;
        }
        tracing::info!(count, "Tasks added to download queue");
        Ok(count)
    }

    /// Remove a task that has not started yet
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no pending task has this ID (running tasks cannot be removed).
    pub async fn remove_task(&self, id: &str) -> Result<DownloadTask> {
        let mut state = self.state.lock().await;
        let task = self
            .queue
            .remove(id)
            .await
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        state.download_total = state.download_total.saturating_sub(1);
        drop(state);

        tracing::info!(id = %id, "Task removed from download queue");
        self.emit_event(Event::Log {
            message: format!("Removed task: {}", task.title),
        });
        self.emit_progress().await;
        Ok(task)
    }

    /// Remove every pending task and reset the finished-download counters
    ///
    /// Running downloads are left alone and still count as outstanding.
    pub async fn clear_tasks(&self) -> usize {
        let mut state = self.state.lock().await;
        let cleared = self.queue.clear_pending().await.len();
        let running = self.queue.stats().await.running as u64;

        state.download_total = running;
        state.download_done = 0;
        state.download_succeeded = 0;
        state.download_failed = 0;
        state.download_canceled = 0;
        drop(state);

        tracing::info!(cleared, "Pending tasks cleared");
        self.emit_event(Event::Log {
            message: format!("Cleared {cleared} pending tasks"),
        });
        self.emit_progress().await;
        cleared
    }

    /// Mark a task selected and hand it to the queue
    pub(crate) async fn commit(&self, mut task: DownloadTask) {
        task.selected = true;
        let id = task.id.clone();

        let mut state = self.state.lock().await;
        self.queue.enqueue(task).await;
        state.download_total += 1;
        drop(state);

        tracing::debug!(id = %id, "Task committed");
        self.emit_event(Event::TaskQueued { id });
    }
}
