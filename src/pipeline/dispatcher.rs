//! Component event handling and counter bookkeeping.
//!
//! Parser, resolver and queue events all arrive here and are handled one at a
//! time, which keeps counter updates and public event order consistent.

use crate::parser::ParserEvent;
use crate::queue::QueueEvent;
use crate::resolve::ResolveEvent;
use crate::types::{Event, HistoryRecord, HistoryStatus, QueueState};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

use super::Pipeline;

pub(crate) async fn run(
    pipeline: Pipeline,
    mut parser_rx: mpsc::UnboundedReceiver<ParserEvent>,
    mut resolve_rx: mpsc::UnboundedReceiver<ResolveEvent>,
    mut queue_rx: mpsc::UnboundedReceiver<QueueEvent>,
) {
    tracing::debug!("Event dispatcher started");
    let shutdown = pipeline.shutdown_token.clone();

    loop {
        tokio::select! {
            Some(event) = parser_rx.recv() => pipeline.handle_parser_event(event).await,
            Some(event) = resolve_rx.recv() => pipeline.handle_resolve_event(event).await,
            Some(event) = queue_rx.recv() => pipeline.handle_queue_event(event).await,
            _ = shutdown.cancelled() => break,
            else => break,
        }
    }

    // deliver whatever the components reported before shutdown
    while let Ok(event) = queue_rx.try_recv() {
        pipeline.handle_queue_event(event).await;
    }
    while let Ok(event) = resolve_rx.try_recv() {
        pipeline.handle_resolve_event(event).await;
    }
    while let Ok(event) = parser_rx.try_recv() {
        pipeline.handle_parser_event(event).await;
    }

    tracing::debug!("Event dispatcher stopped");
}

impl Pipeline {
    async fn handle_parser_event(&self, event: ParserEvent) {
        match event {
            ParserEvent::Entry(entry) => {
                let (stats, save_path) = {
                    let mut state = self.state.lock().await;
                    state.parse.total += 1;
                    let save_path = state
                        .current_save_path
                        .clone()
                        .unwrap_or_else(|| self.config.download.default_save_path.clone());
                    (state.parse, save_path)
                };

                tracing::debug!(id = %entry.id, index = entry.sequence_index, "Entry parsed");
                self.emit_event(Event::EntryParsed {
                    entry: entry.clone(),
                });
                self.emit_parse_stats(stats);

                if self.accepting_new.load(Ordering::SeqCst) {
                    self.resolver.add_task(entry, save_path).await;
                }
            }
            ParserEvent::Log(message) => self.emit_event(Event::Log { message }),
            ParserEvent::Finished {
                entries,
                skipped_lines,
            } => {
                self.emit_event(Event::ParseFinished {
                    entries,
                    skipped_lines,
                });
                self.emit_event(Event::Log {
                    message: format!("Parsed {entries} entries"),
                });
            }
            ParserEvent::Failed(error) => {
                let stats = {
                    let mut state = self.state.lock().await;
                    state.parse.total += 1;
                    state.parse.failed += 1;
                    state.parse
                };
                tracing::error!(error = %error, "Parse failed");
                self.emit_event(Event::TaskError {
                    id: None,
                    message: error.to_string(),
                    code: error.error_code().to_string(),
                });
                self.emit_parse_stats(stats);
            }
            ParserEvent::Canceled => {
                tracing::debug!("Parse run canceled");
            }
        }
    }

    async fn handle_resolve_event(&self, event: ResolveEvent) {
        match event {
            ResolveEvent::Resolved(task) => {
                let stats = {
                    let mut state = self.state.lock().await;
                    state.parse.success += 1;
                    state.parse
                };
                self.emit_parse_stats(stats);
                self.emit_event(Event::TaskReady { task: task.clone() });

                if self.config.download.auto_enqueue && self.accepting_new.load(Ordering::SeqCst) {
                    self.commit(task).await;
                }
            }
            ResolveEvent::Failed { entry, error } => {
                let stats = {
                    let mut state = self.state.lock().await;
                    state.parse.failed += 1;
                    state.parse
                };
                tracing::warn!(id = %entry.id, error = %error, "Resolve failed");
                self.emit_event(Event::TaskError {
                    id: Some(entry.id),
                    message: error.to_string(),
                    code: error.error_code().to_string(),
                });
                self.emit_parse_stats(stats);
            }
        }
    }

    async fn handle_queue_event(&self, event: QueueEvent) {
        match event {
            QueueEvent::Started(task) => self.emit_event(Event::TaskStarted { task }),
            QueueEvent::Progress { id, percent } => {
                self.emit_event(Event::TaskProgress { id, percent });
            }
            QueueEvent::Log { id, line } => self.emit_event(Event::Log {
                message: format!("[{id}] {line}"),
            }),
            QueueEvent::Finished {
                task,
                status,
                error,
            } => {
                {
                    let mut state = self.state.lock().await;
                    state.download_done += 1;
                    match status {
                        HistoryStatus::Success => state.download_succeeded += 1,
                        HistoryStatus::Failed => state.download_failed += 1,
                        HistoryStatus::Canceled => state.download_canceled += 1,
                    }
                }

                let record = HistoryRecord::from_task(
                    &task,
                    status,
                    error.as_ref().map(|e| e.to_string()),
                );
                if let Err(e) = self.history.record(record.clone()).await {
                    tracing::error!(id = %task.id, sink = self.history.name(), error = %e, "Failed to record history");
                }

                self.emit_event(Event::TaskFinished {
                    task: task.clone(),
                    status,
                });
                if status == HistoryStatus::Failed
                    && let Some(error) = &error
                {
                    self.emit_event(Event::TaskError {
                        id: Some(task.id.clone()),
                        message: error.to_string(),
                        code: error.error_code().to_string(),
                    });
                }
                self.emit_event(Event::HistoryRecorded { record });
                self.emit_progress().await;
            }
            QueueEvent::AllFinished => {
                {
                    let mut state = self.state.lock().await;
                    // a start() issued after the drain keeps the flags
                    if self.queue.state().await == QueueState::Stopped {
                        state.is_running = false;
                        state.is_paused = false;
                    }
                }
                tracing::info!("All tasks finished");
                self.emit_event(Event::AllTasksFinished);
            }
        }
    }
}
