//! Shared test helpers for creating Pipeline instances in tests.

use crate::config::Config;
use crate::history::{HistorySink, MemoryHistorySink};
use crate::pipeline::Pipeline;
use crate::test_support::FakeTool;
use crate::types::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub(crate) const WAIT: Duration = Duration::from_secs(15);

/// Pipeline wired to a fake yt-dlp, recording history in memory.
/// The FakeTool must be kept alive for the duration of the test.
pub(crate) async fn create_test_pipeline(
    configure: impl FnOnce(&mut Config),
) -> (Pipeline, FakeTool, Arc<MemoryHistorySink>) {
    let fake = FakeTool::new();
    let mut config = fake.config();
    configure(&mut config);

    let history = Arc::new(MemoryHistorySink::new());
    let sink: Arc<dyn HistorySink> = history.clone();
    let pipeline = Pipeline::with_history_sink(config, sink).await.unwrap();
    (pipeline, fake, history)
}

/// Receive events until `done` matches (inclusive); panics after [`WAIT`]
pub(crate) async fn events_until<F>(rx: &mut broadcast::Receiver<Event>, mut done: F) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) => {
                let stop = done(&event);
                seen.push(event);
                if stop {
                    return seen;
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                panic!("test receiver lagged by {n} events")
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                panic!("event channel closed; received so far: {seen:#?}")
            }
            Err(_) => panic!("timed out waiting for event; received so far: {seen:#?}"),
        }
    }
}

/// Receive until the `n`-th event matching `pred`
pub(crate) async fn events_until_count<F>(
    rx: &mut broadcast::Receiver<Event>,
    n: usize,
    mut pred: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut count = 0;
    events_until(rx, |e| {
        if pred(e) {
            count += 1;
        }
        count >= n
    })
    .await
}

pub(crate) fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

pub(crate) fn is_all_finished(event: &Event) -> bool {
    matches!(event, Event::AllTasksFinished)
}
