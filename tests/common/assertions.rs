//! Event collection helpers for integration tests

use std::time::Duration;
use tokio::sync::broadcast;
use video_dl::Event;

/// Default time allowed for a scenario to settle
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(20);

/// Collect events until `stop` matches (inclusive)
///
/// # Panics
///
/// On timeout or when the channel closes, listing what was received.
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut stop: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut seen = Vec::new();
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = stop(&event);
                    seen.push(event);
                    if done {
                        return true;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    match result {
        Ok(true) => seen,
        Ok(false) => panic!("Event channel closed; received: {seen:#?}"),
        Err(_) => panic!("Timed out waiting for event; received: {seen:#?}"),
    }
}

/// Collect until the `n`-th event matching `pred`
pub async fn collect_events_until_count<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    n: usize,
    mut pred: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut matched = 0;
    collect_events_until(events, timeout, |e| {
        if pred(e) {
            matched += 1;
        }
        matched >= n
    })
    .await
}

/// IDs carried by `TaskReady` events, in arrival order
pub fn ready_ids(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::TaskReady { task } => Some(task.id.clone()),
            _ => None,
        })
        .collect()
}
