use crate::error::Error;
use crate::pipeline::test_helpers::{WAIT, count, create_test_pipeline, events_until};
use crate::test_support::{sample_task, video_url};
use crate::types::{Event, HistoryStatus};

#[tokio::test]
async fn shutdown_kills_downloads_and_records_them() {
    let (pipeline, fake, history) =
        create_test_pipeline(|c| c.download.max_concurrent_downloads = 2).await;
    fake.set_download_delay(30.0);
    let mut rx = pipeline.subscribe();

    for id in ["a", "b", "c"] {
        pipeline
            .add_task(sample_task(id, &fake.save_dir()))
            .await
            .unwrap();
    }
    pipeline.start().await.unwrap();
    assert_eq!(pipeline.download_stats().await.running, 2);

    pipeline.shutdown().await.unwrap();

    let events = events_until(&mut rx, |e| matches!(e, Event::Shutdown)).await;
    assert_eq!(
        count(&events, |e| matches!(
            e,
            Event::TaskFinished {
                status: HistoryStatus::Canceled,
                ..
            }
        )),
        2
    );
    assert_eq!(history.count(HistoryStatus::Canceled).await, 2);

    let stats = pipeline.download_stats().await;
    assert_eq!((stats.running, stats.pending, stats.canceled), (0, 1, 2));
    assert!(!pipeline.is_running().await);
}

#[tokio::test]
async fn new_work_is_refused_after_shutdown() {
    let (pipeline, fake, _history) = create_test_pipeline(|_| {}).await;
    pipeline.shutdown().await.unwrap();

    let err = pipeline
        .parse_url(&video_url("late"), fake.save_dir())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));

    let err = pipeline
        .add_task(sample_task("late", &fake.save_dir()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));

    let err = pipeline.add_tasks(Vec::new()).await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));

    assert!(matches!(pipeline.start().await, Err(Error::ShuttingDown)));
    assert!(matches!(pipeline.resume().await, Err(Error::ShuttingDown)));
}

#[tokio::test]
async fn shutdown_cancels_a_running_parse() {
    let (pipeline, fake, _history) = create_test_pipeline(|_| {}).await;
    fake.set_dump_delay(30.0);

    pipeline
        .parse_url(&video_url("slow"), fake.save_dir())
        .await
        .unwrap();
    assert!(pipeline.is_parsing().await);

    pipeline.shutdown().await.unwrap();
    assert!(!pipeline.is_parsing().await);
}

#[tokio::test]
async fn shutdown_twice_is_harmless() {
    let (pipeline, _fake, _history) = create_test_pipeline(|_| {}).await;
    let mut rx = pipeline.subscribe();

    pipeline.shutdown().await.unwrap();
    pipeline.shutdown().await.unwrap();

    let events = events_until(&mut rx, |e| matches!(e, Event::Shutdown)).await;
    assert_eq!(count(&events, |e| matches!(e, Event::Shutdown)), 1);
    events_until(&mut rx, |e| matches!(e, Event::Shutdown)).await;
}

#[tokio::test]
async fn queries_still_answer_after_shutdown() {
    let (pipeline, fake, _history) = create_test_pipeline(|_| {}).await;
    pipeline
        .add_task(sample_task("a", &fake.save_dir()))
        .await
        .unwrap();
    pipeline.shutdown().await.unwrap();

    assert_eq!(pipeline.download_stats().await.pending, 1);
    assert!(!pipeline.is_paused().await);
    assert!(pipeline.remove_task("a").await.is_ok());
}

#[tokio::test]
async fn dropping_every_handle_stops_the_dispatcher() {
    let (pipeline, _fake, _history) = create_test_pipeline(|_| {}).await;
    let second = pipeline.clone();
    let handle = pipeline.dispatcher.lock().await.take().unwrap();

    drop(pipeline);
    assert!(!second.shutdown_token.is_cancelled());
    assert!(!handle.is_finished());

    drop(second);
    tokio::time::timeout(WAIT, handle)
        .await
        .expect("dispatcher kept running after the last handle was dropped")
        .unwrap();
}
