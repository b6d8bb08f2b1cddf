//! Batch download example
//!
//! Parses a playlist (or single video) URL, queues every resolved entry and
//! downloads them with bounded concurrency, printing events as they arrive.
//!
//! ```bash
//! cargo run --example batch_download -- "https://www.youtube.com/playlist?list=..." ./videos
//! ```

use video_dl::{Config, Event, Pipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .ok_or("usage: batch_download <url> [save_dir]")?;
    let save_dir = args.next().unwrap_or_else(|| "./videos".to_string());

    let mut config = Config::default();
    config.download.auto_enqueue = true;
    config.download.max_concurrent_downloads = 3;

    let pipeline = Pipeline::new(config).await?;
    println!("Using yt-dlp {}", pipeline.tool_version().await?);

    let mut events = pipeline.subscribe();
    pipeline.parse_url(&url, &save_dir).await?;

    // downloads start once every parsed entry has been resolved or rejected
    let mut expected = None;
    let mut resolved = 0;
    while let Ok(event) = events.recv().await {
        match event {
            Event::EntryParsed { entry } => {
                println!(
                    "[parse] {}/{} {}",
                    entry.sequence_index, entry.total_count, entry.title
                );
            }
            Event::ParseFinished {
                entries,
                skipped_lines,
            } => {
                println!("[parse] done: {entries} entries ({skipped_lines} unreadable lines)");
                if entries == 0 {
                    break;
                }
                expected = Some(entries);
            }
            Event::TaskQueued { .. } => resolved += 1,
            Event::TaskProgress { id, percent } => {
                println!("[download] {id}: {percent:.1}%");
            }
            Event::TaskError { id: None, message, .. } => {
                eprintln!("[error] {message}");
                break;
            }
            Event::TaskError {
                id: Some(id),
                message,
                ..
            } => {
                eprintln!("[error] {id}: {message}");
                if !pipeline.is_running().await {
                    resolved += 1;
                }
            }
            Event::TaskFinished { task, status } => {
                println!("[download] {} finished: {status:?}", task.title);
            }
            Event::AllTasksFinished => {
                let stats = pipeline.download_stats().await;
                println!(
                    "All downloads finished: {} ok, {} failed, {} canceled",
                    stats.succeeded, stats.failed, stats.canceled
                );
                break;
            }
            _ => {}
        }

        if expected == Some(resolved) && !pipeline.is_running().await {
            if pipeline.download_stats().await.pending == 0 {
                break;
            }
            pipeline.start().await?;
        }
    }

    pipeline.shutdown().await?;
    Ok(())
}
