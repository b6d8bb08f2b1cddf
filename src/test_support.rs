//! Fake yt-dlp and sample data shared by unit tests
//!
//! The fake tool is a POSIX shell script run through `/bin/sh`, so nothing has to
//! be made executable. Its behavior is driven by files in its temp directory:
//!
//! | file                 | effect                                                    |
//! |----------------------|-----------------------------------------------------------|
//! | `dump.out`           | stdout of the metadata dump                               |
//! | `dump.err`           | stderr of the metadata dump                               |
//! | `dump.code`          | exit code of the metadata dump                            |
//! | `dump.sleep`         | metadata dump sleeps this many seconds and prints nothing |
//! | `resolve/<id>.json`  | `-j` output for the URL ending in `<id>`                  |
//! | `resolve.sleep`      | delay before every `-j` answer                            |
//! | `fail/<id>`          | download of `<id>` exits 1                                |
//! | `download.sleep`     | downloads sleep this many seconds after 50%               |

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::config::Config;
use crate::types::{DownloadTask, EntryKind, ParsedEntry};
use crate::ytdlp::YtDlp;
use chrono::Utc;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const SCRIPT: &str = r#"#!/bin/sh
dir='@DIR@'
for last in "$@"; do :; done
name="${last##*/}"
case "$1" in
  --version)
    echo "2026.09.01-fake"
    exit 0 ;;
  --dump-json|-J|--flat-playlist)
    if [ -f "$dir/dump.sleep" ]; then exec sleep "$(cat "$dir/dump.sleep")"; fi
    if [ -f "$dir/dump.out" ]; then cat "$dir/dump.out"; fi
    if [ -f "$dir/dump.err" ]; then cat "$dir/dump.err" >&2; fi
    if [ -f "$dir/dump.code" ]; then exit "$(cat "$dir/dump.code")"; fi
    exit 0 ;;
  -j)
    if [ -f "$dir/resolve.sleep" ]; then sleep "$(cat "$dir/resolve.sleep")"; fi
    if [ -f "$dir/resolve/$name.json" ]; then cat "$dir/resolve/$name.json"; exit 0; fi
    echo "ERROR: [fake] $name: Video unavailable" >&2
    exit 1 ;;
  *)
    echo "[download] Destination: $name.mp4"
    if [ -f "$dir/fail/$name" ]; then
      echo "ERROR: [fake] $name: unable to download video data" >&2
      exit 1
    fi
    echo "[download]  50.0% of 10.00MiB at 1.00MiB/s ETA 00:05"
    if [ -f "$dir/download.sleep" ]; then exec sleep "$(cat "$dir/download.sleep")"; fi
    echo "[download] 100% of 10.00MiB in 00:00:10"
    exit 0 ;;
esac
"#;

/// Scriptable stand-in for yt-dlp
pub(crate) struct FakeTool {
    dir: TempDir,
}

impl FakeTool {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = SCRIPT.replace("@DIR@", &dir.path().to_string_lossy());
        std::fs::write(dir.path().join("yt-dlp.sh"), script).unwrap();
        std::fs::create_dir_all(dir.path().join("resolve")).unwrap();
        std::fs::create_dir_all(dir.path().join("fail")).unwrap();
        Self { dir }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn save_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Configuration pointing every tool invocation at the script
    pub(crate) fn config(&self) -> Config {
        let mut config = Config::default();
        config.tools.ytdlp_path = Some(PathBuf::from("/bin/sh"));
        config.tools.base_args = vec![self.path().join("yt-dlp.sh").to_string_lossy().into_owned()];
        config.tools.search_path = false;
        config.download.default_save_path = self.save_dir();
        config
    }

    pub(crate) fn tool(&self) -> Arc<YtDlp> {
        Arc::new(YtDlp::from_config(&self.config()))
    }

    pub(crate) fn set_dump(&self, stdout: &str) {
        self.write("dump.out", stdout);
    }

    pub(crate) fn set_dump_failure(&self, code: i32, stderr: &str) {
        self.write("dump.code", &code.to_string());
        self.write("dump.err", stderr);
    }

    pub(crate) fn set_dump_delay(&self, secs: f64) {
        self.write("dump.sleep", &secs.to_string());
    }

    /// Make `-j` answer for `id` with a full single-video record
    pub(crate) fn add_video(&self, id: &str) {
        self.write(&format!("resolve/{id}.json"), &video_json(id).to_string());
    }

    pub(crate) fn set_resolve_delay(&self, secs: f64) {
        self.write("resolve.sleep", &secs.to_string());
    }

    pub(crate) fn fail_download(&self, id: &str) {
        self.write(&format!("fail/{id}"), "");
    }

    pub(crate) fn set_download_delay(&self, secs: f64) {
        self.write("download.sleep", &secs.to_string());
    }

    pub(crate) fn clear_download_delay(&self) {
        std::fs::remove_file(self.path().join("download.sleep")).ok();
    }

    fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.path().join(name), contents).unwrap();
    }
}

pub(crate) fn video_url(id: &str) -> String {
    format!("https://videos.example.com/watch/{id}")
}

/// Single-video record in the shape `yt-dlp -j` prints
pub(crate) fn video_json(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Video {id}"),
        "webpage_url": video_url(id),
        "ext": "mp4",
        "duration": 42,
        "formats": [
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"},
            {"format_id": "136", "ext": "mp4", "vcodec": "avc1.4d401f", "height": 720},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "height": 1080},
        ],
        "playlist": null,
        "playlist_index": null,
    })
}

/// Playlist member record as printed by `--dump-json` on a playlist URL
pub(crate) fn playlist_member_json(id: &str, index: u32, count: u32) -> Value {
    let mut value = video_json(id);
    value["playlist"] = json!("Test Playlist");
    value["playlist_title"] = json!("Test Playlist");
    value["playlist_index"] = json!(index);
    value["playlist_count"] = json!(count);
    value
}

pub(crate) fn json_lines(values: &[Value]) -> String {
    let mut out = String::new();
    for value in values {
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}

pub(crate) fn sample_entry(id: &str) -> ParsedEntry {
    ParsedEntry {
        id: id.into(),
        title: format!("Video {id}"),
        source_url: video_url(id),
        sequence_index: 1,
        total_count: 1,
        kind: EntryKind::Single,
        format_hint: String::new(),
        extension_hint: "mp4".into(),
        playlist_title: None,
        duration_secs: None,
        thumbnail: None,
    }
}

pub(crate) fn sample_task(id: &str, save_path: &Path) -> DownloadTask {
    DownloadTask {
        id: id.into(),
        sequence_index: 1,
        total_count: 1,
        kind: EntryKind::Single,
        title: format!("Video {id}"),
        source_url: video_url(id),
        format_id: "137".into(),
        extension: "mp4".into(),
        save_path: save_path.to_path_buf(),
        resolved_at: Utc::now(),
        started_at: None,
        ended_at: None,
        selected: true,
        finished: false,
    }
}

/// Receive until `done` matches (inclusive); panics after `timeout`
pub(crate) async fn recv_until<T, F>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    timeout: Duration,
    mut done: F,
) -> Vec<T>
where
    T: std::fmt::Debug,
    F: FnMut(&T) -> bool,
{
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(item)) => {
                let stop = done(&item);
                seen.push(item);
                if stop {
                    return seen;
                }
            }
            Ok(None) => panic!("channel closed; received so far: {seen:#?}"),
            Err(_) => panic!("timed out after {timeout:?}; received so far: {seen:#?}"),
        }
    }
}
