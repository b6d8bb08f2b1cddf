//! Shell-script stand-in for yt-dlp
//!
//! The script answers the three invocation shapes the pipeline uses: a metadata
//! dump, a single-video `-j` lookup and a download. Downloads write a small file
//! into the `-o` directory so tests can check where output landed.

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use video_dl::Config;

const SCRIPT: &str = r#"#!/bin/sh
dir='@DIR@'
for last in "$@"; do :; done
name="${last##*/}"
case "$1" in
  --version)
    echo "2026.09.01-fake"
    exit 0 ;;
  --dump-json|-J|--flat-playlist)
    cat "$dir/dump.out" 2>/dev/null
    exit 0 ;;
  -j)
    if [ -f "$dir/resolve/$name.json" ]; then cat "$dir/resolve/$name.json"; exit 0; fi
    echo "ERROR: [fake] $name: Video unavailable" >&2
    exit 1 ;;
  *)
    out=""
    prev=""
    for arg in "$@"; do
      if [ "$prev" = "-o" ]; then out="$arg"; fi
      prev="$arg"
    done
    if [ -f "$dir/fail/$name" ]; then
      echo "ERROR: [fake] $name: HTTP Error 403: Forbidden" >&2
      exit 1
    fi
    target="$(dirname "$out")"
    mkdir -p "$target"
    echo "[download] Destination: $target/$name.mp4"
    echo "[download]  25.0% of 4.00MiB at 2.00MiB/s ETA 00:01"
    if [ -f "$dir/download.sleep" ]; then exec sleep "$(cat "$dir/download.sleep")"; fi
    echo "[download] 100% of 4.00MiB in 00:00:02"
    echo "fake video $name" > "$target/$name.mp4"
    exit 0 ;;
esac
"#;

/// Scriptable yt-dlp replacement living in a temp directory
pub struct FakeYtDlp {
    dir: TempDir,
}

impl FakeYtDlp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let script = SCRIPT.replace("@DIR@", &dir.path().to_string_lossy());
        std::fs::write(dir.path().join("yt-dlp.sh"), script).expect("Failed to write script");
        std::fs::create_dir_all(dir.path().join("resolve")).expect("Failed to create resolve dir");
        std::fs::create_dir_all(dir.path().join("fail")).expect("Failed to create fail dir");
        Self { dir }
    }

    pub fn save_dir(&self) -> PathBuf {
        self.dir.path().join("videos")
    }

    /// Config running every yt-dlp invocation through the script
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.tools.ytdlp_path = Some(PathBuf::from("/bin/sh"));
        config.tools.base_args = vec![
            self.dir
                .path()
                .join("yt-dlp.sh")
                .to_string_lossy()
                .into_owned(),
        ];
        config.tools.search_path = false;
        config.download.default_save_path = self.save_dir();
        config
    }

    /// Publish a playlist: the dump prints one member per line and each
    /// member resolves to a full record
    pub fn publish_playlist(&self, title: &str, ids: &[&str]) {
        let count = ids.len() as u32;
        let mut dump = String::new();
        for (i, id) in ids.iter().enumerate() {
            let mut member = video_record(id);
            member["playlist"] = json!(title);
            member["playlist_title"] = json!(title);
            member["playlist_index"] = json!(i as u32 + 1);
            member["playlist_count"] = json!(count);
            dump.push_str(&member.to_string());
            dump.push('\n');
            self.publish_video(id);
        }
        self.write("dump.out", &dump);
    }

    /// Make `id` resolvable without adding it to the dump
    pub fn publish_video(&self, id: &str) {
        self.write(&format!("resolve/{id}.json"), &video_record(id).to_string());
    }

    /// Add a raw line to the end of the dump output
    pub fn append_dump_line(&self, line: &str) {
        let path = self.dir.path().join("dump.out");
        let mut dump = std::fs::read_to_string(&path).unwrap_or_default();
        dump.push_str(line);
        dump.push('\n');
        self.write("dump.out", &dump);
    }

    /// Remove the `-j` record so resolving `id` fails
    pub fn withdraw_video(&self, id: &str) {
        std::fs::remove_file(self.dir.path().join(format!("resolve/{id}.json"))).ok();
    }

    pub fn fail_download(&self, id: &str) {
        self.write(&format!("fail/{id}"), "");
    }

    pub fn set_download_delay(&self, secs: f64) {
        self.write("download.sleep", &secs.to_string());
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.dir.path().join(name), contents).expect("Failed to write fake tool file");
    }
}

pub fn video_url(id: &str) -> String {
    format!("https://videos.example.com/watch/{id}")
}

pub fn playlist_url(name: &str) -> String {
    format!("https://videos.example.com/playlist?list={name}")
}

fn video_record(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Clip {id}"),
        "webpage_url": video_url(id),
        "ext": "mp4",
        "duration": 12.5,
        "formats": [
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "height": 360},
            {"format_id": "22", "ext": "mp4", "vcodec": "avc1.64001F", "height": 720},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus"},
        ],
    })
}
