//! Configuration types for video-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// External tool configuration (yt-dlp location and invocation)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Directory shipped alongside the application that may contain a bundled yt-dlp
    #[serde(default)]
    pub bundled_dir: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit or bundled binary is found (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Arguments placed before every generated argument list
    ///
    /// Useful for options that apply to every invocation (cookies, proxy), or to
    /// run the tool through an interpreter.
    #[serde(default)]
    pub base_args: Vec<String>,

    /// Kill any single tool invocation that runs longer than this (None = no limit)
    #[serde(default, with = "optional_duration_serde")]
    pub process_timeout: Option<Duration>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            bundled_dir: None,
            search_path: true,
            base_args: Vec::new(),
            process_timeout: None,
        }
    }
}

/// How the metadata dump is requested from the tool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpMode {
    /// `--dump-json`: one JSON object per line, one line per video (default)
    #[default]
    DumpJson,
    /// `-J`: a single JSON document for the whole URL
    SingleJson,
    /// `--flat-playlist -j`: one lightweight JSON object per playlist member
    FlatPlaylist,
}

/// Metadata parser configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Dump flag variant used for `parse_url`
    #[serde(default)]
    pub dump_mode: DumpMode,
}

/// Resolver pool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Maximum concurrent resolver jobs (default: 4)
    ///
    /// Read once when the pipeline is created; the pool is not resized afterwards.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
        }
    }
}

/// Download behavior configuration (save path, concurrency, downloader arguments)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Save path used when an entry arrives without an explicit one (default: "./downloads")
    #[serde(default = "default_save_path")]
    pub default_save_path: PathBuf,

    /// Maximum concurrent downloads (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Output filename template appended to the save path (default: "%(title)s.%(ext)s")
    #[serde(default = "default_output_template")]
    pub output_template: String,

    /// Format selector used when no specific format was resolved
    /// (default: "bestvideo+bestaudio/best")
    #[serde(default = "default_fallback_format")]
    pub fallback_format: String,

    /// Container used when merging the fallback selection (default: "mp4")
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,

    /// Commit every resolved task to the download queue without waiting for the caller
    /// (default: false)
    #[serde(default)]
    pub auto_enqueue: bool,

    /// Extra arguments appended to every download invocation before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_save_path: default_save_path(),
            max_concurrent_downloads: default_max_concurrent(),
            output_template: default_output_template(),
            fallback_format: default_fallback_format(),
            merge_output_format: default_merge_output_format(),
            auto_enqueue: false,
            extra_args: Vec::new(),
        }
    }
}

/// Main configuration for the pipeline
///
/// Fields are organized into logical sub-configs:
/// - [`tools`](ToolsConfig) - yt-dlp discovery and invocation
/// - [`parser`](ParserConfig) - metadata dump mode
/// - [`resolve`](ResolveConfig) - resolver pool size
/// - [`download`](DownloadConfig) - save path, concurrency, downloader arguments
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Metadata parser settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// Resolver pool settings
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Download queue settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Buffer size of the public event channel (default: 1000)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            parser: ParserConfig::default(),
            resolve: ResolveConfig::default(),
            download: DownloadConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Config {
    /// Parse a configuration from a JSON string
    ///
    /// Missing fields take their defaults, so `{}` is a valid configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&contents)
    }

    /// Check that all limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.resolve.max_threads == 0 {
            return Err(Error::Config {
                message: "resolver pool needs at least one thread".to_string(),
                key: Some("resolve.max_threads".to_string()),
            });
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "download queue needs at least one concurrent slot".to_string(),
                key: Some("download.max_concurrent_downloads".to_string()),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event channel capacity must be greater than zero".to_string(),
                key: Some("event_channel_capacity".to_string()),
            });
        }
        if self.download.output_template.trim().is_empty() {
            return Err(Error::Config {
                message: "output template must not be empty".to_string(),
                key: Some("download.output_template".to_string()),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_threads() -> usize {
    4
}

fn default_max_concurrent() -> usize {
    4
}

fn default_save_path() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_fallback_format() -> String {
    "bestvideo+bestaudio/best".to_string()
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

// Optional Duration serialization helper (whole seconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
