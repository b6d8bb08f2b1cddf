//! yt-dlp discovery and argument construction
//!
//! The rest of the crate never builds yt-dlp command lines by hand: the parser,
//! resolver pool and download queue ask [`YtDlp`] for argument lists and a
//! [`ProcessRunner`] to execute them.

use crate::config::{Config, DownloadConfig, DumpMode, ToolsConfig};
use crate::error::{Error, Result};
use crate::process::ProcessRunner;
use crate::types::DownloadTask;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable name looked up on PATH and in the bundled directory
pub const BINARY_NAME: &str = "yt-dlp";

/// Where the yt-dlp executable was found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinarySource {
    /// `tools.ytdlp_path`
    Configured,
    /// Next to the application (or in `tools.bundled_dir`)
    Bundled,
    /// Found on PATH
    SearchPath,
    /// Nothing found; the bare name is left for the OS to resolve
    BareName,
}

/// A located yt-dlp executable plus the settings that shape its command lines
#[derive(Clone, Debug)]
pub struct YtDlp {
    program: PathBuf,
    source: BinarySource,
    base_args: Vec<String>,
    timeout: Option<Duration>,
    dump_mode: DumpMode,
    download: DownloadConfig,
}

impl YtDlp {
    /// Locate yt-dlp and capture the argument settings from the configuration
    pub fn from_config(config: &Config) -> Self {
        let (program, source) = discover(&config.tools);
        tracing::info!(program = %program.display(), ?source, "Using yt-dlp");

        Self {
            program,
            source,
            base_args: config.tools.base_args.clone(),
            timeout: config.tools.process_timeout,
            dump_mode: config.parser.dump_mode,
            download: config.download.clone(),
        }
    }

    /// Path (or bare name) of the executable
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// How the executable was found
    pub fn source(&self) -> BinarySource {
        self.source
    }

    /// A runner with base arguments and timeout applied
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.program.clone())
            .with_base_args(self.base_args.clone())
            .with_timeout(self.timeout)
    }

    /// Arguments for the streaming metadata dump of `url`
    pub fn dump_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = match self.dump_mode {
            DumpMode::DumpJson => vec!["--dump-json".into()],
            DumpMode::SingleJson => vec!["-J".into()],
            DumpMode::FlatPlaylist => vec!["--flat-playlist".into(), "-j".into()],
        };
        args.push(url.to_string());
        args
    }

    /// Arguments for the single-record detail dump used by the resolver pool
    pub fn resolve_args(&self, url: &str) -> Vec<String> {
        vec!["-j".into(), url.to_string()]
    }

    /// Arguments that download `task` into its save path
    pub fn download_args(&self, task: &DownloadTask) -> Vec<String> {
        let mut args = Vec::new();

        if task.format_id.is_empty() {
            args.push("-f".into());
            args.push(self.download.fallback_format.clone());
            args.push("--merge-output-format".into());
            args.push(self.download.merge_output_format.clone());
        } else {
            args.push("-f".into());
            args.push(task.format_id.clone());
        }

        let output = task.save_path.join(&self.download.output_template);
        args.push("-o".into());
        args.push(output.to_string_lossy().into_owned());

        args.push("--no-playlist".into());
        args.push("--no-warnings".into());
        args.push("--newline".into());
        args.extend(self.download.extra_args.iter().cloned());
        args.push(task.source_url.clone());
        args
    }

    /// Run `--version` and return the reported version string
    pub async fn version(&self) -> Result<String> {
        let output = self.runner().start(["--version"]).collect().await;
        let stdout = output.into_stdout()?;
        let version = stdout.lines().next().unwrap_or_default().trim().to_string();
        if version.is_empty() {
            return Err(Error::NoOutput {
                stderr: String::new(),
            });
        }
        Ok(version)
    }
}

/// Find the executable: configured path, then bundled copy, then PATH, then bare name
fn discover(tools: &ToolsConfig) -> (PathBuf, BinarySource) {
    if let Some(path) = &tools.ytdlp_path {
        return (path.clone(), BinarySource::Configured);
    }

    if let Some(path) = bundled_candidates(tools.bundled_dir.as_deref())
        .into_iter()
        .find(|p| p.is_file())
    {
        return (path, BinarySource::Bundled);
    }

    if tools.search_path
        && let Ok(path) = which::which(BINARY_NAME)
    {
        return (path, BinarySource::SearchPath);
    }

    tracing::warn!("yt-dlp not found in bundled directory or PATH, relying on bare name");
    (PathBuf::from(BINARY_NAME), BinarySource::BareName)
}

fn bundled_candidates(bundled_dir: Option<&Path>) -> Vec<PathBuf> {
    let file_name = format!("{}{}", BINARY_NAME, std::env::consts::EXE_SUFFIX);

    let base = match bundled_dir {
        Some(dir) => dir.to_path_buf(),
        None => match std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            Some(dir) => dir,
            None => return Vec::new(),
        },
    };

    let mut candidates = vec![base.join(&file_name), base.join("bin").join(&file_name)];
    if let Some(parent) = base.parent() {
        candidates.push(parent.join("bin").join(&file_name));
    }
    candidates
}
