//! Extractor backed by the external `yt-dlp` binary

use super::parser::{PROGRESS_MARKER, RESULT_MARKER, ToolLine, parse_line, parse_media_info};
use super::traits::{Extractor, ExtractorCapabilities, ProgressCallback};
use crate::config::ExtractorConfig;
use crate::error::ExtractionError;
use crate::types::{ExtractionOutput, MediaInfo};
use crate::utils::strip_ansi;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Format that merges the best video and audio streams (needs ffmpeg)
const MERGED_FORMAT: &str = "bestvideo+bestaudio/best";

/// Streams that already contain both video and audio
const PROGRESSIVE_FORMAT: &str =
    "best[ext=mp4][acodec!=none][vcodec!=none]/best[acodec!=none][vcodec!=none]/best";

/// Format request passed to yt-dlp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    /// Value of `-f`
    pub format: String,
    /// Directory holding ffmpeg, when merging is possible
    pub ffmpeg_location: Option<PathBuf>,
}

impl FormatSelection {
    /// Pick merged formats when ffmpeg is available, progressive otherwise
    pub fn for_ffmpeg(ffmpeg: Option<&Path>) -> Self {
        match ffmpeg {
            Some(binary) => Self {
                format: MERGED_FORMAT.to_string(),
                ffmpeg_location: binary.parent().map(Path::to_path_buf),
            },
            None => Self::progressive(),
        }
    }

    /// Formats that never need post-processing
    pub fn progressive() -> Self {
        Self {
            format: PROGRESSIVE_FORMAT.to_string(),
            ffmpeg_location: None,
        }
    }

    /// Whether this selection relies on ffmpeg
    pub fn merges(&self) -> bool {
        self.ffmpeg_location.is_some()
    }
}

/// Extractor that shells out to `yt-dlp`
///
/// Progress is read line by line from stdout using a progress template, so
/// callbacks fire while the child is still running.
///
/// # Examples
///
/// ```no_run
/// use media_dl::extractor::YtDlpExtractor;
/// use std::path::PathBuf;
///
/// // Explicit binary, no ffmpeg
/// let extractor = YtDlpExtractor::new(PathBuf::from("/usr/local/bin/yt-dlp"), None);
///
/// // Or auto-discover both from PATH
/// let extractor = YtDlpExtractor::from_path().expect("yt-dlp not found in PATH");
/// ```
pub struct YtDlpExtractor {
    binary_path: PathBuf,
    formats: FormatSelection,
    fallback_on_missing_dependency: bool,
    timeout: Option<Duration>,
}

impl YtDlpExtractor {
    /// Create an extractor with an explicit binary path and optional ffmpeg
    pub fn new(binary_path: PathBuf, ffmpeg: Option<PathBuf>) -> Self {
        Self {
            binary_path,
            formats: FormatSelection::for_ffmpeg(ffmpeg.as_deref()),
            fallback_on_missing_dependency: true,
            timeout: None,
        }
    }

    /// Attempt to find yt-dlp (and ffmpeg or avconv) in PATH
    pub fn from_path() -> Option<Self> {
        let binary = which::which("yt-dlp").ok()?;
        Some(Self::new(binary, find_ffmpeg()))
    }

    /// Build from configuration; `None` when no binary can be located
    pub fn from_config(config: &ExtractorConfig) -> Option<Self> {
        let binary = config.ytdlp_path.clone().or_else(|| {
            config
                .search_path
                .then(|| which::which("yt-dlp").ok())
                .flatten()
        })?;

        let ffmpeg = config.ffmpeg_path.clone().or_else(|| {
            if config.search_path {
                find_ffmpeg()
            } else {
                None
            }
        });

        Some(
            Self::new(binary, ffmpeg)
                .with_fallback(config.fallback_on_missing_dependency)
                .with_timeout(config.timeout),
        )
    }

    /// Retry with progressive formats when merging fails for lack of ffmpeg
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_on_missing_dependency = enabled;
        self
    }

    /// Kill runs that exceed `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Format selection used for the first attempt
    pub fn formats(&self) -> &FormatSelection {
        &self.formats
    }

    fn download_args(url: &str, work_dir: &Path, formats: &FormatSelection) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--no-color".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--progress".into(),
            "--no-simulate".into(),
            "-f".into(),
            formats.format.clone().into(),
            "-o".into(),
            work_dir.join("%(title)s.%(ext)s").into_os_string(),
            "--progress-template".into(),
            format!(
                "download:{PROGRESS_MARKER} %(progress.status)s %(progress._percent_str)s"
            )
            .into(),
            "--progress-template".into(),
            format!("postprocess:{PROGRESS_MARKER} postprocess").into(),
            "--print".into(),
            format!("after_move:{RESULT_MARKER} %()j").into(),
        ];

        if let Some(location) = &formats.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.clone().into_os_string());
        }

        args.push("--".into());
        args.push(url.into());
        args
    }

    async fn run_once(
        &self,
        url: &str,
        work_dir: &Path,
        formats: &FormatSelection,
        on_progress: &ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError> {
        let mut child = Command::new(&self.binary_path)
            .args(Self::download_args(url, work_dir, formats))
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Drain stderr concurrently so a chatty child never blocks on a full pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let mut result = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| ExtractionError::Failed(format!("failed to read yt-dlp output: {e}")))?
            {
                match parse_line(&line) {
                    Some(ToolLine::Progress(event)) => on_progress(event),
                    Some(ToolLine::Result(output)) => result = Some(output),
                    None => {}
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExtractionError::Failed(format!("failed to wait for yt-dlp: {e}")))?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let detail = strip_ansi(&stderr);
            tracing::debug!(code = ?status.code(), stderr = %detail, "yt-dlp exited with failure");
            return Err(ExtractionError::classify(detail));
        }

        result.ok_or_else(|| {
            ExtractionError::Failed("yt-dlp finished without reporting a file".to_string())
        })
    }

    async fn run_all(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: &ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError> {
        match self.run_once(url, work_dir, &self.formats, on_progress).await {
            Err(ExtractionError::MissingDependency(detail))
                if self.fallback_on_missing_dependency && self.formats.merges() =>
            {
                tracing::warn!(
                    url,
                    detail = %detail,
                    "merged format failed on ffmpeg, retrying with progressive format"
                );
                self.run_once(url, work_dir, &FormatSelection::progressive(), on_progress)
                    .await
            }
            other => other,
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> ExtractionError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractionError::ExtractorUnavailable(format!(
                "yt-dlp not found at {}",
                self.binary_path.display()
            ))
        } else {
            ExtractionError::Failed(format!("failed to execute yt-dlp: {e}"))
        }
    }

    fn timeout_error(&self) -> ExtractionError {
        ExtractionError::TimedOut(self.timeout.map(|t| t.as_secs()).unwrap_or_default())
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn run(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError> {
        let run = self.run_all(url, work_dir, &on_progress);
        match self.timeout {
            // Dropping the future drops the child, which kills it
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .unwrap_or_else(|_| Err(self.timeout_error())),
            None => run.await,
        }
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        let output = Command::new(&self.binary_path)
            .args(["-J", "--no-playlist", "--no-warnings", "--skip-download", "--"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| self.timeout_error())?,
            None => output.await,
        }
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let detail = strip_ansi(&String::from_utf8_lossy(&output.stderr));
            return Err(ExtractionError::classify(detail));
        }

        parse_media_info(&output.stdout)
    }

    fn capabilities(&self) -> ExtractorCapabilities {
        ExtractorCapabilities {
            can_download: true,
            can_merge_formats: self.formats.merges(),
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

fn find_ffmpeg() -> Option<PathBuf> {
    which::which("ffmpeg")
        .or_else(|_| which::which("avconv"))
        .ok()
}
