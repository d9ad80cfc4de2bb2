//! Traits and types for media extraction

use crate::error::ExtractionError;
use crate::types::{ExtractionOutput, MediaInfo, ProgressEvent};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Observer invoked by an extractor as a download advances.
///
/// May be called from a different task than the one awaiting
/// [`Extractor::run`]; calls for a single run arrive in real-time order.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Capabilities of an extractor implementation
#[derive(Debug, Clone, Copy)]
pub struct ExtractorCapabilities {
    /// Can download media at all
    pub can_download: bool,
    /// Can merge separate video and audio streams (requires ffmpeg)
    pub can_merge_formats: bool,
}

/// Narrow interface to the external extraction tool
///
/// # Examples
///
/// ```no_run
/// use media_dl::extractor::{Extractor, YtDlpExtractor};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = YtDlpExtractor::from_path().expect("yt-dlp not found");
/// let output = extractor
///     .run(
///         "https://example.com/watch/1",
///         Path::new("/tmp/job"),
///         Arc::new(|event| println!("{event:?}")),
///     )
///     .await?;
/// println!("downloaded {}.{}", output.title, output.ext);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Download the media at `url` into `work_dir`.
    ///
    /// On failure the directory may contain partial files.
    async fn run(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError>;

    /// Look up metadata without downloading
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError>;

    /// Query capabilities of this extractor
    fn capabilities(&self) -> ExtractorCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
