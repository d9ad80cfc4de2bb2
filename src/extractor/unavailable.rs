//! Extractor used when no extraction tool is installed

use super::traits::{Extractor, ExtractorCapabilities, ProgressCallback};
use crate::error::ExtractionError;
use crate::types::{ExtractionOutput, MediaInfo};
use async_trait::async_trait;
use std::path::Path;

const NOT_INSTALLED: &str =
    "yt-dlp is not available. Configure extractor.ytdlp_path or ensure yt-dlp is in PATH.";

/// Extractor that fails every request with [`ExtractionError::ExtractorUnavailable`]
///
/// Keeps the service up (health, capabilities, API) when yt-dlp is absent;
/// submitted jobs end in the `error` state instead of crashing.
pub struct UnavailableExtractor;

#[async_trait]
impl Extractor for UnavailableExtractor {
    async fn run(
        &self,
        _url: &str,
        _work_dir: &Path,
        _on_progress: ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError> {
        Err(ExtractionError::ExtractorUnavailable(NOT_INSTALLED.into()))
    }

    async fn probe(&self, _url: &str) -> Result<MediaInfo, ExtractionError> {
        Err(ExtractionError::ExtractorUnavailable(NOT_INSTALLED.into()))
    }

    fn capabilities(&self) -> ExtractorCapabilities {
        ExtractorCapabilities {
            can_download: false,
            can_merge_formats: false,
        }
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
