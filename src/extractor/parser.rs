//! Parser for yt-dlp output

use crate::error::ExtractionError;
use crate::types::{ExtractionOutput, MediaInfo, ProgressEvent};
use serde_json::Value;
use std::path::PathBuf;

/// Prefix of progress lines printed through `--progress-template`
pub(crate) const PROGRESS_MARKER: &str = "[media-dl:progress]";

/// Prefix of the final info line printed through `--print after_move:`
pub(crate) const RESULT_MARKER: &str = "[media-dl:result]";

/// One meaningful line of yt-dlp stdout
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// Download progress or phase change
    Progress(ProgressEvent),
    /// Final information about the written file
    Result(ExtractionOutput),
}

/// Parse one stdout line; unrelated lines yield `None`.
///
/// Progress lines look like `[media-dl:progress] downloading  42.3%`,
/// result lines like `[media-dl:result] {"title": ..., "ext": ...}`.
pub fn parse_line(line: &str) -> Option<ToolLine> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(PROGRESS_MARKER) {
        let rest = rest.trim_start();
        let (status, percent) = rest.split_once(' ').unwrap_or((rest, ""));
        return match status {
            "downloading" => Some(ToolLine::Progress(ProgressEvent::Downloading {
                percent: percent.to_string(),
            })),
            "finished" | "postprocess" => Some(ToolLine::Progress(ProgressEvent::Finished)),
            _ => None,
        };
    }

    if let Some(rest) = line.strip_prefix(RESULT_MARKER) {
        return match serde_json::from_str::<Value>(rest.trim()) {
            Ok(info) => Some(ToolLine::Result(parse_result(&info))),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable yt-dlp result line");
                None
            }
        };
    }

    None
}

/// Extract title, extension and written path from an info dict
pub fn parse_result(info: &Value) -> ExtractionOutput {
    let source_path = ["filepath", "_filename", "filename"]
        .iter()
        .find_map(|key| info.get(*key).and_then(Value::as_str))
        .map(PathBuf::from);

    let ext = info
        .get("ext")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            source_path
                .as_ref()
                .and_then(|p| p.extension())
                .and_then(|e| e.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "mp4".to_string());

    ExtractionOutput {
        title: string_field(info, "title").unwrap_or_else(|| "video".to_string()),
        ext,
        source_path,
    }
}

/// Parse `yt-dlp -J` output into metadata
pub fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo, ExtractionError> {
    let info: Value = serde_json::from_slice(stdout)
        .map_err(|e| ExtractionError::Failed(format!("invalid metadata JSON: {e}")))?;

    let thumbnail = string_field(&info, "thumbnail")
        .or_else(|| {
            info.get("thumbnails")
                .and_then(Value::as_array)
                .and_then(|thumbs| thumbs.last())
                .and_then(|thumb| thumb.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    Ok(MediaInfo {
        title: string_field(&info, "title").unwrap_or_else(|| "Video".to_string()),
        thumbnail,
        duration: info.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
        uploader: string_field(&info, "uploader").unwrap_or_else(|| "Unknown".to_string()),
    })
}

fn string_field(info: &Value, key: &str) -> Option<String> {
    info.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
