//! Utility functions for filenames, artifact lookup and scratch directories

use crate::types::JobId;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Name used when a title sanitizes to nothing
pub const DEFAULT_TITLE: &str = "video";

/// Characters that are illegal in filenames on common filesystems, plus the
/// fullwidth lookalikes that extraction tools substitute for them
const ILLEGAL_FILENAME_CHARS: &[char] = &[
    '\\', '/', '*', '?', ':', '"', '<', '>', '|', // ASCII
    '＼', '／', '＊', '？', '：', '＂', '＜', '＞', '｜', // fullwidth
    '⧸', '⧹', // big solidus / reverse solidus
];

// The pattern is a literal, so compilation cannot fail at runtime
#[allow(clippy::expect_used)]
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ANSI regex"));

/// Replace filesystem-illegal characters with `_` and trim whitespace.
///
/// Returns [`DEFAULT_TITLE`] if nothing is left.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Test: Video?"), "Test_ Video_");
/// assert_eq!(sanitize_filename("   "), "video");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    // Tabs and newlines become spaces so the trim below removes them at the edges
    let replaced: String = name
        .chars()
        .map(|c| {
            if ILLEGAL_FILENAME_CHARS.contains(&c) {
                '_'
            } else if c.is_control() {
                if c.is_whitespace() { ' ' } else { '_' }
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Remove terminal colour escape sequences from tool output
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Content type for an artifact, derived from its extension
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("m4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "video/mp4",
    }
}

/// Find the first regular file in `dir` whose name ends with `ext`.
///
/// Partial downloads (`.part`, `.ytdl`) never match because they do not end
/// with the media extension.
pub async fn find_artifact(dir: &Path, ext: &str) -> std::io::Result<Option<PathBuf>> {
    let suffix = format!(".{}", ext.trim_start_matches('.'));
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_match = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&suffix));
        if is_match && entry.file_type().await?.is_file() {
            candidates.push(path);
        }
    }

    // read_dir order is platform dependent
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Recursively delete a job's scratch directory.
///
/// A directory that is already gone counts as success. Other failures are
/// logged and swallowed; returns whether the directory is gone afterwards.
pub async fn remove_work_dir(job_id: &JobId, dir: &Path) -> bool {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            tracing::debug!(job_id = %job_id, ?dir, "removed work dir");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(job_id = %job_id, ?dir, "work dir already gone");
            true
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, ?dir, error = %e, "failed to remove work dir");
            false
        }
    }
}
