//! Error types for media-dl
//!
//! This module provides:
//! - The crate-wide [`Error`] type and [`Result`] alias
//! - [`ExtractionError`], the classified failure of the external extraction tool
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "jobs.work_root")
        key: Option<String>,
    },

    /// Submitted URL is missing or malformed; rejected before any job exists
    #[error("invalid URL: {0}")]
    Validation(String),

    /// Unknown job id
    #[error("job {0} not found")]
    NotFound(JobId),

    /// A job with this id is already tracked
    #[error("job {0} already exists")]
    JobExists(JobId),

    /// Retrieval attempted before the job reached `done`
    #[error("job {id} is not ready (status: {status})")]
    NotReady {
        /// The job that was requested
        id: JobId,
        /// Status observed at request time
        status: JobStatus,
    },

    /// The job finished but its artifact is no longer on disk
    #[error("artifact for job {0} no longer exists")]
    MissingArtifact(JobId),

    /// The external extraction tool failed
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Extraction reported success but no output file could be located
    #[error("no downloaded file found in {0}")]
    ArtifactNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Message suitable for storing on a failed job and showing to end users.
    ///
    /// Raw tool output is only exposed for unclassified extraction failures.
    pub fn user_message(&self) -> String {
        match self {
            Error::Extraction(e) => e.user_message(),
            Error::ArtifactNotFound(_) => "The downloaded file could not be found.".to_string(),
            Error::Io(_) => "A storage error occurred while saving the file.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Classified failure reported by an [`Extractor`](crate::extractor::Extractor)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The source site or URL is not supported by the extraction tool
    #[error("unsupported URL: {0}")]
    Unsupported(String),

    /// The source refused access (private, geo-blocked, login required)
    #[error("access forbidden: {0}")]
    Forbidden(String),

    /// The content has been removed or never existed
    #[error("content unavailable: {0}")]
    Unavailable(String),

    /// A media tool needed for the requested format (ffmpeg, ffprobe) is missing
    #[error("missing runtime dependency: {0}")]
    MissingDependency(String),

    /// The extraction tool itself is not installed or cannot be started
    #[error("extraction tool unavailable: {0}")]
    ExtractorUnavailable(String),

    /// The extraction exceeded the configured time limit
    #[error("extraction timed out after {0} seconds")]
    TimedOut(u64),

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}

impl ExtractionError {
    /// Classify raw tool output into a failure category.
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let lower = detail.to_lowercase();

        if detail.contains("Unsupported URL") {
            ExtractionError::Unsupported(detail)
        } else if detail.contains("HTTP Error 403")
            || lower.contains("private video")
            || lower.contains("sign in to confirm")
        {
            ExtractionError::Forbidden(detail)
        } else if detail.contains("Video unavailable") || lower.contains("has been removed") {
            ExtractionError::Unavailable(detail)
        } else if ["ffmpeg", "ffprobe", "avconv"]
            .iter()
            .any(|tool| lower.contains(tool))
        {
            ExtractionError::MissingDependency(detail)
        } else {
            ExtractionError::Failed(detail)
        }
    }

    /// Text shown to end users for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::Unsupported(_) => {
                "This link is not supported. Please enter a video link.".to_string()
            }
            ExtractionError::Forbidden(_) => {
                "The source blocked access. The video may be private or region-restricted."
                    .to_string()
            }
            ExtractionError::Unavailable(_) => {
                "The video does not exist or has been removed.".to_string()
            }
            ExtractionError::MissingDependency(_) => {
                "The server cannot produce this format because a media tool (FFmpeg) is missing. \
                 Please choose another video or try a lower quality."
                    .to_string()
            }
            ExtractionError::ExtractorUnavailable(_) => {
                "Downloads are unavailable because the extraction tool is not installed on the \
                 server. Please try again later."
                    .to_string()
            }
            ExtractionError::TimedOut(_) => {
                "The download took too long and was stopped. Please try again later.".to_string()
            }
            ExtractionError::Failed(detail) => {
                let line = detail
                    .lines()
                    .rev()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or_default();
                let line = line.strip_prefix("ERROR:").unwrap_or(line).trim();
                if line.is_empty() {
                    "Something went wrong. Please try again later.".to_string()
                } else {
                    line.to_string()
                }
            }
        }
    }

    /// Text shown for metadata lookups, where unclassified detail is never exposed.
    pub fn lookup_message(&self) -> String {
        match self {
            ExtractionError::Failed(_) | ExtractionError::MissingDependency(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
            other => other.user_message(),
        }
    }
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "job 3f2a... not found",
///     "details": { "job_id": "3f2a..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - client error or job not in a retrievable state
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::NotReady { .. } => 400,
            Error::MissingArtifact(_) => 400,
            Error::Extraction(ExtractionError::ExtractorUnavailable(_)) => 503,
            Error::Extraction(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict
            Error::JobExists(_) => 409,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 500 Internal Server Error
            Error::ArtifactNotFound(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::JobExists(_) => "job_exists",
            Error::NotReady { .. } => "not_ready",
            Error::MissingArtifact(_) => "missing_artifact",
            Error::Extraction(e) => match e {
                ExtractionError::Unsupported(_) => "unsupported_source",
                ExtractionError::Forbidden(_) => "access_forbidden",
                ExtractionError::Unavailable(_) => "content_unavailable",
                ExtractionError::MissingDependency(_) => "missing_dependency",
                ExtractionError::ExtractorUnavailable(_) => "extractor_unavailable",
                ExtractionError::TimedOut(_) => "extraction_timeout",
                ExtractionError::Failed(_) => "extraction_failed",
            },
            Error::ShuttingDown => "shutting_down",
            Error::ArtifactNotFound(_) => "artifact_not_found",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();

        let (message, details) = match &error {
            Error::NotFound(id) | Error::MissingArtifact(id) | Error::JobExists(id) => (
                error.to_string(),
                Some(serde_json::json!({ "job_id": id })),
            ),
            Error::NotReady { id, status } => (
                error.to_string(),
                Some(serde_json::json!({ "job_id": id, "status": status })),
            ),
            Error::Extraction(e) => (e.lookup_message(), None),
            Error::Config { key: Some(key), .. } => {
                (error.to_string(), Some(serde_json::json!({ "key": key })))
            }
            // Internal failures never expose paths or OS detail
            Error::ArtifactNotFound(_) | Error::Io(_) | Error::Serialization(_) => {
                ("internal server error".to_string(), None)
            }
            _ => (error.to_string(), None),
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
