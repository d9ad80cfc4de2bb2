//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`]: submission, progress stream, retrieval, job snapshot
//! - [`info`]: metadata lookup without a job
//! - [`system`]: health, capabilities, OpenAPI

use serde::{Deserialize, Serialize};

mod info;
mod jobs;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use info::*;
pub use jobs::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Body of POST /download and POST /get_info
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UrlRequest {
    /// Media page URL (http or https)
    #[serde(default)]
    pub url: String,
}

/// Response of POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    /// Always "started"
    pub status: String,
    /// Identifier used for progress and retrieval
    #[schema(value_type = String)]
    pub download_id: crate::types::JobId,
}

/// Response of POST /get_info
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct InfoResponse {
    /// Always "success"
    pub status: String,
    /// Media title
    pub title: String,
    /// Thumbnail URL (may be empty)
    pub thumbnail: String,
    /// Duration in seconds
    pub duration: f64,
    /// Uploader or channel name
    pub uploader: String,
}

impl From<crate::types::MediaInfo> for InfoResponse {
    fn from(info: crate::types::MediaInfo) -> Self {
        Self {
            status: "success".to_string(),
            title: info.title,
            thumbnail: info.thumbnail,
            duration: info.duration,
            uploader: info.uploader,
        }
    }
}
