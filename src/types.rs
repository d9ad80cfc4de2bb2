//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Unique identifier for a job
///
/// Generated from a random UUID at submission and never reused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status as observed by clients
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, extractor not yet reporting
    Starting,
    /// Extractor is fetching media
    Downloading,
    /// Download finished, post-processing (muxing) in progress
    Processing,
    /// Artifact ready for retrieval
    Done,
    /// Failed with a user-facing message
    Error,
}

impl JobStatus {
    /// Whether no further transitions can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Lowercase name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a job together with the data that only exists in that state
#[derive(Clone, Debug, PartialEq)]
pub enum JobState {
    /// Accepted, extractor not yet reporting
    Starting,
    /// Extractor is fetching media
    Downloading,
    /// Post-processing in progress
    Processing,
    /// Artifact ready
    Done {
        /// Sanitized display filename
        filename: String,
        /// Location of the artifact inside the job's work dir
        file_path: PathBuf,
    },
    /// Failed
    Error {
        /// User-facing failure description
        message: String,
    },
}

impl JobState {
    /// Status discriminant of this state
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Starting => JobStatus::Starting,
            JobState::Downloading => JobStatus::Downloading,
            JobState::Processing => JobStatus::Processing,
            JobState::Done { .. } => JobStatus::Done,
            JobState::Error { .. } => JobStatus::Error,
        }
    }
}

/// A change to a job, applied atomically by the [`JobStore`](crate::store::JobStore)
#[derive(Clone, Debug, PartialEq)]
pub enum JobPatch {
    /// Download percentage reported by the extractor
    Progress(f64),
    /// Raw download finished, post-processing started
    Processing,
    /// Artifact resolved and renamed
    Done {
        /// Sanitized display filename
        filename: String,
        /// Final artifact path
        file_path: PathBuf,
    },
    /// Job failed
    Failed {
        /// User-facing failure description
        message: String,
    },
}

/// One download request and its tracked state
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Normalized URL handed to the extractor
    pub url: String,
    /// Scratch directory owned exclusively by this job
    pub work_dir: PathBuf,
    /// Current state
    pub state: JobState,
    /// Download percentage in [0, 100]
    pub progress: f64,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Time the job reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether a cleanup has already been scheduled for this job
    pub cleanup_scheduled: bool,
}

impl Job {
    /// Create a job in the `starting` state
    pub fn new(id: JobId, url: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            url: url.into(),
            work_dir: work_dir.into(),
            state: JobState::Starting,
            progress: 0.0,
            created_at: Utc::now(),
            finished_at: None,
            cleanup_scheduled: false,
        }
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Whether the job reached `done` or `error`
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Display filename, only present when done
    pub fn filename(&self) -> Option<&str> {
        match &self.state {
            JobState::Done { filename, .. } => Some(filename),
            _ => None,
        }
    }

    /// Artifact path, only present when done
    pub fn file_path(&self) -> Option<&Path> {
        match &self.state {
            JobState::Done { file_path, .. } => Some(file_path),
            _ => None,
        }
    }

    /// Failure message, only present on error
    pub fn message(&self) -> Option<&str> {
        match &self.state {
            JobState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Apply a patch following the job state machine.
    ///
    /// Returns `false` when the patch is not a legal transition, in which case
    /// the job is left untouched.
    pub fn apply(&mut self, patch: JobPatch) -> bool {
        if self.is_terminal() {
            return false;
        }

        match patch {
            JobPatch::Progress(percent) => match self.state {
                JobState::Starting | JobState::Downloading => {
                    self.state = JobState::Downloading;
                    self.progress = self.progress.max(clamp_percent(percent));
                    true
                }
                _ => false,
            },
            JobPatch::Processing => match self.state {
                JobState::Starting | JobState::Downloading => {
                    self.state = JobState::Processing;
                    self.progress = 100.0;
                    true
                }
                _ => false,
            },
            // `done` is only reachable through `processing`
            JobPatch::Done {
                filename,
                file_path,
            } => match self.state {
                JobState::Processing => {
                    self.state = JobState::Done {
                        filename,
                        file_path,
                    };
                    self.progress = 100.0;
                    self.finished_at = Some(Utc::now());
                    true
                }
                _ => false,
            },
            JobPatch::Failed { message } => {
                self.state = JobState::Error { message };
                self.progress = 0.0;
                self.finished_at = Some(Utc::now());
                true
            }
        }
    }

    /// Compact view pushed to progress stream clients
    pub fn payload(&self) -> ProgressPayload {
        ProgressPayload {
            progress: self.progress,
            status: self.status(),
            message: self.message().map(str::to_string),
            filename: self.filename().map(str::to_string),
        }
    }

    /// Public snapshot without filesystem paths
    pub fn info(&self) -> JobInfo {
        JobInfo {
            id: self.id.clone(),
            url: self.url.clone(),
            status: self.status(),
            progress: self.progress,
            filename: self.filename().map(str::to_string),
            message: self.message().map(str::to_string),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// Clamp a percentage into [0, 100]; NaN becomes 0
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Progress message sent to clients
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressPayload {
    /// Download percentage
    pub progress: f64,
    /// Job status
    pub status: JobStatus,
    /// Failure message (error only)
    pub message: Option<String>,
    /// Display filename (done only)
    pub filename: Option<String>,
}

impl ProgressPayload {
    /// Message sent when a job was cleaned up while a client was following it
    pub const GONE_MESSAGE: &'static str = "This download is no longer available.";

    /// Final payload for a job that disappeared mid-stream
    pub fn gone() -> Self {
        Self {
            progress: 0.0,
            status: JobStatus::Error,
            message: Some(Self::GONE_MESSAGE.to_string()),
            filename: None,
        }
    }
}

/// Job snapshot returned by `GET /jobs/{id}`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Job identifier
    pub id: JobId,
    /// Normalized URL
    pub url: String,
    /// Job status
    pub status: JobStatus,
    /// Download percentage
    pub progress: f64,
    /// Display filename (done only)
    pub filename: Option<String>,
    /// Failure message (error only)
    pub message: Option<String>,
    /// Submission time
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    /// Terminal time
    #[schema(value_type = Option<String>)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Progress notification emitted by an extractor
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Raw percentage text as printed by the tool (e.g. `" 42.3%"`)
    Downloading {
        /// Unparsed percentage string
        percent: String,
    },
    /// Raw download finished; post-processing may follow
    Finished,
}

/// Successful extractor result
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionOutput {
    /// Media title as reported by the source
    pub title: String,
    /// Final file extension (without dot)
    pub ext: String,
    /// Path the tool reports it wrote, if any
    pub source_path: Option<PathBuf>,
}

/// Metadata returned by a probe (no download)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// Media title
    pub title: String,
    /// Thumbnail URL (may be empty)
    pub thumbnail: String,
    /// Duration in seconds
    pub duration: f64,
    /// Uploader or channel name
    pub uploader: String,
}

/// System capabilities reported by `GET /capabilities`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Name of the active extractor implementation
    pub extractor: String,
    /// Whether downloads can run at all
    pub can_download: bool,
    /// Whether separate video and audio streams can be merged
    pub can_merge_formats: bool,
    /// Number of jobs currently tracked
    pub tracked_jobs: usize,
}
