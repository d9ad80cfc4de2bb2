//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Job lifecycle settings (scratch storage, concurrency, cleanup policy)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobConfig {
    /// Directory under which each job gets its own scratch directory
    /// (default: `<system temp>/media-dl`)
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Maximum number of extractor runs at the same time (default: 3)
    ///
    /// Jobs waiting for a slot stay in the `starting` state.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Delay between a successful retrieval and deletion of the job's files
    /// (default: 30 seconds)
    #[serde(default = "default_cleanup_delay", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub cleanup_delay: Duration,

    /// How long a finished job that is never retrieved is kept (default: 1 hour)
    #[serde(default = "default_unretrieved_ttl", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub unretrieved_ttl: Duration,

    /// How often the retention sweeper runs (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,

    /// Interval between progress stream checks, in milliseconds (default: 500)
    #[serde(default = "default_poll_interval", with = "millis_serde")]
    #[schema(value_type = u64)]
    pub poll_interval: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            max_concurrent_jobs: default_max_concurrent(),
            cleanup_delay: default_cleanup_delay(),
            unretrieved_ttl: default_unretrieved_ttl(),
            sweep_interval: default_sweep_interval(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// External extraction tool settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtractorConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for binaries if explicit paths are not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Retry once with a progressive (no-merge) format when ffmpeg turns out
    /// to be unusable (default: true)
    #[serde(default = "default_true")]
    pub fallback_on_missing_dependency: bool,

    /// Upper bound for a single extraction run (None = unlimited)
    #[serde(default, with = "optional_duration_serde")]
    #[schema(value_type = Option<u64>)]
    pub timeout: Option<Duration>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: true,
            fallback_on_missing_dependency: true,
            timeout: None,
        }
    }
}

/// Main configuration for [`MediaService`](crate::MediaService)
///
/// - [`jobs`](JobConfig): scratch storage, concurrency and cleanup policy
/// - [`extractor`](ExtractorConfig): external tool discovery
/// - [`server`](ServerIntegrationConfig): REST API
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Job lifecycle settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// External extraction tool settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(Error::Config {
                message: "max_concurrent_jobs must be at least 1".into(),
                key: Some("jobs.max_concurrent_jobs".into()),
            });
        }
        if self.jobs.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll_interval must be greater than zero".into(),
                key: Some("jobs.poll_interval".into()),
            });
        }
        if self.jobs.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "sweep_interval must be greater than zero".into(),
                key: Some("jobs.sweep_interval".into()),
            });
        }
        if self.jobs.work_root.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "work_root must not be empty".into(),
                key: Some("jobs.work_root".into()),
            });
        }
        Ok(())
    }
}

/// External access and control interfaces
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

// Default value functions
fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("media-dl")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_cleanup_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_unretrieved_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
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
