//! Service facade wiring the job lifecycle components together

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::{Extractor, UnavailableExtractor, YtDlpExtractor};
use crate::media_url::prepare_url;
use crate::retrieval::{Artifact, RetrievalController};
use crate::runner::JobRunner;
use crate::store::JobStore;
use crate::stream::{ProgressStreamer, StreamEvent};
use crate::types::{Capabilities, Job, JobId, MediaInfo};
use crate::utils::remove_work_dir;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// How many times submission retries when a fresh id collides with an existing one
const ID_ATTEMPTS: usize = 3;

/// Main service instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaService {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Shared job state
    store: Arc<JobStore>,
    /// Extraction backend (trait object for pluggable implementations)
    extractor: Arc<dyn Extractor>,
    runner: JobRunner,
    streamer: ProgressStreamer,
    retrieval: RetrievalController,
    /// Stops background tasks (retention sweeper) on shutdown
    shutdown_token: CancellationToken,
    /// Set to false during shutdown
    accepting_new: Arc<AtomicBool>,
}

impl MediaService {
    /// Create a service, discovering the extraction tool from configuration.
    ///
    /// When no `yt-dlp` binary can be found the service still starts with an
    /// [`UnavailableExtractor`], so every job fails with a clear message.
    pub async fn new(config: Config) -> Result<Self> {
        let extractor: Arc<dyn Extractor> = match YtDlpExtractor::from_config(&config.extractor)
        {
            Some(extractor) => Arc::new(extractor),
            None => {
                tracing::warn!("yt-dlp not found, downloads will fail until it is installed");
                Arc::new(UnavailableExtractor)
            }
        };
        Self::with_extractor(config, extractor).await
    }

    /// Create a service around an explicit extractor
    pub async fn with_extractor(config: Config, extractor: Arc<dyn Extractor>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.jobs.work_root)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create work root '{}': {}",
                        config.jobs.work_root.display(),
                        e
                    ),
                ))
            })?;

        let caps = extractor.capabilities();
        tracing::info!(
            extractor = extractor.name(),
            can_download = caps.can_download,
            can_merge_formats = caps.can_merge_formats,
            work_root = ?config.jobs.work_root,
            "extractor initialized"
        );

        let store = Arc::new(JobStore::new());
        let runner = JobRunner::new(
            store.clone(),
            extractor.clone(),
            config.jobs.max_concurrent_jobs,
        );
        let streamer = ProgressStreamer::new(store.clone(), config.jobs.poll_interval);
        let retrieval = RetrievalController::new(
            store.clone(),
            config.jobs.cleanup_delay,
            config.jobs.unretrieved_ttl,
        );

        let shutdown_token = CancellationToken::new();
        retrieval.spawn_sweeper(config.jobs.sweep_interval, shutdown_token.clone());

        Ok(Self {
            config: Arc::new(config),
            store,
            extractor,
            runner,
            streamer,
            retrieval,
            shutdown_token,
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Validate a URL, create a job for it and start it in the background.
    ///
    /// Invalid URLs are rejected before any directory or job exists.
    pub async fn submit(&self, raw_url: &str) -> Result<JobId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = prepare_url(raw_url)?;
        let (id, work_dir) = self.allocate_work_dir().await?;

        self.register(Job::new(id.clone(), url.clone(), work_dir.clone()))
            .await?;

        tracing::info!(job_id = %id, url = %url, "job submitted");
        self.runner.spawn(id.clone(), url, work_dir);
        Ok(id)
    }

    /// Add a freshly allocated job to the store, releasing its work dir on failure
    async fn register(&self, job: Job) -> Result<()> {
        let (id, work_dir) = (job.id.clone(), job.work_dir.clone());
        if let Err(e) = self.store.create(job) {
            tracing::warn!(job_id = %id, error = %e, "could not register job, releasing its work dir");
            remove_work_dir(&id, &work_dir).await;
            return Err(e);
        }
        Ok(())
    }

    async fn allocate_work_dir(&self) -> Result<(JobId, std::path::PathBuf)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let id = JobId::generate();
            let work_dir = self.config.jobs.work_root.join(id.as_str());
            match tokio::fs::create_dir(&work_dir).await {
                Ok(()) => return Ok((id, work_dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < ID_ATTEMPTS => {
                    tracing::warn!(job_id = %id, "job id collision, generating a new one");
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Look up metadata for a URL without creating a job
    pub async fn probe(&self, raw_url: &str) -> Result<MediaInfo> {
        let url = prepare_url(raw_url)?;
        self.extractor.probe(&url).await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "metadata lookup failed");
            Error::from(e)
        })
    }

    /// Snapshot of a tracked job
    pub fn job(&self, id: &JobId) -> Result<Job> {
        self.store.get(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Open a progress stream for a job
    pub fn progress(&self, id: &JobId) -> Result<BoxStream<'static, StreamEvent>> {
        self.streamer.open(id)
    }

    /// Open a finished job's artifact and schedule its cleanup
    pub async fn fetch(&self, id: &JobId) -> Result<Artifact> {
        self.retrieval.fetch(id).await
    }

    /// Extractor capabilities and current load
    pub fn capabilities(&self) -> Capabilities {
        let caps = self.extractor.capabilities();
        Capabilities {
            extractor: self.extractor.name().to_string(),
            can_download: caps.can_download,
            can_merge_formats: caps.can_merge_formats,
            tracked_jobs: self.store.len(),
        }
    }

    /// Shared job store
    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Retrieval and cleanup controller
    pub fn retrieval(&self) -> &RetrievalController {
        &self.retrieval
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gracefully shut down the service
    ///
    /// Stops accepting submissions, stops the retention sweeper, then drops
    /// every job and deletes its scratch directory.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown_token.cancel();
        let removed = self.retrieval.shutdown().await;
        tracing::info!(removed, "Shutdown complete");
    }
}
