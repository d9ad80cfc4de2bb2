//! Background execution of a single job
//!
//! The runner drives one job from `starting` to `done` or `error` on its own
//! task. Extractor callbacks are translated into [`JobPatch`]es and applied
//! through the store, so the runner never holds a job record of its own.

use crate::error::{Error, Result};
use crate::extractor::{Extractor, ProgressCallback};
use crate::store::JobStore;
use crate::types::{ExtractionOutput, JobId, JobPatch, ProgressEvent};
use crate::utils::{find_artifact, sanitize_filename, strip_ansi};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawns and drives jobs against an [`Extractor`]
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<JobStore>,
    extractor: Arc<dyn Extractor>,
    concurrent_limit: Arc<Semaphore>,
}

impl JobRunner {
    /// Create a runner that allows at most `max_concurrent` extractor runs
    pub fn new(store: Arc<JobStore>, extractor: Arc<dyn Extractor>, max_concurrent: usize) -> Self {
        Self {
            store,
            extractor,
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Start a job in the background.
    ///
    /// The job must already exist in the store. Every failure is recorded on
    /// the job; nothing escapes the task.
    pub fn spawn(&self, id: JobId, url: String, work_dir: PathBuf) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(id, url, work_dir).await })
    }

    /// Drive a job to a terminal state on the current task
    pub async fn run(&self, id: JobId, url: String, work_dir: PathBuf) {
        // Queued jobs stay in `starting` until a slot frees up
        let _permit = match self.concurrent_limit.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.fail(&id, "The service is shutting down.".to_string());
                return;
            }
        };

        info!(job_id = %id, url = %url, extractor = self.extractor.name(), "starting job");

        let on_progress = self.progress_callback(id.clone());
        let result = self.extractor.run(&url, &work_dir, on_progress).await;

        let outcome = match result {
            Ok(output) => finalize_artifact(&work_dir, &output).await,
            Err(e) => Err(Error::from(e)),
        };

        match outcome {
            Ok((filename, file_path)) => {
                info!(job_id = %id, filename = %filename, "job finished");
                // Extractors that never report `Finished` still pass through processing
                self.store.update(&id, JobPatch::Processing);
                if !self.store.update(
                    &id,
                    JobPatch::Done {
                        filename,
                        file_path,
                    },
                ) {
                    debug!(job_id = %id, "job vanished before completion was recorded");
                }
            }
            Err(e) => {
                warn!(job_id = %id, error = %e, "job failed");
                self.fail(&id, e.user_message());
            }
        }
    }

    fn fail(&self, id: &JobId, message: String) {
        if !self.store.update(id, JobPatch::Failed { message }) {
            debug!(job_id = %id, "job vanished before failure was recorded");
        }
    }

    fn progress_callback(&self, id: JobId) -> ProgressCallback {
        let store = self.store.clone();
        Arc::new(move |event| {
            let patch = match event {
                ProgressEvent::Downloading { percent } => JobPatch::Progress(parse_percent(&percent)),
                ProgressEvent::Finished => JobPatch::Processing,
            };
            // Rejected patches (e.g. a second stream after processing) are dropped
            store.update(&id, patch);
        })
    }
}

/// Parse a tool percentage such as `" \x1b[0;94m42.3%\x1b[0m"`; malformed input is 0
pub fn parse_percent(raw: &str) -> f64 {
    strip_ansi(raw)
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// Locate the produced file and move it to its sanitized name.
///
/// Returns the display filename and the final path.
pub async fn finalize_artifact(
    work_dir: &Path,
    output: &ExtractionOutput,
) -> Result<(String, PathBuf)> {
    let source = resolve_artifact(work_dir, output).await?;
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(output.ext.as_str())
        .to_string();

    let filename = format!("{}.{}", sanitize_filename(&output.title), ext);
    let target = work_dir.join(&filename);

    if source != target {
        tokio::fs::rename(&source, &target).await?;
        debug!(from = ?source, to = ?target, "renamed artifact");
    }

    Ok((filename, target))
}

async fn resolve_artifact(work_dir: &Path, output: &ExtractionOutput) -> Result<PathBuf> {
    if let Some(path) = &output.source_path {
        let path = if path.is_absolute() {
            path.clone()
        } else {
            work_dir.join(path)
        };
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return Ok(path);
        }
        debug!(?path, "reported artifact path does not exist, scanning work dir");
    }

    find_artifact(work_dir, &output.ext)
        .await?
        .ok_or_else(|| Error::ArtifactNotFound(work_dir.to_path_buf()))
}
