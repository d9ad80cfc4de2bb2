//! Artifact retrieval and scratch storage reclamation
//!
//! Retrieval opens the artifact and then schedules deletion of the job's work
//! dir after a grace period. The open handle keeps an in-flight transfer alive
//! on Unix even if the delay elapses first. A background sweeper reclaims
//! finished jobs that are never retrieved.

use crate::error::{Error, Result};
use crate::store::JobStore;
use crate::types::JobId;
use crate::utils::{content_type_for, remove_work_dir};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// An opened artifact ready to be streamed to a client
#[derive(Debug)]
pub struct Artifact {
    /// Open handle to the file
    pub file: tokio::fs::File,
    /// Display filename for `Content-Disposition`
    pub filename: String,
    /// File size in bytes
    pub len: u64,
    /// MIME type derived from the extension
    pub content_type: &'static str,
}

/// Serves completed artifacts and reclaims job storage
#[derive(Clone)]
pub struct RetrievalController {
    store: Arc<JobStore>,
    cleanup_delay: Duration,
    unretrieved_ttl: Duration,
}

impl RetrievalController {
    /// Create a controller.
    ///
    /// `cleanup_delay` is the grace period after retrieval, `unretrieved_ttl`
    /// how long a finished job may wait for a retrieval that never comes.
    pub fn new(store: Arc<JobStore>, cleanup_delay: Duration, unretrieved_ttl: Duration) -> Self {
        Self {
            store,
            cleanup_delay,
            unretrieved_ttl,
        }
    }

    /// Open the artifact of a finished job and schedule its cleanup.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for ids that were never issued
    /// - [`Error::MissingArtifact`] when the job was already reclaimed or the
    ///   file cannot be opened
    /// - [`Error::NotReady`] while the job is not `done`
    pub async fn fetch(&self, id: &JobId) -> Result<Artifact> {
        let Some(job) = self.store.get(id) else {
            return Err(if self.store.is_reclaimed(id) {
                Error::MissingArtifact(id.clone())
            } else {
                Error::NotFound(id.clone())
            });
        };

        let (Some(path), Some(filename)) = (job.file_path(), job.filename()) else {
            return Err(Error::NotReady {
                id: id.clone(),
                status: job.status(),
            });
        };

        // Opening is the existence check; no separate exists() race
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            warn!(job_id = %id, ?path, error = %e, "artifact could not be opened");
            Error::MissingArtifact(id.clone())
        })?;
        let len = file.metadata().await?.len();

        self.schedule_cleanup(id);
        info!(job_id = %id, filename, len, "serving artifact");

        Ok(Artifact {
            file,
            filename: filename.to_string(),
            len,
            content_type: content_type_for(path),
        })
    }

    /// Schedule deletion after the grace period.
    ///
    /// Returns `false` if a cleanup was already scheduled or the job is gone.
    pub fn schedule_cleanup(&self, id: &JobId) -> bool {
        if !self.store.mark_cleanup_scheduled(id) {
            return false;
        }

        debug!(job_id = %id, delay = ?self.cleanup_delay, "cleanup scheduled");
        let controller = self.clone();
        let id = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.cleanup_delay).await;
            controller.cleanup_now(&id).await;
        });
        true
    }

    /// Remove the job from the store and delete its work dir.
    ///
    /// Returns `false` if the job was already gone.
    pub async fn cleanup_now(&self, id: &JobId) -> bool {
        let Some(job) = self.store.remove(id) else {
            debug!(job_id = %id, "cleanup skipped, job already removed");
            return false;
        };
        remove_work_dir(id, &job.work_dir).await;
        info!(job_id = %id, "job cleaned up");
        true
    }

    /// Reclaim finished jobs nobody retrieved within the ttl.
    ///
    /// Returns how many jobs were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut removed = 0;
        for id in self.store.expired(self.unretrieved_ttl, Utc::now()) {
            // A retrieval may have scheduled its own cleanup in the meantime
            if self.store.mark_cleanup_scheduled(&id) && self.cleanup_now(&id).await {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "swept unretrieved jobs");
        }
        removed
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until cancelled
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        controller.sweep_expired().await;
                    }
                    _ = cancel.cancelled() => {
                        debug!("retention sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Drop every job and delete all work dirs.
    ///
    /// Running extractors are not interrupted; their late updates hit an
    /// absent job and are ignored.
    pub async fn shutdown(&self) -> usize {
        let jobs = self.store.drain();
        let count = jobs.len();
        for job in jobs {
            if !job.status().is_terminal() {
                debug!(job_id = %job.id, status = %job.status(), "dropping unfinished job");
            }
            remove_work_dir(&job.id, &job.work_dir).await;
        }
        if count > 0 {
            info!(count, "removed all jobs on shutdown");
        }
        count
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Job, JobPatch, JobStatus};
    use std::path::{Path, PathBuf};
    use tokio::io::AsyncReadExt;

    fn controller(delay: Duration) -> (RetrievalController, Arc<JobStore>) {
        let store = Arc::new(JobStore::new());
        let controller =
            RetrievalController::new(store.clone(), delay, Duration::from_secs(3600));
        (controller, store)
    }

    fn finished_job(store: &JobStore, root: &Path) -> (JobId, PathBuf) {
        let id = JobId::generate();
        let work_dir = root.join(id.as_str());
        std::fs::create_dir(&work_dir).unwrap();
        let file_path = work_dir.join("clip.mp4");
        std::fs::write(&file_path, b"hello").unwrap();

        store
            .create(Job::new(id.clone(), "https://example.com/v", &work_dir))
            .unwrap();
        store.update(&id, JobPatch::Processing);
        store.update(
            &id,
            JobPatch::Done {
                filename: "clip.mp4".into(),
                file_path,
            },
        );
        (id, work_dir)
    }

    #[tokio::test]
    async fn unknown_and_unready_jobs_are_rejected() {
        let (controller, store) = controller(Duration::from_secs(30));
        assert!(matches!(
            controller.fetch(&JobId::generate()).await,
            Err(Error::NotFound(_))
        ));

        let id = JobId::generate();
        store
            .create(Job::new(id.clone(), "https://example.com/v", "/tmp/none"))
            .unwrap();
        store.update(&id, JobPatch::Progress(50.0));
        match controller.fetch(&id).await {
            Err(Error::NotReady { status, .. }) => assert_eq!(status, JobStatus::Downloading),
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_serves_file_then_cleanup_reclaims_it() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store) = controller(Duration::from_millis(30));
        let (id, work_dir) = finished_job(&store, dir.path());

        let mut artifact = controller.fetch(&id).await.unwrap();
        assert_eq!(artifact.filename, "clip.mp4");
        assert_eq!(artifact.len, 5);
        assert_eq!(artifact.content_type, "video/mp4");
        let mut body = Vec::new();
        artifact.file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"hello");

        for _ in 0..100 {
            if !work_dir.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!work_dir.exists());
        assert!(store.get(&id).is_none());
        assert!(matches!(
            controller.fetch(&id).await,
            Err(Error::MissingArtifact(_))
        ));
    }

    #[tokio::test]
    async fn deleted_file_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store) = controller(Duration::from_secs(30));
        let (id, work_dir) = finished_job(&store, dir.path());
        std::fs::remove_file(work_dir.join("clip.mp4")).unwrap();

        assert!(matches!(
            controller.fetch(&id).await,
            Err(Error::MissingArtifact(_))
        ));
        // No cleanup was scheduled for a failed fetch
        assert!(controller.schedule_cleanup(&id));
    }

    #[tokio::test]
    async fn cleanup_is_scheduled_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store) = controller(Duration::from_secs(30));
        let (id, _work_dir) = finished_job(&store, dir.path());

        controller.fetch(&id).await.unwrap();
        // Second fetch inside the grace period still works
        controller.fetch(&id).await.unwrap();
        assert!(!controller.schedule_cleanup(&id));
        assert!(store.get(&id).unwrap().cleanup_scheduled);
    }

    #[tokio::test]
    async fn cleanup_now_tolerates_missing_dir() {
        let (controller, store) = controller(Duration::from_secs(30));
        let id = JobId::generate();
        store
            .create(Job::new(id.clone(), "https://example.com/v", "/nonexistent/media-dl/x"))
            .unwrap();

        assert!(controller.cleanup_now(&id).await);
        assert!(!controller.cleanup_now(&id).await);
    }

    #[tokio::test]
    async fn sweeper_reclaims_unretrieved_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::new());
        let controller =
            RetrievalController::new(store.clone(), Duration::from_secs(30), Duration::ZERO);
        let (done_id, work_dir) = finished_job(&store, dir.path());

        let running = JobId::generate();
        store
            .create(Job::new(running.clone(), "https://example.com/v", "/tmp/none"))
            .unwrap();

        assert_eq!(controller.sweep_expired().await, 1);
        assert!(store.get(&done_id).is_none());
        assert!(!work_dir.exists());
        assert!(store.get(&running).is_some());
    }

    #[tokio::test]
    async fn sweeper_task_stops_on_cancel() {
        let (controller, _store) = controller(Duration::from_secs(30));
        let token = CancellationToken::new();
        let handle = controller.spawn_sweeper(Duration::from_millis(5), token.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, store) = controller(Duration::from_secs(30));
        let (_a, dir_a) = finished_job(&store, dir.path());
        let (_b, dir_b) = finished_job(&store, dir.path());

        assert_eq!(controller.shutdown().await, 2);
        assert!(store.is_empty());
        assert!(!dir_a.exists());
        assert!(!dir_b.exists());
    }
}
