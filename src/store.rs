//! In-memory job store
//!
//! The store is the only structure mutated by more than one actor (the job
//! runner and the cleanup controller). A single mutex guards the map and is
//! held only for the duration of one map operation, never across I/O or an
//! `.await`, so progress callbacks, stream readers and cleanup never contend
//! for long.

use crate::error::{Error, Result};
use crate::types::{Job, JobId, JobPatch};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How many reclaimed ids are remembered for retrieval error reporting
const RECLAIMED_CAPACITY: usize = 4096;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    reclaimed: HashSet<JobId>,
    reclaimed_order: VecDeque<JobId>,
}

impl Inner {
    fn remember_reclaimed(&mut self, id: JobId) {
        if self.reclaimed.insert(id.clone()) {
            self.reclaimed_order.push_back(id);
        }
        while self.reclaimed_order.len() > RECLAIMED_CAPACITY {
            if let Some(oldest) = self.reclaimed_order.pop_front() {
                self.reclaimed.remove(&oldest);
            }
        }
    }
}

/// Thread-safe mapping from job id to job state
///
/// All reads return owned snapshots, never references into the map.
#[derive(Default)]
pub struct JobStore {
    inner: Mutex<Inner>,
}

impl JobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::error!("job store mutex poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Insert a new job; fails if the id is already tracked
    pub fn create(&self, job: Job) -> Result<()> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&job.id) {
            return Err(Error::JobExists(job.id));
        }
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Apply a patch atomically.
    ///
    /// Returns `false` if the job is absent (it may have been cleaned up
    /// concurrently) or the patch is not a legal transition.
    pub fn update(&self, id: &JobId, patch: JobPatch) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get_mut(id) {
            Some(job) => job.apply(patch),
            None => false,
        }
    }

    /// Snapshot of a job
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.lock().jobs.get(id).cloned()
    }

    /// Remove a job, remembering its id as reclaimed
    pub fn remove(&self, id: &JobId) -> Option<Job> {
        let mut inner = self.lock();
        let removed = inner.jobs.remove(id);
        if removed.is_some() {
            inner.remember_reclaimed(id.clone());
        }
        removed
    }

    /// Whether the id belonged to a job that has since been cleaned up
    pub fn is_reclaimed(&self, id: &JobId) -> bool {
        self.lock().reclaimed.contains(id)
    }

    /// Flag a job for cleanup.
    ///
    /// Returns `true` only for the first caller, so a cleanup is scheduled at
    /// most once per job.
    pub fn mark_cleanup_scheduled(&self, id: &JobId) -> bool {
        let mut inner = self.lock();
        match inner.jobs.get_mut(id) {
            Some(job) if !job.cleanup_scheduled => {
                job.cleanup_scheduled = true;
                true
            }
            _ => false,
        }
    }

    /// Terminal jobs finished more than `ttl` before `now` with no cleanup scheduled
    pub fn expired(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<JobId> {
        // A ttl too large for chrono never expires anything
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Vec::new();
        };
        self.lock()
            .jobs
            .values()
            .filter(|job| !job.cleanup_scheduled)
            .filter(|job| {
                job.finished_at
                    .is_some_and(|finished| now.signed_duration_since(finished) >= ttl)
            })
            .map(|job| job.id.clone())
            .collect()
    }

    /// Remove every job (used at shutdown)
    pub fn drain(&self) -> Vec<Job> {
        let mut inner = self.lock();
        let jobs: Vec<Job> = inner.jobs.drain().map(|(_, job)| job).collect();
        for job in &jobs {
            inner.remember_reclaimed(job.id.clone());
        }
        jobs
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    /// Whether no jobs are tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use std::sync::Arc;

    fn new_job() -> Job {
        Job::new(JobId::generate(), "https://example.com/v", "/tmp/x")
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let store = JobStore::new();
        let job = new_job();
        store.create(job.clone()).unwrap();
        assert!(matches!(store.create(job), Err(Error::JobExists(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_on_absent_job_is_noop() {
        let store = JobStore::new();
        assert!(!store.update(&JobId::generate(), JobPatch::Progress(10.0)));
        assert!(store.is_empty());
    }

    #[test]
    fn snapshots_are_detached_copies() {
        let store = JobStore::new();
        let job = new_job();
        let id = job.id.clone();
        store.create(job).unwrap();

        let before = store.get(&id).unwrap();
        store.update(&id, JobPatch::Progress(55.0));
        assert_eq!(before.progress, 0.0);
        assert_eq!(store.get(&id).unwrap().progress, 55.0);
    }

    #[test]
    fn remove_marks_id_reclaimed() {
        let store = JobStore::new();
        let job = new_job();
        let id = job.id.clone();
        store.create(job).unwrap();

        assert!(!store.is_reclaimed(&id));
        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.get(&id).is_none());
        assert!(store.is_reclaimed(&id));
    }

    #[test]
    fn cleanup_flag_is_granted_once() {
        let store = JobStore::new();
        let job = new_job();
        let id = job.id.clone();
        store.create(job).unwrap();

        assert!(store.mark_cleanup_scheduled(&id));
        assert!(!store.mark_cleanup_scheduled(&id));
        assert!(!store.mark_cleanup_scheduled(&JobId::generate()));
    }

    #[test]
    fn expired_selects_old_unscheduled_terminal_jobs() {
        let store = JobStore::new();
        let running = new_job();
        let finished = new_job();
        let scheduled = new_job();
        let (running_id, finished_id, scheduled_id) = (
            running.id.clone(),
            finished.id.clone(),
            scheduled.id.clone(),
        );
        store.create(running).unwrap();
        store.create(finished).unwrap();
        store.create(scheduled).unwrap();

        for id in [&finished_id, &scheduled_id] {
            store.update(
                id,
                JobPatch::Failed {
                    message: "x".into(),
                },
            );
        }
        store.mark_cleanup_scheduled(&scheduled_id);

        let later = Utc::now() + chrono::Duration::seconds(120);
        let expired = store.expired(Duration::from_secs(60), later);
        assert_eq!(expired, vec![finished_id]);
        assert!(store.expired(Duration::from_secs(600), later).is_empty());
        assert_eq!(
            store.get(&running_id).unwrap().status(),
            JobStatus::Starting
        );
    }

    #[test]
    fn concurrent_writers_keep_progress_monotonic() {
        let store = Arc::new(JobStore::new());
        let job = new_job();
        let id = job.id.clone();
        store.create(job).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    let mut last = 0.0;
                    for i in 0..100 {
                        store.update(&id, JobPatch::Progress(f64::from(i + t)));
                        let seen = store.get(&id).unwrap().progress;
                        assert!(seen >= last);
                        last = seen;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&id).unwrap().progress, 100.0);
    }

    #[test]
    fn drain_empties_store() {
        let store = JobStore::new();
        store.create(new_job()).unwrap();
        store.create(new_job()).unwrap();
        assert_eq!(store.drain().len(), 2);
        assert!(store.is_empty());
    }
}
