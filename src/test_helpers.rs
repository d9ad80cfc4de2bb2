//! Shared test helpers: a scripted extractor and service constructors.

use crate::config::Config;
use crate::error::ExtractionError;
use crate::extractor::{Extractor, ExtractorCapabilities, ProgressCallback};
use crate::service::MediaService;
use crate::store::JobStore;
use crate::types::{ExtractionOutput, Job, JobId, MediaInfo, ProgressEvent};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Content written by [`FakeExtractor`] for successful runs
pub(crate) const FAKE_CONTENT: &[u8] = b"fake media bytes";

enum Outcome {
    Succeed { title: String, write_file: bool },
    Fail(ExtractionError),
}

/// Extractor that replays scripted progress and then succeeds or fails
pub(crate) struct FakeExtractor {
    events: Vec<ProgressEvent>,
    outcome: Outcome,
    delay: Duration,
    gate: Option<Arc<tokio::sync::Notify>>,
}

impl FakeExtractor {
    /// Report progress, then write `download.mp4` and return `title`
    pub(crate) fn succeeding(title: &str) -> Self {
        Self {
            events: vec![
                ProgressEvent::Downloading {
                    percent: "  10.0%".into(),
                },
                ProgressEvent::Downloading {
                    percent: "\x1b[0;94m 55.5%\x1b[0m".into(),
                },
                ProgressEvent::Finished,
            ],
            outcome: Outcome::Succeed {
                title: title.to_string(),
                write_file: true,
            },
            delay: Duration::ZERO,
            gate: None,
        }
    }

    /// Report a little progress, then fail with `error`
    pub(crate) fn failing(error: ExtractionError) -> Self {
        Self {
            events: vec![ProgressEvent::Downloading {
                percent: "5%".into(),
            }],
            outcome: Outcome::Fail(error),
            delay: Duration::ZERO,
            gate: None,
        }
    }

    /// Succeed without writing any file
    pub(crate) fn without_file(mut self) -> Self {
        if let Outcome::Succeed { write_file, .. } = &mut self.outcome {
            *write_file = false;
        }
        self
    }

    /// Replace the scripted progress events
    pub(crate) fn with_events(mut self, events: Vec<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    /// Sleep between events
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block after the scripted events until the gate is notified
    pub(crate) fn with_gate(mut self, gate: Arc<tokio::sync::Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn run(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError> {
        for event in &self.events {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            on_progress(event.clone());
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.outcome {
            Outcome::Succeed { title, write_file } => {
                let path = work_dir.join("download.mp4");
                if *write_file {
                    tokio::fs::write(&path, FAKE_CONTENT)
                        .await
                        .map_err(|e| ExtractionError::Failed(e.to_string()))?;
                }
                Ok(ExtractionOutput {
                    title: title.clone(),
                    ext: "mp4".into(),
                    source_path: Some(path),
                })
            }
            Outcome::Fail(error) => {
                tracing::debug!(url, "fake extractor failing");
                Err(error.clone())
            }
        }
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        match &self.outcome {
            Outcome::Succeed { title, .. } => Ok(MediaInfo {
                title: title.clone(),
                thumbnail: format!("{url}/thumb.jpg"),
                duration: 42.0,
                uploader: "Tester".into(),
            }),
            Outcome::Fail(error) => Err(error.clone()),
        }
    }

    fn capabilities(&self) -> ExtractorCapabilities {
        ExtractorCapabilities {
            can_download: true,
            can_merge_formats: false,
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Config whose scratch storage lives in `root` and whose timers are short
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.jobs.work_root = root.join("work");
    config.jobs.poll_interval = Duration::from_millis(10);
    config.jobs.cleanup_delay = Duration::from_millis(50);
    config.jobs.max_concurrent_jobs = 2;
    config
}

/// Create a service backed by `extractor`.
/// Returns the service and the tempdir (which must be kept alive).
pub(crate) async fn create_test_service(
    extractor: FakeExtractor,
) -> (MediaService, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let service = MediaService::with_extractor(test_config(temp_dir.path()), Arc::new(extractor))
        .await
        .unwrap();
    (service, temp_dir)
}

/// Poll the store until the job is terminal or gone
pub(crate) async fn wait_for_terminal(store: &JobStore, id: &JobId) -> Job {
    for _ in 0..500 {
        match store.get(id) {
            Some(job) if job.is_terminal() => return job,
            Some(_) => tokio::time::sleep(Duration::from_millis(5)).await,
            None => panic!("job {id} disappeared"),
        }
    }
    panic!("job {id} never reached a terminal state");
}
