//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use media_dl::extractor::{Extractor, ExtractorCapabilities, ProgressCallback};
use media_dl::{Config, ExtractionError, ExtractionOutput, Job, JobId, MediaInfo, ProgressEvent};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bytes written by [`ScriptedExtractor`] for successful runs
pub const CONTENT: &[u8] = b"integration test media";

/// Extractor whose behavior depends on the URL:
/// URLs containing `fail` end in an unavailable error, everything else
/// succeeds with a title taken from the last path segment.
///
/// When a gate is set, each run waits for one permit before finishing.
pub struct ScriptedExtractor {
    step: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedExtractor {
    pub fn new(step: Duration) -> Self {
        Self { step, gate: None }
    }

    pub fn gated(step: Duration, gate: Arc<Semaphore>) -> Self {
        Self {
            step,
            gate: Some(gate),
        }
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn run(
        &self,
        url: &str,
        work_dir: &Path,
        on_progress: ProgressCallback,
    ) -> Result<ExtractionOutput, ExtractionError> {
        for percent in ["  0.0%", " 25.0%", " 50.0%", " 75.0%", "100.0%"] {
            on_progress(ProgressEvent::Downloading {
                percent: percent.to_string(),
            });
            tokio::time::sleep(self.step).await;
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| ExtractionError::Failed(e.to_string()))?;
            permit.forget();
        }

        if url.contains("fail") {
            return Err(ExtractionError::Unavailable(
                "ERROR: [generic] Video unavailable".into(),
            ));
        }

        on_progress(ProgressEvent::Finished);
        tokio::time::sleep(self.step).await;

        let title = url.rsplit('/').next().unwrap_or("video").to_string();
        let path = work_dir.join("partial-name.mp4");
        tokio::fs::write(&path, CONTENT)
            .await
            .map_err(|e| ExtractionError::Failed(e.to_string()))?;

        Ok(ExtractionOutput {
            title,
            ext: "mp4".into(),
            source_path: Some(path),
        })
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        Ok(MediaInfo {
            title: url.to_string(),
            thumbnail: String::new(),
            duration: 1.0,
            uploader: "Integration".into(),
        })
    }

    fn capabilities(&self) -> ExtractorCapabilities {
        ExtractorCapabilities {
            can_download: true,
            can_merge_formats: false,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Config rooted in `root` with short timers
pub fn fast_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.jobs.work_root = root.join("jobs");
    config.jobs.poll_interval = Duration::from_millis(10);
    config.jobs.cleanup_delay = Duration::from_millis(100);
    config.jobs.sweep_interval = Duration::from_millis(20);
    config
}

/// Poll until the job is terminal
pub async fn wait_for_terminal(service: &media_dl::MediaService, id: &JobId) -> Job {
    for _ in 0..1000 {
        let job = service.job(id).expect("job should still exist");
        if job.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} never finished");
}

/// Poll until `cond` holds or panic after ~5 seconds
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
