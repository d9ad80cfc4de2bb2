//! # media-dl
//!
//! Web service that runs media extraction jobs in the background, streams
//! their progress and hands out the finished file.
//!
//! ## Job lifecycle
//!
//! - A client submits a URL; a job is created in the `starting` state with
//!   its own scratch directory
//! - A background task runs the [`Extractor`] and records progress
//!   (`downloading`, then `processing` while streams are merged)
//! - The job ends `done` (file ready) or `error` (with a user-facing message)
//! - Clients follow the job through a progress stream and fetch the file once
//!   it is done; the scratch directory is deleted shortly after retrieval, or
//!   after a retention period if the file is never fetched
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaService};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = MediaService::new(Config::default()).await?;
//!
//!     let id = service.submit("https://www.youtube.com/watch?v=abc").await?;
//!
//!     let mut progress = service.progress(&id)?;
//!     while let Some(event) = progress.next().await {
//!         println!("{event:?}");
//!     }
//!
//!     let artifact = service.fetch(&id).await?;
//!     println!("{} ({} bytes)", artifact.filename, artifact.len);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Media extraction adapter
pub mod extractor;
/// URL validation and normalization
pub mod media_url;
/// Artifact retrieval and cleanup
pub mod retrieval;
/// Background job execution
pub mod runner;
/// Service facade
pub mod service;
/// In-memory job store
pub mod store;
/// Progress streams
pub mod stream;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, ExtractionError, Result, ToHttpStatus};
pub use extractor::{Extractor, ExtractorCapabilities, UnavailableExtractor, YtDlpExtractor};
pub use retrieval::Artifact;
pub use service::MediaService;
pub use stream::StreamEvent;
pub use types::{
    Capabilities, ExtractionOutput, Job, JobId, JobInfo, JobStatus, MediaInfo, ProgressEvent,
    ProgressPayload,
};

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Intended as the shutdown future of [`api::start_api_server`].
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaService, shutdown_signal};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Arc::new(Config::default());
///     let service = Arc::new(MediaService::new((*config).clone()).await?);
///
///     media_dl::api::start_api_server(service.clone(), config, shutdown_signal()).await?;
///     service.shutdown().await;
///
///     Ok(())
/// }
/// ```
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal handlers may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
