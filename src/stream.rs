//! Per-job progress streams
//!
//! A stream polls the store, emits a payload only when the observable state
//! changed since the last emission, and ends after the terminal payload. The
//! stream only reads; dropping it (client disconnect) never affects the job.

use crate::error::{Error, Result};
use crate::store::JobStore;
use crate::types::{JobId, ProgressPayload};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// One message on a progress stream
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Job state changed
    Update(ProgressPayload),
    /// The job was removed while the stream was open; the stream ends
    Gone,
}

/// Opens progress streams over a [`JobStore`]
#[derive(Clone)]
pub struct ProgressStreamer {
    store: Arc<JobStore>,
    poll_interval: Duration,
}

struct Cursor {
    store: Arc<JobStore>,
    id: JobId,
    poll_interval: Duration,
    last: Option<ProgressPayload>,
    first_check: bool,
    finished: bool,
}

impl ProgressStreamer {
    /// Create a streamer that checks the store every `poll_interval`
    pub fn new(store: Arc<JobStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// Open a stream for `id`.
    ///
    /// Unknown ids fail immediately with [`Error::NotFound`] instead of
    /// producing an empty stream.
    pub fn open(&self, id: &JobId) -> Result<BoxStream<'static, StreamEvent>> {
        if self.store.get(id).is_none() {
            return Err(Error::NotFound(id.clone()));
        }

        let cursor = Cursor {
            store: self.store.clone(),
            id: id.clone(),
            poll_interval: self.poll_interval,
            last: None,
            first_check: true,
            finished: false,
        };

        Ok(stream::unfold(cursor, next_event).boxed())
    }
}

async fn next_event(mut cursor: Cursor) -> Option<(StreamEvent, Cursor)> {
    if cursor.finished {
        return None;
    }

    loop {
        if cursor.first_check {
            cursor.first_check = false;
        } else {
            tokio::time::sleep(cursor.poll_interval).await;
        }

        let Some(job) = cursor.store.get(&cursor.id) else {
            tracing::debug!(job_id = %cursor.id, "job removed while streaming");
            cursor.finished = true;
            return Some((StreamEvent::Gone, cursor));
        };

        let payload = job.payload();
        let terminal = job.is_terminal();

        if cursor.last.as_ref() != Some(&payload) {
            cursor.last = Some(payload.clone());
            cursor.finished = terminal;
            return Some((StreamEvent::Update(payload), cursor));
        }

        if terminal {
            return None;
        }
    }
}
