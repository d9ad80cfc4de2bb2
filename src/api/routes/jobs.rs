//! Job handlers: submission, progress stream, retrieval and snapshot.

use super::{SubmitResponse, UrlRequest};
use crate::api::AppState;
use crate::error::{ApiError, Error};
use crate::stream::StreamEvent;
use crate::types::{JobId, ProgressPayload};
use axum::{
    Json,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

/// POST /download - Submit a URL and start a job
#[utoipa::path(
    post,
    path = "/api/download",
    tag = "jobs",
    request_body = UrlRequest,
    responses(
        (status = 200, description = "Job started", body = SubmitResponse),
        (status = 400, description = "Missing or invalid URL", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected submission body");
            return ApiError::validation("missing required field: url").into_response();
        }
    };

    match state.service.submit(&request.url).await {
        Ok(id) => (
            StatusCode::OK,
            Json(SubmitResponse {
                status: "started".to_string(),
                download_id: id,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /progress/:id - Progress stream for a job
///
/// Each message carries `{progress, status, message, filename}` and is sent
/// only when something changed. The stream closes after `done` or `error`.
/// A job cleaned up meanwhile ends the stream with an `error` payload saying
/// the download is no longer available.
#[utoipa::path(
    get,
    path = "/api/progress/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream", body = crate::types::ProgressPayload),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>, Error> {
    let id = JobId::from(id);
    let events = state.service.progress(&id)?;

    // Every message is an unnamed data event so `EventSource.onmessage` sees it
    let sse_stream = events.filter_map(move |event| {
        let payload = match event {
            StreamEvent::Update(payload) => payload,
            StreamEvent::Gone => ProgressPayload::gone(),
        };
        match serde_json::to_string(&payload) {
            Ok(json_data) => Some(Ok(SseEvent::default().data(json_data))),
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "failed to serialize progress payload");
                None
            }
        }
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// GET /download_file/:id - Retrieve the finished artifact
#[utoipa::path(
    get,
    path = "/api/download_file/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Artifact bytes sent as an attachment", content_type = "application/octet-stream"),
        (status = 400, description = "Job not ready or file no longer available", body = crate::error::ApiError),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Error> {
    let artifact = state.service.fetch(&JobId::from(id)).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type)
        .header(header::CONTENT_LENGTH, artifact.len)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.filename),
        )
        .body(Body::from_stream(ReaderStream::new(artifact.file)))
        .map_err(|e| Error::ApiServerError(format!("failed to build file response: {e}")))
}

/// GET /jobs/:id - Job snapshot
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job state", body = crate::types::JobInfo),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::types::JobInfo>, Error> {
    let job = state.service.job(&JobId::from(id))?;
    Ok(Json(job.info()))
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
pub(crate) fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
