//! Metadata lookup handler.

use super::{InfoResponse, UrlRequest};
use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /get_info - Look up title, thumbnail, duration and uploader
#[utoipa::path(
    post,
    path = "/api/get_info",
    tag = "info",
    request_body = UrlRequest,
    responses(
        (status = 200, description = "Media metadata", body = InfoResponse),
        (status = 400, description = "Invalid URL or lookup failed", body = crate::error::ApiError),
        (status = 503, description = "Extraction tool not installed", body = crate::error::ApiError)
    )
)]
pub async fn get_info(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return ApiError::validation("missing required field: url").into_response();
    };

    match state.service.probe(&request.url).await {
        Ok(info) => (StatusCode::OK, Json(InfoResponse::from(info))).into_response(),
        Err(e) => e.into_response(),
    }
}
