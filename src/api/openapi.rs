//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the media-dl REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "Submit media URLs, follow download progress and retrieve finished files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::submit_download,
        crate::api::routes::progress_stream,
        crate::api::routes::download_file,
        crate::api::routes::get_job,

        // Info
        crate::api::routes::get_info,

        // System
        crate::api::routes::get_capabilities,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobStatus,
        crate::types::JobInfo,
        crate::types::ProgressPayload,
        crate::types::MediaInfo,
        crate::types::Capabilities,

        // API request/response types from routes
        crate::api::routes::UrlRequest,
        crate::api::routes::SubmitResponse,
        crate::api::routes::InfoResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Job lifecycle - Submit URLs, stream progress, retrieve files"),
        (name = "info", description = "Metadata lookup without starting a job"),
        (name = "system", description = "System endpoints - Health checks, capabilities, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
