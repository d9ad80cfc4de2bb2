//! Application state for the API server

use crate::MediaService;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone). Server settings (CORS, Swagger
/// UI, bind address) are consumed while building the router and are not
/// needed by handlers.
#[derive(Clone)]
pub struct AppState {
    /// The job lifecycle service
    pub service: Arc<MediaService>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<MediaService>) -> Self {
        Self { service }
    }
}
