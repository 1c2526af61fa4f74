use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::cv::source::DocumentSource;
use crate::personalization::PersonalizationPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub cache: ResponseCache,
    /// Read-only content store for CVs and job applications.
    pub source: Arc<dyn DocumentSource>,
    /// Owns the model client; every model call goes through it.
    pub pipeline: PersonalizationPipeline,
}
