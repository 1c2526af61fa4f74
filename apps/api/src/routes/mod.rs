pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;
use crate::{analysis, cache, cv, personalization};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis
        .route("/api/v1/analysis", post(analysis::handlers::handle_analyze))
        // Personalization
        .route(
            "/api/v1/personalize",
            post(personalization::handlers::handle_personalize),
        )
        .route(
            "/api/v1/personalize/full",
            post(personalization::handlers::handle_personalize_full),
        )
        // CV documents
        .route("/api/v1/cv/diff", post(cv::handlers::handle_diff))
        .route("/api/v1/cv/:locale", get(cv::handlers::handle_get_cv))
        // Cache administration
        .route("/api/v1/cache/stats", get(cache::handlers::handle_stats))
        .route("/api/v1/cache", delete(cache::handlers::handle_clear))
        .with_state(state)
}
