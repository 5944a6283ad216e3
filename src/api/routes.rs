use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/movies", get(handlers::list_movies).post(handlers::add_movie))
        // Recommendations
        .route("/recommend", get(handlers::recommend))
        .route("/rebuild", post(handlers::rebuild))
        .route("/stats", get(handlers::stats))
        // Engagement
        .route("/click", post(handlers::record_click))
        .route("/click_stats", get(handlers::click_stats))
        // Outermost first: the request ID must exist before the trace span is made
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}
