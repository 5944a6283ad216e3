use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{
        ClickResponse, ClickStatsResponse, Movie, MovieId, NewMovie, RecommendResponse,
    },
    services::SnapshotStats,
};

use super::AppState;

// Request types

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub movie: String,
    pub top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MovieIdQuery {
    pub movie_id: MovieId,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Titles available for lookup, sorted
pub async fn list_movies(State(state): State<AppState>) -> Json<Vec<String>> {
    let snapshot = state.engine.snapshot().await;
    Json(snapshot.catalog.titles())
}

/// Recommends movies similar to the requested title and counts each
/// returned movie as shown
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<RecommendQuery>,
) -> AppResult<Json<RecommendResponse>> {
    let top_n = params.top_n.unwrap_or(state.default_top_n);

    let recommendations = state.engine.recommend(&params.movie, top_n).await.map_err(|e| {
        tracing::info!(request_id = %request_id, movie = %params.movie, error = %e, "No recommendations");
        e
    })?;

    for rec in &recommendations {
        if let Err(e) = state.tracker.record_shown(rec.movie_id).await {
            tracing::warn!(
                request_id = %request_id,
                movie_id = rec.movie_id,
                tracker = state.tracker.name(),
                error = %e,
                "Failed to record shown recommendation"
            );
        }
    }

    tracing::info!(
        request_id = %request_id,
        movie = %params.movie,
        returned = recommendations.len(),
        "Served recommendations"
    );

    Ok(Json(RecommendResponse {
        movie: params.movie,
        recommendations,
    }))
}

/// Registers a click on a recommended movie
pub async fn record_click(
    State(state): State<AppState>,
    Query(params): Query<MovieIdQuery>,
) -> AppResult<Json<ClickResponse>> {
    let clicks = state.tracker.record_click(params.movie_id).await?;
    Ok(Json(ClickResponse {
        movie_id: params.movie_id,
        clicks,
    }))
}

/// Click-through percentage of a movie
pub async fn click_stats(
    State(state): State<AppState>,
    Query(params): Query<MovieIdQuery>,
) -> AppResult<Json<ClickStatsResponse>> {
    let click_percentage = state.tracker.click_rate(params.movie_id).await?;
    Ok(Json(ClickStatsResponse {
        movie_id: params.movie_id,
        click_percentage,
    }))
}

/// Adds a movie with its seed rating, then rebuilds so it can be queried.
///
/// Once the store has the movie the answer is 201 even if the rebuild fails;
/// the movie then becomes queryable on the next successful rebuild.
pub async fn add_movie(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<NewMovie>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    let movie = state.store.add_movie(request, state.seed_user_id).await?;

    tracing::info!(
        request_id = %request_id,
        movie_id = movie.movie_id,
        title = %movie.title,
        "Movie added, rebuilding similarity"
    );

    if let Err(e) = state.engine.rebuild(state.store.as_ref()).await {
        tracing::warn!(
            request_id = %request_id,
            movie_id = movie.movie_id,
            error = %e,
            "Movie saved but rebuild failed, previous snapshot stays published"
        );
    }

    Ok((StatusCode::CREATED, Json(movie)))
}

/// Reloads ratings and movies from the store and publishes a new snapshot
pub async fn rebuild(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<SnapshotStats>> {
    tracing::info!(request_id = %request_id, store = state.store.name(), "Rebuild requested");
    let stats = state.engine.rebuild(state.store.as_ref()).await?;
    Ok(Json(stats))
}

/// Build statistics of the published snapshot
pub async fn stats(State(state): State<AppState>) -> Json<SnapshotStats> {
    let snapshot = state.engine.snapshot().await;
    Json(snapshot.stats.clone())
}
