use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{
    error::AppResult,
    models::{EngagementCounters, MovieId},
};

/// Click-through counters for shown recommendations
///
/// Called by the HTTP layer, never by the ranker: once per returned movie
/// when recommendations are shown, and once per click.
#[async_trait::async_trait]
pub trait EngagementTracker: Send + Sync {
    /// Counts one appearance of `movie_id` in a recommendation list
    async fn record_shown(&self, movie_id: MovieId) -> AppResult<()>;

    /// Counts one click and returns the new click total
    async fn record_click(&self, movie_id: MovieId) -> AppResult<u64>;

    /// Current counters, zero for movies never seen
    async fn counters(&self, movie_id: MovieId) -> AppResult<EngagementCounters>;

    /// Clicks per shown recommendation, as a percentage
    async fn click_rate(&self, movie_id: MovieId) -> AppResult<f64> {
        Ok(self.counters(movie_id).await?.click_percentage())
    }

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Process-local tracker, used with the MovieLens file store and in tests
#[derive(Default)]
pub struct MemoryEngagementTracker {
    counters: RwLock<HashMap<MovieId, EngagementCounters>>,
}

impl MemoryEngagementTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EngagementTracker for MemoryEngagementTracker {
    async fn record_shown(&self, movie_id: MovieId) -> AppResult<()> {
        self.counters.write().await.entry(movie_id).or_default().shown += 1;
        Ok(())
    }

    async fn record_click(&self, movie_id: MovieId) -> AppResult<u64> {
        let mut counters = self.counters.write().await;
        let entry = counters.entry(movie_id).or_default();
        entry.clicks += 1;
        Ok(entry.clicks)
    }

    async fn counters(&self, movie_id: MovieId) -> AppResult<EngagementCounters> {
        Ok(self
            .counters
            .read()
            .await
            .get(&movie_id)
            .copied()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
