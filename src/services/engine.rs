use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::{
    db::RatingStore,
    error::AppResult,
    models::{Movie, Rating, Recommendation},
    services::{
        catalog::Catalog,
        recommender,
        similarity::{self, SimilarityMatrix},
    },
};

/// Build metadata reported by the stats endpoints
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotStats {
    pub movies: usize,
    pub indexed_movies: usize,
    pub ratings: usize,
    pub built_at: DateTime<Utc>,
    pub build_ms: u64,
}

/// Catalog and similarity table published together
#[derive(Debug)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub similarity: SimilarityMatrix,
    pub stats: SnapshotStats,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            catalog: Catalog::default(),
            similarity: SimilarityMatrix::default(),
            stats: SnapshotStats {
                movies: 0,
                indexed_movies: 0,
                ratings: 0,
                built_at: Utc::now(),
                build_ms: 0,
            },
        }
    }
}

/// Holds the current snapshot and replaces it wholesale on rebuild.
///
/// Queries take a clone of the `Arc` and work on it without holding any
/// lock, so a rebuild never changes a snapshot someone is reading. New
/// snapshots are built off to the side and only swapped in once complete.
pub struct RecommendationEngine {
    current: RwLock<Arc<Snapshot>>,
    rebuild_lock: Mutex<()>,
    build_shards: usize,
}

impl RecommendationEngine {
    /// Creates an engine with nothing published; every query is `NotFound`
    /// until the first rebuild
    pub fn new(build_shards: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            rebuild_lock: Mutex::new(()),
            build_shards,
        }
    }

    /// The currently published snapshot
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Reloads everything from the store and publishes a new snapshot.
    ///
    /// On failure the previous snapshot stays published.
    pub async fn rebuild(&self, store: &dyn RatingStore) -> AppResult<SnapshotStats> {
        let _guard = self.rebuild_lock.lock().await;

        let (ratings, movies) = tokio::try_join!(store.load_ratings(), store.load_movies())
            .map_err(|e| {
                tracing::error!(store = store.name(), error = %e, "Rebuild aborted, keeping current snapshot");
                e
            })?;

        self.build_and_publish(ratings, movies).await
    }

    /// Builds from already loaded data and publishes the result
    pub async fn rebuild_from(
        &self,
        ratings: Vec<Rating>,
        movies: Vec<Movie>,
    ) -> AppResult<SnapshotStats> {
        let _guard = self.rebuild_lock.lock().await;
        self.build_and_publish(ratings, movies).await
    }

    async fn build_and_publish(
        &self,
        ratings: Vec<Rating>,
        movies: Vec<Movie>,
    ) -> AppResult<SnapshotStats> {
        let start = Instant::now();

        let similarity = similarity::build_sharded(&ratings, self.build_shards)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Rebuild aborted, keeping current snapshot");
                e
            })?;
        let catalog = Catalog::new(movies);

        let stats = SnapshotStats {
            movies: catalog.len(),
            indexed_movies: similarity.len(),
            ratings: ratings.len(),
            built_at: Utc::now(),
            build_ms: start.elapsed().as_millis() as u64,
        };

        let snapshot = Arc::new(Snapshot {
            catalog,
            similarity,
            stats: stats.clone(),
        });

        *self.current.write().await = snapshot;

        tracing::info!(
            movies = stats.movies,
            indexed_movies = stats.indexed_movies,
            ratings = stats.ratings,
            build_ms = stats.build_ms,
            "Published new recommendation snapshot"
        );

        Ok(stats)
    }

    /// Top `top_n` movies similar to `title` in the current snapshot
    pub async fn recommend(&self, title: &str, top_n: usize) -> AppResult<Vec<Recommendation>> {
        let snapshot = self.snapshot().await;
        recommender::recommend(title, &snapshot.catalog, &snapshot.similarity, top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRatingStore, MockRatingStore};
    use crate::error::AppError;

    fn movies() -> Vec<Movie> {
        vec![
            Movie::new(1, "Alien"),
            Movie::new(2, "Aliens"),
            Movie::new(3, "Clueless"),
        ]
    }

    fn ratings() -> Vec<Rating> {
        vec![
            Rating::new(1, 1, 5.0),
            Rating::new(2, 1, 4.0),
            Rating::new(1, 2, 5.0),
            Rating::new(2, 2, 4.0),
            Rating::new(3, 3, 5.0),
        ]
    }

    #[tokio::test]
    async fn test_nothing_published_is_not_found() {
        let engine = RecommendationEngine::new(2);
        let err = engine.recommend("Alien", 4).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rebuild_from_store() {
        let engine = RecommendationEngine::new(2);
        let store = MemoryRatingStore::new(movies(), ratings());

        let stats = engine.rebuild(&store).await.unwrap();
        assert_eq!(stats.movies, 3);
        assert_eq!(stats.indexed_movies, 3);
        assert_eq!(stats.ratings, 5);

        let recs = engine.recommend("alien", 4).await.unwrap();
        assert_eq!(recs[0].title, "Aliens");
        assert_eq!(recs.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let engine = RecommendationEngine::new(2);
        engine.rebuild_from(ratings(), movies()).await.unwrap();
        let before = engine.snapshot().await;

        let mut store = MockRatingStore::new();
        store
            .expect_load_ratings()
            .returning(|| Err(AppError::Internal("connection reset".to_string())));
        store.expect_load_movies().returning(|| Ok(Vec::new()));
        store.expect_name().return_const("mock");

        let result = engine.rebuild(&store).await;
        assert!(result.is_err());

        let after = engine.snapshot().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(engine.recommend("Alien", 1).await.unwrap()[0].movie_id, 2);
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot_across_rebuild() {
        let engine = RecommendationEngine::new(2);
        engine.rebuild_from(ratings(), movies()).await.unwrap();
        let held = engine.snapshot().await;

        engine.rebuild_from(Vec::new(), Vec::new()).await.unwrap();

        // The held snapshot is untouched, the published one is new and empty
        assert_eq!(held.similarity.len(), 3);
        assert!(engine.snapshot().await.similarity.is_empty());
        assert!(engine.recommend("Alien", 4).await.is_err());
    }

    #[tokio::test]
    async fn test_added_movie_needs_rebuild() {
        let engine = RecommendationEngine::new(2);
        let mut all_movies = movies();
        all_movies.push(Movie::new(4, "Heat"));

        // Catalog knows Heat, ratings do not
        engine.rebuild_from(ratings(), all_movies.clone()).await.unwrap();
        let err = engine.recommend("Heat", 4).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("no similarity data")));

        let mut all_ratings = ratings();
        all_ratings.push(Rating::new(3, 4, 4.0));
        engine.rebuild_from(all_ratings, all_movies).await.unwrap();

        let recs = engine.recommend("Heat", 4).await.unwrap();
        assert_eq!(recs[0].title, "Clueless");
    }
}
