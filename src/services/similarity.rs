//! Item-item cosine similarity over the user rating matrix.
//!
//! Every movie is a vector with one component per user, zero where the user
//! has not rated it. The similarity table is dense (`items × items`), which
//! keeps lookups trivial but caps the catalog at a few thousand movies; past
//! that, a sparse neighbour list or an ANN index would be needed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{MovieId, Rating, UserId},
};

/// Sparse per-movie rating vectors, movies in ascending id order
#[derive(Debug, Clone, Default)]
pub struct RatingVectors {
    movies: Vec<MovieId>,
    /// `(user, value)` pairs sorted by user, one row per movie
    rows: Vec<Vec<(UserId, f64)>>,
    norms: Vec<f64>,
    user_count: usize,
    rating_count: usize,
}

impl RatingVectors {
    /// Groups ratings by movie. A repeated `(user, movie)` pair keeps the
    /// last value seen.
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        let mut grouped: BTreeMap<MovieId, BTreeMap<UserId, f64>> = BTreeMap::new();
        let mut users = BTreeSet::new();

        for rating in ratings {
            grouped
                .entry(rating.movie_id)
                .or_default()
                .insert(rating.user_id, rating.value);
            users.insert(rating.user_id);
        }

        let mut movies = Vec::with_capacity(grouped.len());
        let mut rows = Vec::with_capacity(grouped.len());
        let mut norms = Vec::with_capacity(grouped.len());
        let mut rating_count = 0;

        for (movie_id, by_user) in grouped {
            let row: Vec<(UserId, f64)> = by_user.into_iter().collect();
            rating_count += row.len();
            norms.push(row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt());
            movies.push(movie_id);
            rows.push(row);
        }

        Self {
            movies,
            rows,
            norms,
            user_count: users.len(),
            rating_count,
        }
    }

    pub fn movies(&self) -> &[MovieId] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.user_count
    }

    /// Distinct `(user, movie)` pairs after duplicates collapsed
    pub fn rating_count(&self) -> usize {
        self.rating_count
    }

    /// Cosine similarity between rows `a` and `b`.
    ///
    /// Zero-norm rows are similar to nothing, themselves included. A norm or
    /// score that is not finite counts as zero.
    fn cosine(&self, a: usize, b: usize) -> f64 {
        let (norm_a, norm_b) = (self.norms[a], self.norms[b]);
        if !usable_norm(norm_a) || !usable_norm(norm_b) {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        let score = dot(&self.rows[a], &self.rows[b]) / (norm_a * norm_b);
        if score.is_finite() {
            score.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Upper-triangle entries `(row, row..len)` of the similarity table
    fn upper_row(&self, row: usize) -> Vec<f64> {
        (row..self.len()).map(|col| self.cosine(row, col)).collect()
    }
}

fn usable_norm(norm: f64) -> bool {
    norm.is_finite() && norm != 0.0
}

/// Dot product of two user-sorted sparse vectors
fn dot(a: &[(UserId, f64)], b: &[(UserId, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Symmetric movie-by-movie cosine similarity table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityMatrix {
    movies: Vec<MovieId>,
    positions: HashMap<MovieId, usize>,
    /// Row-major `movies.len() × movies.len()`
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Builds the full table on the calling thread
    pub fn build(ratings: &[Rating]) -> Self {
        let vectors = RatingVectors::from_ratings(ratings);
        if vectors.is_empty() {
            tracing::warn!("No ratings available, similarity matrix is empty");
            return Self::default();
        }

        let start = Instant::now();
        let rows: Vec<(usize, Vec<f64>)> =
            (0..vectors.len()).map(|row| (row, vectors.upper_row(row))).collect();
        let matrix = Self::assemble(vectors.movies().to_vec(), rows);

        tracing::debug!(
            movies = vectors.len(),
            users = vectors.user_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built similarity matrix"
        );

        matrix
    }

    /// Fills the table from upper-triangle rows and mirrors it
    fn assemble(movies: Vec<MovieId>, rows: Vec<(usize, Vec<f64>)>) -> Self {
        let n = movies.len();
        let mut scores = vec![0.0; n * n];
        for (row, upper) in rows {
            for (offset, score) in upper.into_iter().enumerate() {
                let col = row + offset;
                scores[row * n + col] = score;
                scores[col * n + row] = score;
            }
        }

        let positions = movies
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();

        Self {
            movies,
            positions,
            scores,
        }
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// Movies in index order (ascending id)
    pub fn movies(&self) -> &[MovieId] {
        &self.movies
    }

    pub fn contains(&self, movie_id: MovieId) -> bool {
        self.positions.contains_key(&movie_id)
    }

    pub fn get(&self, a: MovieId, b: MovieId) -> Option<f64> {
        let row = *self.positions.get(&a)?;
        let col = *self.positions.get(&b)?;
        Some(self.scores[row * self.len() + col])
    }

    /// `(movie, score)` pairs for every movie, the queried one included
    pub fn row(&self, movie_id: MovieId) -> Option<impl Iterator<Item = (MovieId, f64)> + '_> {
        let row = *self.positions.get(&movie_id)?;
        let n = self.len();
        Some(
            self.movies
                .iter()
                .copied()
                .zip(self.scores[row * n..(row + 1) * n].iter().copied()),
        )
    }
}

/// Builds the similarity table with rows spread over `shards` blocking tasks.
///
/// Rows are dealt round-robin so the triangular workload evens out. The
/// result is identical to [`SimilarityMatrix::build`]. If any shard fails,
/// the partial rows are dropped and an error is returned.
pub async fn build_sharded(ratings: &[Rating], shards: usize) -> AppResult<SimilarityMatrix> {
    build_sharded_with(ratings, shards, RatingVectors::upper_row).await
}

/// Row computation run inside each shard
type RowFn = fn(&RatingVectors, usize) -> Vec<f64>;

async fn build_sharded_with(
    ratings: &[Rating],
    shards: usize,
    compute_row: RowFn,
) -> AppResult<SimilarityMatrix> {
    let vectors = Arc::new(RatingVectors::from_ratings(ratings));
    if vectors.is_empty() {
        tracing::warn!("No ratings available, similarity matrix is empty");
        return Ok(SimilarityMatrix::default());
    }

    let start = Instant::now();
    let shards = shards.clamp(1, vectors.len());

    let mut tasks = Vec::with_capacity(shards);
    for shard in 0..shards {
        let vectors = Arc::clone(&vectors);
        tasks.push(tokio::task::spawn_blocking(move || {
            (shard..vectors.len())
                .step_by(shards)
                .map(|row| (row, compute_row(&vectors, row)))
                .collect::<Vec<_>>()
        }));
    }

    let mut rows = Vec::with_capacity(vectors.len());
    for task in tasks {
        match task.await {
            Ok(shard_rows) => rows.extend(shard_rows),
            Err(e) => {
                tracing::error!(error = %e, "Similarity shard failed, discarding build");
                return Err(AppError::Internal(format!("similarity build failed: {}", e)));
            }
        }
    }

    let matrix = SimilarityMatrix::assemble(vectors.movies().to_vec(), rows);

    tracing::info!(
        movies = vectors.len(),
        users = vectors.user_count(),
        ratings = vectors.rating_count(),
        shards,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Built similarity matrix"
    );

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    /// A and B are rated identically, C leans towards A, D is unrelated,
    /// E only has zero ratings.
    fn sample_ratings() -> Vec<Rating> {
        vec![
            Rating::new(1, 1, 5.0),
            Rating::new(2, 1, 3.0),
            Rating::new(3, 1, 4.0),
            Rating::new(1, 2, 5.0),
            Rating::new(2, 2, 3.0),
            Rating::new(3, 2, 4.0),
            Rating::new(1, 3, 4.0),
            Rating::new(3, 3, 1.0),
            Rating::new(4, 4, 2.0),
            Rating::new(5, 4, 5.0),
            Rating::new(1, 5, 0.0),
        ]
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_identical_vectors_are_fully_similar() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        assert_close(matrix.get(1, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_known_cosine_value() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        // A = (5, 3, 4), C = (4, 0, 1)
        let expected = (5.0 * 4.0 + 4.0 * 1.0) / ((50.0f64).sqrt() * (17.0f64).sqrt());
        assert_close(matrix.get(1, 3).unwrap(), expected);
    }

    #[test]
    fn test_disjoint_raters_are_not_similar() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        assert_eq!(matrix.get(1, 4), Some(0.0));
    }

    #[test]
    fn test_symmetric_and_bounded() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        for &a in matrix.movies() {
            for &b in matrix.movies() {
                let ab = matrix.get(a, b).unwrap();
                assert_eq!(ab, matrix.get(b, a).unwrap());
                assert!((-1.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_diagonal() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        for id in 1..=4 {
            assert_eq!(matrix.get(id, id), Some(1.0));
        }
        // Only zero ratings: zero norm
        assert_eq!(matrix.get(5, 5), Some(0.0));
    }

    #[test]
    fn test_zero_norm_movie_is_similar_to_nothing() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        for &other in matrix.movies() {
            assert_eq!(matrix.get(5, other), Some(0.0));
        }
    }

    #[test]
    fn test_negative_ratings_stay_in_range() {
        let ratings = vec![
            Rating::new(1, 1, 2.0),
            Rating::new(2, 1, -1.0),
            Rating::new(1, 2, -2.0),
            Rating::new(2, 2, 1.0),
        ];
        let matrix = SimilarityMatrix::build(&ratings);
        assert_close(matrix.get(1, 2).unwrap(), -1.0);
    }

    #[test]
    fn test_non_finite_scores_become_zero() {
        let ratings = vec![
            Rating::new(1, 1, 5.0),
            Rating::new(2, 1, 4.0),
            Rating::new(1, 2, 5.0),
            Rating::new(2, 2, 4.0),
            Rating::new(1, 3, f64::NAN),
            Rating::new(1, 4, 1e200),
            Rating::new(2, 4, 1e200),
        ];
        let matrix = SimilarityMatrix::build(&ratings);

        for &a in matrix.movies() {
            for &b in matrix.movies() {
                let score = matrix.get(a, b).unwrap();
                assert!((-1.0..=1.0).contains(&score), "sim({a}, {b}) = {score}");
            }
        }
        assert_eq!(matrix.get(1, 3), Some(0.0));
        assert_eq!(matrix.get(1, 4), Some(0.0));

        // The intact neighbour still ranks first
        let best = matrix
            .row(1)
            .unwrap()
            .filter(|(id, _)| *id != 1)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert_eq!(best.0, 2);
    }

    #[test]
    fn test_empty_ratings_give_empty_matrix() {
        let matrix = SimilarityMatrix::build(&[]);
        assert!(matrix.is_empty());
        assert!(matrix.row(1).is_none());
        assert_eq!(matrix.get(1, 1), None);
    }

    #[test]
    fn test_build_is_idempotent() {
        let first = SimilarityMatrix::build(&sample_ratings());
        let second = SimilarityMatrix::build(&sample_ratings());
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_rating_last_write_wins() {
        let ratings = vec![
            Rating::new(1, 1, 1.0),
            Rating::new(2, 1, 1.0),
            Rating::new(1, 2, 5.0),
            Rating::new(1, 2, 1.0),
            Rating::new(2, 2, 1.0),
        ];
        let vectors = RatingVectors::from_ratings(&ratings);
        assert_eq!(vectors.rating_count(), 4);
        assert_eq!(vectors.user_count(), 2);

        let matrix = SimilarityMatrix::build(&ratings);
        assert_close(matrix.get(1, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_index_is_sorted_by_movie_id() {
        let ratings = vec![
            Rating::new(1, 30, 3.0),
            Rating::new(1, 10, 3.0),
            Rating::new(1, 20, 3.0),
        ];
        let matrix = SimilarityMatrix::build(&ratings);
        assert_eq!(matrix.movies(), &[10, 20, 30]);
        assert!(matrix.contains(20));
        assert!(!matrix.contains(40));
    }

    #[test]
    fn test_row_includes_every_movie_once() {
        let matrix = SimilarityMatrix::build(&sample_ratings());
        let row: Vec<(MovieId, f64)> = matrix.row(1).unwrap().collect();
        let ids: Vec<MovieId> = row.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_sharded_build_matches_single_threaded() {
        let ratings = sample_ratings();
        let single = SimilarityMatrix::build(&ratings);
        for shards in [1, 2, 3, 16] {
            let sharded = build_sharded(&ratings, shards).await.unwrap();
            assert_eq!(sharded, single, "shards = {shards}");
        }
    }

    #[tokio::test]
    async fn test_failed_shard_discards_build() {
        fn panicking_row(vectors: &RatingVectors, row: usize) -> Vec<f64> {
            if row == 1 {
                panic!("row {row} failed");
            }
            vectors.upper_row(row)
        }

        let result = build_sharded_with(&sample_ratings(), 2, panicking_row).await;
        assert!(matches!(result, Err(AppError::Internal(msg)) if msg.contains("similarity build failed")));
    }

    #[tokio::test]
    async fn test_sharded_build_of_nothing() {
        let matrix = tokio_test::assert_ok!(build_sharded(&[], 4).await);
        assert!(matrix.is_empty());
    }
}
