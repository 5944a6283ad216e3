//! In-memory rating store
//!
//! Backs the service when it runs straight off a MovieLens 100k download
//! (`u.item` + `u.data`) and serves as the store in tests.

use std::path::Path;

use tokio::sync::RwLock;

use crate::{
    db::{validate_new_movie, RatingStore},
    error::{AppError, AppResult},
    models::{
        movie::parse_release_date, rating::validate_rating, Genre, Movie, MovieId, NewMovie,
        Rating,
    },
    services::catalog::title_key,
};

const ITEM_FILE: &str = "u.item";
const DATA_FILE: &str = "u.data";

/// `u.item` columns before the genre flags: id, title, release date,
/// video release date, IMDb URL
const ITEM_GENRE_OFFSET: usize = 5;

struct MemoryInner {
    movies: Vec<Movie>,
    ratings: Vec<Rating>,
}

pub struct MemoryRatingStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryRatingStore {
    pub fn new(movies: Vec<Movie>, ratings: Vec<Rating>) -> Self {
        Self {
            inner: RwLock::new(MemoryInner { movies, ratings }),
        }
    }

    /// Loads `u.item` and `u.data` from a MovieLens 100k directory
    pub async fn from_movielens_dir(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref();
        let items = read_latin1(&dir.join(ITEM_FILE)).await?;
        let data = read_latin1(&dir.join(DATA_FILE)).await?;

        let movies = parse_items(&items)?;
        let ratings = parse_ratings(&data)?;

        tracing::info!(
            dir = %dir.display(),
            movies = movies.len(),
            ratings = ratings.len(),
            "Loaded MovieLens data"
        );

        Ok(Self::new(movies, ratings))
    }
}

/// MovieLens files are latin-1; decoding byte-per-char is exact for it
async fn read_latin1(path: &Path) -> AppResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::DataLoad(format!("{}: {}", path.display(), e)))?;
    Ok(bytes.into_iter().map(char::from).collect())
}

/// Parses pipe-separated `u.item` lines
pub fn parse_items(contents: &str) -> AppResult<Vec<Movie>> {
    let mut movies = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < ITEM_GENRE_OFFSET + Genre::ALL.len() {
            return Err(AppError::DataLoad(format!(
                "u.item line {}: expected {} fields, found {}",
                line_no + 1,
                ITEM_GENRE_OFFSET + Genre::ALL.len(),
                fields.len()
            )));
        }

        let movie_id: MovieId = fields[0].trim().parse().map_err(|_| {
            AppError::DataLoad(format!("u.item line {}: bad movie id", line_no + 1))
        })?;

        let mut movie = Movie::new(movie_id, fields[1].trim());
        movie.release_date = parse_release_date(fields[2]);
        for (flag, genre) in fields[ITEM_GENRE_OFFSET..].iter().zip(Genre::ALL) {
            if flag.trim() == "1" {
                movie.genres.insert(genre);
            }
        }
        movies.push(movie);
    }

    Ok(movies)
}

/// Parses tab-separated `u.data` lines: user, item, rating, timestamp
pub fn parse_ratings(contents: &str) -> AppResult<Vec<Rating>> {
    let mut ratings = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let mut next = |name: &str| {
            fields.next().ok_or_else(|| {
                AppError::DataLoad(format!("u.data line {}: missing {}", line_no + 1, name))
            })
        };
        let user = next("user id")?;
        let movie = next("movie id")?;
        let value = next("rating")?;

        let bad = |name: &str| AppError::DataLoad(format!("u.data line {}: bad {}", line_no + 1, name));
        let value: f64 = value.parse().map_err(|_| bad("rating"))?;
        let value = validate_rating(value)
            .map_err(|e| AppError::DataLoad(format!("u.data line {}: {}", line_no + 1, e)))?;
        ratings.push(Rating::new(
            user.parse().map_err(|_| bad("user id"))?,
            movie.parse().map_err(|_| bad("movie id"))?,
            value,
        ));
    }

    Ok(ratings)
}

#[async_trait::async_trait]
impl RatingStore for MemoryRatingStore {
    async fn load_ratings(&self) -> AppResult<Vec<Rating>> {
        Ok(self.inner.read().await.ratings.clone())
    }

    async fn load_movies(&self) -> AppResult<Vec<Movie>> {
        Ok(self.inner.read().await.movies.clone())
    }

    async fn add_movie(&self, new_movie: NewMovie, seed_user_id: i64) -> AppResult<Movie> {
        let validated = validate_new_movie(&new_movie)?;
        let mut inner = self.inner.write().await;

        let key = title_key(&validated.title);
        if inner.movies.iter().any(|m| title_key(&m.title) == key) {
            return Err(AppError::InvalidInput(format!(
                "movie '{}' already exists",
                validated.title
            )));
        }

        let movie_id = inner.movies.iter().map(|m| m.movie_id).max().unwrap_or(0) + 1;
        let rating = Rating::new(seed_user_id, movie_id, validated.rating);
        let movie = validated.into_movie(movie_id);

        inner.movies.push(movie.clone());
        inner.ratings.push(rating);

        Ok(movie)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
