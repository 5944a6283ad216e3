//! Rating store and engagement storage backends

use crate::{
    error::AppResult,
    models::{Movie, NewMovie, Rating},
};

pub mod memory;
pub mod postgres;
pub mod redis;

pub use self::memory::MemoryRatingStore;
pub use self::postgres::{create_pool, PgRatingStore};
pub use self::redis::create_redis_client;

/// Source of the rating feed and the movie catalog
///
/// The recommendation engine reads everything in bulk on every rebuild;
/// stores only need to support full loads plus adding a single movie.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    /// Every `(user, movie, value)` rating
    async fn load_ratings(&self) -> AppResult<Vec<Rating>>;

    /// Every movie in the catalog
    async fn load_movies(&self) -> AppResult<Vec<Movie>>;

    /// Adds a movie plus its seed rating from `seed_user_id`.
    ///
    /// Fails with `InvalidInput` when a movie with the same title (ignoring
    /// case) already exists. The new movie gets `max(movie_id) + 1`.
    async fn add_movie(&self, new_movie: NewMovie, seed_user_id: i64) -> AppResult<Movie>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// A submitted movie that passed validation, waiting for an id
#[derive(Debug, Clone)]
pub(crate) struct ValidatedMovie {
    pub title: String,
    pub release_date: chrono::NaiveDate,
    pub genre: crate::models::Genre,
    pub rating: f64,
}

impl ValidatedMovie {
    pub fn into_movie(self, movie_id: crate::models::MovieId) -> Movie {
        Movie::new(movie_id, self.title)
            .with_genre(self.genre)
            .with_release_date(self.release_date)
    }
}

/// Checks the fields of a submitted movie before any store touches it
pub(crate) fn validate_new_movie(new_movie: &NewMovie) -> AppResult<ValidatedMovie> {
    use crate::{error::AppError, models::rating::validate_rating};

    let title = new_movie.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title must not be empty".to_string()));
    }
    let release_date = new_movie
        .parsed_release_date()
        .map_err(AppError::InvalidInput)?;
    let rating = validate_rating(new_movie.rating).map_err(AppError::InvalidInput)?;

    Ok(ValidatedMovie {
        title: title.to_string(),
        release_date,
        genre: new_movie.category,
        rating,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, models::Genre};

    fn new_movie(title: &str, release_date: &str, rating: f64) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            category: Genre::Western,
            release_date: release_date.to_string(),
            rating,
        }
    }

    #[test]
    fn test_validate_new_movie() {
        let validated = validate_new_movie(&new_movie(" Unforgiven ", "07-Aug-1992", 4.0)).unwrap();
        assert_eq!(validated.title, "Unforgiven");

        let movie = validated.into_movie(1683);
        assert_eq!(movie.movie_id, 1683);
        assert!(movie.genres.contains(&Genre::Western));
        assert!(movie.release_date.is_some());
    }

    #[test]
    fn test_validate_new_movie_rejects_bad_input() {
        for candidate in [
            new_movie("   ", "07-Aug-1992", 4.0),
            new_movie("Unforgiven", "August 1992", 4.0),
            new_movie("Unforgiven", "07-Aug-1992", 9.0),
        ] {
            let err = validate_new_movie(&candidate).unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
    }
}
