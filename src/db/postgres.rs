use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    db::{validate_new_movie, RatingStore},
    error::{AppError, AppResult},
    models::{rating::validate_rating, Genre, Movie, MovieId, NewMovie, Rating, UserId},
};

/// Creates a PostgreSQL connection pool and applies the schema migrations
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

#[derive(Debug, FromRow)]
struct MovieRow {
    movie_id: MovieId,
    title: String,
    release_date: Option<NaiveDate>,
    genres: Vec<String>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        let mut movie = Movie::new(row.movie_id, row.title);
        movie.release_date = row.release_date;
        for name in row.genres {
            match name.parse::<Genre>() {
                Ok(genre) => {
                    movie.genres.insert(genre);
                }
                Err(e) => tracing::warn!(movie_id = row.movie_id, error = %e, "Skipping stored genre"),
            }
        }
        movie
    }
}

#[derive(Debug, FromRow)]
struct RatingRow {
    user_id: UserId,
    movie_id: MovieId,
    rating: f64,
}

impl RatingRow {
    /// Rejects stored values that are not finite or fall outside the rating scale
    fn into_rating(self) -> AppResult<Rating> {
        let value = validate_rating(self.rating).map_err(|e| {
            AppError::DataLoad(format!(
                "rating of movie {} by user {}: {}",
                self.movie_id, self.user_id, e
            ))
        })?;
        Ok(Rating::new(self.user_id, self.movie_id, value))
    }
}

/// Rating store over the `movies` and `ratings` tables
#[derive(Clone)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RatingStore for PgRatingStore {
    async fn load_ratings(&self) -> AppResult<Vec<Rating>> {
        let rows = sqlx::query_as::<_, RatingRow>(
            "SELECT user_id, movie_id, rating FROM ratings ORDER BY movie_id, user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RatingRow::into_rating).collect()
    }

    async fn load_movies(&self) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(
            "SELECT movie_id, title, release_date, genres FROM movies ORDER BY movie_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn add_movie(&self, new_movie: NewMovie, seed_user_id: i64) -> AppResult<Movie> {
        let validated = validate_new_movie(&new_movie)?;
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent inserts so max(movie_id) + 1 stays unique
        sqlx::query("LOCK TABLE movies IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM movies WHERE lower(title) = lower($1))",
        )
        .bind(&validated.title)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(AppError::InvalidInput(format!(
                "movie '{}' already exists",
                validated.title
            )));
        }

        let movie_id: MovieId =
            sqlx::query_scalar("SELECT COALESCE(MAX(movie_id), 0) + 1 FROM movies")
                .fetch_one(&mut *tx)
                .await?;

        let rating = validated.rating;
        let movie = validated.into_movie(movie_id);
        let genres: Vec<String> = movie.genres.iter().map(|g| g.as_str().to_string()).collect();

        sqlx::query(
            "INSERT INTO movies (movie_id, title, release_date, genres) VALUES ($1, $2, $3, $4)",
        )
        .bind(movie.movie_id)
        .bind(&movie.title)
        .bind(movie.release_date)
        .bind(&genres)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO ratings (user_id, movie_id, rating) VALUES ($1, $2, $3)
            ON CONFLICT (user_id, movie_id) DO UPDATE SET rating = EXCLUDED.rating
            "#,
        )
        .bind(seed_user_id)
        .bind(movie.movie_id)
        .bind(rating)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(movie_id = movie.movie_id, title = %movie.title, "Movie added");

        Ok(movie)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
