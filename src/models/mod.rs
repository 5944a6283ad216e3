use serde::{Deserialize, Serialize};

pub mod movie;
pub mod rating;

pub use movie::{Genre, Movie, NewMovie};
pub use rating::Rating;

/// Stable key of a movie, used for similarity and engagement tracking
pub type MovieId = i64;

/// Opaque user identifier from the rating feed
pub type UserId = i64;

/// A single ranked recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub movie_id: MovieId,
    pub title: String,
    pub score: f64,
}

/// Response body of the recommend endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub movie: String,
    pub recommendations: Vec<Recommendation>,
}

/// Response body of the click endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ClickResponse {
    pub movie_id: MovieId,
    pub clicks: u64,
}

/// Response body of the click statistics endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ClickStatsResponse {
    pub movie_id: MovieId,
    pub click_percentage: f64,
}

/// Counters kept per movie by the engagement tracker
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngagementCounters {
    pub shown: u64,
    pub clicks: u64,
}

impl EngagementCounters {
    /// Click-through rate as a percentage; zero when the movie was never shown
    pub fn click_percentage(&self) -> f64 {
        if self.shown == 0 {
            0.0
        } else {
            self.clicks as f64 / self.shown as f64 * 100.0
        }
    }
}
