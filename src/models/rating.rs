use serde::{Deserialize, Serialize};

use super::{MovieId, UserId};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// One user's score for one movie
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub value: f64,
}

impl Rating {
    pub fn new(user_id: UserId, movie_id: MovieId, value: f64) -> Self {
        Self {
            user_id,
            movie_id,
            value,
        }
    }
}

/// Checks a rating entered through the API
pub fn validate_rating(value: f64) -> Result<f64, String> {
    if value.is_finite() && (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, value
        ))
    }
}
