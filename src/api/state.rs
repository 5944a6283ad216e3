use std::sync::Arc;

use crate::{
    config,
    db::RatingStore,
    services::{EngagementTracker, RecommendationEngine},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    pub store: Arc<dyn RatingStore>,
    pub tracker: Arc<dyn EngagementTracker>,
    pub default_top_n: usize,
    pub seed_user_id: i64,
}

impl AppState {
    pub fn new(
        engine: Arc<RecommendationEngine>,
        store: Arc<dyn RatingStore>,
        tracker: Arc<dyn EngagementTracker>,
    ) -> Self {
        Self {
            engine,
            store,
            tracker,
            default_top_n: config::default_top_n(),
            seed_user_id: config::default_seed_user_id(),
        }
    }

    pub fn with_default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    pub fn with_seed_user_id(mut self, user_id: i64) -> Self {
        self.seed_user_id = user_id;
        self
    }
}
