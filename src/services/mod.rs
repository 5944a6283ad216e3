pub mod catalog;
pub mod engagement;
pub mod engine;
pub mod recommender;
pub mod similarity;

pub use catalog::Catalog;
pub use engagement::{EngagementTracker, MemoryEngagementTracker};
pub use engine::{RecommendationEngine, Snapshot, SnapshotStats};
pub use similarity::SimilarityMatrix;
