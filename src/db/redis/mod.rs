pub mod engagement;

pub use engagement::{create_redis_client, EngagementKey, EngagementWriterHandle, RedisEngagementTracker};
