use std::sync::Arc;

use movie_recommender::{
    api::{create_router, AppState},
    config::Config,
    db::{
        create_pool, create_redis_client,
        redis::{EngagementWriterHandle, RedisEngagementTracker},
        MemoryRatingStore, PgRatingStore, RatingStore,
    },
    services::{EngagementTracker, MemoryEngagementTracker, RecommendationEngine},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_recommender=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (store, tracker, writer_handle) = connect_backends(&config).await?;

    // Ratings are read once here and on every explicit rebuild
    let engine = Arc::new(RecommendationEngine::new(config.build_shards));
    engine.rebuild(store.as_ref()).await?;

    let state = AppState::new(engine, store, tracker)
        .with_default_top_n(config.default_top_n)
        .with_seed_user_id(config.seed_user_id);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = writer_handle {
        handle.shutdown().await;
    }

    Ok(())
}

type Backends = (
    Arc<dyn RatingStore>,
    Arc<dyn EngagementTracker>,
    Option<EngagementWriterHandle>,
);

/// MovieLens files with in-memory counters when `DATA_DIR` is set,
/// Postgres and Redis otherwise
async fn connect_backends(config: &Config) -> anyhow::Result<Backends> {
    if let Some(dir) = &config.data_dir {
        tracing::info!(data_dir = %dir, "Using MovieLens files and in-memory engagement counters");
        let store: Arc<dyn RatingStore> = Arc::new(MemoryRatingStore::from_movielens_dir(dir).await?);
        let tracker: Arc<dyn EngagementTracker> = Arc::new(MemoryEngagementTracker::new());
        return Ok((store, tracker, None));
    }

    let pool = create_pool(&config.database_url).await?;
    let redis_client = create_redis_client(&config.redis_url)?;
    let (tracker, handle) = RedisEngagementTracker::new(redis_client);

    tracing::info!("Connected to Postgres and Redis");

    let store: Arc<dyn RatingStore> = Arc::new(PgRatingStore::new(pool));
    let tracker: Arc<dyn EngagementTracker> = Arc::new(tracker);
    Ok((store, tracker, Some(handle)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
