use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::models::{EngagementCounters, MovieId};
use crate::services::engagement::EngagementTracker;

const SHOWN_FIELD: &str = "shown";
const CLICKS_FIELD: &str = "clicks";

/// Redis keys used for engagement counters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngagementKey {
    /// Hash holding the `shown` and `clicks` counters of one movie
    Counters(MovieId),
}

impl Display for EngagementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngagementKey::Counters(movie_id) => write!(f, "engagement:{}", movie_id),
        }
    }
}

/// Creates a Redis client for engagement counters
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Counter increment queued for the background writer
#[derive(Debug)]
struct CounterIncrement {
    key: String,
    field: &'static str,
    delta: i64,
}

/// Engagement tracker storing per-movie counters in Redis hashes
///
/// "Shown" events arrive once per recommended movie on every query, so they
/// go through a background writer and never hold up the response. Clicks
/// are written directly because the caller wants the new count back.
#[derive(Clone)]
pub struct RedisEngagementTracker {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CounterIncrement>,
}

/// Handle for gracefully shutting down the counter writer
pub struct EngagementWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl EngagementWriterHandle {
    /// Signals the writer to stop and waits until queued increments are flushed
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Engagement writer shutdown signal sent");
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Engagement writer task ended abnormally");
        }
    }
}

impl RedisEngagementTracker {
    /// Creates the tracker and spawns its background writer task
    pub fn new(redis_client: Client) -> (Self, EngagementWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        let task = tokio::spawn(async move {
            Self::writer_task(client, write_rx, shutdown_rx).await;
        });

        let tracker = Self {
            redis_client,
            write_tx,
        };

        (tracker, EngagementWriterHandle { shutdown_tx, task })
    }

    /// Applies queued increments until shutdown, then drains what is left
    async fn writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CounterIncrement>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Engagement writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::apply(&client, &msg).await {
                        tracing::error!(error = %e, key = %msg.key, "Failed to update engagement counter");
                    }
                }
                _ = shutdown_rx.recv() => {
                    let mut flushed = 0;
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::apply(&client, &msg).await {
                            tracing::error!(error = %e, key = %msg.key, "Failed to flush engagement counter during shutdown");
                        }
                        flushed += 1;
                    }
                    tracing::info!(flushed, "Engagement writer task stopped");
                    break;
                }
            }
        }
    }

    async fn apply(client: &Client, msg: &CounterIncrement) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: i64 = conn.hincr(&msg.key, msg.field, msg.delta).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl EngagementTracker for RedisEngagementTracker {
    async fn record_shown(&self, movie_id: MovieId) -> AppResult<()> {
        let msg = CounterIncrement {
            key: EngagementKey::Counters(movie_id).to_string(),
            field: SHOWN_FIELD,
            delta: 1,
        };
        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, movie_id, "Failed to queue shown counter");
        }
        Ok(())
    }

    async fn record_click(&self, movie_id: MovieId) -> AppResult<u64> {
        let key = EngagementKey::Counters(movie_id).to_string();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let clicks: u64 = conn.hincr(&key, CLICKS_FIELD, 1).await?;
        Ok(clicks)
    }

    async fn counters(&self, movie_id: MovieId) -> AppResult<EngagementCounters> {
        let key = EngagementKey::Counters(movie_id).to_string();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let (shown, clicks): (Option<u64>, Option<u64>) =
            conn.hget(&key, &[SHOWN_FIELD, CLICKS_FIELD]).await?;

        Ok(EngagementCounters {
            shown: shown.unwrap_or(0),
            clicks: clicks.unwrap_or(0),
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
