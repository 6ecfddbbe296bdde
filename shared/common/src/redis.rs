use redis::{aio::ConnectionManager, AsyncCommands, Client};

use crate::{AppError, RedisConfig};

/// Thin wrapper around a shared Redis connection manager. The only concern
/// this slice keeps in Redis is per-sender counters for message rate limits.
#[derive(Clone)]
pub struct RedisService {
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &RedisConfig) -> Result<Self, AppError> {
        let client = Client::open(config.connection_string()).map_err(AppError::Redis)?;

        let manager = ConnectionManager::new(client).await.map_err(AppError::Redis)?;

        // Test connection
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(AppError::Redis)?;

        tracing::info!("Redis connection established");

        Ok(Self { manager })
    }

    /// Fixed-window counter. Returns false once the caller is over `limit`
    /// within `window_seconds`.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: i64,
    ) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let current: u32 = conn.incr(key, 1).await.map_err(AppError::Redis)?;

        if current == 1 {
            let _: bool = conn
                .expire(key, window_seconds)
                .await
                .map_err(AppError::Redis)?;
        }

        Ok(current <= limit)
    }
}
