use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, Client};

use crate::error::AppResult;
use crate::services::throttle::CounterStore;

/// Creates a Redis client for throttle counters
///
/// Creating the client does not touch the network.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Fixed-window counters shared by every instance pointing at the same Redis
#[derive(Clone)]
pub struct RedisCounters {
    connection: ConnectionManager,
}

impl RedisCounters {
    /// Opens a managed connection that reconnects on failure
    pub async fn connect(redis_client: Client) -> anyhow::Result<Self> {
        let connection = ConnectionManager::new(redis_client).await?;
        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl CounterStore for RedisCounters {
    async fn increment(
        &self,
        key: &str,
        _now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut conn = self.connection.clone();

        // MULTI/EXEC so the counter never outlives its window
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire_at(key, expires_at.timestamp())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, key = %key, "Redis throttle increment failed");
                e
            })?;

        tracing::trace!(key = %key, count, "Throttle counter incremented");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use redis::AsyncCommands;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[test]
    fn test_create_client_does_not_connect() {
        assert!(create_redis_client("redis://127.0.0.1:1").is_ok());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_increment_counts_and_expires() {
        let client = create_redis_client(&redis_url()).unwrap();
        let counters = RedisCounters::connect(client.clone()).await.unwrap();

        let now = Utc::now();
        let key = format!("throttle:test:{}", uuid::Uuid::new_v4());
        let expires_at = now + Duration::seconds(30);

        assert_eq!(counters.increment(&key, now, expires_at).await.unwrap(), 1);
        assert_eq!(counters.increment(&key, now, expires_at).await.unwrap(), 2);

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 30);

        // Clean up
        let _: () = conn.del(&key).await.unwrap();
    }
}
