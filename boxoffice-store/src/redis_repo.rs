use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::RedisResult;
use tracing::info;

use boxoffice_core::lock::{DistributedLock, LockError, LockToken};

/// Deletes the key only while it still carries the caller's token.
const RELEASE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Round-trips a PING so startup fails fast on an unreachable server.
    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis connected ({})", pong);
        Ok(())
    }
}

/// Single-node Redis lease lock: `SET NX PX` plus compare-and-delete.
#[derive(Clone)]
pub struct RedisLock {
    conn: MultiplexedConnection,
    release: redis::Script,
}

impl RedisLock {
    pub async fn new(client: &RedisClient) -> RedisResult<Self> {
        Ok(Self {
            conn: client.connection().await?,
            release: redis::Script::new(RELEASE_SCRIPT),
        })
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let mut conn = self.conn.clone();
        let token = LockToken::new();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        // SET NX: Only set if key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token.value())
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(LockError::backend)?;

        Ok(result.map(|_| token))
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let _deleted: i64 = self
            .release
            .key(key)
            .arg(token.value())
            .invoke_async(&mut conn)
            .await
            .map_err(LockError::backend)?;
        Ok(())
    }
}
