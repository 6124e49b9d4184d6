//! Redis-backed key-value store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::StoreError;
use crate::storage::KeyValueStore;

const DEPENDENCY: &str = "kv";

/// `KeyValueStore` over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisKvStore {
    connection: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(map_redis_error)?;

        let store = Self { connection };
        store.ping().await?;
        tracing::info!(url = %url, "Key-value store connected");
        Ok(store)
    }
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}

fn map_redis_error(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        StoreError::unavailable(DEPENDENCY, err.to_string())
    } else {
        StoreError::backend(DEPENDENCY, err.to_string())
    }
}
