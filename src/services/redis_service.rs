// src/services/redis_service.rs
use crate::errors::ThumbsmithError;
use crate::services::preset_store::KeyValueStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

/// Redis-backed [`KeyValueStore`]. Values never expire.
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, ThumbsmithError> {
        let client = Client::open(redis_url)?;

        // Test connection
        let mut conn = client.get_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        Ok(Self { client })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ThumbsmithError> {
        let mut conn = self.client.get_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), ThumbsmithError> {
        let mut conn = self.client.get_async_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}
