use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::errors::Result;
use super::watch::WatchStream;

/// A key-value-version tuple returned by bulk queries.
#[derive(Debug, Clone)]
pub struct KeyValueVersion {
    pub key: String,
    pub value: Vec<u8>,
    pub version: i64,
}

/// Durable key-value store holding cluster metadata (topic configurations,
/// coordinator address). Keys are absolute, `/`-separated paths.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// Full paths of the keys stored below `path`.
    async fn get_childrens(&self, path: &str) -> Result<Vec<String>>;
    /// Create-or-replace write.
    async fn put(&self, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn watch(&self, prefix: &str) -> Result<WatchStream>;

    /// Put a key with a time-to-live. The key is automatically deleted after `ttl`
    /// unless it is written again in the meantime.
    async fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Retrieve all key-value pairs under a given prefix.
    async fn get_bulk(&self, prefix: &str) -> Result<Vec<KeyValueVersion>>;
}
