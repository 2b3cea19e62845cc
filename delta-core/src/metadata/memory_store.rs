use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use super::{
    errors::Result,
    store::{KeyValueVersion, MetadataStore},
    watch::{WatchEvent, WatchStream},
    MetadataError,
};

const WATCH_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    version: i64,
}

/// In-memory `MetadataStore` backed by a flat map of absolute paths.
/// Used by single-node deployments and by tests.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoredValue>>,
    revision: Arc<AtomicI64>,
    events: broadcast::Sender<WatchEvent>,
}

impl MemoryStore {
    pub async fn new() -> Result<Self> {
        let (events, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Ok(MemoryStore {
            inner: Arc::new(DashMap::new()),
            revision: Arc::new(AtomicI64::new(0)),
            events,
        })
    }

    fn validate_key(key: &str) -> Result<()> {
        if !key.starts_with('/') || key.len() < 2 || key.ends_with('/') || key.contains("//") {
            return Err(MetadataError::InvalidArguments(format!(
                "key must be an absolute path without empty segments: {:?}",
                key
            )));
        }
        Ok(())
    }

    fn next_revision(&self) -> i64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn store(&self, key: &str, value: Value) -> Result<i64> {
        Self::validate_key(key)?;
        let bytes = serde_json::to_vec(&value)?;
        let version = self.next_revision();
        self.inner
            .insert(key.to_owned(), StoredValue { value, version });
        // no receivers is not an error
        let _ = self.events.send(WatchEvent::Put {
            key: key.to_owned(),
            value: bytes,
            version,
        });
        Ok(version)
    }

    fn remove(&self, key: &str, only_version: Option<i64>) {
        let removed = match only_version {
            Some(version) => self.inner.remove_if(key, |_, stored| stored.version == version),
            None => self.inner.remove(key),
        };
        if removed.is_some() {
            let version = self.next_revision();
            let _ = self.events.send(WatchEvent::Delete {
                key: key.to_owned(),
                version,
            });
        }
    }

    fn children_prefix(path: &str) -> String {
        if path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{}/", path)
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Self::validate_key(key)?;
        Ok(self.inner.get(key).map(|stored| stored.value.clone()))
    }

    async fn get_childrens(&self, path: &str) -> Result<Vec<String>> {
        let prefix = Self::children_prefix(path);
        let mut children: Vec<String> = self
            .inner
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        children.sort();
        Ok(children)
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.store(key, value)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::validate_key(key)?;
        self.remove(key, None);
        Ok(())
    }

    async fn watch(&self, prefix: &str) -> Result<WatchStream> {
        Ok(WatchStream::from_broadcast(self.events.subscribe(), prefix))
    }

    async fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let version = self.store(key, value)?;
        let store = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            trace!(key = %key, version, "ttl expired");
            // a newer write keeps the key alive
            store.remove(&key, Some(version));
        });
        Ok(())
    }

    async fn get_bulk(&self, prefix: &str) -> Result<Vec<KeyValueVersion>> {
        let prefix = Self::children_prefix(prefix);
        let mut entries = Vec::new();
        for entry in self.inner.iter() {
            if entry.key().starts_with(&prefix) {
                entries.push(KeyValueVersion {
                    key: entry.key().clone(),
                    value: serde_json::to_vec(&entry.value().value)?,
                    version: entry.value().version,
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
