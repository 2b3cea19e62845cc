use std::collections::BTreeSet;
use std::sync::Arc;

use delta_core::metadata::{MetadataError, MetadataStore, WatchEvent};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::retry::{retry_until, RetryManager};
use crate::{
    local_partitions::LocalPartitions,
    resources::{TopicConf, TopicConfResources, BASE_TOPIC_CONF_PATH},
    topic::Topic,
};

/// Keeps the local partition registry in line with the persisted topic
/// configurations.
///
/// ## Process Flow:
/// 1. **Watch**: subscribes to `/topics/conf` before reading anything, so no
///    change falls between the read and the watch
/// 2. **Resync**: reads every persisted configuration and applies it
/// 3. **Follow**: applies each Put, releases the topic on Delete
///
/// A lagged or closed watch starts over from step 1 after a backoff. Only
/// invalid arguments are treated as fatal. Returns when `cancel` fires.
pub(crate) async fn follow_topic_assignments(
    store: Arc<dyn MetadataStore>,
    local: Arc<LocalPartitions>,
    retry: RetryManager,
    cancel: CancellationToken,
) -> Result<(), MetadataError> {
    retry_until(
        "assignment_follower",
        &retry,
        &cancel,
        || watch_once(Arc::clone(&store), Arc::clone(&local)),
        is_retryable,
    )
    .await
}

pub(crate) fn is_retryable(err: &MetadataError) -> bool {
    !matches!(err, MetadataError::InvalidArguments(_))
}

async fn watch_once(
    store: Arc<dyn MetadataStore>,
    local: Arc<LocalPartitions>,
) -> Result<(), MetadataError> {
    let mut watch = store.watch(BASE_TOPIC_CONF_PATH).await?;
    resync(store.as_ref(), &local).await?;

    while let Some(event) = watch.next().await {
        match event? {
            WatchEvent::Put { key, value, .. } => {
                let Some(topic) = TopicConfResources::parse_topic_conf_path(&key) else {
                    continue;
                };
                apply_conf(&local, &topic, &value);
            }
            WatchEvent::Delete { key, .. } => {
                if let Some(topic) = TopicConfResources::parse_topic_conf_path(&key) {
                    let released = local.release_topic(&topic);
                    info!(topic = %topic, released, "topic configuration deleted");
                }
            }
        }
    }

    Err(MetadataError::WatchChannelClosed)
}

async fn resync(store: &dyn MetadataStore, local: &LocalPartitions) -> Result<(), MetadataError> {
    let entries = store.get_bulk(BASE_TOPIC_CONF_PATH).await?;
    let mut persisted = BTreeSet::new();
    for entry in entries {
        let Some(topic) = TopicConfResources::parse_topic_conf_path(&entry.key) else {
            continue;
        };
        apply_conf(local, &topic, &entry.value);
        persisted.insert(topic);
    }

    for topic in local.topics().difference(&persisted) {
        let released = local.release_topic(topic);
        info!(topic = %topic, released, "released partitions of unconfigured topic");
    }
    debug!(topics = persisted.len(), "local partitions resynced");
    Ok(())
}

// a malformed document is skipped, the next write of the topic corrects it
fn apply_conf(local: &LocalPartitions, topic: &Topic, raw: &[u8]) {
    match serde_json::from_slice::<TopicConf>(raw) {
        Ok(conf) => {
            local.sync_topic(topic, &conf.broker_partition_assignments);
        }
        Err(err) => {
            warn!(topic = %topic, error = %err, "ignoring malformed topic configuration");
        }
    }
}
