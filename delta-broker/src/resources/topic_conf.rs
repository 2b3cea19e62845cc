use std::sync::Arc;

use delta_core::metadata::{MetadataError, MetadataStore};
use delta_core::proto;
use serde::{Deserialize, Serialize};

use crate::{
    resources::BASE_TOPIC_CONF_PATH,
    topic::{to_proto_assignments, BrokerPartitionAssignment, Topic},
    utils::join_path,
};

/// Persisted configuration of a topic: the cluster's source of truth for
/// its partition assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TopicConf {
    pub(crate) broker_partition_assignments: Vec<BrokerPartitionAssignment>,
    /// JSON encoded record type, as supplied by the client
    #[serde(default)]
    pub(crate) record_type: Option<String>,
}

impl TopicConf {
    pub(crate) fn to_response(&self) -> proto::ConfigureTopicResponse {
        proto::ConfigureTopicResponse {
            broker_partition_assignments: to_proto_assignments(&self.broker_partition_assignments),
            record_type: self.record_type.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct TopicConfResources {
    store: Arc<dyn MetadataStore>,
}

impl std::fmt::Debug for TopicConfResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicConfResources").finish()
    }
}

impl TopicConfResources {
    pub(crate) fn new(store: Arc<dyn MetadataStore>) -> Self {
        TopicConfResources { store }
    }

    pub(crate) fn topic_conf_path(topic: &Topic) -> String {
        join_path(&[BASE_TOPIC_CONF_PATH, &topic.namespace, &topic.name])
    }

    /// Inverse of [`Self::topic_conf_path`]; `None` for keys outside the layout.
    pub(crate) fn parse_topic_conf_path(path: &str) -> Option<Topic> {
        let rest = path.strip_prefix(BASE_TOPIC_CONF_PATH)?.strip_prefix('/')?;
        let (namespace, name) = rest.split_once('/')?;
        let topic = Topic::new(namespace, name);
        topic.validate().ok()?;
        Some(topic)
    }

    pub(crate) async fn read_topic_conf(
        &self,
        topic: &Topic,
    ) -> Result<Option<TopicConf>, MetadataError> {
        let path = Self::topic_conf_path(topic);
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Create-or-replace write of the topic configuration.
    pub(crate) async fn save_topic_conf(
        &self,
        topic: &Topic,
        conf: &TopicConf,
    ) -> Result<(), MetadataError> {
        let path = Self::topic_conf_path(topic);
        let data = serde_json::to_value(conf)?;
        self.store.put(&path, data).await
    }
}
