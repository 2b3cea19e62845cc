use dashmap::DashMap;
use delta_core::proto;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::topic::{topic_partition_key, BrokerPartitionAssignment, Partition, Topic};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocalPartition {
    pub(crate) topic: Topic,
    pub(crate) partition: Partition,
    pub(crate) follower_brokers: Vec<String>,
}

/// Ranges this broker currently leads. This is what the broker reports to
/// the coordinator as its ground truth.
#[derive(Debug)]
pub(crate) struct LocalPartitions {
    self_addr: String,
    /// key: `namespace.name.start-stop`
    partitions: DashMap<String, LocalPartition>,
}

impl LocalPartitions {
    pub(crate) fn new(self_addr: impl Into<String>) -> Self {
        LocalPartitions {
            self_addr: self_addr.into(),
            partitions: DashMap::new(),
        }
    }

    pub(crate) fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Serves the range. Returns false when it was already served.
    pub(crate) fn assign(&self, topic: &Topic, assignment: &BrokerPartitionAssignment) -> bool {
        let key = topic_partition_key(topic, &assignment.partition);
        let added = self
            .partitions
            .insert(
                key.clone(),
                LocalPartition {
                    topic: topic.clone(),
                    partition: assignment.partition,
                    follower_brokers: assignment.follower_brokers.clone(),
                },
            )
            .is_none();
        if added {
            info!(partition = %key, "serving partition");
        }
        added
    }

    /// Stops serving the range. Returns false when it was not served.
    pub(crate) fn release(&self, topic: &Topic, partition: &Partition) -> bool {
        let key = topic_partition_key(topic, partition);
        let removed = self.partitions.remove(&key).is_some();
        if removed {
            info!(partition = %key, "released partition");
        }
        removed
    }

    /// Applies an assignment pushed by the coordinator: ranges led by this
    /// broker are served, draining requests release the listed ranges.
    pub(crate) fn apply_assignments(
        &self,
        topic: &Topic,
        assignments: &[BrokerPartitionAssignment],
        is_draining: bool,
    ) -> usize {
        let mut changed = 0;
        for assignment in assignments {
            let applied = if is_draining {
                self.release(topic, &assignment.partition)
            } else if assignment.leader_broker == self.self_addr {
                self.assign(topic, assignment)
            } else {
                false
            };
            if applied {
                changed += 1;
            }
        }
        changed
    }

    /// Brings the topic in line with its full persisted assignment: ranges
    /// this broker leads are served, any other range of the topic is dropped.
    /// Returns `(added, removed)`.
    pub(crate) fn sync_topic(
        &self,
        topic: &Topic,
        assignments: &[BrokerPartitionAssignment],
    ) -> (usize, usize) {
        let led: Vec<&BrokerPartitionAssignment> = assignments
            .iter()
            .filter(|a| a.leader_broker == self.self_addr)
            .collect();

        let stale: Vec<Partition> = self
            .partitions
            .iter()
            .filter(|entry| entry.value().topic == *topic)
            .filter(|entry| !led.iter().any(|a| a.partition.same_range(&entry.value().partition)))
            .map(|entry| entry.value().partition)
            .collect();

        let removed = stale.iter().filter(|p| self.release(topic, p)).count();
        let added = led.iter().filter(|a| self.assign(topic, a)).count();
        if added + removed > 0 {
            debug!(topic = %topic, added, removed, "local partitions synced");
        }
        (added, removed)
    }

    pub(crate) fn release_topic(&self, topic: &Topic) -> usize {
        let before = self.partitions.len();
        self.partitions.retain(|_, local| local.topic != *topic);
        before - self.partitions.len()
    }

    pub(crate) fn topics(&self) -> BTreeSet<Topic> {
        self.partitions
            .iter()
            .map(|entry| entry.value().topic.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Snapshot reported to the coordinator.
    pub(crate) fn stats_snapshot(&self) -> proto::BrokerStats {
        let mut stats: Vec<proto::TopicPartitionStats> = self
            .partitions
            .iter()
            .map(|entry| proto::TopicPartitionStats {
                topic: Some((&entry.value().topic).into()),
                partition: Some(entry.value().partition.into()),
                publisher_count: 0,
                subscriber_count: 0,
            })
            .collect();
        stats.sort_by_key(|s| {
            s.topic
                .as_ref()
                .map(|t| (t.namespace.clone(), t.name.clone()))
                .zip(s.partition.map(|p| p.range_start))
        });
        proto::BrokerStats {
            cpu_usage_percent: 0,
            stats,
        }
    }
}
