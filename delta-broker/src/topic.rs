use delta_core::proto;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the partition ring shared by every topic of the cluster.
///
/// 2520 = 8 * 9 * 5 * 7 is divisible by every count from 1 to 10, so the
/// common partition counts carve the ring into equal ranges.
pub(crate) const MAX_PARTITION_COUNT: i32 = 8 * 9 * 5 * 7;

/// Topic identity, `namespace.name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) struct Topic {
    pub(crate) namespace: String,
    pub(crate) name: String,
}

impl Topic {
    pub(crate) fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Topic {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace and name must be non-empty and free of the separators used
    /// by the topic key and the metadata paths.
    pub(crate) fn validate(&self) -> Result<(), String> {
        for (label, value) in [("namespace", &self.namespace), ("name", &self.name)] {
            if value.is_empty() {
                return Err(format!("topic {} must not be empty", label));
            }
            if value.contains('/') || value.contains('.') {
                return Err(format!(
                    "topic {} {:?} must not contain '/' or '.'",
                    label, value
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// A contiguous range `[range_start, range_stop)` of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Partition {
    pub(crate) ring_size: i32,
    pub(crate) range_start: i32,
    pub(crate) range_stop: i32,
    pub(crate) unix_time_ns: i64,
}

impl Partition {
    pub(crate) fn new(range_start: i32, range_stop: i32, unix_time_ns: i64) -> Self {
        Partition {
            ring_size: MAX_PARTITION_COUNT,
            range_start,
            range_stop,
            unix_time_ns,
        }
    }

    /// Carves the ring into `partition_count` contiguous ranges of width
    /// `ring / partition_count`; the last range absorbs the remainder.
    ///
    /// Callers validate `1..=MAX_PARTITION_COUNT` beforehand.
    pub(crate) fn split_ring(partition_count: i32, unix_time_ns: i64) -> Vec<Partition> {
        let width = MAX_PARTITION_COUNT / partition_count;
        (0..partition_count)
            .map(|i| {
                let range_start = i * width;
                let range_stop = if i == partition_count - 1 {
                    MAX_PARTITION_COUNT
                } else {
                    range_start + width
                };
                Partition::new(range_start, range_stop, unix_time_ns)
            })
            .collect()
    }

    pub(crate) fn same_range(&self, other: &Partition) -> bool {
        self.range_start == other.range_start && self.range_stop == other.range_stop
    }

    pub(crate) fn overlaps(&self, other: &Partition) -> bool {
        self.range_start < other.range_stop && other.range_start < self.range_stop
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.ring_size > 0
            && self.range_start >= 0
            && self.range_start < self.range_stop
            && self.range_stop <= self.ring_size
    }
}

/// Key of one range of a topic: `namespace.name.0000-0630`.
pub(crate) fn topic_partition_key(topic: &Topic, partition: &Partition) -> String {
    format!(
        "{}.{:04}-{:04}",
        topic, partition.range_start, partition.range_stop
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BrokerPartitionAssignment {
    pub(crate) partition: Partition,
    pub(crate) leader_broker: String,
    #[serde(default)]
    pub(crate) follower_brokers: Vec<String>,
}

impl BrokerPartitionAssignment {
    pub(crate) fn new(partition: Partition, leader_broker: impl Into<String>) -> Self {
        BrokerPartitionAssignment {
            partition,
            leader_broker: leader_broker.into(),
            follower_brokers: Vec::new(),
        }
    }
}

// --- wire conversions ---

impl From<proto::Topic> for Topic {
    fn from(topic: proto::Topic) -> Self {
        Topic::new(topic.namespace, topic.name)
    }
}

impl From<&Topic> for proto::Topic {
    fn from(topic: &Topic) -> Self {
        proto::Topic {
            namespace: topic.namespace.clone(),
            name: topic.name.clone(),
        }
    }
}

impl From<proto::Partition> for Partition {
    fn from(partition: proto::Partition) -> Self {
        Partition {
            ring_size: partition.ring_size,
            range_start: partition.range_start,
            range_stop: partition.range_stop,
            unix_time_ns: partition.unix_time_ns,
        }
    }
}

impl From<Partition> for proto::Partition {
    fn from(partition: Partition) -> Self {
        proto::Partition {
            ring_size: partition.ring_size,
            range_start: partition.range_start,
            range_stop: partition.range_stop,
            unix_time_ns: partition.unix_time_ns,
        }
    }
}

impl From<&BrokerPartitionAssignment> for proto::BrokerPartitionAssignment {
    fn from(assignment: &BrokerPartitionAssignment) -> Self {
        proto::BrokerPartitionAssignment {
            partition: Some(assignment.partition.into()),
            leader_broker: assignment.leader_broker.clone(),
            follower_brokers: assignment.follower_brokers.clone(),
        }
    }
}

impl TryFrom<proto::BrokerPartitionAssignment> for BrokerPartitionAssignment {
    type Error = String;

    fn try_from(assignment: proto::BrokerPartitionAssignment) -> Result<Self, Self::Error> {
        let partition = assignment
            .partition
            .ok_or_else(|| "assignment without partition".to_string())?;
        let partition: Partition = partition.into();
        if !partition.is_valid() {
            return Err(format!(
                "invalid range [{}, {}) on a ring of {}",
                partition.range_start, partition.range_stop, partition.ring_size
            ));
        }
        if assignment.leader_broker.is_empty() {
            return Err("assignment without leader".to_string());
        }
        Ok(BrokerPartitionAssignment {
            partition,
            leader_broker: assignment.leader_broker,
            follower_brokers: assignment.follower_brokers,
        })
    }
}

pub(crate) fn to_proto_assignments(
    assignments: &[BrokerPartitionAssignment],
) -> Vec<proto::BrokerPartitionAssignment> {
    assignments.iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_highly_composite() {
        assert_eq!(MAX_PARTITION_COUNT, 2520);
        for count in 1..=10 {
            assert_eq!(MAX_PARTITION_COUNT % count, 0, "count {}", count);
        }
    }

    #[test]
    fn split_ring_covers_ring_without_overlap() {
        for count in [1, 3, 4, 6, 7, 11, 13, 100, 1000, MAX_PARTITION_COUNT] {
            let partitions = Partition::split_ring(count, 42);
            assert_eq!(partitions.len(), count as usize);
            assert_eq!(partitions[0].range_start, 0);
            assert_eq!(partitions.last().unwrap().range_stop, MAX_PARTITION_COUNT);
            for pair in partitions.windows(2) {
                assert_eq!(pair[0].range_stop, pair[1].range_start);
                assert!(!pair[0].overlaps(&pair[1]));
            }
            assert!(partitions.iter().all(Partition::is_valid));
        }
    }

    #[test]
    fn last_partition_absorbs_remainder() {
        // 2520 / 11 = 229, remainder 1
        let partitions = Partition::split_ring(11, 0);
        assert_eq!(partitions[0].range_stop - partitions[0].range_start, 229);
        let last = partitions.last().unwrap();
        assert_eq!(last.range_stop - last.range_start, 230);
    }

    #[test]
    fn topic_validation() {
        assert!(Topic::new("ns", "orders").validate().is_ok());
        assert!(Topic::new("", "orders").validate().is_err());
        assert!(Topic::new("ns", "").validate().is_err());
        assert!(Topic::new("n/s", "orders").validate().is_err());
        assert!(Topic::new("ns", "or.ders").validate().is_err());
    }

    #[test]
    fn keys() {
        let topic = Topic::new("ns", "orders");
        assert_eq!(topic.to_string(), "ns.orders");
        let partition = Partition::new(0, 630, 0);
        assert_eq!(topic_partition_key(&topic, &partition), "ns.orders.0000-0630");
    }

    #[test]
    fn wire_assignments_are_checked() {
        let assignment = BrokerPartitionAssignment::new(Partition::new(0, 1260, 3), "b1");
        let wire = proto::BrokerPartitionAssignment::from(&assignment);
        assert_eq!(BrokerPartitionAssignment::try_from(wire.clone()), Ok(assignment));

        let mut missing = wire.clone();
        missing.partition = None;
        assert!(BrokerPartitionAssignment::try_from(missing).is_err());

        let mut reversed = wire.clone();
        reversed.partition = Some(Partition::new(1260, 0, 3).into());
        assert!(BrokerPartitionAssignment::try_from(reversed).is_err());

        let mut leaderless = wire;
        leaderless.leader_broker.clear();
        assert!(BrokerPartitionAssignment::try_from(leaderless).is_err());
    }
}
