use super::Balancer;
use crate::topic::{BrokerPartitionAssignment, Topic};

impl Balancer {
    /// Which brokers currently serve `topic`, derived from the brokers' own
    /// reports rather than from the directory. One assignment per reported
    /// range, sorted by range start.
    pub(crate) fn lookup_topic_partitions(&self, topic: &Topic) -> Vec<BrokerPartitionAssignment> {
        let mut assignments = Vec::new();
        for entry in self.brokers.iter() {
            for stat in entry.value().topic_partition_stats.values() {
                if stat.topic == *topic {
                    assignments.push(BrokerPartitionAssignment::new(
                        stat.partition(),
                        entry.key().clone(),
                    ));
                }
            }
        }
        assignments.sort_by(|a, b| {
            a.partition
                .range_start
                .cmp(&b.partition.range_start)
                .then_with(|| a.leader_broker.cmp(&b.leader_broker))
        });
        assignments
    }
}
