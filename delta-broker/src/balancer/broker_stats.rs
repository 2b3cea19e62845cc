use std::collections::{BTreeSet, HashMap};

use delta_core::proto;
use tracing::warn;

use crate::topic::{topic_partition_key, Partition, Topic};
use crate::utils::unix_time_ns;

/// One range a broker reported serving.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TopicPartitionStat {
    pub(crate) topic: Topic,
    pub(crate) range_start: i32,
    pub(crate) range_stop: i32,
    pub(crate) unix_time_ns: i64,
    pub(crate) publisher_count: i32,
    pub(crate) subscriber_count: i32,
}

impl TopicPartitionStat {
    pub(crate) fn partition(&self) -> Partition {
        Partition::new(self.range_start, self.range_stop, self.unix_time_ns)
    }
}

/// What one broker currently serves, as last reported by the broker itself.
#[derive(Debug, Clone)]
pub(crate) struct BrokerStats {
    pub(crate) topic_partition_count: i32,
    pub(crate) publisher_count: i32,
    pub(crate) subscriber_count: i32,
    pub(crate) cpu_usage_percent: i32,
    /// keyed by `namespace.name.start-stop`
    pub(crate) topic_partition_stats: HashMap<String, TopicPartitionStat>,
    /// Time of registration or of the latest merged report.
    pub(crate) last_seen_ns: i64,
}

impl Default for BrokerStats {
    fn default() -> Self {
        BrokerStats {
            topic_partition_count: 0,
            publisher_count: 0,
            subscriber_count: 0,
            cpu_usage_percent: 0,
            topic_partition_stats: HashMap::new(),
            last_seen_ns: unix_time_ns(),
        }
    }
}

impl BrokerStats {
    /// Replaces the served set with the reported snapshot.
    ///
    /// Entries missing from the snapshot are dropped; the report is the
    /// broker's full view, not a delta.
    pub(crate) fn update_stats(&mut self, reported: &proto::BrokerStats) {
        let mut next = HashMap::with_capacity(reported.stats.len());
        let mut publisher_count = 0;
        let mut subscriber_count = 0;

        for stat in &reported.stats {
            let (Some(topic), Some(partition)) = (stat.topic.clone(), stat.partition) else {
                warn!("skipping reported partition stat without topic or partition");
                continue;
            };
            let topic: Topic = topic.into();
            let partition: Partition = partition.into();
            publisher_count += stat.publisher_count;
            subscriber_count += stat.subscriber_count;

            next.insert(
                topic_partition_key(&topic, &partition),
                TopicPartitionStat {
                    topic,
                    range_start: partition.range_start,
                    range_stop: partition.range_stop,
                    unix_time_ns: partition.unix_time_ns,
                    publisher_count: stat.publisher_count,
                    subscriber_count: stat.subscriber_count,
                },
            );
        }

        self.topic_partition_count = next.len() as i32;
        self.publisher_count = publisher_count;
        self.subscriber_count = subscriber_count;
        self.cpu_usage_percent = reported.cpu_usage_percent;
        self.topic_partition_stats = next;
        self.last_seen_ns = unix_time_ns();
    }

    pub(crate) fn topics(&self) -> BTreeSet<Topic> {
        self.topic_partition_stats
            .values()
            .map(|stat| stat.topic.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(ranges: &[(&str, i32, i32)]) -> proto::BrokerStats {
        proto::BrokerStats {
            cpu_usage_percent: 12,
            stats: ranges
                .iter()
                .map(|(name, start, stop)| proto::TopicPartitionStats {
                    topic: Some(proto::Topic {
                        namespace: "ns".into(),
                        name: name.to_string(),
                    }),
                    partition: Some(Partition::new(*start, *stop, 1).into()),
                    publisher_count: 1,
                    subscriber_count: 2,
                })
                .collect(),
        }
    }

    #[test]
    fn update_replaces_previous_snapshot() {
        let mut stats = BrokerStats::default();
        stats.update_stats(&reported(&[("a", 0, 1260), ("a", 1260, 2520), ("b", 0, 2520)]));
        assert_eq!(stats.topic_partition_count, 3);
        assert_eq!(stats.subscriber_count, 6);
        assert!(stats.topics().contains(&Topic::new("ns", "b")));

        stats.update_stats(&reported(&[("a", 0, 1260)]));
        assert_eq!(stats.topic_partition_count, 1);
        assert!(!stats.topics().contains(&Topic::new("ns", "b")));
        assert!(stats.topic_partition_stats.contains_key("ns.a.0000-1260"));
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let mut report = reported(&[("a", 0, 2520)]);
        report.stats.push(proto::TopicPartitionStats {
            topic: None,
            partition: Some(Partition::new(0, 10, 0).into()),
            publisher_count: 0,
            subscriber_count: 0,
        });
        let mut stats = BrokerStats::default();
        stats.update_stats(&report);
        assert_eq!(stats.topic_partition_count, 1);
    }
}
