mod allocate;
mod broker_stats;
mod lookup;
mod partition_slots;
mod repair;


pub(crate) use allocate::{allocate_topic_partitions, BrokerLoad, BrokerPicker};
pub(crate) use broker_stats::BrokerStats;
pub(crate) use partition_slots::PartitionSlotToBrokerList;

use std::collections::BTreeSet;

use dashmap::{mapref::entry::Entry, DashMap};
use delta_core::proto;
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker_metrics::{BROKERS_REGISTERED, ORPHANED_PARTITIONS_TOTAL};
use crate::topic::{BrokerPartitionAssignment, Partition, Topic, MAX_PARTITION_COUNT};
use crate::utils::unix_time_ns;

#[derive(Debug, Error)]
pub(crate) enum BalancerError {
    #[error("no broker available")]
    NoBroker,

    #[error("partition count {0} outside 1..={max}", max = MAX_PARTITION_COUNT)]
    InvalidPartitionCount(i32),

    #[error("range [{range_start}, {range_stop}) outside ring of size {ring_size}")]
    InvalidRange {
        range_start: i32,
        range_stop: i32,
        ring_size: i32,
    },
}

pub(crate) type PartitionChangeFn = Box<dyn Fn(&Topic, &[BrokerPartitionAssignment]) + Send + Sync>;
pub(crate) type BrokerChangeFn = Box<dyn Fn(&str, &BrokerStats) + Send + Sync>;

/// The coordinator's view of the fleet.
///
/// `brokers` holds what each broker last reported about itself, while
/// `topic_to_brokers` is the per-topic directory of ring ranges. Both are
/// sharded maps; every mutation goes through a single-key entry so that
/// concurrent registrations, reports, removals and allocations for the same
/// key serialize without a global lock. A shard guard of one map is never
/// held while the other map is accessed.
///
/// The balancer is derived state. It is rebuilt from broker reports and the
/// persisted topic configurations and is never persisted itself.
pub(crate) struct Balancer {
    /// key: broker address
    brokers: DashMap<String, BrokerStats>,
    /// key: topic (`namespace.name`)
    topic_to_brokers: DashMap<String, PartitionSlotToBrokerList>,
    on_partition_change: PartitionChangeFn,
    on_add_broker: BrokerChangeFn,
    on_remove_broker: BrokerChangeFn,
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer")
            .field("brokers", &self.brokers.len())
            .field("topics", &self.topic_to_brokers.len())
            .finish()
    }
}

impl Default for Balancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer {
    pub(crate) fn new() -> Self {
        Balancer {
            brokers: DashMap::new(),
            topic_to_brokers: DashMap::new(),
            on_partition_change: Box::new(|_: &Topic, _: &[BrokerPartitionAssignment]| {}),
            on_add_broker: Box::new(|_: &str, _: &BrokerStats| {}),
            on_remove_broker: Box::new(|_: &str, _: &BrokerStats| {}),
        }
    }

    pub(crate) fn with_on_partition_change(mut self, hook: PartitionChangeFn) -> Self {
        self.on_partition_change = hook;
        self
    }

    pub(crate) fn with_on_add_broker(mut self, hook: BrokerChangeFn) -> Self {
        self.on_add_broker = hook;
        self
    }

    pub(crate) fn with_on_remove_broker(mut self, hook: BrokerChangeFn) -> Self {
        self.on_remove_broker = hook;
        self
    }

    /// Registers a broker. Idempotent: a concurrent or repeated registration
    /// returns the record that won the insert.
    pub(crate) fn add_broker(&self, broker: &str) -> BrokerStats {
        let (stats, inserted) = match self.brokers.entry(broker.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => (entry.insert(BrokerStats::default()).clone(), true),
        };

        if inserted {
            info!(broker = %broker, "broker registered");
            gauge!(BROKERS_REGISTERED.name).set(self.brokers.len() as f64);
        }

        (self.on_add_broker)(broker, &stats);
        stats
    }

    /// Unregisters a broker and moves every range it held for any topic to
    /// one replacement per topic. Without a replacement the ranges stay
    /// orphaned until a broker reports them again.
    pub(crate) fn remove_broker(&self, broker: &str) -> Option<BrokerStats> {
        let removed = self.brokers.remove(broker).map(|(_, stats)| stats);
        gauge!(BROKERS_REGISTERED.name).set(self.brokers.len() as f64);

        let mut affected: BTreeSet<String> = self
            .topic_to_brokers
            .iter()
            .filter(|entry| entry.value().contains_broker(broker))
            .map(|entry| entry.key().clone())
            .collect();
        if let Some(stats) = &removed {
            affected.extend(stats.topics().iter().map(Topic::to_string));
        }

        for topic_key in affected {
            let mut avoid = self
                .topic_to_brokers
                .get(&topic_key)
                .map(|slots| slots.brokers())
                .unwrap_or_default();
            avoid.extend(self.brokers_serving(&topic_key));

            let replacement = BrokerPicker::new(self.broker_loads())
                .pick(1, &avoid, &BTreeSet::new())
                .pop();

            let Some(mut slots) = self.topic_to_brokers.get_mut(&topic_key) else {
                continue;
            };
            match replacement {
                Some(new_broker) => {
                    slots.replace_broker(broker, Some(&new_broker));
                    info!(
                        topic = %topic_key,
                        from = %broker,
                        to = %new_broker,
                        "reassigned partitions of departed broker"
                    );
                }
                None => {
                    let orphaned = slots.remove_broker(broker);
                    if orphaned > 0 {
                        counter!(ORPHANED_PARTITIONS_TOTAL.name).increment(orphaned as u64);
                        warn!(
                            topic = %topic_key,
                            broker = %broker,
                            orphaned,
                            "no replacement broker, partitions left orphaned"
                        );
                    }
                }
            }
        }

        if let Some(stats) = &removed {
            info!(broker = %broker, "broker unregistered");
            (self.on_remove_broker)(broker, stats);
        }
        removed
    }

    /// Merges a broker's self-reported snapshot, then binds every reported
    /// range in the directory. The directory converges on what brokers
    /// actually serve, whatever the allocation bookkeeping says.
    pub(crate) fn on_broker_stats_updated(&self, broker: &str, reported: &proto::BrokerStats) {
        if !self.brokers.contains_key(broker) {
            self.add_broker(broker);
        }
        self.brokers
            .entry(broker.to_string())
            .or_default()
            .update_stats(reported);

        for stat in &reported.stats {
            let (Some(topic), Some(partition)) = (stat.topic.clone(), stat.partition) else {
                continue;
            };
            let topic: Topic = topic.into();
            let partition: Partition = partition.into();

            let mut slots = self
                .topic_to_brokers
                .entry(topic.to_string())
                .or_insert_with(|| PartitionSlotToBrokerList::new(MAX_PARTITION_COUNT));
            if let Err(err) = slots.add_broker(&partition, broker) {
                warn!(topic = %topic, broker = %broker, error = %err, "ignoring reported partition");
            }
        }
    }

    /// Allocates against the live broker set. See [`allocate_topic_partitions`].
    pub(crate) fn allocate_topic_partitions(
        &self,
        partition_count: i32,
        follower_count: usize,
    ) -> Result<Vec<BrokerPartitionAssignment>, BalancerError> {
        allocate_topic_partitions(
            &self.broker_loads(),
            partition_count,
            follower_count,
            unix_time_ns(),
        )
    }

    /// Replaces the topic's directory entry with a freshly decided assignment.
    pub(crate) fn assign_topic(
        &self,
        topic: &Topic,
        assignments: &[BrokerPartitionAssignment],
    ) -> Result<(), BalancerError> {
        let slots = PartitionSlotToBrokerList::from_assignments(MAX_PARTITION_COUNT, assignments)?;
        self.topic_to_brokers.insert(topic.to_string(), slots);
        debug!(topic = %topic, partitions = assignments.len(), "directory updated");
        Ok(())
    }

    pub(crate) fn notify_partition_change(
        &self,
        topic: &Topic,
        assignments: &[BrokerPartitionAssignment],
    ) {
        (self.on_partition_change)(topic, assignments)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }

    pub(crate) fn contains_broker(&self, broker: &str) -> bool {
        self.brokers.contains_key(broker)
    }

    /// Snapshot of the topic's directory entry.
    #[cfg(test)]
    pub(crate) fn topic_slots(&self, topic: &Topic) -> Option<PartitionSlotToBrokerList> {
        self.topic_to_brokers
            .get(&topic.to_string())
            .map(|slots| slots.clone())
    }

    /// Brokers whose last report is older than `ttl_ns`.
    pub(crate) fn expired_brokers(&self, ttl_ns: i64, now_ns: i64) -> Vec<String> {
        let mut expired: Vec<String> = self
            .brokers
            .iter()
            .filter(|entry| now_ns.saturating_sub(entry.value().last_seen_ns) > ttl_ns)
            .map(|entry| entry.key().clone())
            .collect();
        expired.sort();
        expired
    }

    pub(crate) fn broker_loads(&self) -> Vec<BrokerLoad> {
        let mut loads: Vec<BrokerLoad> = self
            .brokers
            .iter()
            .map(|entry| {
                BrokerLoad::new(
                    entry.key().clone(),
                    entry.value().topic_partition_count.max(0) as usize,
                )
            })
            .collect();
        loads.sort_by(|a, b| a.address.cmp(&b.address));
        loads
    }

    fn brokers_serving(&self, topic_key: &str) -> BTreeSet<String> {
        self.brokers
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .topic_partition_stats
                    .values()
                    .any(|stat| stat.topic.to_string() == topic_key)
            })
            .map(|entry| entry.key().clone())
            .collect()
    }
}
