use std::collections::BTreeSet;

use super::BalancerError;
use crate::topic::{BrokerPartitionAssignment, Partition, MAX_PARTITION_COUNT};

/// Load of a live broker as seen by placement decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BrokerLoad {
    pub(crate) address: String,
    pub(crate) partition_count: usize,
}

impl BrokerLoad {
    pub(crate) fn new(address: impl Into<String>, partition_count: usize) -> Self {
        BrokerLoad {
            address: address.into(),
            partition_count,
        }
    }
}

/// Least-loaded broker selection.
///
/// Candidates are ordered by `(load, address)`, which makes every pick
/// deterministic for a given broker set. Each pick counts towards the
/// chosen broker's load, so consecutive picks spread across the fleet.
#[derive(Debug, Clone)]
pub(crate) struct BrokerPicker {
    loads: Vec<BrokerLoad>,
}

impl BrokerPicker {
    pub(crate) fn new(loads: Vec<BrokerLoad>) -> Self {
        BrokerPicker { loads }
    }

    pub(crate) fn contains(&self, broker: &str) -> bool {
        self.loads.iter().any(|load| load.address == broker)
    }

    /// Picks up to `count` distinct brokers, never one in `exclude`.
    /// Brokers in `avoid` are used only when no other candidate is left.
    pub(crate) fn pick(
        &mut self,
        count: usize,
        avoid: &BTreeSet<String>,
        exclude: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut order: Vec<usize> = (0..self.loads.len())
            .filter(|i| !exclude.contains(&self.loads[*i].address))
            .collect();
        order.sort_by(|a, b| {
            let (a, b) = (&self.loads[*a], &self.loads[*b]);
            avoid
                .contains(&a.address)
                .cmp(&avoid.contains(&b.address))
                .then(a.partition_count.cmp(&b.partition_count))
                .then(a.address.cmp(&b.address))
        });

        order
            .into_iter()
            .take(count)
            .map(|i| {
                self.loads[i].partition_count += 1;
                self.loads[i].address.clone()
            })
            .collect()
    }
}

/// Carves the ring into `partition_count` ranges and places each on the
/// least-loaded broker, with `follower_count` distinct followers when the
/// broker set allows.
///
/// Never returns an empty success: an empty broker set is `NoBroker`.
pub(crate) fn allocate_topic_partitions(
    brokers: &[BrokerLoad],
    partition_count: i32,
    follower_count: usize,
    unix_time_ns: i64,
) -> Result<Vec<BrokerPartitionAssignment>, BalancerError> {
    if !(1..=MAX_PARTITION_COUNT).contains(&partition_count) {
        return Err(BalancerError::InvalidPartitionCount(partition_count));
    }
    if brokers.is_empty() {
        return Err(BalancerError::NoBroker);
    }

    // leader and follower roles are balanced independently
    let mut leaders = BrokerPicker::new(brokers.to_vec());
    let mut followers = BrokerPicker::new(brokers.to_vec());
    let no_avoid = BTreeSet::new();
    let mut assignments = Vec::with_capacity(partition_count as usize);

    for partition in Partition::split_ring(partition_count, unix_time_ns) {
        let leader = leaders
            .pick(1, &no_avoid, &BTreeSet::new())
            .pop()
            .ok_or(BalancerError::NoBroker)?;
        let exclude = BTreeSet::from([leader.clone()]);
        let follower_brokers = followers.pick(follower_count, &no_avoid, &exclude);

        assignments.push(BrokerPartitionAssignment {
            partition,
            leader_broker: leader,
            follower_brokers,
        });
    }

    Ok(assignments)
}
