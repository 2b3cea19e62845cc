use std::collections::BTreeSet;

use tracing::{debug, info};

use super::BalancerError;
use crate::topic::{BrokerPartitionAssignment, Partition};

/// Binding of one ring range to the brokers serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionSlotToBroker {
    pub(crate) range_start: i32,
    pub(crate) range_stop: i32,
    pub(crate) unix_time_ns: i64,
    /// `None` marks an orphaned range: recorded but unserved.
    pub(crate) assigned_broker: Option<String>,
    pub(crate) follower_brokers: Vec<String>,
}

impl PartitionSlotToBroker {
    fn partition(&self, ring_size: i32) -> Partition {
        Partition {
            ring_size,
            range_start: self.range_start,
            range_stop: self.range_stop,
            unix_time_ns: self.unix_time_ns,
        }
    }
}

/// Per-topic directory of ring ranges. Slots are kept sorted by
/// `range_start`, lie within `[0, ring_size)` and never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionSlotToBrokerList {
    pub(crate) ring_size: i32,
    pub(crate) slots: Vec<PartitionSlotToBroker>,
}

impl PartitionSlotToBrokerList {
    pub(crate) fn new(ring_size: i32) -> Self {
        PartitionSlotToBrokerList {
            ring_size,
            slots: Vec::new(),
        }
    }

    pub(crate) fn from_assignments(
        ring_size: i32,
        assignments: &[BrokerPartitionAssignment],
    ) -> Result<Self, BalancerError> {
        let mut list = PartitionSlotToBrokerList::new(ring_size);
        for assignment in assignments {
            list.add_broker(&assignment.partition, &assignment.leader_broker)?;
            if let Some(slot) = list.slot_mut(&assignment.partition) {
                slot.follower_brokers = assignment
                    .follower_brokers
                    .iter()
                    .filter(|f| **f != assignment.leader_broker)
                    .cloned()
                    .collect();
            }
        }
        Ok(list)
    }

    fn validate_range(&self, partition: &Partition) -> Result<(), BalancerError> {
        if partition.range_start < 0
            || partition.range_start >= partition.range_stop
            || partition.range_stop > self.ring_size
        {
            return Err(BalancerError::InvalidRange {
                range_start: partition.range_start,
                range_stop: partition.range_stop,
                ring_size: self.ring_size,
            });
        }
        Ok(())
    }

    fn slot_mut(&mut self, partition: &Partition) -> Option<&mut PartitionSlotToBroker> {
        self.slots.iter_mut().find(|slot| {
            slot.range_start == partition.range_start && slot.range_stop == partition.range_stop
        })
    }

    /// Binds `broker` as the leader of the range.
    ///
    /// An exact range match takes the new leader, filling the slot if it
    /// was orphaned. A range not seen before evicts every slot it overlaps.
    pub(crate) fn add_broker(
        &mut self,
        partition: &Partition,
        broker: &str,
    ) -> Result<(), BalancerError> {
        self.validate_range(partition)?;

        if let Some(slot) = self.slot_mut(partition) {
            if slot.assigned_broker.as_deref() != Some(broker) {
                debug!(
                    range_start = slot.range_start,
                    range_stop = slot.range_stop,
                    previous = ?slot.assigned_broker,
                    broker = %broker,
                    "partition slot owner changed"
                );
                slot.assigned_broker = Some(broker.to_string());
                slot.follower_brokers.retain(|f| f != broker);
            }
            slot.unix_time_ns = slot.unix_time_ns.max(partition.unix_time_ns);
            return Ok(());
        }

        let ring_size = self.ring_size;
        self.slots.retain(|slot| {
            let overlaps = slot.partition(ring_size).overlaps(partition);
            if overlaps {
                debug!(
                    range_start = slot.range_start,
                    range_stop = slot.range_stop,
                    "evicting overlapped partition slot"
                );
            }
            !overlaps
        });

        let position = self
            .slots
            .partition_point(|slot| slot.range_start < partition.range_start);
        self.slots.insert(
            position,
            PartitionSlotToBroker {
                range_start: partition.range_start,
                range_stop: partition.range_stop,
                unix_time_ns: partition.unix_time_ns,
                assigned_broker: Some(broker.to_string()),
                follower_brokers: Vec::new(),
            },
        );
        Ok(())
    }

    /// Strips `broker` from every slot; slots it led become orphaned.
    /// Returns the number of slots left orphaned by this call.
    pub(crate) fn remove_broker(&mut self, broker: &str) -> usize {
        self.replace_broker(broker, None)
    }

    /// Swaps `old` for `new` in every role it holds. With `new = None` the
    /// broker is dropped. Returns the number of slots left orphaned.
    pub(crate) fn replace_broker(&mut self, old: &str, new: Option<&str>) -> usize {
        let mut orphaned = 0;
        for slot in &mut self.slots {
            if slot.assigned_broker.as_deref() == Some(old) {
                slot.assigned_broker = new.map(str::to_string);
                match new {
                    Some(new) => slot.follower_brokers.retain(|f| f != new),
                    None => orphaned += 1,
                }
                info!(
                    range_start = slot.range_start,
                    range_stop = slot.range_stop,
                    from = %old,
                    to = ?new,
                    "partition slot leader replaced"
                );
            }

            if let Some(position) = slot.follower_brokers.iter().position(|f| f == old) {
                let replacement = new.filter(|n| {
                    slot.assigned_broker.as_deref() != Some(*n)
                        && !slot.follower_brokers.iter().any(|f| f == n)
                });
                match replacement {
                    Some(n) => slot.follower_brokers[position] = n.to_string(),
                    None => {
                        slot.follower_brokers.remove(position);
                    }
                }
            }
        }
        orphaned
    }

    pub(crate) fn contains_broker(&self, broker: &str) -> bool {
        self.slots.iter().any(|slot| {
            slot.assigned_broker.as_deref() == Some(broker)
                || slot.follower_brokers.iter().any(|f| f == broker)
        })
    }

    pub(crate) fn brokers(&self) -> BTreeSet<String> {
        let mut brokers = BTreeSet::new();
        for slot in &self.slots {
            brokers.extend(slot.assigned_broker.iter().cloned());
            brokers.extend(slot.follower_brokers.iter().cloned());
        }
        brokers
    }

    #[cfg(test)]
    pub(crate) fn orphaned_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.assigned_broker.is_none())
            .count()
    }

    /// Served slots as assignments; orphaned slots are omitted.
    #[cfg(test)]
    pub(crate) fn to_assignments(&self) -> Vec<BrokerPartitionAssignment> {
        self.slots
            .iter()
            .filter_map(|slot| {
                slot.assigned_broker.as_ref().map(|leader| BrokerPartitionAssignment {
                    partition: slot.partition(self.ring_size),
                    leader_broker: leader.clone(),
                    follower_brokers: slot.follower_brokers.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::MAX_PARTITION_COUNT;

    fn p(start: i32, stop: i32) -> Partition {
        Partition::new(start, stop, 0)
    }

    fn leaders(list: &PartitionSlotToBrokerList) -> Vec<(i32, i32, Option<&str>)> {
        list.slots
            .iter()
            .map(|s| (s.range_start, s.range_stop, s.assigned_broker.as_deref()))
            .collect()
    }

    #[test]
    fn add_broker_keeps_slots_sorted_and_disjoint() {
        let mut list = PartitionSlotToBrokerList::new(MAX_PARTITION_COUNT);
        list.add_broker(&p(1260, 2520), "b2").unwrap();
        list.add_broker(&p(0, 1260), "b1").unwrap();
        assert_eq!(
            leaders(&list),
            vec![(0, 1260, Some("b1")), (1260, 2520, Some("b2"))]
        );

        // a finer split evicts the slot it overlaps
        list.add_broker(&p(0, 630), "b3").unwrap();
        assert_eq!(
            leaders(&list),
            vec![(0, 630, Some("b3")), (1260, 2520, Some("b2"))]
        );
    }

    #[test]
    fn add_broker_rejects_ranges_outside_the_ring() {
        let mut list = PartitionSlotToBrokerList::new(MAX_PARTITION_COUNT);
        assert!(list.add_broker(&p(-1, 10), "b1").is_err());
        assert!(list.add_broker(&p(10, 10), "b1").is_err());
        assert!(list.add_broker(&p(0, MAX_PARTITION_COUNT + 1), "b1").is_err());
        assert!(list.slots.is_empty());
    }

    #[test]
    fn add_broker_fills_an_orphaned_slot() {
        let mut list = PartitionSlotToBrokerList::new(MAX_PARTITION_COUNT);
        list.add_broker(&p(0, 2520), "b1").unwrap();
        assert_eq!(list.remove_broker("b1"), 1);
        assert_eq!(list.orphaned_count(), 1);
        assert!(list.to_assignments().is_empty());

        list.add_broker(&p(0, 2520), "b2").unwrap();
        assert_eq!(list.orphaned_count(), 0);
        assert_eq!(leaders(&list), vec![(0, 2520, Some("b2"))]);
    }

    #[test]
    fn replace_broker_swaps_leaders_and_followers() {
        let assignments = vec![
            BrokerPartitionAssignment {
                partition: p(0, 1260),
                leader_broker: "b1".into(),
                follower_brokers: vec!["b2".into()],
            },
            BrokerPartitionAssignment {
                partition: p(1260, 2520),
                leader_broker: "b2".into(),
                follower_brokers: vec!["b3".into()],
            },
        ];
        let mut list =
            PartitionSlotToBrokerList::from_assignments(MAX_PARTITION_COUNT, &assignments).unwrap();

        assert_eq!(list.replace_broker("b2", Some("b4")), 0);
        assert!(!list.contains_broker("b2"));
        assert_eq!(list.slots[0].follower_brokers, vec!["b4".to_string()]);
        assert_eq!(list.slots[1].assigned_broker.as_deref(), Some("b4"));
        assert_eq!(list.slots[1].follower_brokers, vec!["b3".to_string()]);
    }

    #[test]
    fn replacing_with_an_existing_follower_promotes_it() {
        let assignments = vec![BrokerPartitionAssignment {
            partition: p(0, 2520),
            leader_broker: "b1".into(),
            follower_brokers: vec!["b2".into()],
        }];
        let mut list =
            PartitionSlotToBrokerList::from_assignments(MAX_PARTITION_COUNT, &assignments).unwrap();

        list.replace_broker("b1", Some("b2"));
        assert_eq!(list.slots[0].assigned_broker.as_deref(), Some("b2"));
        assert!(list.slots[0].follower_brokers.is_empty());
    }
}
