use std::collections::BTreeSet;

use tracing::info;

use super::{Balancer, BalancerError, BrokerPicker};
use crate::topic::BrokerPartitionAssignment;

impl Balancer {
    /// Repairs a persisted assignment so that it only points at live brokers.
    ///
    /// A dead leader is replaced by its first live follower, or else by the
    /// least-loaded live broker not already serving the partition. Dead or
    /// duplicate followers are dropped and the follower list is topped up to
    /// `follower_count` where the fleet allows.
    ///
    /// Returns whether anything changed, or `NoBroker` when a leader could
    /// not be replaced. `assignments` is only written on success.
    pub(crate) fn ensure_assignments_to_active_brokers(
        &self,
        assignments: &mut [BrokerPartitionAssignment],
        follower_count: usize,
    ) -> Result<bool, BalancerError> {
        let mut picker = BrokerPicker::new(self.broker_loads());
        let no_avoid = BTreeSet::new();
        let mut changed = false;
        let mut repaired = assignments.to_vec();

        for assignment in repaired.iter_mut() {
            if !picker.contains(&assignment.leader_broker) {
                let promoted = assignment
                    .follower_brokers
                    .iter()
                    .position(|f| picker.contains(f))
                    .map(|position| assignment.follower_brokers.remove(position));

                let leader = match promoted {
                    Some(follower) => follower,
                    None => {
                        let exclude: BTreeSet<String> =
                            assignment.follower_brokers.iter().cloned().collect();
                        picker
                            .pick(1, &no_avoid, &exclude)
                            .pop()
                            .ok_or(BalancerError::NoBroker)?
                    }
                };
                info!(
                    range_start = assignment.partition.range_start,
                    range_stop = assignment.partition.range_stop,
                    from = %assignment.leader_broker,
                    to = %leader,
                    "replacing inactive partition leader"
                );
                assignment.leader_broker = leader;
                changed = true;
            }

            let before = assignment.follower_brokers.clone();
            let mut seen = BTreeSet::from([assignment.leader_broker.clone()]);
            assignment
                .follower_brokers
                .retain(|f| picker.contains(f) && seen.insert(f.clone()));

            if assignment.follower_brokers.len() < follower_count {
                let wanted = follower_count - assignment.follower_brokers.len();
                let extra = picker.pick(wanted, &no_avoid, &seen);
                assignment.follower_brokers.extend(extra);
            }

            if assignment.follower_brokers != before {
                changed = true;
            }
        }

        if changed {
            assignments.clone_from_slice(&repaired);
        }
        Ok(changed)
    }
}
