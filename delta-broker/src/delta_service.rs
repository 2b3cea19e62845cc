mod assignment_follower;
mod leader_election;
mod retry;

pub(crate) use leader_election::{LeaderElection, LeadershipProbe, StaticLeadership};
pub(crate) use retry::RetryManager;

use anyhow::Result;
use delta_core::metadata::MetadataStore;
use delta_core::proto::ReportBrokerStatsRequest;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tracing::{debug, error, info, warn};

use crate::{
    balancer::{Balancer, PartitionChangeFn},
    broker_server::DeltaServerImpl,
    local_partitions::LocalPartitions,
    service_configuration::ServiceConfiguration,
    topic::{BrokerPartitionAssignment, Topic},
    topic_coordinator::TopicCoordinator,
    utils::unix_time_ns,
};

// Delta Service runs every background duty of a broker node next to the
// coordination gRPC server.
//
// Coordination server:
// Serves ConfigureTopic, LookupTopicBrokers, ReportBrokerStats and
// AssignTopicPartitions. Non-coordinator nodes forward the first three.
//
// Leader Election:
// Tracks the coordinator role and publishes the coordinator address.
//
// Stats reporter:
// Every node reports the ranges it serves, which is how the coordinator
// learns about live brokers.
//
// Liveness sweeper:
// On the coordinator only, brokers that stopped reporting are removed and
// their ranges handed to a replacement.
//
// Partition change pusher:
// Assignments decided by the coordinator are pushed to their leaders.
//
// Assignment follower:
// Every node follows the persisted topic configurations in the metadata store.
pub(crate) struct DeltaService {
    service_config: ServiceConfiguration,
    meta_store: Arc<dyn MetadataStore>,
    coordinator: Arc<TopicCoordinator>,
    local_partitions: Arc<LocalPartitions>,
    partition_changes: Option<mpsc::UnboundedReceiver<PartitionChange>>,
}

impl std::fmt::Debug for DeltaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaService")
            .field("broker_addr", &self.service_config.broker_addr)
            .field("self_addr", &self.service_config.self_addr())
            .finish_non_exhaustive()
    }
}

/// A topic's new assignment, as announced by the balancer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PartitionChange {
    pub(crate) topic: Topic,
    pub(crate) assignments: Vec<BrokerPartitionAssignment>,
}

/// Balancer hook forwarding every partition change to the returned receiver.
pub(crate) fn partition_change_channel() -> (PartitionChangeFn, mpsc::UnboundedReceiver<PartitionChange>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hook: PartitionChangeFn = Box::new(move |topic: &Topic, assignments: &[BrokerPartitionAssignment]| {
        let change = PartitionChange {
            topic: topic.clone(),
            assignments: assignments.to_vec(),
        };
        if tx.send(change).is_err() {
            debug!(topic = %topic, "partition change dropped, pusher stopped");
        }
    });
    (hook, rx)
}

impl DeltaService {
    pub(crate) fn new(
        service_config: ServiceConfiguration,
        meta_store: Arc<dyn MetadataStore>,
        coordinator: Arc<TopicCoordinator>,
        local_partitions: Arc<LocalPartitions>,
        partition_changes: mpsc::UnboundedReceiver<PartitionChange>,
    ) -> Self {
        DeltaService {
            service_config,
            meta_store,
            coordinator,
            local_partitions,
            partition_changes: Some(partition_changes),
        }
    }

    pub(crate) async fn start(&mut self) -> Result<()> {
        let self_addr = self.service_config.self_addr();
        info!(
            cluster = %self.service_config.cluster_name,
            broker = %self_addr,
            coordinator = %self.service_config.leader_addr(),
            "initializing Delta broker node"
        );
        let cancel = CancellationToken::new();

        // Start the Coordination GRPC server
        //==========================================================================
        let grpc_server = DeltaServerImpl::new(
            Arc::clone(&self.coordinator),
            Arc::clone(&self.local_partitions),
            self.service_config.broker_addr,
        );
        let (ready_tx, ready_rx) = oneshot::channel();
        let server_handle = grpc_server.start(ready_tx, cancel.clone());
        ready_rx.await?;

        // Start the Leader Election Service
        //==========================================================================
        let leader_election = self.coordinator.leader_election().clone();
        let leader_check_interval = time::interval(self.service_config.leader_check_interval);
        let leader_cancel = cancel.clone();
        tokio::spawn(async move {
            leader_election
                .start(leader_check_interval, leader_cancel)
                .await;
        });
        info!("leader election service initialized and ready");

        // Partition change pusher
        //==========================================================================
        if let Some(changes) = self.partition_changes.take() {
            let coordinator = Arc::clone(&self.coordinator);
            let pusher_cancel = cancel.clone();
            tokio::spawn(async move {
                push_partition_changes(coordinator, changes, pusher_cancel).await;
            });
        }

        // Stats reporter and liveness sweeper
        //==========================================================================
        let coordinator = Arc::clone(&self.coordinator);
        let local = Arc::clone(&self.local_partitions);
        let report_interval = self.service_config.stats_report_interval;
        let reporter_cancel = cancel.clone();
        tokio::spawn(async move {
            report_broker_stats(coordinator, local, report_interval, reporter_cancel).await;
        });

        let coordinator = Arc::clone(&self.coordinator);
        let broker_ttl = self.service_config.broker_ttl;
        let sweeper_cancel = cancel.clone();
        tokio::spawn(async move {
            sweep_expired_brokers(coordinator, report_interval, broker_ttl, sweeper_cancel).await;
        });

        // Assignment follower
        //==========================================================================
        let retry = RetryManager::new(
            self.service_config.base_backoff_ms,
            self.service_config.max_backoff_ms,
        );
        let follower = tokio::spawn(assignment_follower::follow_topic_assignments(
            Arc::clone(&self.meta_store),
            Arc::clone(&self.local_partitions),
            retry,
            cancel.clone(),
        ));

        info!(broker = %self_addr, "Delta broker node started");

        // Wait for shutdown
        //==========================================================================
        tokio::signal::ctrl_c().await?;
        info!(
            role = ?self.coordinator.leader_election().get_state().await,
            "shutdown requested"
        );
        cancel.cancel();

        let (result_server, result_follower) = tokio::join!(server_handle, follower);
        if let Err(e) = result_server {
            error!(error = ?e, "coordination server task failed");
        }
        match result_follower {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "assignment follower stopped"),
            Err(e) => error!(error = ?e, "assignment follower task failed"),
        }

        Ok(())
    }
}

async fn push_partition_changes(
    coordinator: Arc<TopicCoordinator>,
    mut changes: mpsc::UnboundedReceiver<PartitionChange>,
    cancel: CancellationToken,
) {
    loop {
        let change = tokio::select! {
            _ = cancel.cancelled() => return,
            change = changes.recv() => match change {
                Some(change) => change,
                None => return,
            },
        };
        if let Err(status) = coordinator
            .assign_topic_partitions_to_brokers(&change.topic, &change.assignments, true)
            .await
        {
            warn!(topic = %change.topic, error = %status, "unable to push assignment to every leader");
        }
    }
}

/// Periodically reports the ranges this node serves to the coordinator.
async fn report_broker_stats(
    coordinator: Arc<TopicCoordinator>,
    local: Arc<LocalPartitions>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let request = Request::new(ReportBrokerStatsRequest {
            broker: local.self_addr().to_string(),
            stats: Some(local.stats_snapshot()),
        });
        match coordinator.report_broker_stats(request).await {
            Ok(_) => debug!(broker = %local.self_addr(), partitions = local.len(), "broker stats reported"),
            Err(status) => warn!(broker = %local.self_addr(), error = %status, "unable to report broker stats"),
        }
    }
}

async fn sweep_expired_brokers(
    coordinator: Arc<TopicCoordinator>,
    interval: Duration,
    broker_ttl: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if !coordinator.leader_election().is_coordinator().await {
            continue;
        }
        remove_expired_brokers(coordinator.balancer(), broker_ttl, unix_time_ns());
    }
}

/// Removes every broker whose last report is older than `broker_ttl`.
pub(crate) fn remove_expired_brokers(
    balancer: &Balancer,
    broker_ttl: Duration,
    now_ns: i64,
) -> Vec<String> {
    let ttl_ns = i64::try_from(broker_ttl.as_nanos()).unwrap_or(i64::MAX);
    let expired = balancer.expired_brokers(ttl_ns, now_ns);
    for broker in &expired {
        warn!(broker = %broker, ttl_secs = broker_ttl.as_secs(), "broker stopped reporting, removing");
        balancer.remove_broker(broker);
    }
    expired
}
