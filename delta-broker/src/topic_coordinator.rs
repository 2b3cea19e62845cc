use std::collections::BTreeMap;
use std::sync::Arc;

use delta_core::metadata::MetadataError;
use delta_core::proto::{
    AssignTopicPartitionsRequest, ConfigureTopicRequest, ConfigureTopicResponse,
    LookupTopicBrokersRequest, LookupTopicBrokersResponse, ReportBrokerStatsRequest,
    ReportBrokerStatsResponse,
};
use metrics::counter;
use thiserror::Error;
use tonic::{Request, Status};
use tracing::{debug, info, warn};

use crate::{
    balancer::{Balancer, BalancerError},
    broker_client::{forward_request, BrokerConnector},
    broker_metrics::{
        BROKER_STATS_REPORTS_TOTAL, PARTITION_ALLOCATIONS_TOTAL, TOPIC_CONFIGURE_TOTAL,
    },
    delta_service::LeaderElection,
    local_partitions::LocalPartitions,
    record_type::{RecordType, SchemaError},
    resources::{TopicConf, TopicConfResources},
    topic::{to_proto_assignments, BrokerPartitionAssignment, Topic, MAX_PARTITION_COUNT},
};

#[derive(Debug, Error)]
pub(crate) enum CoordinatorError {
    #[error("invalid record type: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    #[error("partition count {0} outside 1..={max}", max = MAX_PARTITION_COUNT)]
    InvalidPartitionCount(i32),

    #[error("no broker available")]
    NoBrokerAvailable,

    #[error("unable to persist topic configuration: {0}")]
    Persistence(#[source] MetadataError),

    #[error("directory update rejected: {0}")]
    Directory(#[source] BalancerError),

    #[error("no coordinator available: {0}")]
    NotCoordinator(String),
}

impl From<BalancerError> for CoordinatorError {
    fn from(err: BalancerError) -> Self {
        match err {
            BalancerError::NoBroker => CoordinatorError::NoBrokerAvailable,
            BalancerError::InvalidPartitionCount(count) => {
                CoordinatorError::InvalidPartitionCount(count)
            }
            err @ BalancerError::InvalidRange { .. } => CoordinatorError::Directory(err),
        }
    }
}

impl CoordinatorError {
    fn outcome(&self) -> &'static str {
        match self {
            CoordinatorError::InvalidSchema(_)
            | CoordinatorError::InvalidTopic(_)
            | CoordinatorError::InvalidPartitionCount(_) => "invalid_argument",
            CoordinatorError::NoBrokerAvailable | CoordinatorError::NotCoordinator(_) => {
                "unavailable"
            }
            CoordinatorError::Persistence(_) | CoordinatorError::Directory(_) => "internal",
        }
    }
}

impl From<CoordinatorError> for Status {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::InvalidSchema(_)
            | CoordinatorError::InvalidTopic(_)
            | CoordinatorError::InvalidPartitionCount(_) => Status::invalid_argument(err.to_string()),
            CoordinatorError::NoBrokerAvailable | CoordinatorError::NotCoordinator(_) => {
                Status::unavailable(err.to_string())
            }
            CoordinatorError::Persistence(_) | CoordinatorError::Directory(_) => {
                Status::internal(err.to_string())
            }
        }
    }
}

/// Serializes topic configuration through the elected coordinator.
///
/// Every node runs one. On the coordinator it owns the configure path and
/// merges broker reports into the balancer. On every other node it
/// forwards those calls one hop to the coordinator without touching local
/// state. Leadership is asked again on every call.
#[derive(Debug, Clone)]
pub(crate) struct TopicCoordinator {
    self_addr: String,
    balancer: Arc<Balancer>,
    leader_election: LeaderElection,
    topic_conf: TopicConfResources,
    connector: Arc<dyn BrokerConnector>,
    local_partitions: Arc<LocalPartitions>,
    follower_count: usize,
}

impl TopicCoordinator {
    pub(crate) fn new(
        self_addr: impl Into<String>,
        balancer: Arc<Balancer>,
        leader_election: LeaderElection,
        topic_conf: TopicConfResources,
        connector: Arc<dyn BrokerConnector>,
        local_partitions: Arc<LocalPartitions>,
        follower_count: usize,
    ) -> Self {
        TopicCoordinator {
            self_addr: self_addr.into(),
            balancer,
            leader_election,
            topic_conf,
            connector,
            local_partitions,
            follower_count,
        }
    }

    pub(crate) fn balancer(&self) -> &Arc<Balancer> {
        &self.balancer
    }

    pub(crate) fn leader_election(&self) -> &LeaderElection {
        &self.leader_election
    }

    async fn coordinator_addr(&self) -> Result<String, Status> {
        match self.leader_election.coordinator_addr().await {
            Some(addr) if addr != self.self_addr => Ok(addr),
            Some(_) => Err(CoordinatorError::NotCoordinator(
                "coordinator lock changed hands, retry".to_string(),
            )
            .into()),
            None => Err(CoordinatorError::NotCoordinator("no coordinator elected".to_string()).into()),
        }
    }

    // ======================================================================
    // ConfigureTopic
    // ======================================================================

    pub(crate) async fn configure_topic(
        &self,
        request: Request<ConfigureTopicRequest>,
    ) -> Result<ConfigureTopicResponse, Status> {
        if !self.leader_election.is_coordinator().await {
            let leader = self.coordinator_addr().await?;
            debug!(coordinator = %leader, "forwarding topic configuration");
            let forwarded = forward_request(request.metadata(), request.get_ref().clone());
            return self.connector.configure_topic(&leader, forwarded).await;
        }

        match self.configure_as_coordinator(request.into_inner()).await {
            Ok(response) => {
                counter!(TOPIC_CONFIGURE_TOTAL.name, "outcome" => "ok").increment(1);
                Ok(response)
            }
            Err(err) => {
                counter!(TOPIC_CONFIGURE_TOTAL.name, "outcome" => err.outcome()).increment(1);
                warn!(error = %err, "topic configuration failed");
                Err(err.into())
            }
        }
    }

    async fn configure_as_coordinator(
        &self,
        request: ConfigureTopicRequest,
    ) -> Result<ConfigureTopicResponse, CoordinatorError> {
        let topic: Topic = request
            .topic
            .ok_or_else(|| CoordinatorError::InvalidTopic("missing topic".to_string()))?
            .into();
        topic.validate().map_err(CoordinatorError::InvalidTopic)?;
        let partition_count = request.partition_count;
        if !(1..=MAX_PARTITION_COUNT).contains(&partition_count) {
            return Err(CoordinatorError::InvalidPartitionCount(partition_count));
        }
        if let Some(raw) = &request.record_type {
            RecordType::parse(raw)?;
        }

        let existing = match self.topic_conf.read_topic_conf(&topic).await {
            Ok(conf) => conf,
            Err(err) => {
                warn!(topic = %topic, error = %err, "unable to read topic configuration, allocating afresh");
                None
            }
        };

        if let Some(conf) = existing {
            // a different count supersedes the layout, so only a matching one is repaired
            if conf.broker_partition_assignments.len() == partition_count as usize {
                match self.ensure_topic_active_assignments(&topic, conf.clone()).await {
                    Ok(active) => {
                        info!(topic = %topic, partition_count, "topic already configured");
                        return Ok(active.to_response());
                    }
                    Err(err) => {
                        warn!(topic = %topic, error = %err, "unable to reconcile existing assignment");
                    }
                }
            }

            if !conf.broker_partition_assignments.is_empty() {
                if let Err(err) = self
                    .assign_topic_partitions_to_brokers(&topic, &conf.broker_partition_assignments, false)
                    .await
                {
                    warn!(topic = %topic, error = %err, "unable to release previous assignment");
                }
            }
        }

        if self.balancer.is_empty() {
            return Err(CoordinatorError::NoBrokerAvailable);
        }

        let assignments = self
            .balancer
            .allocate_topic_partitions(partition_count, self.follower_count)?;
        let conf = TopicConf {
            broker_partition_assignments: assignments,
            record_type: request.record_type,
        };

        self.topic_conf
            .save_topic_conf(&topic, &conf)
            .await
            .map_err(CoordinatorError::Persistence)?;
        self.publish(&topic, &conf.broker_partition_assignments)?;

        counter!(PARTITION_ALLOCATIONS_TOTAL.name).increment(conf.broker_partition_assignments.len() as u64);
        info!(
            topic = %topic,
            partition_count,
            assignments = ?conf.broker_partition_assignments.iter().map(|a| &a.leader_broker).collect::<Vec<_>>(),
            "topic partitions allocated"
        );
        Ok(conf.to_response())
    }

    /// Repairs the persisted assignment against the live broker set. A
    /// repaired layout is written back and announced; an intact one is
    /// returned as is.
    async fn ensure_topic_active_assignments(
        &self,
        topic: &Topic,
        mut conf: TopicConf,
    ) -> Result<TopicConf, CoordinatorError> {
        let changed = self
            .balancer
            .ensure_assignments_to_active_brokers(&mut conf.broker_partition_assignments, self.follower_count)?;
        if !changed {
            return Ok(conf);
        }

        info!(topic = %topic, "persisting repaired assignment");
        self.topic_conf
            .save_topic_conf(topic, &conf)
            .await
            .map_err(CoordinatorError::Persistence)?;
        self.publish(topic, &conf.broker_partition_assignments)?;
        Ok(conf)
    }

    // persisted state first, then the in-memory directory and listeners
    fn publish(
        &self,
        topic: &Topic,
        assignments: &[BrokerPartitionAssignment],
    ) -> Result<(), CoordinatorError> {
        self.balancer.assign_topic(topic, assignments)?;
        self.balancer.notify_partition_change(topic, assignments);
        Ok(())
    }

    /// Tells every leader of `assignments` to start serving (`is_add`) or to
    /// release its ranges. Every leader is attempted; the first failure is
    /// returned.
    pub(crate) async fn assign_topic_partitions_to_brokers(
        &self,
        topic: &Topic,
        assignments: &[BrokerPartitionAssignment],
        is_add: bool,
    ) -> Result<(), Status> {
        let mut by_leader: BTreeMap<&str, Vec<BrokerPartitionAssignment>> = BTreeMap::new();
        for assignment in assignments {
            by_leader
                .entry(assignment.leader_broker.as_str())
                .or_default()
                .push(assignment.clone());
        }

        let mut first_err = None;
        for (broker, owned) in by_leader {
            if broker == self.self_addr {
                self.local_partitions.apply_assignments(topic, &owned, !is_add);
                continue;
            }
            let request = Request::new(AssignTopicPartitionsRequest {
                topic: Some(topic.into()),
                broker_partition_assignments: to_proto_assignments(&owned),
                is_leader: true,
                is_draining: !is_add,
            });
            if let Err(status) = self.connector.assign_topic_partitions(broker, request).await {
                warn!(topic = %topic, broker = %broker, is_add, error = %status, "assign request failed");
                first_err.get_or_insert(status);
            }
        }

        match first_err {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    // ======================================================================
    // LookupTopicBrokers
    // ======================================================================

    pub(crate) async fn lookup_topic_brokers(
        &self,
        request: Request<LookupTopicBrokersRequest>,
    ) -> Result<LookupTopicBrokersResponse, Status> {
        if !self.leader_election.is_coordinator().await {
            let leader = self.coordinator_addr().await?;
            let forwarded = forward_request(request.metadata(), request.get_ref().clone());
            return self.connector.lookup_topic_brokers(&leader, forwarded).await;
        }

        let proto_topic = request
            .into_inner()
            .topic
            .ok_or_else(|| Status::invalid_argument("missing topic"))?;
        let topic: Topic = proto_topic.clone().into();
        topic.validate().map_err(Status::invalid_argument)?;

        let assignments = self.balancer.lookup_topic_partitions(&topic);
        Ok(LookupTopicBrokersResponse {
            topic: Some(proto_topic),
            broker_partition_assignments: to_proto_assignments(&assignments),
        })
    }

    // ======================================================================
    // ReportBrokerStats
    // ======================================================================

    pub(crate) async fn report_broker_stats(
        &self,
        request: Request<ReportBrokerStatsRequest>,
    ) -> Result<ReportBrokerStatsResponse, Status> {
        if !self.leader_election.is_coordinator().await {
            let leader = self.coordinator_addr().await?;
            let forwarded = forward_request(request.metadata(), request.get_ref().clone());
            self.connector.report_broker_stats(&leader, forwarded).await?;
            return Ok(ReportBrokerStatsResponse {});
        }

        let report = request.into_inner();
        if report.broker.is_empty() {
            return Err(Status::invalid_argument("missing broker address"));
        }
        let stats = report.stats.unwrap_or_default();
        self.balancer.on_broker_stats_updated(&report.broker, &stats);
        counter!(BROKER_STATS_REPORTS_TOTAL.name).increment(1);
        debug!(broker = %report.broker, partitions = stats.stats.len(), "broker stats merged");
        Ok(ReportBrokerStatsResponse {})
    }
}
