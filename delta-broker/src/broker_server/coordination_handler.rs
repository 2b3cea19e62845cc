use crate::broker_server::DeltaServerImpl;
use crate::topic::{BrokerPartitionAssignment, Topic};

use delta_core::proto::{
    coordination_server::Coordination, AssignTopicPartitionsRequest,
    AssignTopicPartitionsResponse, ConfigureTopicRequest, ConfigureTopicResponse,
    LookupTopicBrokersRequest, LookupTopicBrokersResponse, ReportBrokerStatsRequest,
    ReportBrokerStatsResponse,
};

use tonic::{Request, Response, Status};
use tracing::{debug, trace, Level};

#[tonic::async_trait]
impl Coordination for DeltaServerImpl {
    // allocates, or returns, the topic's partition assignment
    #[tracing::instrument(level = Level::INFO, skip_all)]
    async fn configure_topic(
        &self,
        request: Request<ConfigureTopicRequest>,
    ) -> std::result::Result<Response<ConfigureTopicResponse>, tonic::Status> {
        trace!(
            topic = ?request.get_ref().topic,
            partition_count = request.get_ref().partition_count,
            "configure topic request"
        );
        let response = self.coordinator.configure_topic(request).await?;
        Ok(Response::new(response))
    }

    #[tracing::instrument(level = Level::INFO, skip_all)]
    async fn lookup_topic_brokers(
        &self,
        request: Request<LookupTopicBrokersRequest>,
    ) -> std::result::Result<Response<LookupTopicBrokersResponse>, tonic::Status> {
        trace!(topic = ?request.get_ref().topic, "topic brokers lookup request");
        let response = self.coordinator.lookup_topic_brokers(request).await?;
        Ok(Response::new(response))
    }

    #[tracing::instrument(level = Level::DEBUG, skip_all)]
    async fn report_broker_stats(
        &self,
        request: Request<ReportBrokerStatsRequest>,
    ) -> std::result::Result<Response<ReportBrokerStatsResponse>, tonic::Status> {
        let response = self.coordinator.report_broker_stats(request).await?;
        Ok(Response::new(response))
    }

    // pushed by the coordinator, applied to this broker only
    #[tracing::instrument(level = Level::INFO, skip_all)]
    async fn assign_topic_partitions(
        &self,
        request: Request<AssignTopicPartitionsRequest>,
    ) -> std::result::Result<Response<AssignTopicPartitionsResponse>, tonic::Status> {
        let req = request.into_inner();
        let topic: Topic = req
            .topic
            .ok_or_else(|| Status::invalid_argument("missing topic"))?
            .into();
        topic.validate().map_err(Status::invalid_argument)?;

        let assignments = req
            .broker_partition_assignments
            .into_iter()
            .map(BrokerPartitionAssignment::try_from)
            .collect::<Result<Vec<_>, String>>()
            .map_err(Status::invalid_argument)?;

        let changed = self
            .local_partitions
            .apply_assignments(&topic, &assignments, req.is_draining);
        debug!(
            topic = %topic,
            is_leader = req.is_leader,
            is_draining = req.is_draining,
            changed,
            "applied pushed assignment"
        );

        Ok(Response::new(AssignTopicPartitionsResponse {}))
    }
}
