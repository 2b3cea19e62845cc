use async_trait::async_trait;
use dashmap::DashMap;
use delta_core::proto::{
    coordination_client::CoordinationClient, AssignTopicPartitionsRequest, ConfigureTopicRequest,
    ConfigureTopicResponse, LookupTopicBrokersRequest, LookupTopicBrokersResponse,
    ReportBrokerStatsRequest,
};
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::debug;

/// gRPC metadata key carrying the caller's deadline.
const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Outbound calls from this node to another broker.
#[async_trait]
pub(crate) trait BrokerConnector: Send + Sync + std::fmt::Debug {
    async fn configure_topic(
        &self,
        broker: &str,
        request: Request<ConfigureTopicRequest>,
    ) -> Result<ConfigureTopicResponse, Status>;

    async fn lookup_topic_brokers(
        &self,
        broker: &str,
        request: Request<LookupTopicBrokersRequest>,
    ) -> Result<LookupTopicBrokersResponse, Status>;

    async fn report_broker_stats(
        &self,
        broker: &str,
        request: Request<ReportBrokerStatsRequest>,
    ) -> Result<(), Status>;

    async fn assign_topic_partitions(
        &self,
        broker: &str,
        request: Request<AssignTopicPartitionsRequest>,
    ) -> Result<(), Status>;
}

/// Builds an outbound request for `message` carrying the deadline of the
/// inbound call, if it had one.
pub(crate) fn forward_request<T>(incoming: &MetadataMap, message: T) -> Request<T> {
    let mut request = Request::new(message);
    if let Some(timeout) = incoming.get(GRPC_TIMEOUT_HEADER) {
        request
            .metadata_mut()
            .insert(GRPC_TIMEOUT_HEADER, timeout.clone());
    }
    request
}

/// Connector over tonic channels, one cached channel per broker address.
#[derive(Debug, Default)]
pub(crate) struct GrpcBrokerConnector {
    channels: DashMap<String, Channel>,
}

impl GrpcBrokerConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    async fn client(&self, broker: &str) -> Result<CoordinationClient<Channel>, Status> {
        if let Some(channel) = self.channels.get(broker) {
            return Ok(CoordinationClient::new(channel.clone()));
        }

        let uri = if broker.starts_with("http://") || broker.starts_with("https://") {
            broker.to_string()
        } else {
            format!("http://{}", broker)
        };
        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| Status::invalid_argument(format!("invalid broker address {}: {}", broker, e)))?
            .tcp_nodelay(true);
        let channel = endpoint.connect().await.map_err(|e| {
            Status::unavailable(format!("unable to connect to broker {}: {}", broker, e))
        })?;

        debug!(broker = %broker, "connected to broker");
        self.channels.insert(broker.to_string(), channel.clone());
        Ok(CoordinationClient::new(channel))
    }

    fn forget_on_unavailable(&self, broker: &str, status: &Status) {
        if status.code() == tonic::Code::Unavailable {
            self.channels.remove(broker);
        }
    }
}

#[async_trait]
impl BrokerConnector for GrpcBrokerConnector {
    async fn configure_topic(
        &self,
        broker: &str,
        request: Request<ConfigureTopicRequest>,
    ) -> Result<ConfigureTopicResponse, Status> {
        let mut client = self.client(broker).await?;
        client
            .configure_topic(request)
            .await
            .map(|response| response.into_inner())
            .inspect_err(|status| self.forget_on_unavailable(broker, status))
    }

    async fn lookup_topic_brokers(
        &self,
        broker: &str,
        request: Request<LookupTopicBrokersRequest>,
    ) -> Result<LookupTopicBrokersResponse, Status> {
        let mut client = self.client(broker).await?;
        client
            .lookup_topic_brokers(request)
            .await
            .map(|response| response.into_inner())
            .inspect_err(|status| self.forget_on_unavailable(broker, status))
    }

    async fn report_broker_stats(
        &self,
        broker: &str,
        request: Request<ReportBrokerStatsRequest>,
    ) -> Result<(), Status> {
        let mut client = self.client(broker).await?;
        client
            .report_broker_stats(request)
            .await
            .map(|_| ())
            .inspect_err(|status| self.forget_on_unavailable(broker, status))
    }

    async fn assign_topic_partitions(
        &self,
        broker: &str,
        request: Request<AssignTopicPartitionsRequest>,
    ) -> Result<(), Status> {
        let mut client = self.client(broker).await?;
        client
            .assign_topic_partitions(request)
            .await
            .map(|_| ())
            .inspect_err(|status| self.forget_on_unavailable(broker, status))
    }
}
