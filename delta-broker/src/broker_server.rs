mod coordination_handler;

use crate::local_partitions::LocalPartitions;
use crate::topic_coordinator::TopicCoordinator;
use delta_core::proto::coordination_server::CoordinationServer;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub(crate) struct DeltaServerImpl {
    coordinator: Arc<TopicCoordinator>,
    local_partitions: Arc<LocalPartitions>,
    broker_addr: SocketAddr,
}

impl DeltaServerImpl {
    pub(crate) fn new(
        coordinator: Arc<TopicCoordinator>,
        local_partitions: Arc<LocalPartitions>,
        broker_addr: SocketAddr,
    ) -> Self {
        DeltaServerImpl {
            coordinator,
            local_partitions,
            broker_addr,
        }
    }

    pub(crate) fn start(
        &self,
        ready_tx: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let socket_addr = self.broker_addr;

        let server = Server::builder()
            .add_service(CoordinationServer::new(self.clone()))
            .serve_with_shutdown(socket_addr, async move { cancel.cancelled().await });

        tokio::spawn(async move {
            info!(addr = %socket_addr, "coordination gRPC server listening");
            let _ = ready_tx.send(());
            if let Err(e) = server.await {
                warn!(error = ?e, "coordination server error");
            }
        })
    }
}
