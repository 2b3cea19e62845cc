mod args_parse;
mod balancer;
mod broker_client;
mod broker_metrics;
mod broker_server;
mod delta_service;
mod local_partitions;
mod record_type;
mod resources;
mod service_configuration;
mod topic;
mod topic_coordinator;
mod utils;

#[cfg(test)]
mod topic_coordinator_test;

use std::{fs::read_to_string, path::Path, sync::Arc};

use crate::{
    args_parse::Args,
    balancer::{Balancer, BrokerStats},
    broker_client::GrpcBrokerConnector,
    broker_metrics::init_metrics,
    delta_service::{partition_change_channel, DeltaService, LeaderElection, LeadershipProbe, StaticLeadership},
    local_partitions::LocalPartitions,
    resources::{TopicConfResources, COORDINATOR_LEADER_PATH},
    service_configuration::{LoadConfiguration, MetaStoreBackend, ServiceConfiguration},
    topic_coordinator::TopicCoordinator,
};

use anyhow::{Context, Result};
use clap::Parser;
use delta_core::metadata::{MemoryStore, MetadataStore};
use std::net::SocketAddr;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Load the configuration from the specified YAML file
    let config_content = read_to_string(Path::new(&args.config_file))
        .with_context(|| format!("Failed to read config file {}", args.config_file))?;
    let load_config: LoadConfiguration = serde_yaml::from_str(&config_content)?;

    // Attempt to transform LoadConfiguration into ServiceConfiguration
    let mut service_config: ServiceConfiguration = load_config.try_into()?;

    // If `broker_addr` is provided via command-line args, override the value from the config file
    if let Some(broker_addr) = args.broker_addr {
        let broker_address: SocketAddr = broker_addr.parse().context(format!(
            "Failed to parse into Socket address: {}",
            broker_addr
        ))?;
        service_config.broker_addr = broker_address;
    }

    // If "advertised_addr" is provided via command-line args
    if let Some(advertised_addr) = args.advertised_addr {
        service_config.advertised_addr = Some(advertised_addr)
    }

    if let Some(coordinator_addr) = args.coordinator_addr {
        service_config.coordinator_addr = Some(coordinator_addr)
    }

    // If `prom_exporter` is provided via command-line args, override the value from the config file
    if let Some(prom_exporter) = args.prom_exporter {
        let prom_address: SocketAddr = prom_exporter.parse().context(format!(
            "Failed to parse into Socket address: {}",
            prom_exporter
        ))?;
        service_config.prom_exporter = Some(prom_address);
    }

    // Init metrics with or without prometheus exporter
    init_metrics(service_config.prom_exporter, &service_config.cluster_name);

    // initialize the metadata storage layer for the broker
    let metadata_store: Arc<dyn MetadataStore> = match service_config.meta_store_backend {
        MetaStoreBackend::Memory => {
            info!("Initializing in-memory metadata store");
            Arc::new(MemoryStore::new().await?)
        }
    };

    let self_addr = service_config.self_addr();
    let leader_addr = service_config.leader_addr();

    // ranges this node serves, as pushed by the coordinator or read from the store
    let local_partitions = Arc::new(LocalPartitions::new(self_addr.clone()));

    // the balancer announces every new assignment, the service pushes it to the leaders
    let (on_partition_change, partition_changes) = partition_change_channel();
    let balancer = Arc::new(
        Balancer::new()
            .with_on_partition_change(on_partition_change)
            .with_on_add_broker(Box::new(|broker: &str, stats: &BrokerStats| {
                debug!(broker = %broker, partitions = stats.topic_partition_count, "broker registration seen");
            }))
            .with_on_remove_broker(Box::new(|broker: &str, stats: &BrokerStats| {
                info!(broker = %broker, partitions = stats.topic_partition_count, "broker left the fleet");
            })),
    );

    // a single node per cluster coordinates topic configuration
    let leadership: Arc<dyn LeadershipProbe> =
        Arc::new(StaticLeadership::new(self_addr.clone(), leader_addr));
    let leader_election = LeaderElection::new(
        self_addr.clone(),
        leadership,
        Arc::clone(&metadata_store),
        COORDINATOR_LEADER_PATH,
    );

    let coordinator = Arc::new(TopicCoordinator::new(
        self_addr,
        balancer,
        leader_election,
        TopicConfResources::new(Arc::clone(&metadata_store)),
        Arc::new(GrpcBrokerConnector::new()),
        Arc::clone(&local_partitions),
        service_config.follower_count,
    ));

    info!(
        broker_addr = %service_config.broker_addr,
        "Initializing Delta broker service"
    );

    // DeltaService coordinate and start all the services
    let mut delta = DeltaService::new(
        service_config,
        metadata_store,
        coordinator,
        local_partitions,
        partition_changes,
    );

    delta
        .start()
        .await
        .context("Delta broker service unable to start")?;

    info!("Delta broker service stopped");

    Ok(())
}
