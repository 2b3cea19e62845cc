use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// configuration settings loaded from the config file
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoadConfiguration {
    /// Delta cluster name
    pub(crate) cluster_name: String,
    /// Broker services configuration
    pub(crate) broker: BrokerConfig,
    /// Metadata store configuration
    pub(crate) meta_store: MetaStoreConfig,
    /// Static coordinator, absent when this node coordinates
    #[serde(default)]
    pub(crate) coordinator: Option<CoordinatorConfig>,
    #[serde(default)]
    pub(crate) balancer: BalancerConfig,
    #[serde(default)]
    pub(crate) follower: FollowerConfig,
}

/// configuration settings for the Delta broker node
#[derive(Debug, Clone)]
pub(crate) struct ServiceConfiguration {
    /// Delta cluster name
    pub(crate) cluster_name: String,
    /// Address the coordination gRPC service binds to
    pub(crate) broker_addr: SocketAddr,
    /// Address other nodes use to reach this one; defaults to `broker_addr`
    pub(crate) advertised_addr: Option<String>,
    /// Address of the coordinator node; `None` means this node coordinates
    pub(crate) coordinator_addr: Option<String>,
    /// Prometheus exporter address
    pub(crate) prom_exporter: Option<SocketAddr>,
    pub(crate) meta_store_backend: MetaStoreBackend,
    pub(crate) follower_count: usize,
    pub(crate) stats_report_interval: Duration,
    pub(crate) broker_ttl: Duration,
    pub(crate) leader_check_interval: Duration,
    pub(crate) base_backoff_ms: u64,
    pub(crate) max_backoff_ms: u64,
}

impl ServiceConfiguration {
    /// The address this node is known by across the cluster.
    pub(crate) fn self_addr(&self) -> String {
        self.advertised_addr
            .clone()
            .unwrap_or_else(|| self.broker_addr.to_string())
    }

    /// The coordinator address, which is this node unless configured otherwise.
    pub(crate) fn leader_addr(&self) -> String {
        self.coordinator_addr
            .clone()
            .unwrap_or_else(|| self.self_addr())
    }
}

/// Broker services configuration
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BrokerConfig {
    /// Hostname or IP address for all broker services
    pub(crate) host: String,
    /// Port configuration for broker services
    pub(crate) ports: BrokerPorts,
}

/// Broker port configuration
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BrokerPorts {
    /// Coordination gRPC port
    pub(crate) client: usize,
    /// Prometheus metrics exporter port (optional)
    pub(crate) prometheus: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MetaStoreBackend {
    Memory,
}

/// Metadata store configuration
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetaStoreConfig {
    pub(crate) backend: MetaStoreBackend,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CoordinatorConfig {
    pub(crate) addr: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BalancerConfig {
    /// Followers picked per partition, besides the leader
    pub(crate) follower_count: usize,
    pub(crate) stats_report_interval_secs: u64,
    /// A broker silent for longer than this is removed
    pub(crate) broker_ttl_secs: u64,
    pub(crate) leader_check_interval_secs: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        BalancerConfig {
            follower_count: 0,
            stats_report_interval_secs: 5,
            broker_ttl_secs: 30,
            leader_check_interval_secs: 10,
        }
    }
}

/// Backoff of the assignment follower, 0 selects the built-in default
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FollowerConfig {
    pub(crate) base_backoff_ms: u64,
    pub(crate) max_backoff_ms: u64,
}

/// Implementing the TryFrom trait to transform LoadConfiguration into ServiceConfiguration
impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let broker_addr: SocketAddr = format!("{}:{}", config.broker.host, config.broker.ports.client)
            .parse()
            .context("Failed to create broker_addr")?;

        let prom_exporter: Option<SocketAddr> = match config.broker.ports.prometheus {
            Some(prom_port) => Some(
                format!("{}:{}", config.broker.host, prom_port)
                    .parse()
                    .context("Failed to create prom_exporter")?,
            ),
            None => None,
        };

        let balancer = config.balancer;
        if balancer.stats_report_interval_secs == 0 || balancer.leader_check_interval_secs == 0 {
            return Err(anyhow!("balancer intervals must be greater than zero"));
        }
        if balancer.broker_ttl_secs <= balancer.stats_report_interval_secs {
            return Err(anyhow!(
                "broker_ttl_secs ({}) must exceed stats_report_interval_secs ({})",
                balancer.broker_ttl_secs,
                balancer.stats_report_interval_secs
            ));
        }

        Ok(ServiceConfiguration {
            cluster_name: config.cluster_name,
            broker_addr,
            advertised_addr: None,
            coordinator_addr: config.coordinator.map(|c| c.addr),
            prom_exporter,
            meta_store_backend: config.meta_store.backend,
            follower_count: balancer.follower_count,
            stats_report_interval: Duration::from_secs(balancer.stats_report_interval_secs),
            broker_ttl: Duration::from_secs(balancer.broker_ttl_secs),
            leader_check_interval: Duration::from_secs(balancer.leader_check_interval_secs),
            base_backoff_ms: config.follower.base_backoff_ms,
            max_backoff_ms: config.follower.max_backoff_ms,
        })
    }
}
