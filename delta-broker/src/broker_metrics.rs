use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

pub(crate) struct Metric {
    pub(crate) name: &'static str,
    description: &'static str,
}

pub(crate) const COUNTERS: [Metric; 4] = [
    TOPIC_CONFIGURE_TOTAL,
    PARTITION_ALLOCATIONS_TOTAL,
    ORPHANED_PARTITIONS_TOTAL,
    BROKER_STATS_REPORTS_TOTAL,
];
pub(crate) const GAUGES: [Metric; 2] = [COORDINATOR_STATE, BROKERS_REGISTERED];

// COORDINATION Metrics --------------------------

pub(crate) const COORDINATOR_STATE: Metric = Metric {
    name: "delta_coordinator_state",
    description: "Coordinator role of this node: 0 no coordinator known, 1 following, 2 coordinating",
};

pub(crate) const BROKERS_REGISTERED: Metric = Metric {
    name: "delta_brokers_registered",
    description: "Number of live brokers known to the balancer",
};

pub(crate) const TOPIC_CONFIGURE_TOTAL: Metric = Metric {
    name: "delta_topic_configure_total",
    description: "Topic configuration requests handled by the coordinator, labelled by outcome",
};

pub(crate) const PARTITION_ALLOCATIONS_TOTAL: Metric = Metric {
    name: "delta_partition_allocations_total",
    description: "Total number of partitions placed by fresh allocations",
};

pub(crate) const ORPHANED_PARTITIONS_TOTAL: Metric = Metric {
    name: "delta_orphaned_partitions_total",
    description: "Partitions left without a broker after a broker departure",
};

pub(crate) const BROKER_STATS_REPORTS_TOTAL: Metric = Metric {
    name: "delta_broker_stats_reports_total",
    description: "Broker stats reports merged by the coordinator",
};

pub(crate) fn init_metrics(prom_addr: Option<std::net::SocketAddr>, cluster_name: &str) {
    info!("initializing metrics exporter");

    if let Some(addr) = prom_addr {
        if let Err(err) = PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("cluster", cluster_name.to_string())
            .install()
        {
            warn!(error = %err, "failed to install Prometheus recorder, metrics are not exported");
        }
    }

    for metric in COUNTERS {
        register_counter(metric)
    }

    for metric in GAUGES {
        register_gauge(metric)
    }
}

/// Registers a counter with the given name.
fn register_counter(metric: Metric) {
    metrics::describe_counter!(metric.name, metric.description);
    let _counter = metrics::counter!(metric.name);
}

/// Registers a gauge with the given name.
fn register_gauge(metric: Metric) {
    metrics::describe_gauge!(metric.name, metric.description);
    let _gauge = metrics::gauge!(metric.name);
}
