use clap::Parser;

/// Delta broker node
#[derive(Debug, Parser)]
#[command(name = "delta-broker", version, about)]
pub(crate) struct Args {
    /// Path to config file
    #[arg(long)]
    pub(crate) config_file: String,

    /// Address the coordination service binds to (overrides config)
    #[arg(long)]
    pub(crate) broker_addr: Option<String>,

    /// Address other nodes reach this broker on (fqdn:port)
    #[arg(long)]
    pub(crate) advertised_addr: Option<String>,

    /// Coordinator address (overrides config)
    #[arg(long)]
    pub(crate) coordinator_addr: Option<String>,

    /// Prometheus Exporter http address
    #[arg(long)]
    pub(crate) prom_exporter: Option<String>,
}
