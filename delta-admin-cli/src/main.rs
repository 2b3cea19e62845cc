mod client;
mod topics;

use topics::Topics;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "delta-admin-cli")]
#[command(about = "CLI for managing topic partitions of a Delta cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(name = "topics", about = "Configure topics and look up their brokers")]
    Topics(Topics),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Topics(topics) => topics::handle_command(topics).await?,
    }

    Ok(())
}
