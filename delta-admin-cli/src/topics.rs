use crate::client::coordination_client;
use clap::{Args, Subcommand};
use delta_core::proto::{
    BrokerPartitionAssignment, ConfigureTopicRequest, LookupTopicBrokersRequest, Topic,
};
use serde_json::{json, Value};
use std::fs;

#[derive(Debug, Args)]
pub(crate) struct Topics {
    #[command(subcommand)]
    command: TopicsCommands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum TopicsCommands {
    #[command(
        about = "Configure a topic and print its partition assignment",
        long_about = "Configure a topic and print its partition assignment.\n\nExamples:\n  topics configure --namespace ns --topic orders\n  topics configure --namespace ns --topic orders --partition-count 12 --record-type-file orders.json\n"
    )]
    Configure {
        #[arg(long, help = "Namespace name")]
        namespace: String,
        #[arg(long, help = "Topic name")]
        topic: String,
        #[arg(long, default_value_t = 6, help = "Number of partitions (1..=2520)")]
        partition_count: i32,
        #[arg(long, help = "Path to the JSON record type of the topic")]
        record_type_file: Option<String>,
    },
    #[command(about = "Print the brokers currently serving a topic")]
    Lookup {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        topic: String,
    },
}

pub async fn handle_command(topics: Topics) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = coordination_client().await?;

    match topics.command {
        TopicsCommands::Configure {
            namespace,
            topic,
            partition_count,
            record_type_file,
        } => {
            let record_type = match record_type_file {
                Some(path) => Some(String::from_utf8(fs::read(path)?)?),
                None => None,
            };
            let request = ConfigureTopicRequest {
                topic: Some(Topic { namespace, name: topic }),
                partition_count,
                record_type,
            };
            let response = client.configure_topic(request).await?.into_inner();

            let record_type = response
                .record_type
                .as_deref()
                .map(|raw| serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!(raw)));
            let out = json!({
                "broker_partition_assignments": assignments_json(&response.broker_partition_assignments),
                "record_type": record_type,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        TopicsCommands::Lookup { namespace, topic } => {
            let request = LookupTopicBrokersRequest {
                topic: Some(Topic { namespace, name: topic }),
            };
            let response = client.lookup_topic_brokers(request).await?.into_inner();
            let topic = response
                .topic
                .map(|t| format!("{}.{}", t.namespace, t.name));
            let out = json!({
                "topic": topic,
                "broker_partition_assignments": assignments_json(&response.broker_partition_assignments),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

fn assignments_json(assignments: &[BrokerPartitionAssignment]) -> Value {
    Value::Array(
        assignments
            .iter()
            .map(|a| {
                let partition = a.partition.map(|p| {
                    json!({
                        "ring_size": p.ring_size,
                        "range_start": p.range_start,
                        "range_stop": p.range_stop,
                        "unix_time_ns": p.unix_time_ns,
                    })
                });
                json!({
                    "partition": partition,
                    "leader_broker": a.leader_broker,
                    "follower_brokers": a.follower_brokers,
                })
            })
            .collect(),
    )
}
