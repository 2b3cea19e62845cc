use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use delta_core::metadata::{
    KeyValueVersion, MemoryStore, MetadataError, MetadataStore, Result as MetaResult, WatchStream,
};
use delta_core::proto::{
    self, AssignTopicPartitionsRequest, ConfigureTopicRequest, ConfigureTopicResponse,
    LookupTopicBrokersRequest, LookupTopicBrokersResponse, ReportBrokerStatsRequest,
};
use prost::Message;
use serde_json::Value;
use tonic::{Code, Request, Status};

use crate::{
    balancer::Balancer,
    broker_client::BrokerConnector,
    delta_service::{LeaderElection, LeadershipProbe, StaticLeadership},
    local_partitions::LocalPartitions,
    resources::{TopicConf, TopicConfResources, COORDINATOR_LEADER_PATH},
    topic::{BrokerPartitionAssignment, Partition, Topic},
    topic_coordinator::TopicCoordinator,
};

const SELF_ADDR: &str = "b0:7777";
const OTHER_COORDINATOR: &str = "b9:7777";

// ======================================================================
// Test doubles
// ======================================================================

/// Metadata store that counts writes and can be told to fail.
#[derive(Debug, Clone)]
struct CountingStore {
    inner: MemoryStore,
    puts: Arc<AtomicUsize>,
    fail_puts: Arc<AtomicBool>,
    fail_gets: Arc<AtomicBool>,
}

impl CountingStore {
    async fn new() -> Self {
        CountingStore {
            inner: MemoryStore::new().await.expect("memory store"),
            puts: Arc::new(AtomicUsize::new(0)),
            fail_puts: Arc::new(AtomicBool::new(false)),
            fail_gets: Arc::new(AtomicBool::new(false)),
        }
    }

    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn unavailable() -> MetadataError {
        MetadataError::StorageError("metadata store unavailable".into())
    }
}

#[async_trait]
impl MetadataStore for CountingStore {
    async fn get(&self, key: &str) -> MetaResult<Option<Value>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get(key).await
    }

    async fn get_childrens(&self, path: &str) -> MetaResult<Vec<String>> {
        self.inner.get_childrens(path).await
    }

    async fn put(&self, key: &str, value: Value) -> MetaResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> MetaResult<()> {
        self.inner.delete(key).await
    }

    async fn watch(&self, prefix: &str) -> MetaResult<WatchStream> {
        self.inner.watch(prefix).await
    }

    async fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> MetaResult<()> {
        self.inner.put_with_ttl(key, value, ttl).await
    }

    async fn get_bulk(&self, prefix: &str) -> MetaResult<Vec<KeyValueVersion>> {
        self.inner.get_bulk(prefix).await
    }
}

/// Connector that records every outbound call instead of dialing.
#[derive(Debug, Default)]
struct RecordingConnector {
    configure_calls: Mutex<Vec<(String, ConfigureTopicRequest, Option<String>)>>,
    assign_calls: Mutex<Vec<(String, AssignTopicPartitionsRequest)>>,
    report_calls: Mutex<Vec<String>>,
    fail_assign: AtomicBool,
    configure_error: Mutex<Option<Status>>,
}

impl RecordingConnector {
    fn drain_calls(&self) -> Vec<(String, AssignTopicPartitionsRequest)> {
        self.assign_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, request)| request.is_draining)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BrokerConnector for RecordingConnector {
    async fn configure_topic(
        &self,
        broker: &str,
        request: Request<ConfigureTopicRequest>,
    ) -> Result<ConfigureTopicResponse, Status> {
        let deadline = request
            .metadata()
            .get("grpc-timeout")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.configure_calls
            .lock()
            .unwrap()
            .push((broker.to_string(), request.into_inner(), deadline));
        if let Some(status) = self.configure_error.lock().unwrap().clone() {
            return Err(status);
        }
        Ok(ConfigureTopicResponse {
            broker_partition_assignments: vec![proto::BrokerPartitionAssignment {
                partition: Some(Partition::new(0, 2520, 1).into()),
                leader_broker: "remote".to_string(),
                follower_brokers: vec![],
            }],
            record_type: Some("from-coordinator".to_string()),
        })
    }

    async fn lookup_topic_brokers(
        &self,
        _broker: &str,
        request: Request<LookupTopicBrokersRequest>,
    ) -> Result<LookupTopicBrokersResponse, Status> {
        Ok(LookupTopicBrokersResponse {
            topic: request.into_inner().topic,
            broker_partition_assignments: vec![],
        })
    }

    async fn report_broker_stats(
        &self,
        broker: &str,
        _request: Request<ReportBrokerStatsRequest>,
    ) -> Result<(), Status> {
        self.report_calls.lock().unwrap().push(broker.to_string());
        Ok(())
    }

    async fn assign_topic_partitions(
        &self,
        broker: &str,
        request: Request<AssignTopicPartitionsRequest>,
    ) -> Result<(), Status> {
        self.assign_calls
            .lock()
            .unwrap()
            .push((broker.to_string(), request.into_inner()));
        if self.fail_assign.load(Ordering::SeqCst) {
            return Err(Status::unavailable("broker unreachable"));
        }
        Ok(())
    }
}

/// Leadership that can be flipped between calls.
#[derive(Debug)]
struct ToggleLeadership {
    leading: AtomicBool,
}

#[async_trait]
impl LeadershipProbe for ToggleLeadership {
    async fn is_leader(&self) -> bool {
        self.leading.load(Ordering::SeqCst)
    }

    async fn leader_addr(&self) -> Option<String> {
        if self.leading.load(Ordering::SeqCst) {
            Some(SELF_ADDR.to_string())
        } else {
            Some(OTHER_COORDINATOR.to_string())
        }
    }
}

struct Harness {
    coordinator: TopicCoordinator,
    balancer: Arc<Balancer>,
    store: CountingStore,
    connector: Arc<RecordingConnector>,
    changes: Arc<Mutex<Vec<(Topic, usize)>>>,
}

async fn harness_with_probe(probe: Arc<dyn LeadershipProbe>) -> Harness {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&changes);
    let balancer = Arc::new(Balancer::new().with_on_partition_change(Box::new(
        move |topic: &Topic, assignments: &[BrokerPartitionAssignment]| {
            recorded
                .lock()
                .unwrap()
                .push((topic.clone(), assignments.len()));
        },
    )));
    let store = CountingStore::new().await;
    let connector = Arc::new(RecordingConnector::default());
    let leader_election = LeaderElection::new(
        SELF_ADDR,
        probe,
        Arc::new(store.clone()),
        COORDINATOR_LEADER_PATH,
    );
    let coordinator = TopicCoordinator::new(
        SELF_ADDR,
        Arc::clone(&balancer),
        leader_election,
        TopicConfResources::new(Arc::new(store.clone())),
        connector.clone(),
        Arc::new(LocalPartitions::new(SELF_ADDR)),
        0,
    );
    Harness {
        coordinator,
        balancer,
        store,
        connector,
        changes,
    }
}

async fn coordinator_harness() -> Harness {
    harness_with_probe(Arc::new(StaticLeadership::new(SELF_ADDR, SELF_ADDR))).await
}

async fn follower_harness() -> Harness {
    harness_with_probe(Arc::new(StaticLeadership::new(SELF_ADDR, OTHER_COORDINATOR))).await
}

fn configure_request(name: &str, partition_count: i32) -> Request<ConfigureTopicRequest> {
    Request::new(ConfigureTopicRequest {
        topic: Some(proto::Topic {
            namespace: "ns".to_string(),
            name: name.to_string(),
        }),
        partition_count,
        record_type: None,
    })
}

fn leaders(response: &ConfigureTopicResponse) -> Vec<String> {
    response
        .broker_partition_assignments
        .iter()
        .map(|a| a.leader_broker.clone())
        .collect()
}

async fn persist(store: &CountingStore, name: &str, assignments: Vec<BrokerPartitionAssignment>) {
    let conf = TopicConf {
        broker_partition_assignments: assignments,
        record_type: None,
    };
    store
        .inner
        .put(
            &TopicConfResources::topic_conf_path(&Topic::new("ns", name)),
            serde_json::to_value(conf).unwrap(),
        )
        .await
        .unwrap();
}

fn six_over_three_brokers() -> Vec<BrokerPartitionAssignment> {
    Partition::split_ring(6, 1)
        .into_iter()
        .zip(["b1", "b2", "b3", "b1", "b2", "b3"])
        .map(|(partition, leader)| BrokerPartitionAssignment::new(partition, leader))
        .collect()
}

// ======================================================================
// Allocation path
// ======================================================================

/// **Test:** First configuration of a topic on the coordinator.
///
/// **Reason:** Main path: allocate, persist, update directory, notify.
///
/// **Expectation:** Six ranges spread over the three brokers, persisted once,
/// one partition-change notification.
#[tokio::test]
async fn configure_allocates_persists_and_notifies() {
    let h = coordinator_harness().await;
    for broker in ["b1", "b2", "b3"] {
        h.balancer.add_broker(broker);
    }

    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 6))
        .await
        .expect("configured");

    assert_eq!(leaders(&response), vec!["b1", "b2", "b3", "b1", "b2", "b3"]);
    assert_eq!(h.store.puts(), 1);
    assert_eq!(*h.changes.lock().unwrap(), vec![(Topic::new("ns", "orders"), 6)]);

    let slots = h.balancer.topic_slots(&Topic::new("ns", "orders")).unwrap();
    assert_eq!(slots.slots.len(), 6);
}

/// **Test:** Two identical configure calls with an unchanged broker set.
///
/// **Expectation:** Byte-identical responses, a single persistence write.
#[tokio::test]
async fn configure_is_idempotent() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    h.balancer.add_broker("b2");

    let first = h
        .coordinator
        .configure_topic(configure_request("orders", 4))
        .await
        .unwrap();
    let second = h
        .coordinator
        .configure_topic(configure_request("orders", 4))
        .await
        .unwrap();

    assert_eq!(first.encode_to_vec(), second.encode_to_vec());
    assert_eq!(h.store.puts(), 1);
    assert_eq!(h.changes.lock().unwrap().len(), 1);
}

/// **Test:** Topic persisted with 6 partitions over {b1,b2,b3}, all live,
/// configured again with 6.
///
/// **Expectation:** Existing assignment returned, no persistence write.
#[tokio::test]
async fn configure_reuses_live_assignment() {
    let h = coordinator_harness().await;
    for broker in ["b1", "b2", "b3"] {
        h.balancer.add_broker(broker);
    }
    persist(&h.store, "orders", six_over_three_brokers()).await;

    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 6))
        .await
        .unwrap();

    assert_eq!(leaders(&response), vec!["b1", "b2", "b3", "b1", "b2", "b3"]);
    assert_eq!(h.store.puts(), 0);
    assert!(h.connector.assign_calls.lock().unwrap().is_empty());
    assert!(h.changes.lock().unwrap().is_empty());
}

/// **Test:** Persisted assignment references a broker that is gone.
///
/// **Expectation:** The dead leader's ranges are repaired and written back
/// once; the count still matches so no reallocation happens.
#[tokio::test]
async fn configure_repairs_dead_leaders() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    h.balancer.add_broker("b3");
    persist(&h.store, "orders", six_over_three_brokers()).await;

    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 6))
        .await
        .unwrap();

    let leaders = leaders(&response);
    assert_eq!(leaders.len(), 6);
    assert!(leaders.iter().all(|l| l != "b2"));
    assert_eq!(h.store.puts(), 1);
    // untouched ranges keep their leader
    assert_eq!(leaders[0], "b1");
    assert_eq!(leaders[2], "b3");
    assert_eq!(*h.changes.lock().unwrap(), vec![(Topic::new("ns", "orders"), 6)]);
}

/// **Test:** Only b1 is live; the topic is persisted with 6 partitions over
/// {b1,b2,b3} and configured with 3.
///
/// **Reason:** The old layout is superseded. Repairing and announcing it
/// would push ranges that overlap the new ones.
///
/// **Expectation:** One write, a single partition change of 3, and the
/// persisted leaders are asked to release their original ranges.
#[tokio::test]
async fn new_count_does_not_announce_superseded_layout() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    persist(&h.store, "orders", six_over_three_brokers()).await;

    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 3))
        .await
        .unwrap();

    assert_eq!(leaders(&response), vec!["b1", "b1", "b1"]);
    assert_eq!(h.store.puts(), 1);
    assert_eq!(*h.changes.lock().unwrap(), vec![(Topic::new("ns", "orders"), 3)]);

    let drained: Vec<(String, usize)> = h
        .connector
        .drain_calls()
        .into_iter()
        .map(|(broker, request)| (broker, request.broker_partition_assignments.len()))
        .collect();
    assert_eq!(
        drained,
        vec![
            ("b1".to_string(), 2),
            ("b2".to_string(), 2),
            ("b3".to_string(), 2)
        ]
    );
}

/// **Test:** Partition count changes from 2 to 4.
///
/// **Expectation:** The previous leaders are asked to release, then four
/// fresh ranges are persisted.
#[tokio::test]
async fn configure_with_new_count_releases_and_reallocates() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    h.balancer.add_broker("b2");

    h.coordinator
        .configure_topic(configure_request("orders", 2))
        .await
        .unwrap();
    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 4))
        .await
        .unwrap();

    assert_eq!(response.broker_partition_assignments.len(), 4);
    assert_eq!(h.store.puts(), 2);
    let drained: Vec<String> = h
        .connector
        .drain_calls()
        .into_iter()
        .map(|(broker, _)| broker)
        .collect();
    assert_eq!(drained, vec!["b1", "b2"]);
}

/// **Test:** Releasing the previous assignment fails.
///
/// **Reason:** The release is best effort.
///
/// **Expectation:** Allocation still succeeds.
#[tokio::test]
async fn release_failure_does_not_block_allocation() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    h.connector.fail_assign.store(true, Ordering::SeqCst);
    persist(&h.store, "orders", six_over_three_brokers()).await;

    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 3))
        .await
        .expect("allocation proceeds");

    assert_eq!(leaders(&response), vec!["b1", "b1", "b1"]);
    assert!(!h.connector.drain_calls().is_empty());
}

/// **Test:** The persisted configuration cannot be read.
///
/// **Expectation:** Treated as unconfigured; allocation proceeds.
#[tokio::test]
async fn read_failure_is_not_fatal() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    h.store.fail_gets.store(true, Ordering::SeqCst);

    let response = h
        .coordinator
        .configure_topic(configure_request("orders", 2))
        .await
        .unwrap();
    assert_eq!(response.broker_partition_assignments.len(), 2);
    assert_eq!(h.store.puts(), 1);
}

// ======================================================================
// Failures
// ======================================================================

#[tokio::test]
async fn empty_broker_set_is_unavailable() {
    let h = coordinator_harness().await;

    let status = h
        .coordinator
        .configure_topic(configure_request("orders", 4))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(h.store.puts(), 0);
    assert!(h.changes.lock().unwrap().is_empty());
}

/// **Test:** Persisting the new assignment fails.
///
/// **Expectation:** Internal error; nothing advertised in the directory,
/// no notification.
#[tokio::test]
async fn persistence_failure_is_fatal() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    h.store.fail_puts.store(true, Ordering::SeqCst);

    let status = h
        .coordinator
        .configure_topic(configure_request("orders", 4))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);
    assert!(h.balancer.topic_slots(&Topic::new("ns", "orders")).is_none());
    assert!(h.changes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_record_type_is_rejected_without_side_effects() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");

    let mut request = configure_request("orders", 4);
    request.get_mut().record_type = Some(r#"{"fields":[]}"#.to_string());
    let status = h.coordinator.configure_topic(request).await.unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(h.store.puts(), 0);
}

#[tokio::test]
async fn valid_record_type_is_persisted_and_returned() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");
    let record_type =
        r#"{"fields":[{"name":"id","field_index":1,"type":{"scalar":"int64"}}]}"#.to_string();

    let mut request = configure_request("orders", 1);
    request.get_mut().record_type = Some(record_type.clone());
    let response = h.coordinator.configure_topic(request).await.unwrap();

    assert_eq!(response.record_type, Some(record_type));
}

#[tokio::test]
async fn invalid_topic_and_partition_count_are_client_errors() {
    let h = coordinator_harness().await;
    h.balancer.add_broker("b1");

    for request in [
        configure_request("or.ders", 4),
        configure_request("orders", 0),
        configure_request("orders", 2521),
        Request::new(ConfigureTopicRequest {
            topic: None,
            partition_count: 1,
            record_type: None,
        }),
    ] {
        let status = h.coordinator.configure_topic(request).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }
    assert_eq!(h.store.puts(), 0);
}

// ======================================================================
// Proxying
// ======================================================================

/// **Test:** ConfigureTopic on a node that does not coordinate.
///
/// **Expectation:** Forwarded once to the coordinator with the caller's
/// deadline; its response is returned unmodified; no local state changes.
#[tokio::test]
async fn non_coordinator_forwards_configure() {
    let h = follower_harness().await;
    h.balancer.add_broker("b1");

    let mut request = configure_request("orders", 4);
    request.set_timeout(Duration::from_secs(5));
    let response = h.coordinator.configure_topic(request).await.unwrap();

    assert_eq!(response.record_type.as_deref(), Some("from-coordinator"));
    let calls = h.connector.configure_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, OTHER_COORDINATOR);
    assert_eq!(calls[0].1.partition_count, 4);
    assert!(calls[0].2.is_some());
    assert_eq!(h.store.puts(), 0);
    assert!(h.changes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn proxy_errors_propagate_unchanged() {
    let h = follower_harness().await;
    *h.connector.configure_error.lock().unwrap() = Some(Status::not_found("coordinator says no"));

    let status = h
        .coordinator
        .configure_topic(configure_request("orders", 4))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "coordinator says no");
}

/// **Test:** Leadership flips between two calls.
///
/// **Reason:** Leadership must be checked on every call, never cached.
#[tokio::test]
async fn leadership_is_checked_on_every_call() {
    let probe = Arc::new(ToggleLeadership {
        leading: AtomicBool::new(true),
    });
    let h = harness_with_probe(probe.clone()).await;
    h.balancer.add_broker("b1");

    h.coordinator
        .configure_topic(configure_request("orders", 2))
        .await
        .unwrap();
    assert!(h.connector.configure_calls.lock().unwrap().is_empty());

    probe.leading.store(false, Ordering::SeqCst);
    h.coordinator
        .configure_topic(configure_request("orders", 2))
        .await
        .unwrap();
    assert_eq!(h.connector.configure_calls.lock().unwrap().len(), 1);
}

// ======================================================================
// Reports and lookup
// ======================================================================

#[tokio::test]
async fn reports_register_brokers_and_feed_lookup() {
    let h = coordinator_harness().await;
    let stats = proto::BrokerStats {
        cpu_usage_percent: 5,
        stats: vec![proto::TopicPartitionStats {
            topic: Some(proto::Topic {
                namespace: "ns".into(),
                name: "orders".into(),
            }),
            partition: Some(Partition::new(0, 2520, 1).into()),
            publisher_count: 0,
            subscriber_count: 0,
        }],
    };
    h.coordinator
        .report_broker_stats(Request::new(ReportBrokerStatsRequest {
            broker: "b1".into(),
            stats: Some(stats),
        }))
        .await
        .unwrap();
    assert!(h.balancer.contains_broker("b1"));

    let response = h
        .coordinator
        .lookup_topic_brokers(Request::new(LookupTopicBrokersRequest {
            topic: Some(proto::Topic {
                namespace: "ns".into(),
                name: "orders".into(),
            }),
        }))
        .await
        .unwrap();
    assert_eq!(response.broker_partition_assignments.len(), 1);
    assert_eq!(response.broker_partition_assignments[0].leader_broker, "b1");
}

#[tokio::test]
async fn report_without_broker_is_rejected() {
    let h = coordinator_harness().await;
    let status = h
        .coordinator
        .report_broker_stats(Request::new(ReportBrokerStatsRequest::default()))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn non_coordinator_forwards_reports() {
    let h = follower_harness().await;
    h.coordinator
        .report_broker_stats(Request::new(ReportBrokerStatsRequest {
            broker: SELF_ADDR.into(),
            stats: Some(proto::BrokerStats::default()),
        }))
        .await
        .unwrap();

    assert_eq!(*h.connector.report_calls.lock().unwrap(), vec![OTHER_COORDINATOR.to_string()]);
    assert!(h.balancer.is_empty());
}
