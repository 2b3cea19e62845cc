use crate::broker_metrics::COORDINATOR_STATE;
use async_trait::async_trait;
use delta_core::metadata::MetadataStore;
use metrics::gauge;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The external lock primitive deciding which node coordinates the cluster.
///
/// Implementations may block on a remote check; callers never cache the
/// answer across requests.
#[async_trait]
pub(crate) trait LeadershipProbe: Send + Sync + std::fmt::Debug {
    /// True while this node holds the coordinator lock.
    async fn is_leader(&self) -> bool;
    /// Address of the node currently holding the lock, if any.
    async fn leader_addr(&self) -> Option<String>;
}

/// Leadership fixed by configuration: the node whose address matches
/// `leader_addr` coordinates.
#[derive(Debug, Clone)]
pub(crate) struct StaticLeadership {
    self_addr: String,
    leader_addr: String,
}

impl StaticLeadership {
    pub(crate) fn new(self_addr: impl Into<String>, leader_addr: impl Into<String>) -> Self {
        StaticLeadership {
            self_addr: self_addr.into(),
            leader_addr: leader_addr.into(),
        }
    }
}

#[async_trait]
impl LeadershipProbe for StaticLeadership {
    async fn is_leader(&self) -> bool {
        self.self_addr == self.leader_addr
    }

    async fn leader_addr(&self) -> Option<String> {
        Some(self.leader_addr.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LeaderElectionState {
    NoLeader,
    Leading,
    Following,
}

// Coordinator discovery on top of a LeadershipProbe.
// Request paths ask the probe on every call; the background loop only keeps the
// state gauge current and publishes the coordinator address to the metadata store.
#[derive(Clone)]
pub(crate) struct LeaderElection {
    self_addr: String,
    probe: Arc<dyn LeadershipProbe>,
    store: Arc<dyn MetadataStore>,
    path: String,
    state: Arc<Mutex<LeaderElectionState>>,
}

impl std::fmt::Debug for LeaderElection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderElection")
            .field("self_addr", &self.self_addr)
            .field("probe", &self.probe)
            .finish()
    }
}

impl LeaderElection {
    pub(crate) fn new(
        self_addr: impl Into<String>,
        probe: Arc<dyn LeadershipProbe>,
        store: Arc<dyn MetadataStore>,
        path: &str,
    ) -> Self {
        Self {
            self_addr: self_addr.into(),
            probe,
            store,
            path: path.to_owned(),
            state: Arc::new(Mutex::new(LeaderElectionState::NoLeader)),
        }
    }

    /// Live check, never cached.
    pub(crate) async fn is_coordinator(&self) -> bool {
        self.probe.is_leader().await
    }

    pub(crate) async fn coordinator_addr(&self) -> Option<String> {
        self.probe.leader_addr().await
    }

    pub(crate) async fn start(&self, mut leader_check_interval: Interval, cancel: CancellationToken) {
        // the published address outlives a few missed checks, then expires
        let ttl = leader_check_interval.period() * 3;
        loop {
            self.check_leader(ttl).await;
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("leader election loop stopped");
                    return;
                }
                _ = leader_check_interval.tick() => {}
            }
        }
    }

    pub(crate) async fn get_state(&self) -> LeaderElectionState {
        let state = self.state.lock().await;
        state.clone()
    }

    async fn set_state(&self, new_state: LeaderElectionState) {
        let mut state = self.state.lock().await;
        if *state != new_state {
            info!(from = ?*state, to = ?new_state, "coordinator role changed");
            *state = new_state;
            let value = match *state {
                LeaderElectionState::NoLeader => 0.0,
                LeaderElectionState::Following => 1.0,
                LeaderElectionState::Leading => 2.0,
            };
            gauge!(COORDINATOR_STATE.name).set(value);
        }
    }

    async fn check_leader(&self, ttl: Duration) {
        if self.probe.is_leader().await {
            self.set_state(LeaderElectionState::Leading).await;
            debug!(broker = %self.self_addr, "node is the coordinator");

            let payload = serde_json::Value::String(self.self_addr.clone());
            if let Err(e) = self.store.put_with_ttl(&self.path, payload, ttl).await {
                warn!(broker = %self.self_addr, error = %e, "failed to publish coordinator address");
            }
        } else if self.probe.leader_addr().await.is_some() {
            self.set_state(LeaderElectionState::Following).await;
            debug!(broker = %self.self_addr, "node follows the coordinator");
        } else {
            self.set_state(LeaderElectionState::NoLeader).await;
            debug!(broker = %self.self_addr, "no coordinator elected yet");
        }
    }
}
