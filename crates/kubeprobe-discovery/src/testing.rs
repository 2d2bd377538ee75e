//! In-memory doubles for the cluster API and the exec stream

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Node, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kubeprobe_k8s::{ClusterApi, ExecOutput, K8sError, PodExecutor, PodQuery};
use kubeprobe_types::{
    AGENT_LABEL_KEY, Component, DEFAULT_AGENT_NAME, DEFAULT_NAMESPACE, InventoryKind,
    InventoryList,
};

use crate::error::{DiscoveryError, Result};
use crate::explorer::Explorer;

// ============================================================================
// Object Builders
// ============================================================================

pub fn node(name: &str, master: bool) -> Node {
    let labels = master.then(|| {
        BTreeMap::from([(
            "node-role.kubernetes.io/control-plane".to_string(),
            String::new(),
        )])
    });
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn pod(namespace: &str, name: &str, node: &str, labels: &[(&str, &str)]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn with_container(mut pod: Pod, name: &str, command: &[&str]) -> Pod {
    let spec = pod.spec.get_or_insert_with(Default::default);
    spec.containers.push(Container {
        name: name.to_string(),
        command: Some(command.iter().map(|c| c.to_string()).collect()),
        ..Default::default()
    });
    pod
}

/// A control-plane static pod as the kubelet mirrors it
pub fn static_pod(component: &str, node: &str, command: &[&str]) -> Pod {
    with_container(
        pod(
            DEFAULT_NAMESPACE,
            &format!("{}-{}", component, node),
            node,
            &[("component", component), ("tier", "control-plane")],
        ),
        component,
        command,
    )
}

/// The remote-exec agent scheduled on `node`
pub fn agent_pod(node: &str) -> Pod {
    pod(
        DEFAULT_NAMESPACE,
        &format!("{}-{}", DEFAULT_AGENT_NAME, node),
        node,
        &[(AGENT_LABEL_KEY, DEFAULT_AGENT_NAME)],
    )
}

// ============================================================================
// Cluster API
// ============================================================================

pub struct FakeApi {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    failing_kinds: Mutex<HashSet<InventoryKind>>,
    failing_selectors: Mutex<HashSet<String>>,
    failing_pods: Mutex<HashSet<String>>,
}

impl FakeApi {
    pub fn new(nodes: Vec<Node>, pods: Vec<Pod>) -> Self {
        Self {
            nodes,
            pods,
            failing_kinds: Mutex::new(HashSet::new()),
            failing_selectors: Mutex::new(HashSet::new()),
            failing_pods: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_inventory(&self, kind: InventoryKind) {
        self.failing_kinds.lock().insert(kind);
    }

    /// Make pod listings with exactly this label selector fail
    pub fn fail_selector(&self, selector: &str) {
        self.failing_selectors.lock().insert(selector.to_string());
    }

    pub fn fail_get_pod(&self, name: &str) {
        self.failing_pods.lock().insert(name.to_string());
    }

    fn outage(what: impl std::fmt::Display) -> K8sError {
        K8sError::Stream(format!("{} unavailable", what))
    }
}

fn matches_selector(selector: Option<&str>, pod: &Pod, field: bool) -> bool {
    let Some(selector) = selector.filter(|s| !s.is_empty()) else {
        return true;
    };

    selector.split(',').all(|term| {
        let Some((key, value)) = term.split_once('=') else {
            return false;
        };
        if field {
            key == "spec.nodeName"
                && pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) == Some(value)
        } else {
            pod.metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(key))
                .map(String::as_str)
                == Some(value)
        }
    })
}

#[async_trait]
impl ClusterApi for FakeApi {
    async fn list_nodes(&self) -> kubeprobe_k8s::Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }

    async fn list_inventory(&self, kind: InventoryKind) -> kubeprobe_k8s::Result<InventoryList> {
        if self.failing_kinds.lock().contains(&kind) {
            return Err(Self::outage(kind));
        }

        Ok(match kind {
            InventoryKind::Nodes => InventoryList::Nodes(self.nodes.clone()),
            InventoryKind::Pods => InventoryList::Pods(self.pods.clone()),
            other => InventoryList::empty(other),
        })
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        query: &PodQuery,
    ) -> kubeprobe_k8s::Result<Vec<Pod>> {
        if let Some(labels) = query.labels.as_deref() {
            if self.failing_selectors.lock().contains(labels) {
                return Err(Self::outage(labels));
            }
        }

        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.is_none() || p.metadata.namespace.as_deref() == namespace)
            .filter(|p| matches_selector(query.labels.as_deref(), p, false))
            .filter(|p| matches_selector(query.fields.as_deref(), p, true))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> kubeprobe_k8s::Result<Option<Pod>> {
        if self.failing_pods.lock().contains(name) {
            return Err(Self::outage(name));
        }

        Ok(self
            .pods
            .iter()
            .find(|p| {
                p.metadata.namespace.as_deref() == Some(namespace)
                    && p.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }
}

// ============================================================================
// Exec Stream
// ============================================================================

type Reply = Box<dyn Fn(&str, &str) -> kubeprobe_k8s::Result<ExecOutput> + Send + Sync>;

/// Scripted [`PodExecutor`] that counts concurrent calls
pub struct FakeExecutor {
    reply: Reply,
    delay: Duration,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeExecutor {
    /// `reply` receives the agent pod name and the command run on the host
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&str, &str) -> kubeprobe_k8s::Result<ExecOutput> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call as (pod, full command)
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    /// Highest number of calls observed in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// The part of a bridged command that runs on the host, joined by spaces
pub fn host_command(command: &[String]) -> String {
    let start = command
        .iter()
        .position(|c| c == "--")
        .map(|i| i + 1)
        .unwrap_or(0);
    command[start..].join(" ")
}

#[async_trait]
impl PodExecutor for FakeExecutor {
    async fn exec(
        &self,
        _namespace: &str,
        pod: &str,
        command: &[String],
    ) -> kubeprobe_k8s::Result<ExecOutput> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push((pod.to_string(), command.to_vec()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = (self.reply)(pod, &host_command(command));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Explorers
// ============================================================================

pub enum Outcome {
    Found(Vec<Component>),
    Fail(&'static str),
}

/// Explorer returning a fixed outcome and counting its calls
pub struct ScriptedExplorer {
    strategy: &'static str,
    outcome: Outcome,
    calls: AtomicUsize,
}

impl ScriptedExplorer {
    pub fn new(strategy: &'static str, outcome: Outcome) -> Self {
        Self {
            strategy,
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Explorer for ScriptedExplorer {
    fn strategy(&self) -> &'static str {
        self.strategy
    }

    async fn components(&self) -> Result<Vec<Component>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Found(found) => Ok(found.clone()),
            Outcome::Fail(message) => Err(DiscoveryError::Transport {
                context: self.strategy.to_string(),
                source: K8sError::Stream(message.to_string()),
            }),
        }
    }
}
