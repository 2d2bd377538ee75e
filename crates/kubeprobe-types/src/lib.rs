//! Shared types for kubeprobe
//!
//! This crate contains the discovery snapshot and the configuration model
//! used across the kubeprobe crates.

mod config;
mod inventory;

pub use config::{
    BridgeConfig, ComponentConfig, ComponentSource, ConfigError, DEFAULT_AGENT_NAME,
    DEFAULT_MACHINE_CONCURRENCY, DEFAULT_NAMESPACE, DiscoveryConfig, ExplorerKind,
};
pub use inventory::{Inventory, InventoryKind, InventoryList};

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use serde::Serialize;
use std::collections::BTreeMap;

/// Label key used to find the remote-exec agent pods
pub const AGENT_LABEL_KEY: &str = "k8s-app";

/// Node labels that mark a control-plane node
pub const MASTER_ROLE_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/master",
    "node-role.kubernetes.io/control-plane",
];

// ============================================================================
// Component and Machine Types
// ============================================================================

/// A cluster-critical process as observed on one node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Component {
    pub name: String,
    pub node: String,
    /// Parsed command line: lower-cased keys, leading dashes stripped
    pub args: BTreeMap<String, String>,
    pub is_running: bool,
}

impl Component {
    /// A running instance with its parsed arguments
    pub fn running(name: String, node: String, args: BTreeMap<String, String>) -> Self {
        Self {
            name,
            node,
            args,
            is_running: true,
        }
    }

    /// An instance that was expected on `node` but not found
    pub fn absent(name: String, node: String) -> Self {
        Self {
            name,
            node,
            args: BTreeMap::new(),
            is_running: false,
        }
    }

    /// Look up a parsed argument by its (dash-less) name
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

/// OS-level view of a node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Machine {
    pub sysctl: BTreeMap<String, String>,
}

impl Machine {
    pub fn new(sysctl: BTreeMap<String, String>) -> Self {
        Self { sysctl }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.sysctl.get(key).map(String::as_str)
    }
}

/// Captured output of a remote command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The complete result of one discovery run
///
/// A snapshot is built from scratch by every synchronization and never
/// modified once published.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Resources {
    /// When the synchronization that produced this snapshot completed
    pub synced_at: Option<DateTime<Utc>>,

    /// Raw object lists, as returned by the cluster API
    #[serde(flatten)]
    pub inventory: Inventory,

    /// Every tracked component, keyed by name. An empty list means
    /// "looked for, not found".
    pub core_components: BTreeMap<String, Vec<Component>>,

    /// Components whose discovery failed when failures are tolerated
    pub component_errors: BTreeMap<String, String>,

    /// Per-node tunables, keyed by node name
    pub machines: BTreeMap<String, Machine>,
}

impl Resources {
    /// All observed instances of a component, `None` if it was never queried
    pub fn component(&self, name: &str) -> Option<&[Component]> {
        self.core_components.get(name).map(Vec::as_slice)
    }

    /// Whether discovery was attempted for the component
    pub fn is_tracked(&self, name: &str) -> bool {
        self.core_components.contains_key(name)
    }

    /// A tracked component with no running instance whose discovery did not fail
    pub fn is_component_absent(&self, name: &str) -> bool {
        match self.core_components.get(name) {
            Some(found) => {
                !self.component_errors.contains_key(name) && !found.iter().any(|c| c.is_running)
            }
            None => false,
        }
    }

    /// Running instances of a component
    pub fn running_components(&self, name: &str) -> Vec<&Component> {
        self.core_components
            .get(name)
            .map(|found| found.iter().filter(|c| c.is_running).collect())
            .unwrap_or_default()
    }

    pub fn machine(&self, node: &str) -> Option<&Machine> {
        self.machines.get(node)
    }

    pub fn node_names(&self) -> Vec<String> {
        node_names(&self.inventory.nodes)
    }
}

// ============================================================================
// Node Helpers
// ============================================================================

/// Names of the given nodes, in order
pub fn node_names(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|n| n.metadata.name.clone())
        .collect()
}

/// Whether a node carries one of the control-plane role labels
pub fn is_master(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .is_some_and(|labels| MASTER_ROLE_LABELS.iter().any(|l| labels.contains_key(*l)))
}

/// Resolve the nodes a component is expected on
///
/// Master nodes win over an explicit list, which wins over the full node list.
pub fn resolve_nodes(all: &[Node], explicit: &[String], master_nodes: bool) -> Vec<String> {
    if master_nodes {
        return all
            .iter()
            .filter(|n| is_master(n))
            .filter_map(|n| n.metadata.name.clone())
            .collect();
    }

    if !explicit.is_empty() {
        return explicit.to_vec();
    }

    node_names(all)
}
