//! Cluster resource and component discovery for kubeprobe
//!
//! This crate turns a live cluster into a [`Resources`] snapshot: it lists
//! cluster objects, finds control-plane components through a chain of
//! explorers, and reads node tunables by running commands through an
//! in-cluster agent.

mod bridge;
mod cluster;
mod collector;
mod error;
mod explorer;
mod gate;
pub mod parse;
mod registry;

#[cfg(test)]
mod testing;

pub use bridge::{HOST_NAMESPACE_PREFIX, NodeExecutor, RemoteBridge};
pub use cluster::{CLOUD_TYPE, Cluster};
pub use collector::{ComponentStage, ResourceCollector, sysctl_command};
pub use error::{ComponentFailure, DiscoveryError, EXIT_CODE_MARKER, Result};
pub use explorer::{
    AutoExplorer, BareExplorer, Explorer, LabelExplorer, StaticPodExplorer, probe_command,
};
pub use gate::AdmissionGate;
pub use registry::{ExplorerContext, ExplorerFactory, ExplorerRegistry};

// Re-export types used in our public API
pub use kubeprobe_types::{Component, DiscoveryConfig, ExplorerKind, Machine, Resources};
