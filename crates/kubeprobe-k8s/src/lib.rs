//! Kubernetes client for kubeprobe
//!
//! This crate provides the cluster-API seam used by discovery: listing
//! objects, looking up pods, and running commands inside pods over the
//! exec sub-resource.

mod api;
mod client;
mod error;
mod exec;

pub use api::{ClusterApi, KubeApi, PodQuery};
pub use client::KubeClient;
pub use error::{K8sError, Result};
pub use exec::{KubeExecutor, PodExecutor};

// Re-export types that are used in our public API
pub use kubeprobe_types::{ExecOutput, InventoryKind, InventoryList};
