//! Strategies for finding a component and its command line

mod auto;
mod bare;
mod label;
mod static_pod;

pub use auto::AutoExplorer;
pub use bare::{BareExplorer, probe_command};
pub use label::LabelExplorer;
pub use static_pod::StaticPodExplorer;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

use crate::error::{DiscoveryError, Result};
use crate::parse::parse_args;
use kubeprobe_types::Component;

/// Produces zero or more instances of one logical component
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Short name of the strategy, for logs and errors
    fn strategy(&self) -> &'static str;

    async fn components(&self) -> Result<Vec<Component>>;
}

/// Node the pod is scheduled on
fn pod_node(pod: &Pod) -> String {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.clone())
        .unwrap_or_default()
}

/// Parsed launch arguments of the container called `container`
fn container_args(pod: &Pod, container: &str) -> BTreeMap<String, String> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .find(|c| c.name == container)
        .map(|c| {
            parse_args(
                c.command
                    .iter()
                    .flatten()
                    .chain(c.args.iter().flatten()),
            )
        })
        .unwrap_or_default()
}

/// Wait for every per-node result, then fail with the first error if any
fn first_error<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    results.into_iter().collect::<Result<Vec<T>, DiscoveryError>>()
}
