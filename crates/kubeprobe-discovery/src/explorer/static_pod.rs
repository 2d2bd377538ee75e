use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use kubeprobe_k8s::ClusterApi;
use kubeprobe_types::{Component, ExplorerKind};

use super::{Explorer, container_args, first_error};
use crate::error::{DiscoveryError, Result};
use crate::gate::AdmissionGate;

/// Finds a component through the mirror pods the kubelet creates for static
/// manifests, named `<component>-<node>`
pub struct StaticPodExplorer {
    api: Arc<dyn ClusterApi>,
    gate: AdmissionGate,
    name: String,
    namespace: String,
    nodes: Vec<String>,
}

impl StaticPodExplorer {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        gate: AdmissionGate,
        name: impl Into<String>,
        namespace: impl Into<String>,
        nodes: Vec<String>,
    ) -> Self {
        Self {
            api,
            gate,
            name: name.into(),
            namespace: namespace.into(),
            nodes,
        }
    }

    async fn lookup(&self, node: &str) -> Result<Component> {
        let _permit = self.gate.admit().await?;
        let pod_name = format!("{}-{}", self.name, node);
        let pod = self
            .api
            .get_pod(&self.namespace, &pod_name)
            .await
            .map_err(|source| DiscoveryError::Transport {
                context: format!("failed to look up static pod {} on node {}", pod_name, node),
                source,
            })?;

        Ok(match pod {
            Some(pod) => Component::running(
                self.name.clone(),
                node.to_string(),
                container_args(&pod, &self.name),
            ),
            None => {
                debug!(component = %self.name, node, "static pod not found");
                Component::absent(self.name.clone(), node.to_string())
            }
        })
    }
}

#[async_trait]
impl Explorer for StaticPodExplorer {
    fn strategy(&self) -> &'static str {
        ExplorerKind::StaticPod.as_str()
    }

    async fn components(&self) -> Result<Vec<Component>> {
        let results = join_all(self.nodes.iter().map(|node| self.lookup(node))).await;
        first_error(results)
    }
}
