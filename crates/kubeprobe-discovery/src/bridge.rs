//! Remote command execution on cluster nodes
//!
//! Nodes are never contacted directly. Every node runs an agent pod
//! (privileged, sharing the host PID namespace) labelled
//! `k8s-app=<agent>`; a command for a node is sent over the cluster API's
//! exec stream to that node's agent and entered into the host's namespaces
//! with `nsenter`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use kubeprobe_k8s::{ClusterApi, ExecOutput, PodExecutor, PodQuery};
use kubeprobe_types::AGENT_LABEL_KEY;

use crate::error::{DiscoveryError, Result};

/// Prepended to every command so it runs in the namespaces of the node's PID 1
pub const HOST_NAMESPACE_PREFIX: [&str; 9] = [
    "nsenter", "--target", "1", "--mount", "--uts", "--ipc", "--net", "--pid", "--",
];

/// Runs a command on a named node
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &str, command: &[String]) -> Result<ExecOutput>;
}

/// [`NodeExecutor`] that tunnels through the per-node agent pod
pub struct RemoteBridge {
    api: Arc<dyn ClusterApi>,
    executor: Arc<dyn PodExecutor>,
    namespace: String,
    agent: String,
}

impl RemoteBridge {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        executor: Arc<dyn PodExecutor>,
        namespace: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            api,
            executor,
            namespace: namespace.into(),
            agent: agent.into(),
        }
    }

    /// Label selector matching the agent pods
    pub fn agent_selector(&self) -> String {
        format!("{}={}", AGENT_LABEL_KEY, self.agent)
    }

    /// Name of the single agent pod scheduled on `node`
    async fn agent_pod(&self, node: &str) -> Result<String> {
        let query = PodQuery::new()
            .labels(self.agent_selector())
            .fields(format!("spec.nodeName={}", node));

        let pods = self
            .api
            .list_pods(Some(&self.namespace), &query)
            .await
            .map_err(|source| DiscoveryError::Transport {
                context: format!("failed to find remote agent on node {}", node),
                source,
            })?;

        match pods.as_slice() {
            [pod] => pod
                .metadata
                .name
                .clone()
                .ok_or_else(|| DiscoveryError::AgentNotFound {
                    node: node.to_string(),
                    namespace: self.namespace.clone(),
                    agent: self.agent.clone(),
                }),
            [] => Err(DiscoveryError::AgentNotFound {
                node: node.to_string(),
                namespace: self.namespace.clone(),
                agent: self.agent.clone(),
            }),
            many => Err(DiscoveryError::AmbiguousAgent {
                node: node.to_string(),
                count: many.len(),
            }),
        }
    }
}

#[async_trait]
impl NodeExecutor for RemoteBridge {
    async fn execute(&self, node: &str, command: &[String]) -> Result<ExecOutput> {
        let pod = self.agent_pod(node).await?;

        let host_command: Vec<String> = HOST_NAMESPACE_PREFIX
            .iter()
            .map(|s| s.to_string())
            .chain(command.iter().cloned())
            .collect();

        debug!(node, pod = %pod, ?command, "running remote command");
        self.executor
            .exec(&self.namespace, &pod, &host_command)
            .await
            .map_err(|source| DiscoveryError::Remote {
                node: node.to_string(),
                source,
            })
    }
}
