use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use kubeprobe_k8s::{ClusterApi, PodQuery};
use kubeprobe_types::{Component, ExplorerKind};

use super::{Explorer, container_args, pod_node};
use crate::error::{DiscoveryError, Result};

/// Finds a component by listing the pods that carry its labels
///
/// Every matching pod counts as a running instance.
pub struct LabelExplorer {
    api: Arc<dyn ClusterApi>,
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
}

impl LabelExplorer {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            api,
            name: name.into(),
            namespace: namespace.into(),
            labels,
        }
    }
}

#[async_trait]
impl Explorer for LabelExplorer {
    fn strategy(&self) -> &'static str {
        ExplorerKind::Label.as_str()
    }

    async fn components(&self) -> Result<Vec<Component>> {
        let selector = PodQuery::label_selector(&self.labels);
        let pods = self
            .api
            .list_pods(Some(&self.namespace), &PodQuery::new().labels(selector.as_str()))
            .await
            .map_err(|source| DiscoveryError::Transport {
                context: format!(
                    "failed to list pods matching {} in {}",
                    selector, self.namespace
                ),
                source,
            })?;

        debug!(component = %self.name, selector = %selector, pods = pods.len(), "label lookup");
        Ok(pods
            .iter()
            .map(|pod| {
                Component::running(
                    self.name.clone(),
                    pod_node(pod),
                    container_args(pod, &self.name),
                )
            })
            .collect())
    }
}
