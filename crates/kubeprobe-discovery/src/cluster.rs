//! Cluster façade: wires explorers together once and serves snapshots

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use kubeprobe_k8s::{ClusterApi, PodExecutor};
use kubeprobe_types::{BridgeConfig, DiscoveryConfig, Resources, resolve_nodes};

use crate::bridge::{NodeExecutor, RemoteBridge};
use crate::collector::ResourceCollector;
use crate::error::{DiscoveryError, Result};
use crate::explorer::AutoExplorer;
use crate::gate::AdmissionGate;
use crate::registry::{ExplorerContext, ExplorerRegistry};

/// Provider type reported for every cluster
pub const CLOUD_TYPE: &str = "kubernetes";

pub struct Cluster {
    api: Arc<dyn ClusterApi>,
    executor: Arc<dyn PodExecutor>,
    config: DiscoveryConfig,
    registry: Arc<ExplorerRegistry>,
    collector: Option<ResourceCollector>,
    tracked: Vec<String>,
    resources: RwLock<Option<Arc<Resources>>>,
}

impl Cluster {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        executor: Arc<dyn PodExecutor>,
        config: DiscoveryConfig,
        registry: Arc<ExplorerRegistry>,
    ) -> Self {
        Self {
            api,
            executor,
            config,
            registry,
            collector: None,
            tracked: Vec::new(),
            resources: RwLock::new(None),
        }
    }

    /// Resolve target nodes and build one auto dispatcher per configured component
    ///
    /// All explorers share one gate of `machine_concurrency` permits, so the
    /// component stage never has more per-node calls in flight than that.
    ///
    /// Node lists are resolved against the nodes present now; nodes joining
    /// later are seen by the bulk fetch and the machine fetch but not by
    /// component discovery until the façade is rebuilt.
    pub async fn init(&mut self) -> Result<()> {
        if self.collector.is_some() {
            return Err(DiscoveryError::AlreadyInitialized);
        }
        self.config.validate()?;

        let bridge: Option<Arc<dyn NodeExecutor>> = match &self.config.bridge {
            BridgeConfig::Proxy { namespace, agent } => Some(Arc::new(RemoteBridge::new(
                Arc::clone(&self.api),
                Arc::clone(&self.executor),
                namespace.clone(),
                agent.clone(),
            ))),
            BridgeConfig::None => None,
        };

        let nodes = self
            .api
            .list_nodes()
            .await
            .map_err(|source| DiscoveryError::Transport {
                context: "failed to list nodes".to_string(),
                source,
            })?;

        let gate = AdmissionGate::new(self.config.machine_concurrency);
        let mut dispatchers = Vec::with_capacity(self.config.components.len());
        for component in &self.config.components {
            let source = &component.source;
            let targets = resolve_nodes(&nodes, source.nodes(), source.master_nodes());

            let ctx = ExplorerContext {
                component,
                nodes: &targets,
                api: &self.api,
                bridge: bridge.as_ref(),
                gate: &gate,
            };
            let chain = self.registry.chain(&ctx);
            if chain.is_empty() {
                warn!(component = %component.name, "no applicable explorer, component will always be absent");
            }

            let dispatcher = AutoExplorer::new(component.name.clone(), chain);
            debug!(
                component = %component.name,
                strategies = ?dispatcher.strategies(),
                nodes = targets.len(),
                "component dispatcher ready"
            );
            dispatchers.push(Arc::new(dispatcher));
        }

        self.tracked = self
            .config
            .components
            .iter()
            .map(|c| c.name.clone())
            .collect();
        self.collector = Some(ResourceCollector::new(
            Arc::clone(&self.api),
            bridge,
            dispatchers,
            &self.config,
        ));

        info!(
            nodes = nodes.len(),
            components = self.tracked.len(),
            bridge = self.config.bridge.is_enabled(),
            "cluster discovery initialized"
        );
        Ok(())
    }

    /// Run a full discovery and publish the new snapshot
    ///
    /// On failure the previously published snapshot stays in place.
    pub async fn sync_resources(&self) -> Result<()> {
        let collector = self
            .collector
            .as_ref()
            .ok_or(DiscoveryError::NotInitialized)?;

        let resources = collector.collect().await?;
        *self.resources.write() = Some(Arc::new(resources));
        Ok(())
    }

    /// The latest published snapshot, if any sync has succeeded
    pub fn resources(&self) -> Option<Arc<Resources>> {
        self.resources.read().clone()
    }

    pub fn cloud_type(&self) -> &'static str {
        CLOUD_TYPE
    }

    /// Names of the components being discovered, in configuration order
    pub fn tracked_components(&self) -> &[String] {
        &self.tracked
    }

    pub fn is_initialized(&self) -> bool {
        self.collector.is_some()
    }
}
