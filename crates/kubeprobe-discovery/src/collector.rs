//! The discovery pipeline
//!
//! A run goes through three stages, each consuming the previous stage's
//! output: the bulk object fetch produces an [`Inventory`], the component
//! fetch turns it into a [`ComponentStage`], and the machine fetch completes
//! the [`Resources`] snapshot. Work inside a stage runs in parallel; stages
//! never overlap.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use kubeprobe_k8s::ClusterApi;
use kubeprobe_types::{
    Component, DiscoveryConfig, Inventory, InventoryKind, Machine, Resources, node_names,
};

use crate::bridge::NodeExecutor;
use crate::error::{ComponentFailure, DiscoveryError, Result};
use crate::explorer::{AutoExplorer, Explorer};
use crate::gate::AdmissionGate;
use crate::parse::parse_key_values;

/// Command dumping every kernel tunable of a node
pub fn sysctl_command() -> Vec<String> {
    vec!["sysctl".to_string(), "-a".to_string()]
}

/// Output of the component stage
#[derive(Debug)]
pub struct ComponentStage {
    pub inventory: Inventory,
    pub components: BTreeMap<String, Vec<Component>>,
    pub component_errors: BTreeMap<String, String>,
}

pub struct ResourceCollector {
    api: Arc<dyn ClusterApi>,
    bridge: Option<Arc<dyn NodeExecutor>>,
    dispatchers: Vec<Arc<AutoExplorer>>,
    machine_concurrency: usize,
    tolerate_component_failures: bool,
}

impl ResourceCollector {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        bridge: Option<Arc<dyn NodeExecutor>>,
        dispatchers: Vec<Arc<AutoExplorer>>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            api,
            bridge,
            dispatchers,
            machine_concurrency: config.machine_concurrency,
            tolerate_component_failures: config.tolerate_component_failures,
        }
    }

    /// Run all three stages and build a fresh snapshot
    pub async fn collect(&self) -> Result<Resources> {
        let started = Instant::now();

        let inventory = self.fetch_inventory().await?;
        let stage = self.fetch_components(inventory).await?;
        let mut resources = self.fetch_machines(stage).await?;
        resources.synced_at = Some(Utc::now());

        info!(
            nodes = resources.inventory.nodes.len(),
            components = resources.core_components.len(),
            machines = resources.machines.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cluster resources synchronized"
        );
        Ok(resources)
    }

    /// List every object kind in parallel; the first failure aborts the rest
    pub async fn fetch_inventory(&self) -> Result<Inventory> {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for kind in InventoryKind::ALL {
            let api = Arc::clone(&self.api);
            tasks.spawn(async move {
                api.list_inventory(kind)
                    .await
                    .map_err(|source| DiscoveryError::Transport {
                        context: format!("failed to fetch {}", kind),
                        source,
                    })
            });
        }

        let mut inventory = Inventory::default();
        // Returning early drops the set, which aborts the lists still running
        while let Some(joined) = tasks.join_next().await {
            inventory.absorb(joined??);
        }

        debug!(
            kinds = InventoryKind::ALL.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inventory fetched"
        );
        Ok(inventory)
    }

    /// Run every component dispatcher to completion
    ///
    /// All failures are collected. Unless failures are tolerated, any of them
    /// fails the stage.
    pub async fn fetch_components(&self, inventory: Inventory) -> Result<ComponentStage> {
        let found = Arc::new(Mutex::new(BTreeMap::new()));
        let mut tasks = JoinSet::new();

        for dispatcher in &self.dispatchers {
            let dispatcher = Arc::clone(dispatcher);
            let found = Arc::clone(&found);
            tasks.spawn(async move {
                let name = dispatcher.component().to_string();
                match dispatcher.components().await {
                    Ok(components) => {
                        found.lock().insert(name, components);
                        Ok(())
                    }
                    Err(error) => Err(ComponentFailure {
                        component: name,
                        error,
                    }),
                }
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Err(failure) = joined? {
                failures.push(failure);
            }
        }
        failures.sort_by(|a, b| a.component.cmp(&b.component));

        let mut components = std::mem::take(&mut *found.lock());
        let mut component_errors = BTreeMap::new();

        if !failures.is_empty() {
            if !self.tolerate_component_failures {
                return Err(DiscoveryError::Components(failures));
            }

            for failure in failures {
                warn!(component = %failure.component, error = %failure.error, "component discovery failed");
                components.insert(failure.component.clone(), Vec::new());
                component_errors.insert(failure.component, failure.error.to_string());
            }
        }

        Ok(ComponentStage {
            inventory,
            components,
            component_errors,
        })
    }

    /// Read the kernel tunables of every node, at most `machine_concurrency` at a time
    pub async fn fetch_machines(&self, stage: ComponentStage) -> Result<Resources> {
        let ComponentStage {
            inventory,
            components,
            component_errors,
        } = stage;

        let machines = match &self.bridge {
            Some(bridge) => self.probe_nodes(bridge, node_names(&inventory.nodes)).await?,
            None => {
                debug!("remote bridge disabled, skipping machine fetch");
                BTreeMap::new()
            }
        };

        Ok(Resources {
            synced_at: None,
            inventory,
            core_components: components,
            component_errors,
            machines,
        })
    }

    async fn probe_nodes(
        &self,
        bridge: &Arc<dyn NodeExecutor>,
        nodes: Vec<String>,
    ) -> Result<BTreeMap<String, Machine>> {
        let started = Instant::now();
        let gate = AdmissionGate::new(self.machine_concurrency);
        let machines = Arc::new(Mutex::new(BTreeMap::new()));
        let mut tasks = JoinSet::new();

        for node in nodes {
            let gate = gate.clone();
            let bridge = Arc::clone(bridge);
            let machines = Arc::clone(&machines);
            tasks.spawn(async move {
                let _permit = gate.admit().await?;
                let machine = fetch_machine(bridge.as_ref(), &node).await.map_err(|e| {
                    DiscoveryError::Machine {
                        node: node.clone(),
                        source: Box::new(e),
                    }
                })?;
                machines.lock().insert(node, machine);
                Ok::<_, DiscoveryError>(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined??;
        }

        let machines = std::mem::take(&mut *machines.lock());
        debug!(
            machines = machines.len(),
            limit = gate.limit(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "machine info fetched"
        );
        Ok(machines)
    }
}

async fn fetch_machine(bridge: &dyn NodeExecutor, node: &str) -> Result<Machine> {
    let output = bridge.execute(node, &sysctl_command()).await?;
    Ok(Machine::new(parse_key_values(&output.stdout)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RemoteBridge;
    use crate::testing::{FakeApi, FakeExecutor, Outcome, ScriptedExplorer, agent_pod, node};
    use kubeprobe_k8s::{ExecOutput, K8sError};
    use kubeprobe_types::{BridgeConfig, DEFAULT_AGENT_NAME, DEFAULT_NAMESPACE};
    use std::time::Duration;

    fn dispatcher(name: &str, outcome: Outcome) -> Arc<AutoExplorer> {
        let candidate: Arc<dyn Explorer> = Arc::new(ScriptedExplorer::new("label", outcome));
        Arc::new(AutoExplorer::new(name, vec![candidate]))
    }

    fn running(name: &str, node: &str) -> Component {
        Component::running(name.into(), node.into(), BTreeMap::new())
    }

    fn bridge(api: &Arc<dyn ClusterApi>, executor: Arc<FakeExecutor>) -> Arc<dyn NodeExecutor> {
        Arc::new(RemoteBridge::new(
            Arc::clone(api),
            executor,
            DEFAULT_NAMESPACE,
            DEFAULT_AGENT_NAME,
        ))
    }

    fn config(tolerate: bool) -> DiscoveryConfig {
        DiscoveryConfig {
            tolerate_component_failures: tolerate,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_inventory_collects_every_kind() {
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(
            vec![node("cp-1", true), node("worker-1", false)],
            vec![agent_pod("cp-1")],
        ));
        let collector = ResourceCollector::new(api, None, Vec::new(), &config(false));

        let inventory = collector.fetch_inventory().await.unwrap();
        assert_eq!(inventory.count(InventoryKind::Nodes), 2);
        assert_eq!(inventory.count(InventoryKind::Pods), 1);
        assert_eq!(inventory.count(InventoryKind::Secrets), 0);
    }

    #[tokio::test]
    async fn test_inventory_failure_names_the_kind() {
        let api = FakeApi::new(vec![node("cp-1", true)], Vec::new());
        api.fail_inventory(InventoryKind::ConfigMaps);
        let collector = ResourceCollector::new(Arc::new(api), None, Vec::new(), &config(false));

        let err = collector.fetch_inventory().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Transport { .. }));
        assert!(err.to_string().contains("configmaps"));
    }

    #[tokio::test]
    async fn test_component_failures_are_collected_in_order() {
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(Vec::new(), Vec::new()));
        let dispatchers = vec![
            dispatcher("kube-scheduler", Outcome::Fail("scheduler lookup")),
            dispatcher("etcd", Outcome::Fail("etcd lookup")),
            dispatcher("kube-proxy", Outcome::Found(vec![running("kube-proxy", "cp-1")])),
        ];
        let collector = ResourceCollector::new(api, None, dispatchers, &config(false));

        let err = collector
            .fetch_components(Inventory::default())
            .await
            .unwrap_err();
        let DiscoveryError::Components(failures) = err else {
            panic!("expected component failures, got {err:?}");
        };
        let names: Vec<_> = failures.iter().map(|f| f.component.as_str()).collect();
        assert_eq!(names, vec!["etcd", "kube-scheduler"]);
    }

    #[tokio::test]
    async fn test_tolerated_failures_leave_empty_entries() {
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(Vec::new(), Vec::new()));
        let dispatchers = vec![
            dispatcher("etcd", Outcome::Fail("etcd lookup")),
            dispatcher("kube-proxy", Outcome::Found(vec![running("kube-proxy", "cp-1")])),
        ];
        let collector = ResourceCollector::new(api, None, dispatchers, &config(true));

        let stage = collector
            .fetch_components(Inventory::default())
            .await
            .unwrap();
        assert_eq!(stage.components["etcd"], Vec::new());
        assert_eq!(stage.components["kube-proxy"].len(), 1);
        assert!(stage.component_errors["etcd"].contains("etcd lookup"));
        assert!(!stage.component_errors.contains_key("kube-proxy"));
    }

    #[tokio::test]
    async fn test_machines_skipped_without_bridge() {
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(vec![node("cp-1", true)], Vec::new()));
        let mut config = config(false);
        config.bridge = BridgeConfig::None;
        let collector = ResourceCollector::new(api, None, Vec::new(), &config);

        let resources = collector.collect().await.unwrap();
        assert!(resources.machines.is_empty());
        assert!(resources.synced_at.is_some());
        assert_eq!(resources.node_names(), vec!["cp-1"]);
    }

    #[tokio::test]
    async fn test_machines_parse_sysctl_output() {
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(
            vec![node("cp-1", true), node("worker-1", false)],
            vec![agent_pod("cp-1"), agent_pod("worker-1")],
        ));
        let executor = Arc::new(FakeExecutor::new(|pod, command| {
            assert_eq!(command, "sysctl -a");
            let forwarding = if pod.ends_with("cp-1") { "1" } else { "0" };
            Ok(ExecOutput::new(
                format!("net.ipv4.ip_forward = {}\nkernel.pid_max = 4194304\n", forwarding),
                "",
            ))
        }));
        let collector = ResourceCollector::new(
            Arc::clone(&api),
            Some(bridge(&api, executor)),
            Vec::new(),
            &config(false),
        );

        let resources = collector.collect().await.unwrap();
        assert_eq!(resources.machines.len(), 2);
        assert_eq!(resources.machine("cp-1").unwrap().get("net.ipv4.ip_forward"), Some("1"));
        assert_eq!(
            resources.machine("worker-1").unwrap().get("net.ipv4.ip_forward"),
            Some("0")
        );
        assert_eq!(
            resources.machine("worker-1").unwrap().get("kernel.pid_max"),
            Some("4194304")
        );
    }

    #[tokio::test]
    async fn test_machine_failure_names_the_node() {
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(
            vec![node("cp-1", true), node("worker-1", false)],
            vec![agent_pod("cp-1"), agent_pod("worker-1")],
        ));
        let executor = Arc::new(FakeExecutor::new(|pod, _| {
            if pod.ends_with("worker-1") {
                Err(K8sError::ExitCode { code: 1 })
            } else {
                Ok(ExecOutput::default())
            }
        }));
        let collector = ResourceCollector::new(
            Arc::clone(&api),
            Some(bridge(&api, executor)),
            Vec::new(),
            &config(false),
        );

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Machine { ref node, .. } if node == "worker-1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_machine_fetch_is_bounded() {
        let nodes: Vec<_> = (0..40).map(|i| node(&format!("node-{i}"), false)).collect();
        let agents: Vec<_> = (0..40).map(|i| agent_pod(&format!("node-{i}"))).collect();
        let api: Arc<dyn ClusterApi> = Arc::new(FakeApi::new(nodes, agents));
        let executor = Arc::new(
            FakeExecutor::new(|_, _| Ok(ExecOutput::new("vm.swappiness = 60\n", "")))
                .with_delay(Duration::from_millis(20)),
        );

        let mut config = config(false);
        config.machine_concurrency = 5;
        let collector = ResourceCollector::new(
            Arc::clone(&api),
            Some(bridge(&api, Arc::clone(&executor))),
            Vec::new(),
            &config,
        );

        let resources = collector.collect().await.unwrap();
        assert_eq!(resources.machines.len(), 40);
        assert!(executor.peak() <= 5, "peak was {}", executor.peak());
        assert!(executor.peak() > 1);
    }

    #[test]
    fn test_sysctl_command() {
        assert_eq!(sysctl_command(), vec!["sysctl", "-a"]);
    }
}
