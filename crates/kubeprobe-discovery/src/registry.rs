//! Registration table mapping explorer kinds to constructors
//!
//! The table is built once at start-up and handed to the cluster façade;
//! its order is the order in which the auto dispatcher tries explorers.

use std::sync::Arc;

use kubeprobe_k8s::ClusterApi;
use kubeprobe_types::{ComponentConfig, ExplorerKind};

use crate::bridge::NodeExecutor;
use crate::explorer::{BareExplorer, Explorer, LabelExplorer, StaticPodExplorer};
use crate::gate::AdmissionGate;

/// Everything a factory may use to build an explorer for one component
pub struct ExplorerContext<'a> {
    pub component: &'a ComponentConfig,
    /// Nodes the component is expected on, already resolved
    pub nodes: &'a [String],
    pub api: &'a Arc<dyn ClusterApi>,
    pub bridge: Option<&'a Arc<dyn NodeExecutor>>,
    /// Shared by every per-node lookup and probe of one cluster
    pub gate: &'a AdmissionGate,
}

/// Builds an explorer, or returns `None` when it does not apply to the component
pub type ExplorerFactory = fn(&ExplorerContext<'_>) -> Option<Arc<dyn Explorer>>;

pub struct ExplorerRegistry {
    entries: Vec<(ExplorerKind, ExplorerFactory)>,
}

impl ExplorerRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Label, then static pod, then bare process discovery
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ExplorerKind::Label, label_explorer);
        registry.register(ExplorerKind::StaticPod, static_pod_explorer);
        registry.register(ExplorerKind::Bare, bare_explorer);
        registry
    }

    /// Add a factory, or replace the existing one for `kind` keeping its position
    pub fn register(&mut self, kind: ExplorerKind, factory: ExplorerFactory) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((kind, factory)),
        }
    }

    pub fn kinds(&self) -> Vec<ExplorerKind> {
        self.entries.iter().map(|(kind, _)| *kind).collect()
    }

    /// Candidate explorers for one component, in priority order
    pub fn chain(&self, ctx: &ExplorerContext<'_>) -> Vec<Arc<dyn Explorer>> {
        self.entries
            .iter()
            .filter(|(kind, _)| ctx.component.source.permits(*kind))
            .filter_map(|(_, factory)| factory(ctx))
            .collect()
    }
}

impl Default for ExplorerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn label_explorer(ctx: &ExplorerContext<'_>) -> Option<Arc<dyn Explorer>> {
    let labels = ctx.component.source.labels().filter(|l| !l.is_empty())?;
    Some(Arc::new(LabelExplorer::new(
        Arc::clone(ctx.api),
        ctx.component.name.clone(),
        ctx.component.namespace.clone(),
        labels.clone(),
    )))
}

fn static_pod_explorer(ctx: &ExplorerContext<'_>) -> Option<Arc<dyn Explorer>> {
    if !ctx.component.source.targets_nodes() {
        return None;
    }
    Some(Arc::new(StaticPodExplorer::new(
        Arc::clone(ctx.api),
        ctx.gate.clone(),
        ctx.component.name.clone(),
        ctx.component.namespace.clone(),
        ctx.nodes.to_vec(),
    )))
}

fn bare_explorer(ctx: &ExplorerContext<'_>) -> Option<Arc<dyn Explorer>> {
    let bridge = ctx.bridge?;
    Some(Arc::new(BareExplorer::new(
        Arc::clone(bridge),
        ctx.gate.clone(),
        ctx.component.name.clone(),
        ctx.nodes.to_vec(),
    )))
}
