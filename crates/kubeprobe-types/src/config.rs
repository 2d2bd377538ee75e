use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Namespace the control plane and the agent live in by default
pub const DEFAULT_NAMESPACE: &str = "kube-system";

/// Value of the agent pods' `k8s-app` label by default
pub const DEFAULT_AGENT_NAME: &str = "kubeprobe-agent";

/// Maximum number of node probes in flight at once by default
pub const DEFAULT_MACHINE_CONCURRENCY: usize = 100;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_agent() -> String {
    DEFAULT_AGENT_NAME.to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("component name must not be empty")]
    EmptyName,

    #[error("component name {0:?} may only contain ASCII letters, digits, '-', '_' and '.'")]
    InvalidName(String),

    #[error("component {0} is configured more than once")]
    Duplicate(String),

    #[error("component {0} has an empty namespace")]
    EmptyNamespace(String),

    #[error("component {0} uses label discovery but has no labels")]
    MissingLabels(String),

    #[error("component {0} uses static pod discovery but names no nodes and does not target master nodes")]
    MissingNodes(String),

    #[error("component {0} uses bare process discovery but the remote bridge is disabled")]
    BridgeRequired(String),

    #[error("remote bridge {0} must not be empty")]
    InvalidBridge(&'static str),

    #[error("machine concurrency must be greater than zero")]
    ZeroConcurrency,
}

// ============================================================================
// Explorer Kinds
// ============================================================================

/// A concrete strategy for finding a component
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExplorerKind {
    Label,
    StaticPod,
    Bare,
}

impl ExplorerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::StaticPod => "staticpod",
            Self::Bare => "bare",
        }
    }
}

impl fmt::Display for ExplorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Component Configuration
// ============================================================================

/// How a component is looked for, tagged by `type`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComponentSource {
    /// Try label, static pod, then bare process discovery
    Auto {
        #[serde(default)]
        labels: BTreeMap<String, String>,
        #[serde(default)]
        nodes: Vec<String>,
        #[serde(default)]
        master_nodes: bool,
    },
    Label {
        labels: BTreeMap<String, String>,
    },
    #[serde(rename = "staticpod")]
    StaticPod {
        #[serde(default)]
        nodes: Vec<String>,
        #[serde(default)]
        master_nodes: bool,
    },
    Bare {
        #[serde(default)]
        nodes: Vec<String>,
        #[serde(default)]
        master_nodes: bool,
    },
}

impl ComponentSource {
    /// Whether this source allows the given explorer to be tried
    pub fn permits(&self, kind: ExplorerKind) -> bool {
        matches!(
            (self, kind),
            (Self::Auto { .. }, _)
                | (Self::Label { .. }, ExplorerKind::Label)
                | (Self::StaticPod { .. }, ExplorerKind::StaticPod)
                | (Self::Bare { .. }, ExplorerKind::Bare)
        )
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Auto { labels, .. } | Self::Label { labels } => Some(labels),
            _ => None,
        }
    }

    /// Explicitly configured nodes
    pub fn nodes(&self) -> &[String] {
        match self {
            Self::Auto { nodes, .. } | Self::StaticPod { nodes, .. } | Self::Bare { nodes, .. } => {
                nodes
            }
            Self::Label { .. } => &[],
        }
    }

    pub fn master_nodes(&self) -> bool {
        match self {
            Self::Auto { master_nodes, .. }
            | Self::StaticPod { master_nodes, .. }
            | Self::Bare { master_nodes, .. } => *master_nodes,
            Self::Label { .. } => false,
        }
    }

    /// Whether the caller pinned the component to specific nodes
    pub fn targets_nodes(&self) -> bool {
        self.master_nodes() || !self.nodes().is_empty()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Auto { .. } => "auto",
            Self::Label { .. } => "label",
            Self::StaticPod { .. } => "staticpod",
            Self::Bare { .. } => "bare",
        }
    }
}

/// A tracked component
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(flatten)]
    pub source: ComponentSource,
}

impl ComponentConfig {
    /// A control-plane component found through `component=<name>` on master nodes
    pub fn control_plane(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: default_namespace(),
            source: ComponentSource::Auto {
                labels: BTreeMap::from([("component".to_string(), name.to_string())]),
                nodes: Vec::new(),
                master_nodes: true,
            },
        }
    }

    fn validate(&self, bridge: &BridgeConfig) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let safe = self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }

        if self.namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace(self.name.clone()));
        }

        match &self.source {
            ComponentSource::Label { labels } if labels.is_empty() => {
                Err(ConfigError::MissingLabels(self.name.clone()))
            }
            ComponentSource::StaticPod { .. } if !self.source.targets_nodes() => {
                Err(ConfigError::MissingNodes(self.name.clone()))
            }
            ComponentSource::Bare { .. } if !bridge.is_enabled() => {
                Err(ConfigError::BridgeRequired(self.name.clone()))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Bridge Configuration
// ============================================================================

/// How commands reach the nodes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeConfig {
    /// Exec into a per-node agent pod labelled `k8s-app=<agent>`
    Proxy {
        #[serde(default = "default_namespace")]
        namespace: String,
        #[serde(default = "default_agent")]
        agent: String,
    },
    /// No remote execution
    None,
}

impl BridgeConfig {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Proxy { .. })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Proxy { namespace, .. } if namespace.is_empty() => {
                Err(ConfigError::InvalidBridge("namespace"))
            }
            Self::Proxy { agent, .. } if agent.is_empty() => {
                Err(ConfigError::InvalidBridge("agent"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::Proxy {
            namespace: default_namespace(),
            agent: default_agent(),
        }
    }
}

// ============================================================================
// Discovery Configuration
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub bridge: BridgeConfig,
    pub components: Vec<ComponentConfig>,

    /// Keep syncing when a component's discovery fails, recording the error
    pub tolerate_component_failures: bool,

    /// Upper bound on concurrent node probes
    pub machine_concurrency: usize,
}

impl DiscoveryConfig {
    /// Check the whole configuration before any discovery happens
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bridge.validate()?;

        if self.machine_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let mut seen = HashSet::new();
        for component in &self.components {
            component.validate(&self.bridge)?;
            if !seen.insert(component.name.as_str()) {
                return Err(ConfigError::Duplicate(component.name.clone()));
            }
        }

        Ok(())
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let mut components: Vec<ComponentConfig> = [
            "kube-apiserver",
            "kube-controller-manager",
            "kube-scheduler",
            "etcd",
        ]
        .into_iter()
        .map(ComponentConfig::control_plane)
        .collect();

        components.push(ComponentConfig {
            name: "kube-proxy".to_string(),
            namespace: default_namespace(),
            source: ComponentSource::Auto {
                labels: BTreeMap::from([("k8s-app".to_string(), "kube-proxy".to_string())]),
                nodes: Vec::new(),
                master_nodes: false,
            },
        });

        components.push(ComponentConfig {
            name: "kubelet".to_string(),
            namespace: default_namespace(),
            source: ComponentSource::Bare {
                nodes: Vec::new(),
                master_nodes: false,
            },
        });

        Self {
            bridge: BridgeConfig::default(),
            components,
            tolerate_component_failures: false,
            machine_concurrency: DEFAULT_MACHINE_CONCURRENCY,
        }
    }
}
