//! Error taxonomy of a discovery run
//!
//! Expected absence is never an error: a missing static pod or a probe that
//! finds no process yields [`Component::absent`](kubeprobe_types::Component)
//! or an empty list instead.

use std::fmt;
use thiserror::Error;

use kubeprobe_k8s::K8sError;
use kubeprobe_types::ConfigError;

/// Substring of a remote error that means the command exited non-zero
pub const EXIT_CODE_MARKER: &str = "terminated with exit code";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cluster discovery has not been initialized")]
    NotInitialized,

    #[error("cluster discovery is already initialized")]
    AlreadyInitialized,

    /// A cluster-API call failed
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: K8sError,
    },

    #[error("remote agent {agent} not found on node {node} in namespace {namespace}")]
    AgentNotFound {
        node: String,
        namespace: String,
        agent: String,
    },

    #[error("{count} remote agent pods match node {node}")]
    AmbiguousAgent { node: String, count: usize },

    /// The exec stream to the agent failed, including non-zero exits
    #[error("remote command on node {node} failed: {source}")]
    Remote {
        node: String,
        #[source]
        source: K8sError,
    },

    #[error("{strategy} explorer failed: {source}")]
    Explorer {
        strategy: &'static str,
        #[source]
        source: Box<DiscoveryError>,
    },

    #[error("failed to discover components: {}", join_failures(.0))]
    Components(Vec<ComponentFailure>),

    #[error("failed to fetch machine info for node {node}: {source}")]
    Machine {
        node: String,
        #[source]
        source: Box<DiscoveryError>,
    },

    #[error("admission gate closed")]
    GateClosed,

    #[error("discovery task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DiscoveryError {
    /// Whether a remote command ran but exited non-zero
    ///
    /// Probes exit non-zero when what they look for is absent, so callers
    /// treat this as "not running" rather than a failure.
    pub fn is_exit_code(&self) -> bool {
        self.to_string().contains(EXIT_CODE_MARKER)
    }
}

/// One component whose dispatcher failed
#[derive(Debug)]
pub struct ComponentFailure {
    pub component: String,
    pub error: DiscoveryError,
}

impl fmt::Display for ComponentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.error)
    }
}

fn join_failures(failures: &[ComponentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = DiscoveryError> = std::result::Result<T, E>;
