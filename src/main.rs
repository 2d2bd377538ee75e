use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{Level, info};

use kubeprobe_discovery::{Cluster, ExplorerRegistry, Resources};
use kubeprobe_k8s::{KubeApi, KubeClient, KubeExecutor};
use kubeprobe_types::DiscoveryConfig;

/// Kubeprobe - Discover cluster objects, control-plane components and node tunables
#[derive(Parser, Debug)]
#[command(name = "kubeprobe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kubernetes context name (defaults to the current context)
    #[arg(value_name = "CONTEXT")]
    context: Option<String>,

    /// Discovery configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// What to print once discovery completes
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
    output: OutputFormat,

    /// Record component discovery failures instead of aborting
    #[arg(long)]
    tolerate_component_failures: bool,

    /// Log discovery progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Object counts, components and machine count
    Summary,
    /// The complete snapshot
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DiscoveryConfig::default(),
    };
    if args.tolerate_component_failures {
        config.tolerate_component_failures = true;
    }

    let kube_client = KubeClient::new();
    let context = args.context.as_deref().or(kube_client.current_context());
    let client = kube_client.connect(args.context.as_deref()).await?;
    info!(context = context.unwrap_or("in-cluster"), "connected");

    let mut cluster = Cluster::new(
        Arc::new(KubeApi::new(client.clone())),
        Arc::new(KubeExecutor::new(client)),
        config,
        Arc::new(ExplorerRegistry::builtin()),
    );
    cluster.init().await?;
    cluster.sync_resources().await?;

    let resources = cluster
        .resources()
        .context("Discovery finished without publishing a snapshot")?;

    let rendered = match args.output {
        OutputFormat::Summary => {
            serde_json::to_string_pretty(&Summary::new(cluster.cloud_type(), &resources))?
        }
        OutputFormat::Json => serde_json::to_string_pretty(resources.as_ref())?,
    };
    println!("{}", rendered);

    Ok(())
}

/// Read and validate a discovery configuration file
fn load_config(path: &Path) -> Result<DiscoveryConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse_config(text: &str) -> Result<DiscoveryConfig> {
    let config: DiscoveryConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Condensed view of a snapshot
#[derive(Debug, Serialize)]
struct Summary {
    cloud_type: &'static str,
    synced_at: Option<String>,
    objects: BTreeMap<&'static str, usize>,
    /// Nodes with a running instance, per component
    components: BTreeMap<String, Vec<String>>,
    absent_components: Vec<String>,
    component_errors: BTreeMap<String, String>,
    machines: usize,
}

impl Summary {
    fn new(cloud_type: &'static str, resources: &Resources) -> Self {
        let objects = resources
            .inventory
            .counts()
            .into_iter()
            .map(|(kind, count)| (kind.as_str(), count))
            .collect();

        let components = resources
            .core_components
            .keys()
            .map(|name| {
                let nodes = resources
                    .running_components(name)
                    .into_iter()
                    .map(|c| c.node.clone())
                    .collect();
                (name.clone(), nodes)
            })
            .collect();

        let absent_components = resources
            .core_components
            .keys()
            .filter(|name| resources.is_component_absent(name))
            .cloned()
            .collect();

        Self {
            cloud_type,
            synced_at: resources.synced_at.map(|t| t.to_rfc3339()),
            objects,
            components,
            absent_components,
            component_errors: resources.component_errors.clone(),
            machines: resources.machines.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeprobe_discovery::{Component, Machine};
    use kubeprobe_types::BridgeConfig;

    #[test]
    fn test_parse_config_accepts_partial_file() {
        let config = parse_config(
            r#"
            tolerate_component_failures = true

            [bridge]
            type = "none"

            [[components]]
            name = "coredns"
            type = "label"
            labels = { k8s-app = "kube-dns" }
            "#,
        )
        .unwrap();

        assert_eq!(config.bridge, BridgeConfig::None);
        assert!(config.tolerate_component_failures);
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.machine_concurrency, 100);
    }

    #[test]
    fn test_parse_config_runs_validation() {
        let err = parse_config(
            r#"
            [bridge]
            type = "none"

            [[components]]
            name = "kubelet"
            type = "bare"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("kubelet"));
    }

    #[test]
    fn test_summary_separates_running_and_absent() {
        let mut resources = Resources::default();
        resources.core_components.insert(
            "kube-scheduler".to_string(),
            vec![
                Component::running("kube-scheduler".into(), "cp-1".into(), BTreeMap::new()),
                Component::absent("kube-scheduler".into(), "cp-2".into()),
            ],
        );
        resources.core_components.insert("etcd".to_string(), Vec::new());
        resources
            .machines
            .insert("cp-1".to_string(), Machine::default());

        let summary = Summary::new("kubernetes", &resources);
        assert_eq!(summary.components["kube-scheduler"], vec!["cp-1"]);
        assert_eq!(summary.absent_components, vec!["etcd"]);
        assert_eq!(summary.objects["nodes"], 0);
        assert_eq!(summary.machines, 1);
    }
}
