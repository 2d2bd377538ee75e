use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use kubeprobe_types::{Component, ExplorerKind};

use super::{Explorer, first_error};
use crate::bridge::NodeExecutor;
use crate::error::Result;
use crate::gate::AdmissionGate;
use crate::parse::parse_args;

/// Shell probe printing the PID of `process`, then one argument per line
///
/// Exits non-zero when no such process exists.
pub fn probe_command(process: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!(
            "pid=$(pidof -s {}) && echo \"$pid\" && tr '\\0' '\\n' < /proc/$pid/cmdline | tail -n +2",
            process
        ),
    ]
}

/// Finds a component by inspecting the process table of each node
///
/// Nodes are probed in parallel, each probe holding a permit of `gate`.
pub struct BareExplorer {
    bridge: Arc<dyn NodeExecutor>,
    gate: AdmissionGate,
    name: String,
    nodes: Vec<String>,
}

impl BareExplorer {
    pub fn new(
        bridge: Arc<dyn NodeExecutor>,
        gate: AdmissionGate,
        name: impl Into<String>,
        nodes: Vec<String>,
    ) -> Self {
        Self {
            bridge,
            gate,
            name: name.into(),
            nodes,
        }
    }

    async fn probe(&self, node: &str) -> Result<Component> {
        let _permit = self.gate.admit().await?;
        match self.bridge.execute(node, &probe_command(&self.name)).await {
            Ok(output) => Ok(self.parse_probe(node, &output.stdout)),
            Err(e) if e.is_exit_code() => {
                debug!(component = %self.name, node, "process not running");
                Ok(Component::absent(self.name.clone(), node.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// First line is the PID, the rest are arguments
    fn parse_probe(&self, node: &str, stdout: &str) -> Component {
        let mut lines = stdout.lines();
        let pid = lines.next().map(str::trim).unwrap_or_default();

        if pid.is_empty() || pid.parse::<u32>().is_err() {
            return Component::absent(self.name.clone(), node.to_string());
        }

        Component::running(self.name.clone(), node.to_string(), parse_args(lines))
    }
}

#[async_trait]
impl Explorer for BareExplorer {
    fn strategy(&self) -> &'static str {
        ExplorerKind::Bare.as_str()
    }

    async fn components(&self) -> Result<Vec<Component>> {
        let results = join_all(self.nodes.iter().map(|node| self.probe(node))).await;
        first_error(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RemoteBridge;
    use crate::error::DiscoveryError;
    use crate::testing::{FakeApi, FakeExecutor, agent_pod, node};
    use kubeprobe_k8s::{ExecOutput, K8sError};
    use std::time::Duration;

    fn explorer_on(
        api: FakeApi,
        executor: Arc<FakeExecutor>,
        gate: AdmissionGate,
        nodes: Vec<String>,
    ) -> BareExplorer {
        let bridge = RemoteBridge::new(Arc::new(api), executor, "kube-system", "kubeprobe-agent");
        BareExplorer::new(Arc::new(bridge), gate, "kubelet", nodes)
    }

    fn explorer(executor: FakeExecutor) -> BareExplorer {
        let api = FakeApi::new(
            vec![node("worker-1", false), node("worker-2", false)],
            vec![agent_pod("worker-1"), agent_pod("worker-2")],
        );
        explorer_on(
            api,
            Arc::new(executor),
            AdmissionGate::new(100),
            vec!["worker-1".to_string(), "worker-2".to_string()],
        )
    }

    #[test]
    fn test_probe_command_targets_process() {
        let command = probe_command("kubelet");
        assert_eq!(command[..2], ["sh", "-c"]);
        assert!(command[2].starts_with("pid=$(pidof -s kubelet) && "));
        assert!(command[2].contains("/proc/$pid/cmdline"));
    }

    #[tokio::test]
    async fn test_running_process_arguments() {
        let executor = FakeExecutor::new(|pod, _| match pod {
            "kubeprobe-agent-worker-1" => Ok(ExecOutput::new(
                "4242\n--kubeconfig=/etc/kubernetes/kubelet.conf\n--Max-Pods=110\n--v=2\n",
                "",
            )),
            _ => Err(K8sError::ExitCode { code: 1 }),
        });

        let found = explorer(executor).components().await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].is_running);
        assert_eq!(found[0].arg("max-pods"), Some("110"));
        assert_eq!(found[0].arg("kubeconfig"), Some("/etc/kubernetes/kubelet.conf"));
        assert_eq!(found[1], Component::absent("kubelet".into(), "worker-2".into()));
    }

    #[tokio::test]
    async fn test_empty_output_is_not_running() {
        let executor = FakeExecutor::new(|_, _| Ok(ExecOutput::new("\n", "")));
        let found = explorer(executor).components().await.unwrap();
        assert!(found.iter().all(|c| !c.is_running && c.args.is_empty()));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let executor = FakeExecutor::new(|_, _| Err(K8sError::Stream("websocket closed".into())));
        let err = explorer(executor).components().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Remote { .. }));
        assert!(!err.is_exit_code());
    }

    #[tokio::test]
    async fn test_missing_agent_stays_an_error() {
        let api = FakeApi::new(
            vec![node("worker-1", false), node("worker-2", false)],
            vec![agent_pod("worker-1")],
        );
        let executor = Arc::new(FakeExecutor::new(|_, _| Err(K8sError::ExitCode { code: 1 })));
        let explorer = explorer_on(
            api,
            executor,
            AdmissionGate::new(100),
            vec!["worker-1".to_string(), "worker-2".to_string()],
        );

        let err = explorer.components().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::AgentNotFound { ref node, .. } if node == "worker-2"));
        assert!(!err.is_exit_code());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_probes_share_the_gate() {
        let names: Vec<String> = (0..60).map(|i| format!("worker-{i}")).collect();
        let api = FakeApi::new(
            names.iter().map(|n| node(n, false)).collect(),
            names.iter().map(|n| agent_pod(n)).collect(),
        );
        let executor = Arc::new(
            FakeExecutor::new(|_, _| Ok(ExecOutput::new("812\n--v=2\n", "")))
                .with_delay(Duration::from_millis(10)),
        );
        let gate = AdmissionGate::new(8);
        let explorer = explorer_on(api, Arc::clone(&executor), gate.clone(), names);

        let found = explorer.components().await.unwrap();
        assert_eq!(found.len(), 60);
        assert!(found.iter().all(|c| c.is_running));
        assert!(executor.peak() <= 8, "peak was {}", executor.peak());
        assert_eq!(gate.available(), 8);
    }
}
