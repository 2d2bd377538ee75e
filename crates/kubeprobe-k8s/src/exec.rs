use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::Api;
use kube::api::AttachParams;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{K8sError, Result};
use kubeprobe_types::ExecOutput;

/// Runs a command inside a pod and captures its output
#[async_trait]
pub trait PodExecutor: Send + Sync {
    async fn exec(&self, namespace: &str, pod: &str, command: &[String]) -> Result<ExecOutput>;
}

/// [`PodExecutor`] over the `pods/exec` sub-resource
#[derive(Clone)]
pub struct KubeExecutor {
    client: kube::Client,
}

impl KubeExecutor {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodExecutor for KubeExecutor {
    async fn exec(&self, namespace: &str, pod: &str, command: &[String]) -> Result<ExecOutput> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);

        debug!(namespace, pod, ?command, "opening exec stream");
        let mut attached = pods
            .exec(pod, command.to_vec(), &params)
            .await
            .map_err(|source| K8sError::Attach {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
                source,
            })?;

        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let status = attached.take_status();

        // Both streams must be drained together or a full pipe stalls the remote side
        let (stdout, stderr) = tokio::try_join!(drain(stdout), drain(stderr)).map_err(|source| {
            K8sError::Io {
                pod: pod.to_string(),
                source,
            }
        })?;

        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        attached
            .join()
            .await
            .map_err(|e| K8sError::Stream(e.to_string()))?;

        check_status(status)?;
        Ok(ExecOutput { stdout, stderr })
    }
}

async fn drain<R>(reader: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Map the terminal status of an exec stream to a result
fn check_status(status: Option<Status>) -> Result<()> {
    let Some(status) = status else {
        return Ok(());
    };

    if status.status.as_deref() == Some("Success") {
        return Ok(());
    }

    if status.reason.as_deref() == Some("NonZeroExitCode") {
        let code = status
            .details
            .as_ref()
            .and_then(|d| d.causes.as_ref())
            .and_then(|causes| {
                causes
                    .iter()
                    .find(|c| c.reason.as_deref() == Some("ExitCode"))
            })
            .and_then(|c| c.message.as_deref())
            .and_then(|m| m.trim().parse::<i32>().ok());

        if let Some(code) = code {
            return Err(K8sError::ExitCode { code });
        }
    }

    Err(K8sError::Stream(
        status
            .message
            .unwrap_or_else(|| "unknown exec failure".to_string()),
    ))
}
