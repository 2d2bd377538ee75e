use thiserror::Error;

/// Errors talking to the cluster API
#[derive(Debug, Error)]
pub enum K8sError {
    #[error("failed to list {what}: {source}")]
    List {
        what: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to get pod {namespace}/{name}: {source}")]
    GetPod {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to open exec stream to pod {namespace}/{pod}: {source}")]
    Attach {
        namespace: String,
        pod: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to read exec output from pod {pod}: {source}")]
    Io {
        pod: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote command ran and exited non-zero
    #[error("command terminated with exit code {code}")]
    ExitCode { code: i32 },

    /// The exec stream reported a failure other than an exit code
    #[error("exec stream failed: {0}")]
    Stream(String),
}

pub type Result<T, E = K8sError> = std::result::Result<T, E>;
