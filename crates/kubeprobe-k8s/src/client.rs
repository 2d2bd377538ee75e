use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::Api;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

/// Kubeconfig-aware client factory
pub struct KubeClient {
    kubeconfig: Option<Kubeconfig>,
    current_context: Option<String>,
}

impl KubeClient {
    /// Load the kubeconfig, if there is one
    ///
    /// A missing kubeconfig is not an error: inside a cluster the
    /// service-account configuration is used instead.
    pub fn new() -> Self {
        match Kubeconfig::read() {
            Ok(kubeconfig) => {
                let current_context = kubeconfig.current_context.clone();
                Self {
                    kubeconfig: Some(kubeconfig),
                    current_context,
                }
            }
            Err(e) => {
                debug!(error = %e, "no kubeconfig, relying on in-cluster configuration");
                Self {
                    kubeconfig: None,
                    current_context: None,
                }
            }
        }
    }

    /// Names of all contexts in the kubeconfig
    pub fn contexts(&self) -> Vec<String> {
        self.kubeconfig
            .iter()
            .flat_map(|k| k.contexts.iter().map(|c| c.name.clone()))
            .collect()
    }

    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref()
    }

    /// Connect to the named context, or to the default configuration
    pub async fn connect(&self, context: Option<&str>) -> Result<kube::Client> {
        let client = match context {
            Some(name) => self.client_for_context(name).await?,
            None => kube::Client::try_default()
                .await
                .context("Failed to create client from the default configuration")?,
        };

        self.validate_client(&client)
            .await
            .context("Cluster API is not reachable with the selected credentials")?;

        Ok(client)
    }

    /// Create a kube::Client for a specific context
    pub async fn client_for_context(&self, context_name: &str) -> Result<kube::Client> {
        let kubeconfig = self
            .kubeconfig
            .clone()
            .context("Failed to read kubeconfig. Is kubectl configured?")?;

        if !kubeconfig.contexts.iter().any(|c| c.name == context_name) {
            anyhow::bail!("Context '{}' not found in kubeconfig", context_name);
        }

        let config = kube::Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .context(format!(
            "Failed to create config for context: {}",
            context_name
        ))?;

        kube::Client::try_from(config).context(format!(
            "Failed to create client for context: {}",
            context_name
        ))
    }

    /// Validate that the client can make API calls
    async fn validate_client(&self, client: &kube::Client) -> Result<()> {
        let ns: Api<Namespace> = Api::all(client.clone());
        // Just try to list with limit 1 to validate auth
        ns.list(&ListParams::default().limit(1)).await?;
        Ok(())
    }
}

impl Default for KubeClient {
    fn default() -> Self {
        Self::new()
    }
}
