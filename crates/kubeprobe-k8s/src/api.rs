use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, LimitRange, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod,
    ResourceQuota, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::ListParams;
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

use crate::error::{K8sError, Result};
use kubeprobe_types::{InventoryKind, InventoryList};

/// Label and field selectors for a pod listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodQuery {
    pub labels: Option<String>,
    pub fields: Option<String>,
}

impl PodQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.labels = Some(selector.into());
        self
    }

    pub fn fields(mut self, selector: impl Into<String>) -> Self {
        self.fields = Some(selector.into());
        self
    }

    /// Build a `k=v,k2=v2` selector from a label map
    pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
        labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn params(&self) -> ListParams {
        let mut params = ListParams::default();
        if let Some(labels) = self.labels.as_deref().filter(|s| !s.is_empty()) {
            params = params.labels(labels);
        }
        if let Some(fields) = self.fields.as_deref().filter(|s| !s.is_empty()) {
            params = params.fields(fields);
        }
        params
    }
}

/// Read access to the cluster API
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List every object of one kind across all namespaces
    async fn list_inventory(&self, kind: InventoryKind) -> Result<InventoryList>;

    /// List pods, in one namespace or all of them
    async fn list_pods(&self, namespace: Option<&str>, query: &PodQuery) -> Result<Vec<Pod>>;

    /// Fetch a pod by name, `None` if it does not exist
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;
}

/// [`ClusterApi`] backed by a `kube::Client`
#[derive(Clone)]
pub struct KubeApi {
    client: kube::Client,
}

impl KubeApi {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    async fn list_all<K>(&self, kind: InventoryKind) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|source| K8sError::List {
                what: kind.to_string(),
                source,
            })?;

        debug!(kind = %kind, count = list.items.len(), "listed objects");
        Ok(list.items)
    }
}

#[async_trait]
impl ClusterApi for KubeApi {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list_all::<Node>(InventoryKind::Nodes).await
    }

    async fn list_inventory(&self, kind: InventoryKind) -> Result<InventoryList> {
        let list = match kind {
            InventoryKind::Nodes => InventoryList::Nodes(self.list_nodes().await?),
            InventoryKind::Namespaces => {
                InventoryList::Namespaces(self.list_all::<Namespace>(kind).await?)
            }
            InventoryKind::Pods => InventoryList::Pods(self.list_all::<Pod>(kind).await?),
            InventoryKind::Deployments => {
                InventoryList::Deployments(self.list_all::<Deployment>(kind).await?)
            }
            InventoryKind::DaemonSets => {
                InventoryList::DaemonSets(self.list_all::<DaemonSet>(kind).await?)
            }
            InventoryKind::StatefulSets => {
                InventoryList::StatefulSets(self.list_all::<StatefulSet>(kind).await?)
            }
            InventoryKind::Jobs => InventoryList::Jobs(self.list_all::<Job>(kind).await?),
            InventoryKind::CronJobs => InventoryList::CronJobs(self.list_all::<CronJob>(kind).await?),
            InventoryKind::Services => InventoryList::Services(self.list_all::<Service>(kind).await?),
            InventoryKind::Ingresses => {
                InventoryList::Ingresses(self.list_all::<Ingress>(kind).await?)
            }
            InventoryKind::NetworkPolicies => {
                InventoryList::NetworkPolicies(self.list_all::<NetworkPolicy>(kind).await?)
            }
            InventoryKind::ServiceAccounts => {
                InventoryList::ServiceAccounts(self.list_all::<ServiceAccount>(kind).await?)
            }
            InventoryKind::Roles => InventoryList::Roles(self.list_all::<Role>(kind).await?),
            InventoryKind::ClusterRoles => {
                InventoryList::ClusterRoles(self.list_all::<ClusterRole>(kind).await?)
            }
            InventoryKind::RoleBindings => {
                InventoryList::RoleBindings(self.list_all::<RoleBinding>(kind).await?)
            }
            InventoryKind::ClusterRoleBindings => {
                InventoryList::ClusterRoleBindings(self.list_all::<ClusterRoleBinding>(kind).await?)
            }
            InventoryKind::Secrets => InventoryList::Secrets(self.list_all::<Secret>(kind).await?),
            InventoryKind::ConfigMaps => {
                InventoryList::ConfigMaps(self.list_all::<ConfigMap>(kind).await?)
            }
            InventoryKind::PersistentVolumes => {
                InventoryList::PersistentVolumes(self.list_all::<PersistentVolume>(kind).await?)
            }
            InventoryKind::PersistentVolumeClaims => InventoryList::PersistentVolumeClaims(
                self.list_all::<PersistentVolumeClaim>(kind).await?,
            ),
            InventoryKind::LimitRanges => {
                InventoryList::LimitRanges(self.list_all::<LimitRange>(kind).await?)
            }
            InventoryKind::ResourceQuotas => {
                InventoryList::ResourceQuotas(self.list_all::<ResourceQuota>(kind).await?)
            }
            InventoryKind::PodDisruptionBudgets => InventoryList::PodDisruptionBudgets(
                self.list_all::<PodDisruptionBudget>(kind).await?,
            ),
            InventoryKind::HorizontalPodAutoscalers => InventoryList::HorizontalPodAutoscalers(
                self.list_all::<HorizontalPodAutoscaler>(kind).await?,
            ),
        };

        Ok(list)
    }

    async fn list_pods(&self, namespace: Option<&str>, query: &PodQuery) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        let list = pods
            .list(&query.params())
            .await
            .map_err(|source| K8sError::List {
                what: format!("pods in {}", namespace.unwrap_or("all namespaces")),
                source,
            })?;

        Ok(list.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.get_opt(name).await.map_err(|source| K8sError::GetPod {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })
    }
}
