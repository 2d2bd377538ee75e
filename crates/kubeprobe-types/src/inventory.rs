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
use serde::{Serialize, Serializer};
use std::fmt;

/// One object list fetched during the bulk phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InventoryKind {
    Nodes,
    Namespaces,
    Pods,
    Deployments,
    DaemonSets,
    StatefulSets,
    Jobs,
    CronJobs,
    Services,
    Ingresses,
    NetworkPolicies,
    ServiceAccounts,
    Roles,
    ClusterRoles,
    RoleBindings,
    ClusterRoleBindings,
    Secrets,
    ConfigMaps,
    PersistentVolumes,
    PersistentVolumeClaims,
    LimitRanges,
    ResourceQuotas,
    PodDisruptionBudgets,
    HorizontalPodAutoscalers,
}

impl InventoryKind {
    /// Every kind, in the order they are issued
    pub const ALL: [InventoryKind; 24] = [
        Self::Nodes,
        Self::Namespaces,
        Self::Pods,
        Self::Deployments,
        Self::DaemonSets,
        Self::StatefulSets,
        Self::Jobs,
        Self::CronJobs,
        Self::Services,
        Self::Ingresses,
        Self::NetworkPolicies,
        Self::ServiceAccounts,
        Self::Roles,
        Self::ClusterRoles,
        Self::RoleBindings,
        Self::ClusterRoleBindings,
        Self::Secrets,
        Self::ConfigMaps,
        Self::PersistentVolumes,
        Self::PersistentVolumeClaims,
        Self::LimitRanges,
        Self::ResourceQuotas,
        Self::PodDisruptionBudgets,
        Self::HorizontalPodAutoscalers,
    ];

    /// Plural resource name, as used in API paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Namespaces => "namespaces",
            Self::Pods => "pods",
            Self::Deployments => "deployments",
            Self::DaemonSets => "daemonsets",
            Self::StatefulSets => "statefulsets",
            Self::Jobs => "jobs",
            Self::CronJobs => "cronjobs",
            Self::Services => "services",
            Self::Ingresses => "ingresses",
            Self::NetworkPolicies => "networkpolicies",
            Self::ServiceAccounts => "serviceaccounts",
            Self::Roles => "roles",
            Self::ClusterRoles => "clusterroles",
            Self::RoleBindings => "rolebindings",
            Self::ClusterRoleBindings => "clusterrolebindings",
            Self::Secrets => "secrets",
            Self::ConfigMaps => "configmaps",
            Self::PersistentVolumes => "persistentvolumes",
            Self::PersistentVolumeClaims => "persistentvolumeclaims",
            Self::LimitRanges => "limitranges",
            Self::ResourceQuotas => "resourcequotas",
            Self::PodDisruptionBudgets => "poddisruptionbudgets",
            Self::HorizontalPodAutoscalers => "horizontalpodautoscalers",
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed result of listing one [`InventoryKind`]
#[derive(Clone, Debug)]
pub enum InventoryList {
    Nodes(Vec<Node>),
    Namespaces(Vec<Namespace>),
    Pods(Vec<Pod>),
    Deployments(Vec<Deployment>),
    DaemonSets(Vec<DaemonSet>),
    StatefulSets(Vec<StatefulSet>),
    Jobs(Vec<Job>),
    CronJobs(Vec<CronJob>),
    Services(Vec<Service>),
    Ingresses(Vec<Ingress>),
    NetworkPolicies(Vec<NetworkPolicy>),
    ServiceAccounts(Vec<ServiceAccount>),
    Roles(Vec<Role>),
    ClusterRoles(Vec<ClusterRole>),
    RoleBindings(Vec<RoleBinding>),
    ClusterRoleBindings(Vec<ClusterRoleBinding>),
    Secrets(Vec<Secret>),
    ConfigMaps(Vec<ConfigMap>),
    PersistentVolumes(Vec<PersistentVolume>),
    PersistentVolumeClaims(Vec<PersistentVolumeClaim>),
    LimitRanges(Vec<LimitRange>),
    ResourceQuotas(Vec<ResourceQuota>),
    PodDisruptionBudgets(Vec<PodDisruptionBudget>),
    HorizontalPodAutoscalers(Vec<HorizontalPodAutoscaler>),
}

impl InventoryList {
    /// An empty list of the given kind
    pub fn empty(kind: InventoryKind) -> Self {
        match kind {
            InventoryKind::Nodes => Self::Nodes(Vec::new()),
            InventoryKind::Namespaces => Self::Namespaces(Vec::new()),
            InventoryKind::Pods => Self::Pods(Vec::new()),
            InventoryKind::Deployments => Self::Deployments(Vec::new()),
            InventoryKind::DaemonSets => Self::DaemonSets(Vec::new()),
            InventoryKind::StatefulSets => Self::StatefulSets(Vec::new()),
            InventoryKind::Jobs => Self::Jobs(Vec::new()),
            InventoryKind::CronJobs => Self::CronJobs(Vec::new()),
            InventoryKind::Services => Self::Services(Vec::new()),
            InventoryKind::Ingresses => Self::Ingresses(Vec::new()),
            InventoryKind::NetworkPolicies => Self::NetworkPolicies(Vec::new()),
            InventoryKind::ServiceAccounts => Self::ServiceAccounts(Vec::new()),
            InventoryKind::Roles => Self::Roles(Vec::new()),
            InventoryKind::ClusterRoles => Self::ClusterRoles(Vec::new()),
            InventoryKind::RoleBindings => Self::RoleBindings(Vec::new()),
            InventoryKind::ClusterRoleBindings => Self::ClusterRoleBindings(Vec::new()),
            InventoryKind::Secrets => Self::Secrets(Vec::new()),
            InventoryKind::ConfigMaps => Self::ConfigMaps(Vec::new()),
            InventoryKind::PersistentVolumes => Self::PersistentVolumes(Vec::new()),
            InventoryKind::PersistentVolumeClaims => Self::PersistentVolumeClaims(Vec::new()),
            InventoryKind::LimitRanges => Self::LimitRanges(Vec::new()),
            InventoryKind::ResourceQuotas => Self::ResourceQuotas(Vec::new()),
            InventoryKind::PodDisruptionBudgets => Self::PodDisruptionBudgets(Vec::new()),
            InventoryKind::HorizontalPodAutoscalers => Self::HorizontalPodAutoscalers(Vec::new()),
        }
    }

    pub fn kind(&self) -> InventoryKind {
        match self {
            Self::Nodes(_) => InventoryKind::Nodes,
            Self::Namespaces(_) => InventoryKind::Namespaces,
            Self::Pods(_) => InventoryKind::Pods,
            Self::Deployments(_) => InventoryKind::Deployments,
            Self::DaemonSets(_) => InventoryKind::DaemonSets,
            Self::StatefulSets(_) => InventoryKind::StatefulSets,
            Self::Jobs(_) => InventoryKind::Jobs,
            Self::CronJobs(_) => InventoryKind::CronJobs,
            Self::Services(_) => InventoryKind::Services,
            Self::Ingresses(_) => InventoryKind::Ingresses,
            Self::NetworkPolicies(_) => InventoryKind::NetworkPolicies,
            Self::ServiceAccounts(_) => InventoryKind::ServiceAccounts,
            Self::Roles(_) => InventoryKind::Roles,
            Self::ClusterRoles(_) => InventoryKind::ClusterRoles,
            Self::RoleBindings(_) => InventoryKind::RoleBindings,
            Self::ClusterRoleBindings(_) => InventoryKind::ClusterRoleBindings,
            Self::Secrets(_) => InventoryKind::Secrets,
            Self::ConfigMaps(_) => InventoryKind::ConfigMaps,
            Self::PersistentVolumes(_) => InventoryKind::PersistentVolumes,
            Self::PersistentVolumeClaims(_) => InventoryKind::PersistentVolumeClaims,
            Self::LimitRanges(_) => InventoryKind::LimitRanges,
            Self::ResourceQuotas(_) => InventoryKind::ResourceQuotas,
            Self::PodDisruptionBudgets(_) => InventoryKind::PodDisruptionBudgets,
            Self::HorizontalPodAutoscalers(_) => InventoryKind::HorizontalPodAutoscalers,
        }
    }

    /// Number of objects in the list
    pub fn len(&self) -> usize {
        match self {
            Self::Nodes(v) => v.len(),
            Self::Namespaces(v) => v.len(),
            Self::Pods(v) => v.len(),
            Self::Deployments(v) => v.len(),
            Self::DaemonSets(v) => v.len(),
            Self::StatefulSets(v) => v.len(),
            Self::Jobs(v) => v.len(),
            Self::CronJobs(v) => v.len(),
            Self::Services(v) => v.len(),
            Self::Ingresses(v) => v.len(),
            Self::NetworkPolicies(v) => v.len(),
            Self::ServiceAccounts(v) => v.len(),
            Self::Roles(v) => v.len(),
            Self::ClusterRoles(v) => v.len(),
            Self::RoleBindings(v) => v.len(),
            Self::ClusterRoleBindings(v) => v.len(),
            Self::Secrets(v) => v.len(),
            Self::ConfigMaps(v) => v.len(),
            Self::PersistentVolumes(v) => v.len(),
            Self::PersistentVolumeClaims(v) => v.len(),
            Self::LimitRanges(v) => v.len(),
            Self::ResourceQuotas(v) => v.len(),
            Self::PodDisruptionBudgets(v) => v.len(),
            Self::HorizontalPodAutoscalers(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw object lists of one snapshot, in the order the API returned them
///
/// Secrets are kept whole in memory but serialize with metadata only.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Inventory {
    pub nodes: Vec<Node>,
    pub namespaces: Vec<Namespace>,
    pub pods: Vec<Pod>,
    pub deployments: Vec<Deployment>,
    pub daemon_sets: Vec<DaemonSet>,
    pub stateful_sets: Vec<StatefulSet>,
    pub jobs: Vec<Job>,
    pub cron_jobs: Vec<CronJob>,
    pub services: Vec<Service>,
    pub ingresses: Vec<Ingress>,
    pub network_policies: Vec<NetworkPolicy>,
    pub service_accounts: Vec<ServiceAccount>,
    pub roles: Vec<Role>,
    pub cluster_roles: Vec<ClusterRole>,
    pub role_bindings: Vec<RoleBinding>,
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
    #[serde(serialize_with = "redact_secrets")]
    pub secrets: Vec<Secret>,
    pub config_maps: Vec<ConfigMap>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    pub limit_ranges: Vec<LimitRange>,
    pub resource_quotas: Vec<ResourceQuota>,
    pub pod_disruption_budgets: Vec<PodDisruptionBudget>,
    pub horizontal_pod_autoscalers: Vec<HorizontalPodAutoscaler>,
}

fn redact_secrets<S: Serializer>(secrets: &[Secret], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(secrets.iter().map(|secret| Secret {
        data: None,
        string_data: None,
        ..secret.clone()
    }))
}

impl Inventory {
    /// Store a fetched list in its slot, replacing whatever was there
    pub fn absorb(&mut self, list: InventoryList) {
        match list {
            InventoryList::Nodes(v) => self.nodes = v,
            InventoryList::Namespaces(v) => self.namespaces = v,
            InventoryList::Pods(v) => self.pods = v,
            InventoryList::Deployments(v) => self.deployments = v,
            InventoryList::DaemonSets(v) => self.daemon_sets = v,
            InventoryList::StatefulSets(v) => self.stateful_sets = v,
            InventoryList::Jobs(v) => self.jobs = v,
            InventoryList::CronJobs(v) => self.cron_jobs = v,
            InventoryList::Services(v) => self.services = v,
            InventoryList::Ingresses(v) => self.ingresses = v,
            InventoryList::NetworkPolicies(v) => self.network_policies = v,
            InventoryList::ServiceAccounts(v) => self.service_accounts = v,
            InventoryList::Roles(v) => self.roles = v,
            InventoryList::ClusterRoles(v) => self.cluster_roles = v,
            InventoryList::RoleBindings(v) => self.role_bindings = v,
            InventoryList::ClusterRoleBindings(v) => self.cluster_role_bindings = v,
            InventoryList::Secrets(v) => self.secrets = v,
            InventoryList::ConfigMaps(v) => self.config_maps = v,
            InventoryList::PersistentVolumes(v) => self.persistent_volumes = v,
            InventoryList::PersistentVolumeClaims(v) => self.persistent_volume_claims = v,
            InventoryList::LimitRanges(v) => self.limit_ranges = v,
            InventoryList::ResourceQuotas(v) => self.resource_quotas = v,
            InventoryList::PodDisruptionBudgets(v) => self.pod_disruption_budgets = v,
            InventoryList::HorizontalPodAutoscalers(v) => self.horizontal_pod_autoscalers = v,
        }
    }

    /// Object count per kind
    pub fn counts(&self) -> Vec<(InventoryKind, usize)> {
        InventoryKind::ALL
            .iter()
            .map(|kind| (*kind, self.count(*kind)))
            .collect()
    }

    pub fn count(&self, kind: InventoryKind) -> usize {
        match kind {
            InventoryKind::Nodes => self.nodes.len(),
            InventoryKind::Namespaces => self.namespaces.len(),
            InventoryKind::Pods => self.pods.len(),
            InventoryKind::Deployments => self.deployments.len(),
            InventoryKind::DaemonSets => self.daemon_sets.len(),
            InventoryKind::StatefulSets => self.stateful_sets.len(),
            InventoryKind::Jobs => self.jobs.len(),
            InventoryKind::CronJobs => self.cron_jobs.len(),
            InventoryKind::Services => self.services.len(),
            InventoryKind::Ingresses => self.ingresses.len(),
            InventoryKind::NetworkPolicies => self.network_policies.len(),
            InventoryKind::ServiceAccounts => self.service_accounts.len(),
            InventoryKind::Roles => self.roles.len(),
            InventoryKind::ClusterRoles => self.cluster_roles.len(),
            InventoryKind::RoleBindings => self.role_bindings.len(),
            InventoryKind::ClusterRoleBindings => self.cluster_role_bindings.len(),
            InventoryKind::Secrets => self.secrets.len(),
            InventoryKind::ConfigMaps => self.config_maps.len(),
            InventoryKind::PersistentVolumes => self.persistent_volumes.len(),
            InventoryKind::PersistentVolumeClaims => self.persistent_volume_claims.len(),
            InventoryKind::LimitRanges => self.limit_ranges.len(),
            InventoryKind::ResourceQuotas => self.resource_quotas.len(),
            InventoryKind::PodDisruptionBudgets => self.pod_disruption_budgets.len(),
            InventoryKind::HorizontalPodAutoscalers => self.horizontal_pod_autoscalers.len(),
        }
    }
}
