use capz_controller_core::{names::OsType, Conditions, Futures, ProvisioningState};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A managed (AKS) cluster.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedCluster",
    status = "AzureManagedClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedClusterSpec {
    /// Kubernetes version of the control plane, e.g. `v1.30.2`.
    #[serde(default)]
    pub version: String,
    #[serde(rename = "dnsServiceIP")]
    pub dns_service_ip: Option<String>,
    pub network_plugin: Option<String>,
    pub network_policy: Option<String>,
    pub aad_profile: Option<AadProfile>,
    #[serde(default)]
    pub addon_profiles: Vec<AddonProfile>,
    pub oidc_issuer_profile: Option<OidcIssuerProfile>,
    pub disable_local_accounts: Option<bool>,
    /// Passed through verbatim; the server picks a default when unset.
    pub outbound_type: Option<String>,
    pub auto_upgrade_channel: Option<String>,
    pub sku: Option<AksSku>,
    #[serde(default)]
    pub extensions: Vec<AksExtension>,
    pub fleets_member: Option<FleetsMember>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AadProfile {
    #[serde(default)]
    pub managed: bool,
    #[serde(rename = "adminGroupObjectIDs", default)]
    pub admin_group_object_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonProfile {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub config: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OidcIssuerProfile {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AksSku {
    /// `Free`, `Standard`, or `Premium`.
    pub tier: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AksExtension {
    pub name: String,
    pub extension_type: String,
    pub version: Option<String>,
    #[serde(default)]
    pub configuration_settings: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetsMember {
    pub name: Option<String>,
    pub manager_name: String,
    pub manager_resource_group: String,
    #[serde(default)]
    pub group: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedClusterStatus {
    #[serde(default)]
    pub ready: bool,
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(rename = "oidcIssuerURL")]
    pub oidc_issuer_url: Option<String>,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub long_running_operation_states: Futures,
}

/// One AKS node pool.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedMachinePool",
    status = "AzureManagedMachinePoolStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedMachinePoolSpec {
    /// Azure-side pool name; the resource name when unset.
    pub name: Option<String>,
    pub sku: Option<String>,
    #[serde(default)]
    pub mode: AgentPoolMode,
    pub replicas: Option<i32>,
    #[serde(default)]
    pub os_type: OsType,
    #[serde(rename = "osDiskType")]
    pub os_disk_type: Option<String>,
    pub max_pods: Option<i32>,
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub enable_auto_scaling: bool,
    pub min_count: Option<i32>,
    pub max_count: Option<i32>,
    /// Kubernetes version of the pool; must not exceed the control plane's.
    pub version: Option<String>,
    pub subnet_name: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum AgentPoolMode {
    System,
    #[default]
    User,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    pub value: String,
    /// `NoSchedule`, `NoExecute`, or `PreferNoSchedule`.
    pub effect: String,
}

impl Taint {
    /// The `key=value:effect` encoding AKS expects.
    pub fn encode(&self) -> String {
        format!("{}={}:{}", self.key, self.value, self.effect)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedMachinePoolStatus {
    #[serde(default)]
    pub ready: bool,
    pub provisioning_state: Option<ProvisioningState>,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub long_running_operation_states: Futures,
}
