use capz_controller_core::{Conditions, Futures};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A hosted ARO (Azure Red Hat OpenShift) control plane.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AroControlPlane",
    status = "AroControlPlaneStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AroControlPlaneSpec {
    #[serde(default)]
    pub version: AroVersion,
    #[serde(default)]
    pub api: ApiProfile,
    #[serde(default)]
    pub network: AroNetworkProfile,
    #[serde(default)]
    pub platform: AroPlatformProfile,
    pub operators_authentication: Option<OperatorsAuthentication>,
    pub etcd: Option<EtcdProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AroVersion {
    #[serde(rename = "id", default)]
    pub id: String,
    #[serde(default)]
    pub channel_group: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AroNetworkProfile {
    pub pod_cidr: Option<String>,
    pub service_cidr: Option<String>,
    pub machine_cidr: Option<String>,
    pub host_prefix: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AroPlatformProfile {
    /// ARM ID of the subnet hosting the control plane.
    #[serde(rename = "subnetID", default)]
    pub subnet_id: String,
    /// ARM ID of the subnet's network security group.
    #[serde(rename = "networkSecurityGroupID", default)]
    pub network_security_group_id: String,
    pub outbound_type: Option<String>,
    /// Resource group Azure creates for cluster-owned resources.
    pub managed_resource_group: Option<String>,
}

/// The per-operator managed identities wired into the hosted control plane.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorsAuthentication {
    #[serde(default)]
    pub managed_identities: ManagedIdentities,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedIdentities {
    /// Operator name to user-assigned identity ARM ID.
    #[serde(default)]
    pub control_plane_operators: BTreeMap<String, String>,
    #[serde(default)]
    pub data_plane_operators: BTreeMap<String, String>,
    #[serde(default)]
    pub service_managed_identity: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EtcdProfile {
    pub data_encryption: Option<EtcdDataEncryption>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EtcdDataEncryption {
    /// `PlatformManaged` or `CustomerManaged`.
    #[serde(default)]
    pub key_management_mode: String,
    pub customer_managed: Option<CustomerManagedEncryption>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerManagedEncryption {
    #[serde(default)]
    pub encryption_type: String,
    pub kms: Option<KmsProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KmsProfile {
    #[serde(default)]
    pub active_key: KmsKey,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KmsKey {
    #[serde(default)]
    pub vault_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AroControlPlaneStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub initialized: bool,
    /// Raw provisioning-state string reported by the ARO RP; may be empty.
    pub provisioning_state: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub long_running_operation_states: Futures,
}
