use capz_controller_core::{names::OsType, Conditions, Futures, ProvisioningState};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single Azure virtual machine backing a Cluster API machine.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachine",
    status = "AzureMachineStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineSpec {
    #[serde(rename = "providerID")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub vm_size: String,
    pub image: Option<Image>,
    #[serde(default)]
    pub os_disk: OsDisk,
    #[serde(default)]
    pub data_disks: Vec<DataDisk>,
    #[serde(default)]
    pub identity: VmIdentity,
    /// Role granted to the system-assigned identity; Contributor on the
    /// subscription when unset.
    pub system_assigned_identity_role: Option<SystemAssignedIdentityRole>,
    #[serde(default)]
    pub user_assigned_identities: Vec<UserAssignedIdentityRef>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(rename = "allocatePublicIP", default)]
    pub allocate_public_ip: bool,
    #[serde(default)]
    pub ssh_public_key: String,
    pub failure_domain: Option<String>,
    pub spot_vm_options: Option<SpotVmOptions>,
    #[serde(default)]
    pub vm_extensions: Vec<VmExtension>,
    #[serde(default)]
    pub subnet_name: String,
    #[serde(default)]
    pub additional_tags: BTreeMap<String, String>,
}

/// How a machine's image is chosen. When absent, a default is derived from
/// the Kubernetes version and OS.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Image {
    /// An explicit ARM image ID.
    #[serde(rename = "id")]
    Id(String),
    /// An Azure Marketplace listing.
    Marketplace {
        publisher: String,
        offer: String,
        sku: String,
        version: String,
    },
    /// An image from a Shared Image Gallery.
    SharedGallery {
        #[serde(rename = "subscriptionID")]
        subscription_id: String,
        resource_group: String,
        gallery: String,
        name: String,
        version: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    #[serde(default)]
    pub os_type: OsType,
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: Option<i32>,
    pub managed_disk: Option<ManagedDiskParameters>,
    pub caching_type: Option<CachingType>,
    pub diff_disk_settings: Option<DiffDiskSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    /// Appended to the VM name to form the disk name.
    pub name_suffix: String,
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: i32,
    pub lun: Option<i32>,
    pub managed_disk: Option<ManagedDiskParameters>,
    pub caching_type: Option<CachingType>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDiskParameters {
    #[serde(default)]
    pub storage_account_type: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum CachingType {
    None,
    ReadOnly,
    ReadWrite,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiffDiskSettings {
    /// `Local` enables ephemeral OS disks.
    pub option: String,
    pub placement: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum VmIdentity {
    #[default]
    None,
    SystemAssigned,
    UserAssigned,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemAssignedIdentityRole {
    /// Name (GUID) of the role assignment to create.
    pub name: Option<String>,
    /// ARM scope the role applies to; the subscription when unset.
    pub scope: Option<String>,
    /// Role-definition ARM ID; Contributor when unset.
    #[serde(rename = "definitionID")]
    pub definition_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentityRef {
    #[serde(rename = "providerID", default)]
    pub provider_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default)]
    pub subnet_name: String,
    pub accelerated_networking: Option<bool>,
    /// Number of private IP configurations; defaults to one.
    pub private_ip_config_count: Option<i32>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpotVmOptions {
    pub max_price: Option<String>,
    pub eviction_policy: Option<EvictionPolicy>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum EvictionPolicy {
    Deallocate,
    Delete,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VmExtension {
    pub name: String,
    pub publisher: String,
    pub version: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub protected_settings: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineStatus {
    #[serde(default)]
    pub ready: bool,
    pub vm_state: Option<ProvisioningState>,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub long_running_operation_states: Futures,
}
