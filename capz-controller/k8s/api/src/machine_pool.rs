use crate::machine::{DataDisk, Image, NetworkInterface, OsDisk, SpotVmOptions, VmExtension, VmIdentity};
use capz_controller_core::{Conditions, Futures, ProvisioningState};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A VM scale set backing a Cluster API machine pool.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachinePool",
    status = "AzureMachinePoolStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolSpec {
    #[serde(rename = "providerID")]
    pub provider_id: Option<String>,
    #[serde(rename = "providerIDList", default)]
    pub provider_id_list: Vec<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub template: MachinePoolTemplate,
    #[serde(default)]
    pub strategy: MachinePoolDeploymentStrategy,
    #[serde(default)]
    pub additional_tags: BTreeMap<String, String>,
}

/// The per-instance shape of the scale set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachinePoolTemplate {
    #[serde(default)]
    pub vm_size: String,
    pub image: Option<Image>,
    #[serde(default)]
    pub os_disk: OsDisk,
    #[serde(default)]
    pub data_disks: Vec<DataDisk>,
    #[serde(default)]
    pub identity: VmIdentity,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub ssh_public_key: String,
    pub spot_vm_options: Option<SpotVmOptions>,
    #[serde(default)]
    pub vm_extensions: Vec<VmExtension>,
    #[serde(default)]
    pub subnet_name: String,
}

/// How replica changes are rolled across scale-set instances.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MachinePoolDeploymentStrategy {
    RollingUpdate {
        /// Instances that may be created above the desired replica count,
        /// as an absolute number or a percentage of replicas.
        #[serde(skip_serializing_if = "Option::is_none")]
        max_surge: Option<IntOrPercent>,
        #[serde(default)]
        delete_policy: DeletePolicy,
    },
}

impl Default for MachinePoolDeploymentStrategy {
    fn default() -> Self {
        Self::RollingUpdate { max_surge: None, delete_policy: DeletePolicy::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum IntOrPercent {
    Int(i32),
    /// A string of the form `"50%"`.
    Percent(String),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum DeletePolicy {
    #[default]
    Oldest,
    Newest,
    Random,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub replicas: i32,
    pub provisioning_state: Option<ProvisioningState>,
    pub image: Option<Image>,
    pub version: Option<String>,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub long_running_operation_states: Futures,
}

/// Mirrors one live scale-set instance so that higher layers can address it
/// as a machine.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachinePoolMachine",
    status = "AzureMachinePoolMachineStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolMachineSpec {
    #[serde(rename = "providerID", default)]
    pub provider_id: String,
    #[serde(rename = "instanceID", default)]
    pub instance_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolMachineStatus {
    #[serde(default)]
    pub ready: bool,
    pub provisioning_state: Option<ProvisioningState>,
    pub version: Option<String>,
    #[serde(default)]
    pub latest_model_applied: bool,
    #[serde(default)]
    pub conditions: Conditions,
}
