use crate::network::{BastionSpec, NetworkSpec};
use capz_controller_core::{Conditions, Futures};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The cluster-wide Azure infrastructure a workload cluster runs on.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureCluster",
    status = "AzureClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterSpec {
    #[serde(rename = "subscriptionID", default)]
    pub subscription_id: String,
    pub location: String,
    pub resource_group: String,
    /// The cloud this cluster lives in; defaults to the public cloud.
    pub azure_environment: Option<String>,
    pub identity_ref: Option<IdentityRef>,
    #[serde(default)]
    pub network_spec: NetworkSpec,
    pub bastion_spec: Option<BastionSpec>,
    #[serde(default)]
    pub additional_tags: BTreeMap<String, String>,
    /// Availability zones offered to machines, keyed by failure-domain id.
    #[serde(default)]
    pub failure_domains: BTreeMap<String, FailureDomain>,
}

/// Points at the `AzureClusterIdentity` used to authenticate this cluster's
/// Azure calls. An empty namespace defaults to the cluster's own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomain {
    #[serde(default)]
    pub control_plane: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub conditions: Conditions,
    #[serde(default)]
    pub long_running_operation_states: Futures,
}
