use crate::labels;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An Azure identity that clusters reference to authenticate ARM calls.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureClusterIdentity",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterIdentitySpec {
    #[serde(rename = "type", default)]
    pub type_: IdentityType,
    #[serde(rename = "tenantID", default)]
    pub tenant_id: String,
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    /// Secret holding the client secret (ServicePrincipal variants) or the
    /// certificate PEM (ServicePrincipalCertificate).
    pub client_secret: Option<SecretRef>,
    /// ARM ID of the user-assigned identity, when applicable.
    #[serde(rename = "resourceID")]
    pub resource_id: Option<String>,
    /// Which namespaces may reference this identity. Absent denies all;
    /// present-but-empty allows all.
    pub allowed_namespaces: Option<AllowedNamespaces>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum IdentityType {
    #[default]
    ServicePrincipal,
    ServicePrincipalCertificate,
    ManualServicePrincipal,
    UserAssignedManagedIdentity,
    WorkloadIdentity,
}

impl IdentityType {
    /// True for the identity types that carry a meaningful secret payload.
    pub fn has_client_secret(&self) -> bool {
        matches!(
            self,
            Self::ServicePrincipal | Self::ServicePrincipalCertificate | Self::ManualServicePrincipal
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllowedNamespaces {
    #[serde(rename = "list")]
    pub namespace_list: Option<Vec<String>>,
    pub selector: Option<labels::Selector>,
}
