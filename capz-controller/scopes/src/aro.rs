//! The ARO hosted-control-plane scope.
//!
//! The user hands us a subnet ARM ID and an NSG ARM ID; everything else in
//! the network spec is derived from those. The operator managed-identity
//! graph and its role assignments are table-driven off fixed role GUIDs.

use crate::{specs, ScopeError};
use capz_controller_azure::{ClientsContext, ResourceSpec};
use capz_controller_core::{
    annotations::{self, KubeconfigMeta},
    names, CloudError, Condition, ConditionStatus, ResourceId,
};
use capz_controller_k8s_api::{
    aro::{AroControlPlane, KmsKey, ManagedIdentities, Visibility},
    Secret,
};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// `Reader` built-in role.
const READER_ROLE_ID: &str = "acdd72a7-3385-48ef-bd42-f606fba81ae7";
/// `Network Contributor` built-in role.
const NETWORK_CONTRIBUTOR_ROLE_ID: &str = "4d97b98b-1d4f-4787-a291-c67834d212e7";
/// `Key Vault Crypto User` built-in role.
const KEY_VAULT_CRYPTO_USER_ROLE_ID: &str = "12338af0-0e69-4776-bea7-57ae8d297424";
/// `Azure Red Hat OpenShift Hosted Control Planes Cluster API Provider`.
const HCP_CLUSTER_API_PROVIDER_ROLE_ID: &str = "88366f10-ed47-4cc0-9fab-c8a06148393e";

/// Operator key whose identity drives Cluster API provisioning.
const CLUSTER_API_OPERATOR: &str = "cluster-api-azure";
/// Operator key whose identity decrypts etcd data through the KMS key.
const KMS_OPERATOR: &str = "kms";

/// Kubeconfigs minted by the ARO RP are short-lived; anything older than
/// this is re-fetched even without an explicit invalidation.
pub const KUBECONFIG_MAX_AGE_MINUTES: i64 = 60;

/// Secret data key carrying the credential expiration, RFC 3339.
const KUBECONFIG_EXPIRATION_KEY: &str = "expiration";

pub struct AroScope {
    clients: ClientsContext,
    control_plane: AroControlPlane,
    name: String,
    namespace: String,
    location: String,
    resource_group: String,
    tenant_id: String,
    create_managed_identities: bool,
    vnet_id: String,
    vnet_name: String,
    vnet_resource_group: String,
    subnet_name: String,
    nsg_name: String,
}

// === impl AroScope ===

impl AroScope {
    pub fn new(
        clients: ClientsContext,
        control_plane: AroControlPlane,
        location: String,
        resource_group: String,
        tenant_id: String,
        create_managed_identities: bool,
    ) -> Result<Self, ScopeError> {
        let name = control_plane
            .metadata
            .name
            .clone()
            .ok_or(ScopeError::MissingMetadata("name"))?;
        let namespace = control_plane
            .metadata
            .namespace
            .clone()
            .ok_or(ScopeError::MissingMetadata("namespace"))?;

        let (vnet_id, vnet_name, subnet_name) =
            parse_subnet_arm_id(&control_plane.spec.platform.subnet_id)?;
        let vnet_resource_group = ResourceId::parse(&vnet_id)?.resource_group;
        let nsg_name = ResourceId::parse(&control_plane.spec.platform.network_security_group_id)?
            .leaf_name()
            .to_string();

        Ok(Self {
            clients,
            control_plane,
            name,
            namespace,
            location,
            resource_group,
            tenant_id,
            create_managed_identities,
            vnet_id,
            vnet_name,
            vnet_resource_group,
            subnet_name,
            nsg_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn vnet_id(&self) -> &str {
        &self.vnet_id
    }

    pub fn vnet_name(&self) -> &str {
        &self.vnet_name
    }

    pub fn subnet_name(&self) -> &str {
        &self.subnet_name
    }

    pub fn security_group_name(&self) -> &str {
        &self.nsg_name
    }

    fn tags(&self) -> specs::Tags {
        let (key, value) = names::cluster_owned_tag(&self.name);
        BTreeMap::from([(key, value)])
    }

    pub fn resource_group_spec(&self) -> specs::ResourceGroupSpec {
        specs::ResourceGroupSpec {
            handle: self.resource_group.clone(),
            name: self.resource_group.clone(),
            location: self.location.clone(),
            tags: self.tags(),
        }
    }

    /// The network is always brought by the user; the specs below only
    /// verify that the named resources exist.
    pub fn vnet_spec(&self) -> specs::VirtualNetworkSpec {
        specs::VirtualNetworkSpec {
            name: self.vnet_name.clone(),
            resource_group: self.vnet_resource_group.clone(),
            location: self.location.clone(),
            cidr_blocks: self
                .control_plane
                .spec
                .network
                .machine_cidr
                .clone()
                .into_iter()
                .collect(),
            tags: self.tags(),
        }
    }

    pub fn subnet_spec(&self) -> specs::SubnetSpec {
        specs::SubnetSpec {
            name: self.subnet_name.clone(),
            vnet_name: self.vnet_name.clone(),
            vnet_resource_group: self.vnet_resource_group.clone(),
            cidr_blocks: Vec::new(),
            security_group_name: Some(self.nsg_name.clone()),
            route_table_name: None,
            nat_gateway_name: None,
            service_endpoints: Vec::new(),
            subscription_id: self.clients.subscription_id().to_string(),
            is_vnet_managed: false,
        }
    }

    pub fn security_group_spec(&self) -> specs::SecurityGroupSpec {
        specs::SecurityGroupSpec {
            name: self.nsg_name.clone(),
            resource_group: self.vnet_resource_group.clone(),
            location: self.location.clone(),
            security_rules: Vec::new(),
            last_applied: Default::default(),
            tags: self.tags(),
        }
    }

    fn managed_identities(&self) -> Option<&ManagedIdentities> {
        self.control_plane
            .spec
            .operators_authentication
            .as_ref()
            .map(|auth| &auth.managed_identities)
    }

    /// One identity spec per operator ARM ID, emitted only when this
    /// controller owns identity creation. Unparseable IDs are skipped so a
    /// single bad entry cannot wedge the rest of the graph.
    pub fn user_assigned_identity_specs(&self) -> Vec<specs::UserAssignedIdentitySpec> {
        if !self.create_managed_identities {
            return Vec::new();
        }
        let Some(identities) = self.managed_identities() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for id in identities
            .control_plane_operators
            .values()
            .chain(identities.data_plane_operators.values())
            .chain(std::iter::once(&identities.service_managed_identity))
        {
            match ResourceId::parse(id) {
                Ok(parsed) => out.push(specs::UserAssignedIdentitySpec {
                    name: parsed.leaf_name().to_string(),
                    resource_group: parsed.resource_group,
                    location: self.location.clone(),
                    tags: self.tags(),
                }),
                Err(error) => {
                    tracing::warn!(%error, "Skipping unparseable operator identity");
                }
            }
        }
        out
    }

    /// The RBAC matrix:
    ///
    /// * the Cluster API operator identity gets the HCP Cluster API Provider
    ///   role on the control-plane subnet;
    /// * every operator identity gets Network Contributor on the subnet;
    /// * the service managed identity gets Reader on each operator identity;
    /// * the KMS operator identity gets Key Vault Crypto User on the vault.
    ///
    /// Entries whose principal ARM ID does not parse are skipped.
    pub fn role_assignment_specs(&self) -> Vec<specs::RoleAssignmentSpec> {
        let Some(identities) = self.managed_identities() else {
            return Vec::new();
        };
        let subscription = self.clients.subscription_id();
        let subnet_scope = self.control_plane.spec.platform.subnet_id.clone();
        let role = |id: &str| {
            format!("/subscriptions/{subscription}/providers/Microsoft.Authorization/roleDefinitions/{id}")
        };

        let mut out = Vec::new();
        let mut assign = |principal: &str, scope: String, role_id: &str| {
            if ResourceId::parse(principal).is_err() {
                tracing::warn!(%principal, "Skipping role assignment for unparseable principal");
                return;
            }
            out.push(specs::RoleAssignmentSpec {
                principal_resource_id: principal.to_string(),
                scope,
                role_definition_id: role(role_id),
                name: None,
            });
        };

        for (operator, principal) in identities
            .control_plane_operators
            .iter()
            .chain(identities.data_plane_operators.iter())
        {
            if operator == CLUSTER_API_OPERATOR {
                assign(principal, subnet_scope.clone(), HCP_CLUSTER_API_PROVIDER_ROLE_ID);
            }
            assign(principal, subnet_scope.clone(), NETWORK_CONTRIBUTOR_ROLE_ID);

            if ResourceId::parse(principal).is_ok() {
                assign(
                    &identities.service_managed_identity,
                    principal.to_string(),
                    READER_ROLE_ID,
                );
            }
        }

        if let Some(key) = self.kms_key() {
            if let Some(kms_principal) = identities.control_plane_operators.get(KMS_OPERATOR) {
                assign(kms_principal, self.key_vault_id(&key.vault_name), KEY_VAULT_CRYPTO_USER_ROLE_ID);
            }
        }
        out
    }

    fn kms_key(&self) -> Option<KmsKey> {
        self.control_plane
            .spec
            .etcd
            .as_ref()?
            .data_encryption
            .as_ref()?
            .customer_managed
            .as_ref()?
            .kms
            .as_ref()
            .map(|kms| kms.active_key.clone())
            .filter(|key| !key.vault_name.is_empty())
    }

    fn key_vault_id(&self, vault_name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.KeyVault/vaults/{vault_name}",
            self.clients.subscription_id(),
            self.resource_group,
        )
    }

    /// The vault backing etcd encryption, when customer-managed keys are in
    /// play.
    pub fn key_vault_spec(&self) -> Option<specs::KeyVaultSpec> {
        let key = self.kms_key()?;
        Some(specs::KeyVaultSpec {
            name: key.vault_name,
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            tenant_id: self.tenant_id.clone(),
            tags: self.tags(),
        })
    }

    pub fn cluster_spec(&self) -> AroClusterSpec {
        let spec = &self.control_plane.spec;
        AroClusterSpec {
            name: self.name.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            version_id: spec.version.id.clone(),
            channel_group: spec.version.channel_group.clone(),
            visibility: spec.api.visibility,
            pod_cidr: spec.network.pod_cidr.clone(),
            service_cidr: spec.network.service_cidr.clone(),
            machine_cidr: spec.network.machine_cidr.clone(),
            host_prefix: spec.network.host_prefix,
            subnet_id: spec.platform.subnet_id.clone(),
            network_security_group_id: spec.platform.network_security_group_id.clone(),
            outbound_type: spec.platform.outbound_type.clone(),
            managed_resource_group: spec.platform.managed_resource_group.clone(),
            managed_identities: self.managed_identities().cloned(),
            kms_key: self.kms_key(),
            tags: self.tags(),
        }
    }

    /// Maps the raw RP provisioning-state string onto the Ready condition.
    pub fn ready_condition(provisioning_state: Option<&str>) -> Condition {
        match provisioning_state {
            Some("Succeeded") => Condition::true_("Ready", "Succeeded"),
            Some(state) if !state.is_empty() => {
                Condition::false_("Ready", state, format!("cluster is {state}"))
            }
            _ => Condition::new(
                "Ready",
                ConditionStatus::Unknown,
                "Creating",
                "nil ProvisioningState was returned",
            ),
        }
    }
}

/// Whether the stored kubeconfig secret must be re-fetched from the RP.
pub fn kubeconfig_is_stale(secret: Option<&Secret>, now: DateTime<Utc>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(data) = secret.data.as_ref().filter(|d| !d.is_empty()) else {
        return true;
    };

    let meta = secret
        .metadata
        .annotations
        .as_ref()
        .map(|a| KubeconfigMeta::from_annotations(a))
        .unwrap_or_default();
    if meta.refresh_needed {
        return true;
    }
    let Some(last_updated) = meta.last_updated else {
        return true;
    };
    if now - last_updated > Duration::minutes(KUBECONFIG_MAX_AGE_MINUTES) {
        return true;
    }

    if let Some(expiration) = data
        .get(KUBECONFIG_EXPIRATION_KEY)
        .and_then(|bytes| std::str::from_utf8(&bytes.0).ok())
        .and_then(|s| s.parse::<DateTime<Utc>>().ok())
    {
        if expiration <= now {
            return true;
        }
    }
    false
}

/// Requests a refresh on the next reconcile without touching the data.
pub fn invalidate_kubeconfig(secret: &mut Secret) {
    secret
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(annotations::KUBECONFIG_REFRESH_NEEDED.to_string(), "true".to_string());
}

fn parse_subnet_arm_id(id: &str) -> Result<(String, String, String), ScopeError> {
    let err = || ScopeError::InvalidSubnetId(id.to_string());

    let vnet_id_re = Regex::new(
        r"^(?i)(/subscriptions/[^/]+/resourceGroups/[^/]+/providers/Microsoft\.Network/virtualNetworks/[^/]+)/subnets/[^/]+$",
    )
    .expect("static regex");
    let vnet_name_re = Regex::new(r"(?i)/virtualNetworks/([^/]+)").expect("static regex");
    let subnet_name_re = Regex::new(r"(?i)/subnets/([^/]+)$").expect("static regex");

    let vnet_id = vnet_id_re
        .captures(id)
        .and_then(|c| c.get(1))
        .ok_or_else(err)?
        .as_str()
        .to_string();
    let vnet_name = vnet_name_re
        .captures(id)
        .and_then(|c| c.get(1))
        .ok_or_else(err)?
        .as_str()
        .to_string();
    let subnet_name = subnet_name_re
        .captures(id)
        .and_then(|c| c.get(1))
        .ok_or_else(err)?
        .as_str()
        .to_string();
    Ok((vnet_id, vnet_name, subnet_name))
}

/// The hosted-control-plane cluster resource itself.
#[derive(Clone, Debug, PartialEq)]
pub struct AroClusterSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub version_id: String,
    pub channel_group: String,
    pub visibility: Visibility,
    pub pod_cidr: Option<String>,
    pub service_cidr: Option<String>,
    pub machine_cidr: Option<String>,
    pub host_prefix: Option<i32>,
    pub subnet_id: String,
    pub network_security_group_id: String,
    pub outbound_type: Option<String>,
    pub managed_resource_group: Option<String>,
    pub managed_identities: Option<ManagedIdentities>,
    pub kms_key: Option<KmsKey>,
    pub tags: specs::Tags,
}

impl ResourceSpec for AroClusterSpec {
    fn service_name(&self) -> &'static str {
        "openshiftclusters"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let mut properties = json!({
            "version": { "id": self.version_id, "channelGroup": self.channel_group },
            "api": {
                "visibility": match self.visibility {
                    Visibility::Public => "Public",
                    Visibility::Private => "Private",
                },
            },
            "network": {
                "podCidr": self.pod_cidr,
                "serviceCidr": self.service_cidr,
                "machineCidr": self.machine_cidr,
                "hostPrefix": self.host_prefix,
            },
            "platform": {
                "subnetId": self.subnet_id,
                "networkSecurityGroupId": self.network_security_group_id,
                "outboundType": self.outbound_type,
                "managedResourceGroup": self.managed_resource_group,
            },
        });
        if let Some(identities) = &self.managed_identities {
            properties["platform"]["operatorsAuthentication"] = json!({
                "userAssignedIdentities": {
                    "controlPlaneOperators": identities.control_plane_operators,
                    "dataPlaneOperators": identities.data_plane_operators,
                    "serviceManagedIdentity": identities.service_managed_identity,
                },
            });
        }
        if let Some(key) = &self.kms_key {
            properties["etcd"] = json!({
                "dataEncryption": {
                    "keyManagementMode": "CustomerManaged",
                    "customerManaged": {
                        "encryptionType": "KMS",
                        "kms": {
                            "activeKey": {
                                "vaultName": key.vault_name,
                                "name": key.name,
                                "version": key.version,
                            },
                        },
                    },
                },
            });
        }
        Ok(Some(json!({
            "location": self.location,
            "properties": properties,
            "tags": self.tags,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capz_controller_core::Environment;
    use capz_controller_k8s_api::{
        aro::{
            AroControlPlaneSpec, AroPlatformProfile, CustomerManagedEncryption,
            EtcdDataEncryption, EtcdProfile, KmsProfile, OperatorsAuthentication,
        },
        ObjectMeta,
    };
    use k8s_openapi::ByteString;
    use pretty_assertions::assert_eq;

    const SUBNET_ID: &str = "/subscriptions/sub-1/resourceGroups/net-rg/providers/Microsoft.Network/virtualNetworks/vnet-x/subnets/snet-y";
    const NSG_ID: &str = "/subscriptions/sub-1/resourceGroups/net-rg/providers/Microsoft.Network/networkSecurityGroups/nsg-z";

    fn scope_with(spec: AroControlPlaneSpec) -> AroScope {
        let control_plane = AroControlPlane {
            metadata: ObjectMeta {
                name: Some("aro-1".to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        };
        AroScope::new(
            ClientsContext::new("sub-1", Environment::public_cloud()),
            control_plane,
            "eastus".to_string(),
            "aro-rg".to_string(),
            "tenant-1".to_string(),
            true,
        )
        .unwrap()
    }

    fn base_spec() -> AroControlPlaneSpec {
        AroControlPlaneSpec {
            platform: AroPlatformProfile {
                subnet_id: SUBNET_ID.to_string(),
                network_security_group_id: NSG_ID.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn identities(entries: &[(&str, &str)]) -> OperatorsAuthentication {
        OperatorsAuthentication {
            managed_identities: ManagedIdentities {
                control_plane_operators: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                data_plane_operators: Default::default(),
                service_managed_identity:
                    "/subscriptions/sub-1/resourceGroups/mi-rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/svc-mi"
                        .to_string(),
            },
        }
    }

    #[test]
    fn network_names_derived_from_the_subnet_arm_id() {
        let scope = scope_with(base_spec());
        assert_eq!(scope.vnet_name(), "vnet-x");
        assert_eq!(scope.subnet_name(), "snet-y");
        assert_eq!(scope.security_group_name(), "nsg-z");
        assert_eq!(
            scope.vnet_id(),
            "/subscriptions/sub-1/resourceGroups/net-rg/providers/Microsoft.Network/virtualNetworks/vnet-x"
        );

        let subnet = scope.subnet_spec();
        assert_eq!(subnet.vnet_resource_group, "net-rg");
        assert!(!subnet.is_vnet_managed);
    }

    #[test]
    fn malformed_subnet_id_is_rejected() {
        let mut spec = base_spec();
        spec.platform.subnet_id = "/subscriptions/sub-1/not-a-subnet".to_string();
        let control_plane = AroControlPlane {
            metadata: ObjectMeta {
                name: Some("aro-1".to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        };
        let result = AroScope::new(
            ClientsContext::new("sub-1", Environment::public_cloud()),
            control_plane,
            "eastus".to_string(),
            "aro-rg".to_string(),
            "tenant-1".to_string(),
            false,
        );
        assert!(matches!(result, Err(ScopeError::InvalidSubnetId(_))));
    }

    #[test]
    fn unparseable_principals_are_skipped() {
        let mut spec = base_spec();
        spec.operators_authentication = Some(identities(&[
            (
                "cluster-api-azure",
                "/subscriptions/sub-1/resourceGroups/mi-rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/capi-mi",
            ),
            ("ingress", "not-an-arm-id"),
        ]));
        let scope = scope_with(spec);

        let identities = scope.user_assigned_identity_specs();
        // capi-mi and the service MI; the ingress entry is dropped.
        assert_eq!(
            identities.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["capi-mi", "svc-mi"]
        );

        let assignments = scope.role_assignment_specs();
        assert!(assignments
            .iter()
            .all(|a| !a.principal_resource_id.contains("not-an-arm-id")));
        // HCP Cluster API Provider + Network Contributor on the subnet, and
        // the service MI reading the operator MI.
        let capi_roles: Vec<_> = assignments
            .iter()
            .filter(|a| a.principal_resource_id.ends_with("capi-mi"))
            .collect();
        assert_eq!(capi_roles.len(), 2);
        assert!(capi_roles.iter().all(|a| a.scope == SUBNET_ID));
        assert!(capi_roles
            .iter()
            .any(|a| a.role_definition_id.ends_with(HCP_CLUSTER_API_PROVIDER_ROLE_ID)));
        assert!(assignments.iter().any(|a| {
            a.principal_resource_id.ends_with("svc-mi")
                && a.scope.ends_with("capi-mi")
                && a.role_definition_id.ends_with(READER_ROLE_ID)
        }));
    }

    #[test]
    fn kms_identity_gets_crypto_user_on_the_vault() {
        let mut spec = base_spec();
        spec.operators_authentication = Some(identities(&[(
            "kms",
            "/subscriptions/sub-1/resourceGroups/mi-rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/kms-mi",
        )]));
        spec.etcd = Some(EtcdProfile {
            data_encryption: Some(EtcdDataEncryption {
                key_management_mode: "CustomerManaged".to_string(),
                customer_managed: Some(CustomerManagedEncryption {
                    encryption_type: "KMS".to_string(),
                    kms: Some(KmsProfile {
                        active_key: KmsKey {
                            vault_name: "aro-kv".to_string(),
                            name: "etcd-key".to_string(),
                            version: "v1".to_string(),
                        },
                    }),
                }),
            }),
        });
        let scope = scope_with(spec);

        let vault = scope.key_vault_spec().unwrap();
        assert_eq!(vault.name, "aro-kv");
        assert_eq!(vault.tenant_id, "tenant-1");

        assert!(scope.role_assignment_specs().iter().any(|a| {
            a.principal_resource_id.ends_with("kms-mi")
                && a.scope.ends_with("/vaults/aro-kv")
                && a.role_definition_id.ends_with(KEY_VAULT_CRYPTO_USER_ROLE_ID)
        }));
    }

    #[test]
    fn identity_specs_suppressed_when_not_owned() {
        let mut spec = base_spec();
        spec.operators_authentication = Some(identities(&[(
            "cluster-api-azure",
            "/subscriptions/sub-1/resourceGroups/mi-rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/capi-mi",
        )]));
        let control_plane = AroControlPlane {
            metadata: ObjectMeta {
                name: Some("aro-1".to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        };
        let scope = AroScope::new(
            ClientsContext::new("sub-1", Environment::public_cloud()),
            control_plane,
            "eastus".to_string(),
            "aro-rg".to_string(),
            "tenant-1".to_string(),
            false,
        )
        .unwrap();
        assert!(scope.user_assigned_identity_specs().is_empty());
        // Role assignments are still emitted over the existing identities.
        assert!(!scope.role_assignment_specs().is_empty());
    }

    fn secret(
        data: Option<&[(&str, &str)]>,
        last_updated: Option<&str>,
        refresh_needed: bool,
    ) -> Secret {
        let mut annotations = BTreeMap::new();
        if let Some(ts) = last_updated {
            annotations.insert(annotations::KUBECONFIG_LAST_UPDATED.to_string(), ts.to_string());
        }
        if refresh_needed {
            annotations
                .insert(annotations::KUBECONFIG_REFRESH_NEEDED.to_string(), "true".to_string());
        }
        Secret {
            metadata: ObjectMeta {
                name: Some("aro-1-kubeconfig".to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            data: data.map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn kubeconfig_staleness_matrix() {
        let now: DateTime<Utc> = "2026-08-30T12:00:00Z".parse().unwrap();
        let value = &[("value", "kubeconfig-bytes")][..];

        assert!(kubeconfig_is_stale(None, now));
        assert!(kubeconfig_is_stale(Some(&secret(None, None, false)), now));
        assert!(kubeconfig_is_stale(Some(&secret(Some(&[]), None, false)), now));
        assert!(kubeconfig_is_stale(Some(&secret(Some(value), None, false)), now));
        assert!(kubeconfig_is_stale(
            Some(&secret(Some(value), Some("2026-08-30T11:30:00Z"), true)),
            now
        ));
        assert!(kubeconfig_is_stale(
            Some(&secret(Some(value), Some("2026-08-30T10:59:00Z"), false)),
            now
        ));
        assert!(!kubeconfig_is_stale(
            Some(&secret(Some(value), Some("2026-08-30T11:30:00Z"), false)),
            now
        ));

        let expired = &[("value", "kubeconfig-bytes"), ("expiration", "2026-08-30T11:59:00Z")][..];
        assert!(kubeconfig_is_stale(
            Some(&secret(Some(expired), Some("2026-08-30T11:30:00Z"), false)),
            now
        ));
    }

    #[test]
    fn invalidation_only_touches_the_annotation() {
        let mut s = secret(Some(&[("value", "kubeconfig-bytes")]), Some("2026-08-30T11:30:00Z"), false);
        invalidate_kubeconfig(&mut s);
        assert_eq!(
            s.metadata
                .annotations
                .as_ref()
                .unwrap()
                .get(annotations::KUBECONFIG_REFRESH_NEEDED)
                .map(String::as_str),
            Some("true")
        );
        assert!(s.data.as_ref().unwrap().contains_key("value"));
    }

    #[test]
    fn ready_condition_mapping() {
        assert_eq!(AroScope::ready_condition(Some("Succeeded")).status, ConditionStatus::True);

        let updating = AroScope::ready_condition(Some("Updating"));
        assert_eq!(updating.status, ConditionStatus::False);
        assert_eq!(updating.reason, "Updating");

        let unknown = AroScope::ready_condition(Some(""));
        assert_eq!(unknown.status, ConditionStatus::Unknown);
        assert_eq!(unknown.reason, "Creating");
        assert_eq!(unknown.message, "nil ProvisioningState was returned");
        assert_eq!(AroScope::ready_condition(None).status, ConditionStatus::Unknown);
    }
}
