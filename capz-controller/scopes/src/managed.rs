//! The managed-cluster scope: AKS cluster, agent pools, and extensions.

use crate::{cluster::ClusterScope, specs, version::KubernetesVersion, ScopeError};
use capz_controller_azure::ResourceSpec;
use capz_controller_core::{names::OsType, resource_id, CloudError};
use capz_controller_k8s_api::{
    managed::{AddonProfile, AgentPoolMode, AzureManagedMachinePool},
    AzureManagedCluster,
};
use serde_json::{json, Value};

const DEFAULT_AGENT_POOL_SKU: &str = "Standard_D2s_v3";

pub struct ManagedClusterScope<'a> {
    cluster: &'a ClusterScope,
    managed: AzureManagedCluster,
    managed_name: String,
}

// === impl ManagedClusterScope ===

impl<'a> ManagedClusterScope<'a> {
    pub fn new(
        cluster: &'a ClusterScope,
        managed: AzureManagedCluster,
    ) -> Result<Self, ScopeError> {
        let managed_name = managed
            .metadata
            .name
            .clone()
            .ok_or(ScopeError::MissingMetadata("name"))?;
        Ok(Self { cluster, managed, managed_name })
    }

    pub fn name(&self) -> &str {
        &self.managed_name
    }

    pub fn managed_cluster_id(&self) -> String {
        resource_id::managed_cluster_id(
            self.cluster.subscription_id(),
            self.cluster.resource_group(),
            &self.managed_name,
        )
    }

    /// The AKS cluster spec with the defaulting rules applied: the outbound
    /// type stays unset for the server to pick, AAD implies Azure RBAC when
    /// managed, and `disableLocalAccounts` is meaningful only under managed
    /// AAD.
    pub fn managed_cluster_spec(&self) -> ManagedClusterSpec {
        let spec = &self.managed.spec;

        let aad = spec.aad_profile.as_ref().map(|aad| AadProfileSpec {
            managed: aad.managed,
            enable_azure_rbac: aad.managed,
            admin_group_object_ids: aad.admin_group_object_ids.clone(),
        });
        // Without managed AAD there are no AAD accounts to fall back to, so
        // the flag is dropped rather than locking the user out.
        let disable_local_accounts = match &aad {
            Some(aad) if aad.managed => spec.disable_local_accounts,
            _ => None,
        };

        ManagedClusterSpec {
            name: self.managed_name.clone(),
            resource_group: self.cluster.resource_group().to_string(),
            location: self.cluster.location().to_string(),
            version: KubernetesVersion::azure_form(&spec.version).to_string(),
            dns_service_ip: spec.dns_service_ip.clone(),
            network_plugin: spec.network_plugin.clone(),
            network_policy: spec.network_policy.clone(),
            outbound_type: spec.outbound_type.clone(),
            aad,
            disable_local_accounts,
            auto_upgrade_channel: spec.auto_upgrade_channel.clone(),
            addon_profiles: spec.addon_profiles.clone(),
            oidc_issuer_enabled: spec.oidc_issuer_profile.as_ref().is_some_and(|p| p.enabled),
            sku_tier: spec.sku.as_ref().map(|s| s.tier.clone()),
            tags: self.cluster.tags(),
        }
    }

    /// Walks the pools, enforcing the version skew rule and the
    /// one-System-pool requirement, and applying AKS defaults.
    pub fn agent_pool_specs(
        &self,
        pools: &[AzureManagedMachinePool],
    ) -> Result<Vec<AgentPoolSpec>, ScopeError> {
        if !pools.iter().any(|p| p.spec.mode == AgentPoolMode::System) {
            return Err(ScopeError::SystemPoolRequired);
        }
        let control_plane = KubernetesVersion::parse(&self.managed.spec.version)?;
        let (vnet_name, vnet_group) = self.cluster.vnet()?;

        let mut out = Vec::with_capacity(pools.len());
        for pool in pools {
            let pool_name = pool
                .metadata
                .name
                .clone()
                .ok_or(ScopeError::MissingMetadata("name"))?;
            let name = pool.spec.name.clone().unwrap_or_else(|| pool_name.clone());

            let version = match &pool.spec.version {
                Some(raw) => {
                    let pool_version = KubernetesVersion::parse(raw)?;
                    if pool_version > control_plane {
                        return Err(ScopeError::PoolVersionExceedsControlPlane {
                            pool_name,
                            pool: raw.clone(),
                            control_plane: self.managed.spec.version.clone(),
                        });
                    }
                    Some(KubernetesVersion::azure_form(raw).to_string())
                }
                None => None,
            };

            let vnet_subnet_id = pool.spec.subnet_name.as_ref().map(|subnet| {
                resource_id::subnet_id(
                    self.cluster.subscription_id(),
                    &vnet_group,
                    &vnet_name,
                    subnet,
                )
            });

            out.push(AgentPoolSpec {
                name,
                owner_cluster: self.managed_name.clone(),
                resource_group: self.cluster.resource_group().to_string(),
                sku: pool
                    .spec
                    .sku
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AGENT_POOL_SKU.to_string()),
                mode: pool.spec.mode,
                replicas: pool.spec.replicas.unwrap_or(1),
                os_type: pool.spec.os_type,
                os_disk_type: pool.spec.os_disk_type.clone(),
                max_pods: pool.spec.max_pods,
                node_labels: pool.spec.node_labels.clone(),
                node_taints: pool.spec.taints.iter().map(|t| t.encode()).collect(),
                enable_auto_scaling: pool.spec.enable_auto_scaling,
                min_count: pool.spec.min_count,
                max_count: pool.spec.max_count,
                version,
                vnet_subnet_id,
            });
        }
        Ok(out)
    }

    /// One spec per user-declared AKS extension, owned by the managed
    /// cluster's ARM ID.
    pub fn aks_extension_specs(&self) -> Vec<AksExtensionSpec> {
        self.managed
            .spec
            .extensions
            .iter()
            .map(|e| AksExtensionSpec {
                name: e.name.clone(),
                owner: self.managed_cluster_id(),
                namespace: self.cluster.namespace().to_string(),
                extension_type: e.extension_type.clone(),
                version: e.version.clone(),
                configuration_settings: e.configuration_settings.clone(),
            })
            .collect()
    }

    /// Private endpoints configured on the control-plane subnet.
    pub fn private_endpoint_specs(&self) -> Result<Vec<specs::PrivateEndpointSpec>, ScopeError> {
        let (vnet_name, vnet_group) = self.cluster.vnet()?;
        let Some(subnet) = self.cluster.network().control_plane_subnet() else {
            return Ok(Vec::new());
        };
        let subnet_id = resource_id::subnet_id(
            self.cluster.subscription_id(),
            &vnet_group,
            &vnet_name,
            &subnet.name,
        );
        Ok(subnet
            .private_endpoints
            .iter()
            .map(|endpoint| specs::PrivateEndpointSpec {
                name: endpoint.name.clone(),
                resource_group: self.cluster.resource_group().to_string(),
                location: self.cluster.location().to_string(),
                subnet_id: subnet_id.clone(),
                connections: endpoint.private_link_service_connections.clone(),
                manual_approval: endpoint.manual_approval,
                tags: self.cluster.tags(),
            })
            .collect())
    }

    /// The fleet membership, when the cluster joins one.
    pub fn fleets_member_spec(&self) -> Option<FleetsMemberSpec> {
        let member = self.managed.spec.fleets_member.as_ref()?;
        Some(FleetsMemberSpec {
            name: member.name.clone().unwrap_or_else(|| self.managed_name.clone()),
            manager_name: member.manager_name.clone(),
            manager_resource_group: member.manager_resource_group.clone(),
            group: member.group.clone(),
            cluster_id: self.managed_cluster_id(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AadProfileSpec {
    pub managed: bool,
    pub enable_azure_rbac: bool,
    pub admin_group_object_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ManagedClusterSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub version: String,
    pub dns_service_ip: Option<String>,
    pub network_plugin: Option<String>,
    pub network_policy: Option<String>,
    pub outbound_type: Option<String>,
    pub aad: Option<AadProfileSpec>,
    pub disable_local_accounts: Option<bool>,
    pub auto_upgrade_channel: Option<String>,
    pub addon_profiles: Vec<AddonProfile>,
    pub oidc_issuer_enabled: bool,
    pub sku_tier: Option<String>,
    pub tags: specs::Tags,
}

impl ResourceSpec for ManagedClusterSpec {
    fn service_name(&self) -> &'static str {
        "managedclusters"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let mut properties = json!({
            "kubernetesVersion": self.version,
            "dnsPrefix": self.name,
            "enableRBAC": true,
            "networkProfile": {
                "networkPlugin": self.network_plugin,
                "networkPolicy": self.network_policy,
                "dnsServiceIP": self.dns_service_ip,
                // Absent means the server assigns its default.
                "outboundType": self.outbound_type,
            },
            "oidcIssuerProfile": { "enabled": self.oidc_issuer_enabled },
            "addonProfiles": self
                .addon_profiles
                .iter()
                .map(|a| (a.name.clone(), json!({"enabled": a.enabled, "config": a.config})))
                .collect::<serde_json::Map<_, _>>(),
        });
        if let Some(aad) = &self.aad {
            properties["aadProfile"] = json!({
                "managed": aad.managed,
                "enableAzureRBAC": aad.enable_azure_rbac,
                "adminGroupObjectIDs": aad.admin_group_object_ids,
            });
        }
        if let Some(disable) = self.disable_local_accounts {
            properties["disableLocalAccounts"] = json!(disable);
        }
        if let Some(channel) = &self.auto_upgrade_channel {
            properties["autoUpgradeProfile"] = json!({ "upgradeChannel": channel });
        }

        let mut body = json!({
            "location": self.location,
            "identity": { "type": "SystemAssigned" },
            "properties": properties,
            "tags": self.tags,
        });
        if let Some(tier) = &self.sku_tier {
            body["sku"] = json!({ "name": "Base", "tier": tier });
        }
        Ok(Some(body))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentPoolSpec {
    pub name: String,
    pub owner_cluster: String,
    pub resource_group: String,
    pub sku: String,
    pub mode: AgentPoolMode,
    pub replicas: i32,
    pub os_type: OsType,
    pub os_disk_type: Option<String>,
    pub max_pods: Option<i32>,
    pub node_labels: std::collections::BTreeMap<String, String>,
    /// `key=value:effect` encoded taints.
    pub node_taints: Vec<String>,
    pub enable_auto_scaling: bool,
    pub min_count: Option<i32>,
    pub max_count: Option<i32>,
    pub version: Option<String>,
    pub vnet_subnet_id: Option<String>,
}

impl ResourceSpec for AgentPoolSpec {
    fn service_name(&self) -> &'static str {
        "agentpools"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.owner_cluster.clone())
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(Some(json!({
            "properties": {
                "vmSize": self.sku,
                "mode": match self.mode {
                    AgentPoolMode::System => "System",
                    AgentPoolMode::User => "User",
                },
                "count": self.replicas,
                "osType": match self.os_type {
                    OsType::Linux => "Linux",
                    OsType::Windows => "Windows",
                },
                "osDiskType": self.os_disk_type,
                "maxPods": self.max_pods,
                "nodeLabels": self.node_labels,
                "nodeTaints": self.node_taints,
                "enableAutoScaling": self.enable_auto_scaling,
                "minCount": self.min_count,
                "maxCount": self.max_count,
                "orchestratorVersion": self.version,
                "vnetSubnetID": self.vnet_subnet_id,
            },
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AksExtensionSpec {
    pub name: String,
    /// ARM ID of the managed cluster the extension installs into.
    pub owner: String,
    /// Kubernetes namespace of the owning cluster resource.
    pub namespace: String,
    pub extension_type: String,
    pub version: Option<String>,
    pub configuration_settings: std::collections::BTreeMap<String, String>,
}

impl ResourceSpec for AksExtensionSpec {
    fn service_name(&self) -> &'static str {
        "aksextensions"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        String::new()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.owner.clone())
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(Some(json!({
            "properties": {
                "extensionType": self.extension_type,
                "version": self.version,
                "autoUpgradeMinorVersion": self.version.is_none(),
                "configurationSettings": self.configuration_settings,
            },
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FleetsMemberSpec {
    pub name: String,
    pub manager_name: String,
    pub manager_resource_group: String,
    pub group: String,
    /// ARM ID of the member cluster.
    pub cluster_id: String,
}

impl ResourceSpec for FleetsMemberSpec {
    fn service_name(&self) -> &'static str {
        "fleetsmembers"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.manager_resource_group.clone()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.manager_name.clone())
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(Some(json!({
            "properties": {
                "clusterResourceId": self.cluster_id,
                "group": self.group,
            },
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capz_controller_azure::ClientsContext;
    use capz_controller_core::Environment;
    use capz_controller_k8s_api::{
        cluster::AzureClusterSpec,
        managed::{AadProfile, AzureManagedClusterSpec, AzureManagedMachinePoolSpec, Taint},
        network::{NetworkSpec, SubnetSpec, VnetSpec},
        AzureCluster, ObjectMeta,
    };
    use pretty_assertions::assert_eq;

    fn cluster_scope() -> ClusterScope {
        let cluster = AzureCluster {
            metadata: ObjectMeta {
                name: Some("my-cluster".to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec: AzureClusterSpec {
                subscription_id: "sub-1".to_string(),
                location: "eastus".to_string(),
                resource_group: "my-rg".to_string(),
                network_spec: NetworkSpec {
                    vnet: VnetSpec { name: "vnet".to_string(), ..Default::default() },
                    subnets: vec![SubnetSpec { name: "nodes".to_string(), ..Default::default() }],
                    ..Default::default()
                },
                ..Default::default()
            },
            status: None,
        };
        ClusterScope::new(ClientsContext::new("sub-1", Environment::public_cloud()), cluster)
            .unwrap()
    }

    fn managed(spec: AzureManagedClusterSpec) -> AzureManagedCluster {
        AzureManagedCluster {
            metadata: ObjectMeta {
                name: Some("aks-1".to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    fn pool(name: &str, spec: AzureManagedMachinePoolSpec) -> AzureManagedMachinePool {
        AzureManagedMachinePool {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    #[test]
    fn managed_aad_enables_azure_rbac() {
        let cluster = cluster_scope();
        let scope = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.30.2".to_string(),
                aad_profile: Some(AadProfile {
                    managed: true,
                    admin_group_object_ids: vec![
                        "00000000-0000-0000-0000-000000000000".to_string(),
                    ],
                }),
                disable_local_accounts: Some(true),
                ..Default::default()
            }),
        )
        .unwrap();

        let spec = scope.managed_cluster_spec();
        assert_eq!(spec.version, "1.30.2");
        let aad = spec.aad.as_ref().unwrap();
        assert!(aad.managed);
        assert!(aad.enable_azure_rbac);
        assert_eq!(spec.disable_local_accounts, Some(true));
        assert_eq!(spec.outbound_type, None);
    }

    #[test]
    fn disable_local_accounts_dropped_without_managed_aad() {
        let cluster = cluster_scope();

        let unmanaged_aad = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.30.2".to_string(),
                aad_profile: Some(AadProfile { managed: false, ..Default::default() }),
                disable_local_accounts: Some(true),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(unmanaged_aad.managed_cluster_spec().disable_local_accounts, None);

        let no_aad = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.30.2".to_string(),
                disable_local_accounts: Some(true),
                ..Default::default()
            }),
        )
        .unwrap();
        assert_eq!(no_aad.managed_cluster_spec().disable_local_accounts, None);
    }

    #[test]
    fn pool_version_must_not_exceed_control_plane() {
        let cluster = cluster_scope();
        let scope = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.20.1".to_string(),
                ..Default::default()
            }),
        )
        .unwrap();

        let pools = vec![pool(
            "pool0",
            AzureManagedMachinePoolSpec {
                mode: AgentPoolMode::System,
                version: Some("v1.21.1".to_string()),
                ..Default::default()
            },
        )];
        assert!(matches!(
            scope.agent_pool_specs(&pools),
            Err(ScopeError::PoolVersionExceedsControlPlane { .. })
        ));

        let scope = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.22.0".to_string(),
                ..Default::default()
            }),
        )
        .unwrap();
        let specs = scope.agent_pool_specs(&pools).unwrap();
        assert_eq!(specs[0].version.as_deref(), Some("1.21.1"));
    }

    #[test]
    fn a_system_pool_is_required() {
        let cluster = cluster_scope();
        let scope = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.30.2".to_string(),
                ..Default::default()
            }),
        )
        .unwrap();

        let pools = vec![pool(
            "pool0",
            AzureManagedMachinePoolSpec { mode: AgentPoolMode::User, ..Default::default() },
        )];
        assert!(matches!(scope.agent_pool_specs(&pools), Err(ScopeError::SystemPoolRequired)));
    }

    #[test]
    fn agent_pool_defaults_and_taints() {
        let cluster = cluster_scope();
        let scope = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.30.2".to_string(),
                ..Default::default()
            }),
        )
        .unwrap();

        let pools = vec![pool(
            "pool0",
            AzureManagedMachinePoolSpec {
                mode: AgentPoolMode::System,
                taints: vec![Taint {
                    key: "dedicated".to_string(),
                    value: "infra".to_string(),
                    effect: "NoSchedule".to_string(),
                }],
                subnet_name: Some("nodes".to_string()),
                ..Default::default()
            },
        )];
        let specs = scope.agent_pool_specs(&pools).unwrap();
        assert_eq!(specs[0].sku, DEFAULT_AGENT_POOL_SKU);
        assert_eq!(specs[0].replicas, 1);
        assert_eq!(specs[0].node_taints, vec!["dedicated=infra:NoSchedule"]);
        assert!(specs[0]
            .vnet_subnet_id
            .as_deref()
            .unwrap()
            .ends_with("/virtualNetworks/vnet/subnets/nodes"));
    }

    #[test]
    fn extensions_are_owned_by_the_cluster_arm_id() {
        let cluster = cluster_scope();
        let scope = ManagedClusterScope::new(
            &cluster,
            managed(AzureManagedClusterSpec {
                version: "v1.30.2".to_string(),
                extensions: vec![capz_controller_k8s_api::managed::AksExtension {
                    name: "flux".to_string(),
                    extension_type: "microsoft.flux".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        )
        .unwrap();

        let extensions = scope.aks_extension_specs();
        assert_eq!(extensions.len(), 1);
        assert_eq!(
            extensions[0].owner,
            "/subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.ContainerService/managedClusters/aks-1"
        );
        assert_eq!(extensions[0].namespace, "ns-1");
    }
}
