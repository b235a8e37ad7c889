//! The machine-pool scope: a VM scale set and its per-instance mirrors.

use crate::{cluster::ClusterScope, specs, ScopeError};
use capz_controller_azure::ResourceSpec;
use capz_controller_core::{names, names::OsType, resource_id, CloudError, ProvisioningState};
use capz_controller_k8s_api::{
    machine_pool::{
        AzureMachinePoolMachineSpec, IntOrPercent, MachinePoolDeploymentStrategy,
    },
    Api, AzureMachinePool, AzureMachinePoolMachine, ObjectMeta, ResourceExt,
    CLUSTER_NAME_LABEL, MACHINE_POOL_NAME_LABEL, REPLICAS_MANAGED_BY_ANNOTATION,
};
use chrono::{DateTime, Utc};
use kube::api::{DeleteParams, ListParams, PostParams};
use serde_json::{json, Value};

/// The live scale set as observed from Azure, reduced to what the pool scope
/// needs for requeue and mirror decisions.
#[derive(Clone, Debug, Default)]
pub struct VmssState {
    pub provisioning_state: Option<ProvisioningState>,
    /// Image version of the scale-set model.
    pub image_version: String,
    pub instances: Vec<VmssInstance>,
}

#[derive(Clone, Debug, Default)]
pub struct VmssInstance {
    pub instance_id: String,
    pub name: String,
    pub provider_id: String,
    /// Image version the instance is actually running.
    pub image_version: String,
}

pub struct MachinePoolScope<'a> {
    cluster: &'a ClusterScope,
    pool: AzureMachinePool,
    pool_name: String,
    /// Replica count from the owning MachinePool.
    desired_replicas: i32,
}

// === impl MachinePoolScope ===

impl<'a> MachinePoolScope<'a> {
    pub fn new(
        cluster: &'a ClusterScope,
        pool: AzureMachinePool,
        desired_replicas: i32,
    ) -> Result<Self, ScopeError> {
        let pool_name = pool
            .metadata
            .name
            .clone()
            .ok_or(ScopeError::MissingMetadata("name"))?;
        Ok(Self { cluster, pool, pool_name, desired_replicas })
    }

    pub fn os_type(&self) -> OsType {
        self.pool.spec.template.os_disk.os_type
    }

    /// The scale-set name: the provider-ID tail once assigned, else derived
    /// from the pool name with the Windows truncation rule.
    pub fn name(&self) -> String {
        if let Some(id) = &self.pool.spec.provider_id {
            let from_id = resource_id::vm_name_from_provider_id(id);
            if !from_id.is_empty() {
                return from_id;
            }
        }
        names::vmss_name(&self.pool_name, self.os_type())
    }

    /// True when an external autoscaler owns the replica count; the provider
    /// then never deletes surplus mirrors.
    pub fn is_externally_managed(&self) -> bool {
        self.pool
            .annotations()
            .contains_key(REPLICAS_MANAGED_BY_ANNOTATION)
    }

    /// The rolling-update surge budget: 1 without a strategy, an absolute
    /// count verbatim, or `ceil(percent * replicas / 100)` with a floor of 1.
    pub fn max_surge(&self) -> Result<i32, ScopeError> {
        let MachinePoolDeploymentStrategy::RollingUpdate { max_surge, .. } = &self.pool.spec.strategy;
        match max_surge {
            None => Ok(1),
            Some(IntOrPercent::Int(n)) => Ok(*n),
            Some(IntOrPercent::Percent(raw)) => {
                let percent: i64 = raw
                    .strip_suffix('%')
                    .and_then(|p| p.parse().ok())
                    .filter(|p| *p >= 0)
                    .ok_or_else(|| ScopeError::InvalidMaxSurge(raw.clone()))?;
                // `i64::div_ceil` is still unstable; this is its expansion for
                // a positive divisor.
                let product = percent * self.desired_replicas as i64;
                let surge = product / 100 + (product % 100 > 0) as i64;
                Ok((surge as i32).max(1))
            }
        }
    }

    /// Whether the reconcile must run again soon: the scale set is still in
    /// flux, the replica count has not converged, or instances lag behind
    /// the scale-set model's image.
    pub fn needs_requeue(&self, observed: &VmssState) -> bool {
        observed.provisioning_state != Some(ProvisioningState::Succeeded)
            || observed.instances.len() != self.desired_replicas as usize
            || observed
                .instances
                .iter()
                .any(|i| i.image_version != observed.image_version)
    }

    pub fn scale_set_spec(&self) -> Result<ScaleSetSpec, ScopeError> {
        let template = &self.pool.spec.template;
        let location = if self.pool.spec.location.is_empty() {
            self.cluster.location().to_string()
        } else {
            self.pool.spec.location.clone()
        };
        let subnet_name = if template.subnet_name.is_empty() {
            self.cluster
                .network()
                .node_subnets()
                .next()
                .map(|s| s.name.clone())
                .ok_or_else(|| ScopeError::SubnetNotFound(String::new()))?
        } else {
            template.subnet_name.clone()
        };
        let (vnet_name, vnet_group) = self.cluster.vnet()?;

        let mut tags = self.pool.spec.additional_tags.clone();
        let (key, value) = names::cluster_owned_tag(self.cluster.cluster_name());
        tags.insert(key, value);

        Ok(ScaleSetSpec {
            name: self.name(),
            resource_group: self.cluster.resource_group().to_string(),
            location,
            capacity: self.desired_replicas.max(0) as i64,
            vm_size: template.vm_size.clone(),
            ssh_public_key: template.ssh_public_key.clone(),
            subnet_id: resource_id::subnet_id(
                self.cluster.subscription_id(),
                &vnet_group,
                &vnet_name,
                &subnet_name,
            ),
            tags,
        })
    }

    /// Mirrors live scale-set instances into `AzureMachinePoolMachine`
    /// objects: creates missing mirrors, and (unless the pool is externally
    /// managed) deletes the oldest surplus ones down to the desired count.
    pub async fn apply_machine_pool_machines(
        &self,
        client: kube::Client,
        observed: &VmssState,
    ) -> Result<(), ScopeError> {
        let api = Api::<AzureMachinePoolMachine>::namespaced(client, self.cluster.namespace());
        let selector = format!(
            "{CLUSTER_NAME_LABEL}={},{MACHINE_POOL_NAME_LABEL}={}",
            self.cluster.cluster_name(),
            self.pool_name,
        );
        let mirrors = api.list(&ListParams::default().labels(&selector)).await?;

        for instance in &observed.instances {
            let exists = mirrors
                .items
                .iter()
                .any(|m| m.spec.provider_id == instance.provider_id);
            if exists {
                continue;
            }
            let mirror = self.mirror_for(instance);
            tracing::info!(
                pool = %self.pool_name,
                instance = %instance.instance_id,
                "Creating machine pool machine"
            );
            match api.create(&PostParams::default(), &mirror).await {
                Ok(_) => {}
                // Another reconcile won the race.
                Err(kube::Error::Api(e)) if e.code == 409 => {}
                Err(e) => return Err(e.into()),
            }
        }

        if self.is_externally_managed() {
            return Ok(());
        }
        let existing: Vec<(String, Option<DateTime<Utc>>)> = mirrors
            .items
            .iter()
            .filter_map(|m| {
                let name = m.metadata.name.clone()?;
                Some((name, m.metadata.creation_timestamp.as_ref().map(|t| t.0)))
            })
            .collect();
        for name in surplus_mirrors(existing, self.desired_replicas as usize) {
            tracing::info!(pool = %self.pool_name, mirror = %name, "Deleting surplus machine pool machine");
            api.delete(&name, &DeleteParams::default()).await?;
        }
        Ok(())
    }

    fn mirror_for(&self, instance: &VmssInstance) -> AzureMachinePoolMachine {
        let labels = [
            (CLUSTER_NAME_LABEL.to_string(), self.cluster.cluster_name().to_string()),
            (MACHINE_POOL_NAME_LABEL.to_string(), self.pool_name.clone()),
        ]
        .into_iter()
        .collect();
        AzureMachinePoolMachine {
            metadata: ObjectMeta {
                name: Some(instance.name.clone()),
                namespace: Some(self.cluster.namespace().to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: AzureMachinePoolMachineSpec {
                provider_id: instance.provider_id.clone(),
                instance_id: instance.instance_id.clone(),
            },
            status: None,
        }
    }
}

/// Names of the mirrors to delete: the oldest ones beyond `desired`, with
/// unstamped (just-created) mirrors treated as newest.
fn surplus_mirrors(
    mut mirrors: Vec<(String, Option<DateTime<Utc>>)>,
    desired: usize,
) -> Vec<String> {
    if mirrors.len() <= desired {
        return Vec::new();
    }
    mirrors.sort_by_key(|(_, created)| created.unwrap_or(DateTime::<Utc>::MAX_UTC));
    mirrors.truncate(mirrors.len() - desired);
    mirrors.into_iter().map(|(name, _)| name).collect()
}

/// The scale set itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScaleSetSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub capacity: i64,
    pub vm_size: String,
    pub ssh_public_key: String,
    pub subnet_id: String,
    pub tags: specs::Tags,
}

impl ResourceSpec for ScaleSetSpec {
    fn service_name(&self) -> &'static str {
        "scalesets"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(Some(json!({
            "location": self.location,
            "sku": { "name": self.vm_size, "tier": "Standard", "capacity": self.capacity },
            "properties": {
                "upgradePolicy": { "mode": "Manual" },
                "virtualMachineProfile": {
                    "networkProfile": {
                        "networkInterfaceConfigurations": [{
                            "name": format!("{}-netconfig", self.name),
                            "properties": {
                                "primary": true,
                                "ipConfigurations": [{
                                    "name": "ipConfig0",
                                    "properties": {
                                        "subnet": { "id": self.subnet_id },
                                        "primary": true,
                                    },
                                }],
                            },
                        }],
                    },
                },
            },
            "tags": self.tags,
        })))
    }
}

/// Parses a provider ID back to its trailing VM, VMSS-instance, or identity
/// segment. Strings without the `azure://` scheme yield an empty string.
pub fn vm_id_from_provider_id(provider_id: &str) -> String {
    resource_id::vm_name_from_provider_id(provider_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capz_controller_azure::ClientsContext;
    use capz_controller_core::Environment;
    use capz_controller_k8s_api::{
        cluster::AzureClusterSpec,
        machine::OsDisk,
        machine_pool::{AzureMachinePoolSpec, DeletePolicy, MachinePoolTemplate},
        network::{NetworkSpec, SubnetSpec, VnetSpec},
        AzureCluster,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn cluster_scope() -> ClusterScope {
        let cluster = AzureCluster {
            metadata: ObjectMeta {
                name: Some("my-cluster".to_string()),
                namespace: Some("default".to_string()),
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

    fn pool(name: &str, os: OsType, strategy: Option<MachinePoolDeploymentStrategy>) -> AzureMachinePool {
        AzureMachinePool {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: AzureMachinePoolSpec {
                template: MachinePoolTemplate {
                    vm_size: "Standard_D2s_v3".to_string(),
                    os_disk: OsDisk { os_type: os, ..Default::default() },
                    ..Default::default()
                },
                strategy: strategy.unwrap_or_default(),
                ..Default::default()
            },
            status: None,
        }
    }

    fn instance(id: &str, image_version: &str) -> VmssInstance {
        VmssInstance {
            instance_id: id.to_string(),
            name: format!("pool0_{id}"),
            provider_id: format!(
                "azure:///subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.Compute/virtualMachineScaleSets/pool0/virtualMachines/{id}"
            ),
            image_version: image_version.to_string(),
        }
    }

    #[test]
    fn windows_pool_names_are_truncated() {
        let cluster = cluster_scope();
        let scope =
            MachinePoolScope::new(&cluster, pool("winpool-00", OsType::Windows, None), 1).unwrap();
        assert_eq!(scope.name(), "win-ol-00");

        let scope = MachinePoolScope::new(&cluster, pool("pool0", OsType::Linux, None), 1).unwrap();
        assert_eq!(scope.name(), "pool0");
    }

    #[rstest]
    #[case(3, None, 1)]
    #[case(3, Some(IntOrPercent::Int(2)), 2)]
    #[case(4, Some(IntOrPercent::Percent("50%".to_string())), 2)]
    #[case(3, Some(IntOrPercent::Percent("50%".to_string())), 2)]
    #[case(10, Some(IntOrPercent::Percent("1%".to_string())), 1)]
    fn max_surge(#[case] replicas: i32, #[case] surge: Option<IntOrPercent>, #[case] want: i32) {
        let cluster = cluster_scope();
        let strategy = surge.map(|max_surge| MachinePoolDeploymentStrategy::RollingUpdate {
            max_surge: Some(max_surge),
            delete_policy: DeletePolicy::Oldest,
        });
        let scope =
            MachinePoolScope::new(&cluster, pool("pool0", OsType::Linux, strategy), replicas)
                .unwrap();
        assert_eq!(scope.max_surge().unwrap(), want);
    }

    #[test]
    fn bad_percent_is_rejected() {
        let cluster = cluster_scope();
        let strategy = MachinePoolDeploymentStrategy::RollingUpdate {
            max_surge: Some(IntOrPercent::Percent("half".to_string())),
            delete_policy: DeletePolicy::Oldest,
        };
        let scope =
            MachinePoolScope::new(&cluster, pool("pool0", OsType::Linux, Some(strategy)), 3)
                .unwrap();
        assert!(matches!(scope.max_surge(), Err(ScopeError::InvalidMaxSurge(_))));
    }

    #[test]
    fn requeue_until_converged() {
        let cluster = cluster_scope();
        let scope = MachinePoolScope::new(&cluster, pool("pool0", OsType::Linux, None), 2).unwrap();

        let converged = VmssState {
            provisioning_state: Some(ProvisioningState::Succeeded),
            image_version: "1.22.0".to_string(),
            instances: vec![instance("0", "1.22.0"), instance("1", "1.22.0")],
        };
        assert!(!scope.needs_requeue(&converged));

        let mut updating = converged.clone();
        updating.provisioning_state = Some(ProvisioningState::Updating);
        assert!(scope.needs_requeue(&updating));

        let mut scaling = converged.clone();
        scaling.instances.pop();
        assert!(scope.needs_requeue(&scaling));

        let mut stale_image = converged;
        stale_image.instances[1].image_version = "1.21.1".to_string();
        assert!(scope.needs_requeue(&stale_image));
    }

    #[test]
    fn surplus_mirrors_are_oldest_first() {
        let at = |secs: i64| Some(DateTime::<Utc>::from_timestamp(secs, 0).unwrap());
        let mirrors = vec![
            ("m-new".to_string(), at(300)),
            ("m-old".to_string(), at(100)),
            ("m-mid".to_string(), at(200)),
            ("m-unstamped".to_string(), None),
        ];

        assert_eq!(surplus_mirrors(mirrors.clone(), 2), vec!["m-old", "m-mid"]);
        assert_eq!(surplus_mirrors(mirrors.clone(), 4), Vec::<String>::new());
        assert_eq!(surplus_mirrors(mirrors, 5), Vec::<String>::new());
    }

    #[test]
    fn scale_set_spec_defaults_from_the_cluster() {
        let cluster = cluster_scope();
        let scope = MachinePoolScope::new(&cluster, pool("pool0", OsType::Linux, None), 3).unwrap();

        let spec = scope.scale_set_spec().unwrap();
        assert_eq!(spec.location, "eastus");
        assert_eq!(spec.capacity, 3);
        assert!(spec.subnet_id.ends_with("/virtualNetworks/vnet/subnets/nodes"));
        assert_eq!(
            spec.tags.get("sigs.k8s.io_cluster-api-provider-azure_cluster_my-cluster"),
            Some(&"owned".to_string())
        );
    }

    #[test]
    fn provider_id_forms() {
        assert_eq!(
            vm_id_from_provider_id(
                "azure:///subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachineScaleSets/pool0/virtualMachines/4"
            ),
            "4"
        );
        assert_eq!(vm_id_from_provider_id("not-azure"), "");
    }
}
