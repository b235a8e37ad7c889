//! The machine scope: derivations for one Azure virtual machine.

use crate::{cluster::ClusterScope, specs, version::KubernetesVersion, ScopeError};
use capz_controller_core::{names, names::OsType, resource_id};
use capz_controller_k8s_api::{
    machine::{Image, NetworkInterface, SystemAssignedIdentityRole, VmIdentity},
    network::{LoadBalancerType, SubnetRole},
    AzureMachine, ResourceExt, MACHINE_CONTROL_PLANE_LABEL, MACHINE_DEPLOYMENT_NAME_LABEL,
    MACHINE_SET_NAME_LABEL, WINDOWS_RUNTIME_ANNOTATION, WINDOWS_SERVER_VERSION_ANNOTATION,
};
use std::collections::BTreeMap;

/// Azure built-in Contributor role definition.
const CONTRIBUTOR_ROLE_ID: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";

const BOOTSTRAP_EXTENSION_PUBLISHER: &str = "Microsoft.Azure.ContainerUpstream";
const BOOTSTRAP_EXTENSION_VERSION: &str = "1.0";

/// Waits for the bootstrap provider to drop its sentinel file, so the VM
/// extension reports provisioning success only once kubeadm has finished.
const LINUX_BOOTSTRAP_EXTENSION_COMMAND: &str =
    "for i in $(seq 1 3600); do if [ -f /run/cluster-api/bootstrap-success.complete ]; then exit 0; fi; sleep 1; done; exit 1";

const WINDOWS_BOOTSTRAP_EXTENSION_COMMAND: &str =
    "powershell.exe -Command \"for ($i = 0; $i -lt 3600; $i++) { if (Test-Path 'C:/run/cluster-api/bootstrap-success.complete') { exit 0 }; Start-Sleep -Seconds 1 }; exit 1\"";

const DEFAULT_IMAGE_PUBLISHER: &str = "cncf-upstream";
const DEFAULT_LINUX_OFFER: &str = "capi";
const DEFAULT_LINUX_SKU: &str = "ubuntu-2204-gen1";
const DEFAULT_WINDOWS_OFFER: &str = "capi-windows";

pub struct MachineScope<'a> {
    cluster: &'a ClusterScope,
    machine: AzureMachine,
    machine_name: String,
    /// Kubernetes version of the owning machine, e.g. `v1.22.0`.
    kubernetes_version: String,
}

// === impl MachineScope ===

impl<'a> MachineScope<'a> {
    pub fn new(
        cluster: &'a ClusterScope,
        machine: AzureMachine,
        kubernetes_version: impl Into<String>,
    ) -> Result<Self, ScopeError> {
        let machine_name = machine
            .metadata
            .name
            .clone()
            .ok_or(ScopeError::MissingMetadata("name"))?;
        Ok(Self {
            cluster,
            machine,
            machine_name,
            kubernetes_version: kubernetes_version.into(),
        })
    }

    pub fn os_type(&self) -> OsType {
        self.machine.spec.os_disk.os_type
    }

    pub fn is_control_plane(&self) -> bool {
        self.machine.labels().contains_key(MACHINE_CONTROL_PLANE_LABEL)
    }

    /// The Azure VM name: the provider-ID tail once one has been assigned,
    /// otherwise derived from the machine name and OS.
    pub fn name(&self) -> String {
        if let Some(id) = &self.machine.spec.provider_id {
            let from_id = resource_id::vm_name_from_provider_id(id);
            if !from_id.is_empty() {
                return from_id;
            }
        }
        names::vm_name(&self.machine_name, self.os_type())
    }

    /// Tags written on the machine's resources: the cluster's legacy
    /// ownership marker plus the machine's own additional tags.
    fn tags(&self) -> specs::Tags {
        let mut tags = self.machine.spec.additional_tags.clone();
        let (key, value) = names::legacy_cluster_owned_tag(self.cluster.cluster_name());
        tags.insert(key, value);
        tags
    }

    /// One NIC spec per configured interface (one default interface when
    /// none are configured), with load-balancer wiring decided by the
    /// machine's role, the API LB type, and NAT-gateway presence.
    pub fn nic_specs(&self) -> Result<Vec<specs::NicSpec>, ScopeError> {
        let default_interface;
        let interfaces: &[NetworkInterface] = if self.machine.spec.network_interfaces.is_empty() {
            default_interface = [NetworkInterface::default()];
            &default_interface
        } else {
            &self.machine.spec.network_interfaces
        };

        let (vnet_name, vnet_group) = self.cluster.vnet()?;
        let vm_name = self.name();
        let total = interfaces.len();

        let mut out = Vec::with_capacity(total);
        for (index, interface) in interfaces.iter().enumerate() {
            let subnet_name = self.subnet_name_for(interface)?;
            let subnet = self
                .cluster
                .network()
                .subnet(&subnet_name)
                .ok_or_else(|| ScopeError::SubnetNotFound(subnet_name.clone()))?;

            let mut spec = specs::NicSpec {
                name: names::nic_name(&vm_name, index, total),
                resource_group: self.cluster.resource_group().to_string(),
                location: self.cluster.location().to_string(),
                subscription_id: self.cluster.subscription_id().to_string(),
                vnet_name: vnet_name.clone(),
                vnet_resource_group: vnet_group.clone(),
                subnet_name,
                accelerated_networking: interface.accelerated_networking,
                ip_config_count: interface.private_ip_config_count.unwrap_or(1),
                dns_servers: interface.dns_servers.clone(),
                tags: self.tags(),
                ..specs::NicSpec::default()
            };

            if self.is_control_plane() {
                let api_lb = self.cluster.api_server_lb();
                match api_lb.lb_type {
                    LoadBalancerType::Public => {
                        spec.public_lb_name = api_lb.name.clone();
                        spec.public_lb_address_pool_name = api_lb.backend_pool_name(false);
                        spec.public_lb_nat_rule_name = vm_name.clone();
                    }
                    LoadBalancerType::Internal => {
                        spec.internal_lb_name = api_lb.name.clone();
                        spec.internal_lb_address_pool_name = api_lb.backend_pool_name(false);
                    }
                }
            } else if subnet.nat_gateway.is_none() {
                if let Some(outbound) = self.cluster.node_outbound_lb() {
                    spec.public_lb_name = outbound.name.clone();
                    spec.public_lb_address_pool_name = outbound.backend_pool_name(true);
                }
            }

            if self.machine.spec.allocate_public_ip && index == 0 {
                spec.public_ip_name = names::public_ip_name(&vm_name);
            }

            out.push(spec);
        }
        Ok(out)
    }

    /// SSH NAT rules on the API-server LB. Only control-plane machines
    /// behind a public API LB get one; an internal LB has no public frontend
    /// to NAT through.
    pub fn inbound_nat_specs(&self) -> Vec<specs::InboundNatSpec> {
        if !self.is_control_plane() {
            return Vec::new();
        }
        let api_lb = self.cluster.api_server_lb();
        if api_lb.lb_type != LoadBalancerType::Public {
            return Vec::new();
        }

        vec![specs::InboundNatSpec {
            name: self.name(),
            load_balancer_name: api_lb.name.clone(),
            resource_group: self.cluster.resource_group().to_string(),
            frontend_ip_config_id: resource_id::frontend_ip_config_id(
                self.cluster.subscription_id(),
                self.cluster.resource_group(),
                &api_lb.name,
                &api_lb.frontend_ip_name(),
            ),
        }]
    }

    /// The role assignment granted to a system-assigned identity:
    /// Contributor on the subscription unless the user narrowed it.
    pub fn role_assignment_specs(&self) -> Vec<specs::RoleAssignmentSpec> {
        if self.machine.spec.identity != VmIdentity::SystemAssigned {
            return Vec::new();
        }

        let sub = self.cluster.subscription_id();
        let role = self.machine.spec.system_assigned_identity_role.clone().unwrap_or_default();
        let SystemAssignedIdentityRole { name, scope, definition_id } = role;

        vec![specs::RoleAssignmentSpec {
            principal_resource_id: format!(
                "/subscriptions/{sub}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
                self.cluster.resource_group(),
                self.name(),
            ),
            scope: scope.unwrap_or_else(|| format!("/subscriptions/{sub}/")),
            role_definition_id: definition_id.unwrap_or_else(|| {
                format!(
                    "/subscriptions/{sub}/providers/Microsoft.Authorization/roleDefinitions/{CONTRIBUTOR_ROLE_ID}"
                )
            }),
            name,
        }]
    }

    /// User extensions first, then the bootstrap-tracking extension on the
    /// public cloud. Other clouds do not publish the bootstrap extension.
    pub fn vm_extension_specs(&self) -> Vec<specs::VmExtensionSpec> {
        let vm_name = self.name();
        let extension = |name: &str,
                         publisher: &str,
                         extension_version: &str,
                         settings: BTreeMap<String, String>,
                         protected: BTreeMap<String, String>| {
            specs::VmExtensionSpec {
                name: name.to_string(),
                vm_name: vm_name.clone(),
                resource_group: self.cluster.resource_group().to_string(),
                location: self.cluster.location().to_string(),
                publisher: publisher.to_string(),
                version: extension_version.to_string(),
                settings,
                protected_settings: protected,
            }
        };

        let mut out: Vec<_> = self
            .machine
            .spec
            .vm_extensions
            .iter()
            .map(|e| {
                extension(
                    &e.name,
                    &e.publisher,
                    &e.version,
                    e.settings.clone(),
                    e.protected_settings.clone(),
                )
            })
            .collect();

        if self.cluster.clients().environment().is_public_cloud() {
            let (name, command) = match self.os_type() {
                OsType::Linux => ("CAPZ.Linux.Bootstrapping", LINUX_BOOTSTRAP_EXTENSION_COMMAND),
                OsType::Windows => {
                    ("CAPZ.Windows.Bootstrapping", WINDOWS_BOOTSTRAP_EXTENSION_COMMAND)
                }
            };
            let mut protected = BTreeMap::new();
            protected.insert("commandToExecute".to_string(), command.to_string());
            out.push(extension(
                name,
                BOOTSTRAP_EXTENSION_PUBLISHER,
                BOOTSTRAP_EXTENSION_VERSION,
                BTreeMap::new(),
                protected,
            ));
        }
        out
    }

    /// Resolves the machine's image: the explicit one when set, otherwise a
    /// marketplace default keyed by OS, Kubernetes version, and the Windows
    /// annotations.
    pub fn vm_image(&self) -> Result<Image, ScopeError> {
        if let Some(image) = &self.machine.spec.image {
            return Ok(image.clone());
        }

        let version = KubernetesVersion::parse(&self.kubernetes_version)?;
        let image_version = KubernetesVersion::azure_form(&self.kubernetes_version).to_string();
        let marketplace = |offer: &str, sku: String| Image::Marketplace {
            publisher: DEFAULT_IMAGE_PUBLISHER.to_string(),
            offer: offer.to_string(),
            sku,
            version: image_version.clone(),
        };

        match self.os_type() {
            OsType::Linux => Ok(marketplace(DEFAULT_LINUX_OFFER, DEFAULT_LINUX_SKU.to_string())),
            OsType::Windows => {
                let annotations = self.machine.annotations();
                let server_version = annotations
                    .get(WINDOWS_SERVER_VERSION_ANNOTATION)
                    .map(String::as_str)
                    .unwrap_or("windows-2019");
                let runtime = annotations.get(WINDOWS_RUNTIME_ANNOTATION).map(String::as_str);

                if version.at_least(1, 22) {
                    Ok(marketplace(DEFAULT_WINDOWS_OFFER, format!("{server_version}-containerd")))
                } else if runtime == Some("containerd") {
                    Err(ScopeError::ContainerdUnsupportedOnPre122)
                } else {
                    Ok(marketplace(DEFAULT_WINDOWS_OFFER, server_version.to_string()))
                }
            }
        }
    }

    /// The availability set this machine joins, or `None` when the cluster
    /// spreads machines across availability zones instead. Control-plane
    /// machines share one set; workers are grouped by their deployment (or,
    /// failing that, their machine set).
    pub fn availability_set(&self) -> Option<String> {
        if self.cluster.has_failure_domains() {
            return None;
        }

        let labels = self.machine.labels();
        let base = if self.is_control_plane() {
            "control-plane".to_string()
        } else if let Some(md) = labels.get(MACHINE_DEPLOYMENT_NAME_LABEL) {
            md.clone()
        } else if let Some(ms) = labels.get(MACHINE_SET_NAME_LABEL) {
            ms.clone()
        } else {
            return None;
        };
        Some(names::availability_set_name(self.cluster.cluster_name(), &base))
    }

    pub fn availability_set_spec(&self) -> Option<specs::AvailabilitySetSpec> {
        Some(specs::AvailabilitySetSpec {
            name: self.availability_set()?,
            resource_group: self.cluster.resource_group().to_string(),
            location: self.cluster.location().to_string(),
            tags: self.tags(),
        })
    }

    /// The OS disk plus one spec per data disk.
    pub fn disk_specs(&self) -> Vec<specs::DiskSpec> {
        let vm_name = self.name();
        let mut out = vec![specs::DiskSpec {
            name: names::os_disk_name(&vm_name),
            resource_group: self.cluster.resource_group().to_string(),
        }];
        out.extend(self.machine.spec.data_disks.iter().map(|d| specs::DiskSpec {
            name: names::data_disk_name(&vm_name, &d.name_suffix),
            resource_group: self.cluster.resource_group().to_string(),
        }));
        out
    }

    pub fn public_ip_specs(&self) -> Vec<specs::PublicIpSpec> {
        if !self.machine.spec.allocate_public_ip {
            return Vec::new();
        }
        vec![specs::PublicIpSpec {
            name: names::public_ip_name(&self.name()),
            resource_group: self.cluster.resource_group().to_string(),
            location: self.cluster.location().to_string(),
            dns_name: None,
            tags: self.tags(),
        }]
    }

    fn subnet_name_for(&self, interface: &NetworkInterface) -> Result<String, ScopeError> {
        if !interface.subnet_name.is_empty() {
            return Ok(interface.subnet_name.clone());
        }
        if !self.machine.spec.subnet_name.is_empty() {
            return Ok(self.machine.spec.subnet_name.clone());
        }
        let wanted = if self.is_control_plane() { SubnetRole::ControlPlane } else { SubnetRole::Node };
        self.cluster
            .network()
            .subnets
            .iter()
            .find(|s| s.role == wanted)
            .map(|s| s.name.clone())
            .ok_or_else(|| ScopeError::SubnetNotFound(String::new()))
    }
}
