//! The cluster scope: derivations for cluster-wide Azure resources.

use crate::{specs, ScopeError};
use capz_controller_azure::ClientsContext;
use capz_controller_core::{annotations, names, resource_id, ResourceId};
use capz_controller_k8s_api::{
    network::{
        LoadBalancerSpec, LoadBalancerType, SecurityRule, SecurityRuleAccess,
        SecurityRuleDirection, SubnetRole, SubnetSpec,
    },
    AzureCluster, ResourceExt,
};
use std::cell::Cell;
use std::collections::BTreeMap;

/// Derives specs for everything a workload cluster shares: resource groups,
/// the VNet and its subnets, NSGs, route tables, NAT gateways, load
/// balancers, public IPs, and private endpoints.
///
/// Constructed once per reconcile; the other scopes borrow it read-only.
pub struct ClusterScope {
    clients: ClientsContext,
    cluster: AzureCluster,
    cluster_name: String,
    namespace: String,
    // Valid for this reconcile only.
    vnet_managed: Cell<Option<bool>>,
}

// === impl ClusterScope ===

impl ClusterScope {
    pub fn new(clients: ClientsContext, cluster: AzureCluster) -> Result<Self, ScopeError> {
        let cluster_name = cluster
            .metadata
            .name
            .clone()
            .ok_or(ScopeError::MissingMetadata("name"))?;
        let namespace = cluster
            .metadata
            .namespace
            .clone()
            .ok_or(ScopeError::MissingMetadata("namespace"))?;
        Ok(Self {
            clients,
            cluster,
            cluster_name,
            namespace,
            vnet_managed: Cell::new(None),
        })
    }

    pub fn clients(&self) -> &ClientsContext {
        &self.clients
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn subscription_id(&self) -> &str {
        self.clients.subscription_id()
    }

    pub fn location(&self) -> &str {
        &self.cluster.spec.location
    }

    pub fn resource_group(&self) -> &str {
        &self.cluster.spec.resource_group
    }

    pub fn cloud_name(&self) -> &str {
        self.clients.cloud_name()
    }

    pub fn network(&self) -> &capz_controller_k8s_api::network::NetworkSpec {
        &self.cluster.spec.network_spec
    }

    /// Tags written on every cluster-owned resource: the user's additional
    /// tags plus the ownership marker.
    pub fn tags(&self) -> specs::Tags {
        let mut tags = self.cluster.spec.additional_tags.clone();
        let (key, value) = names::cluster_owned_tag(&self.cluster_name);
        tags.insert(key, value);
        tags
    }

    /// True when the cluster offers availability zones to its machines.
    pub fn has_failure_domains(&self) -> bool {
        !self.cluster.spec.failure_domains.is_empty()
    }

    /// The VNet's (name, resource group). A bare resource ID is enough: name
    /// and group are recovered from it. An unnamed VNet gets the conventional
    /// `<cluster>-vnet`.
    pub fn vnet(&self) -> Result<(String, String), ScopeError> {
        let vnet = &self.cluster.spec.network_spec.vnet;
        if vnet.name.is_empty() {
            if let Some(id) = &vnet.id {
                let parsed = ResourceId::parse(id)?;
                return Ok((parsed.name, parsed.resource_group));
            }
        }

        let name = if vnet.name.is_empty() {
            format!("{}-vnet", self.cluster_name)
        } else {
            vnet.name.clone()
        };
        let group = vnet
            .resource_group
            .clone()
            .unwrap_or_else(|| self.cluster.spec.resource_group.clone());
        Ok((name, group))
    }

    pub fn api_server_lb(&self) -> LoadBalancerSpec {
        let mut lb = self.cluster.spec.network_spec.api_server_lb.clone();
        if lb.name.is_empty() {
            lb.name = match lb.lb_type {
                LoadBalancerType::Public => format!("{}-public-lb", self.cluster_name),
                LoadBalancerType::Internal => format!("{}-internal-lb", self.cluster_name),
            };
        }
        lb
    }

    pub fn node_outbound_lb(&self) -> Option<LoadBalancerSpec> {
        let mut lb = self.cluster.spec.network_spec.node_outbound_lb.clone()?;
        if lb.name.is_empty() {
            lb.name = self.cluster_name.clone();
        }
        Some(lb)
    }

    pub fn control_plane_outbound_lb(&self) -> Option<LoadBalancerSpec> {
        let mut lb = self
            .cluster
            .spec
            .network_spec
            .control_plane_outbound_lb
            .clone()?;
        if lb.name.is_empty() {
            lb.name = format!("{}-outbound-lb", self.cluster_name);
        }
        Some(lb)
    }

    /// Whether this provider owns the VNet. `observed_tags` is the live
    /// VNet's tag set, `None` when the VNet does not exist yet; a missing
    /// VNet is about to be created by us and is therefore managed. Cached
    /// for the remainder of the reconcile.
    pub fn is_vnet_managed(&self, observed_tags: Option<&BTreeMap<String, String>>) -> bool {
        if let Some(cached) = self.vnet_managed.get() {
            return cached;
        }
        let managed = match observed_tags {
            None => true,
            Some(tags) => {
                let (key, value) = names::cluster_owned_tag(&self.cluster_name);
                tags.get(&key).is_some_and(|v| *v == value)
            }
        };
        self.vnet_managed.set(Some(managed));
        managed
    }

    /// The primary resource group, plus the VNet's group when it lives
    /// elsewhere.
    pub fn resource_group_specs(&self) -> Result<Vec<specs::ResourceGroupSpec>, ScopeError> {
        let group = |name: &str| specs::ResourceGroupSpec {
            handle: names::kubernetes_normalized(name),
            name: name.to_string(),
            location: self.cluster.spec.location.clone(),
            tags: self.tags(),
        };

        let mut groups = vec![group(&self.cluster.spec.resource_group)];
        let (_, vnet_group) = self.vnet()?;
        if vnet_group != self.cluster.spec.resource_group {
            groups.push(group(&vnet_group));
        }
        Ok(groups)
    }

    pub fn vnet_spec(&self) -> Result<specs::VirtualNetworkSpec, ScopeError> {
        let (name, resource_group) = self.vnet()?;
        Ok(specs::VirtualNetworkSpec {
            name,
            resource_group,
            location: self.cluster.spec.location.clone(),
            cidr_blocks: self.cluster.spec.network_spec.vnet.cidr_blocks.clone(),
            tags: self.tags(),
        })
    }

    pub fn subnet_specs(&self, vnet_managed: bool) -> Result<Vec<specs::SubnetSpec>, ScopeError> {
        let (vnet_name, vnet_group) = self.vnet()?;
        let subnet = |s: &SubnetSpec| specs::SubnetSpec {
            name: s.name.clone(),
            vnet_name: vnet_name.clone(),
            vnet_resource_group: vnet_group.clone(),
            cidr_blocks: s.cidr_blocks.clone(),
            security_group_name: self.security_group_name(s),
            route_table_name: s.route_table.as_ref().map(|rt| rt.name.clone()),
            nat_gateway_name: s.nat_gateway.as_ref().map(|n| n.name.clone()),
            service_endpoints: s.service_endpoints.clone(),
            subscription_id: self.clients.subscription_id().to_string(),
            is_vnet_managed: vnet_managed,
        };

        let mut out: Vec<_> = self
            .cluster
            .spec
            .network_spec
            .subnets
            .iter()
            .map(subnet)
            .collect();
        if let Some(bastion) = self.cluster.spec.bastion_spec.as_ref().and_then(|b| b.subnet.as_ref()) {
            out.push(subnet(bastion));
        }
        Ok(out)
    }

    /// NSG specs for every subnet that carries (or defaults) a security
    /// group. The control-plane subnet always gets one so that the default
    /// ingress rules have somewhere to live.
    pub fn security_group_specs(&self) -> Result<Vec<specs::SecurityGroupSpec>, ScopeError> {
        let (_, vnet_group) = self.vnet()?;
        let annotations = self.cluster.annotations();

        let mut out = Vec::new();
        for subnet in &self.cluster.spec.network_spec.subnets {
            let Some(name) = self.security_group_name(subnet) else {
                continue;
            };
            let mut rules = subnet
                .security_group
                .as_ref()
                .map(|sg| sg.security_rules.clone())
                .unwrap_or_default();
            if subnet.role == SubnetRole::ControlPlane {
                inject_default_control_plane_rules(&mut rules);
            }
            out.push(specs::SecurityGroupSpec {
                last_applied: annotations::last_applied_security_rules(annotations, &name),
                name,
                resource_group: vnet_group.clone(),
                location: self.cluster.spec.location.clone(),
                security_rules: rules,
                tags: self.tags(),
            });
        }
        Ok(out)
    }

    pub fn route_table_specs(&self) -> Result<Vec<specs::RouteTableSpec>, ScopeError> {
        let (_, vnet_group) = self.vnet()?;
        Ok(self
            .cluster
            .spec
            .network_spec
            .subnets
            .iter()
            .filter_map(|s| s.route_table.as_ref())
            .map(|rt| specs::RouteTableSpec {
                name: rt.name.clone(),
                resource_group: vnet_group.clone(),
                location: self.cluster.spec.location.clone(),
            })
            .collect())
    }

    pub fn nat_gateway_specs(&self) -> Vec<specs::NatGatewaySpec> {
        self.cluster
            .spec
            .network_spec
            .subnets
            .iter()
            .filter_map(|s| s.nat_gateway.as_ref().map(|n| (s, n)))
            .map(|(subnet, nat)| specs::NatGatewaySpec {
                name: nat.name.clone(),
                resource_group: self.cluster.spec.resource_group.clone(),
                location: self.cluster.spec.location.clone(),
                public_ip_name: self.nat_gateway_ip_name(&subnet.name, nat),
                subscription_id: self.clients.subscription_id().to_string(),
                tags: self.tags(),
            })
            .collect()
    }

    /// Load balancers to reconcile: the API-server LB always; the
    /// node-outbound LB only when no node subnet already provides SNAT
    /// through a NAT gateway; the control-plane-outbound LB only when the
    /// API LB is internal.
    pub fn lb_specs(&self) -> Result<Vec<specs::LoadBalancerSpec>, ScopeError> {
        let mut out = Vec::new();

        let api_lb = self.api_server_lb();
        let (frontend, subnet_id) = match api_lb.lb_type {
            LoadBalancerType::Public => (specs::FrontendKind::Public, None),
            LoadBalancerType::Internal => {
                (specs::FrontendKind::Internal, self.control_plane_subnet_id()?)
            }
        };
        out.push(self.lb_spec(
            &api_lb,
            specs::LoadBalancerRole::ApiServer,
            frontend,
            self.frontend_ip_names(&api_lb, "apiserver"),
            subnet_id,
        ));

        if let Some(lb) = self.node_outbound_lb() {
            let nodes_have_nat = self
                .cluster
                .spec
                .network_spec
                .node_subnets()
                .any(|s| s.nat_gateway.is_some());
            if !nodes_have_nat {
                out.push(self.lb_spec(
                    &lb,
                    specs::LoadBalancerRole::Outbound,
                    specs::FrontendKind::Public,
                    self.frontend_ip_names(&lb, "node-outbound"),
                    None,
                ));
            }
        }

        if api_lb.lb_type == LoadBalancerType::Internal {
            if let Some(lb) = self.control_plane_outbound_lb() {
                out.push(self.lb_spec(
                    &lb,
                    specs::LoadBalancerRole::Outbound,
                    specs::FrontendKind::Public,
                    self.frontend_ip_names(&lb, "controlplane-outbound"),
                    None,
                ));
            }
        }

        Ok(out)
    }

    /// Public IPs for LB frontends, NAT gateways, and the bastion host.
    pub fn public_ip_specs(&self) -> Result<Vec<specs::PublicIpSpec>, ScopeError> {
        let ip = |name: String| specs::PublicIpSpec {
            name,
            resource_group: self.cluster.spec.resource_group.clone(),
            location: self.cluster.spec.location.clone(),
            dns_name: None,
            tags: self.tags(),
        };

        let mut out = Vec::new();
        for lb in self.lb_specs()? {
            if lb.frontend == specs::FrontendKind::Public {
                out.extend(lb.frontend_public_ip_names.iter().cloned().map(ip));
            }
        }
        for subnet in &self.cluster.spec.network_spec.subnets {
            if let Some(nat) = &subnet.nat_gateway {
                let mut spec = ip(self.nat_gateway_ip_name(&subnet.name, nat));
                spec.dns_name = nat.public_ip.as_ref().and_then(|p| p.dns_name.clone());
                out.push(spec);
            }
        }
        if let Some(bastion) = &self.cluster.spec.bastion_spec {
            let name = bastion
                .public_ip
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| format!("pip-{}-bastion", self.cluster_name));
            out.push(ip(name));
        }
        Ok(out)
    }

    pub fn private_endpoint_specs(&self) -> Result<Vec<specs::PrivateEndpointSpec>, ScopeError> {
        let (vnet_name, vnet_group) = self.vnet()?;
        let mut out = Vec::new();
        for subnet in &self.cluster.spec.network_spec.subnets {
            let subnet_id = resource_id::subnet_id(
                self.clients.subscription_id(),
                &vnet_group,
                &vnet_name,
                &subnet.name,
            );
            for endpoint in &subnet.private_endpoints {
                out.push(specs::PrivateEndpointSpec {
                    name: endpoint.name.clone(),
                    resource_group: self.cluster.spec.resource_group.clone(),
                    location: self.cluster.spec.location.clone(),
                    subnet_id: subnet_id.clone(),
                    connections: endpoint.private_link_service_connections.clone(),
                    manual_approval: endpoint.manual_approval,
                    tags: self.tags(),
                });
            }
        }
        Ok(out)
    }

    fn security_group_name(&self, subnet: &SubnetSpec) -> Option<String> {
        if let Some(sg) = &subnet.security_group {
            return Some(sg.name.clone());
        }
        // The control-plane subnet always gets an NSG, so the default
        // ingress rules have a home.
        (subnet.role == SubnetRole::ControlPlane)
            .then(|| format!("{}-controlplane-nsg", self.cluster_name))
    }

    fn nat_gateway_ip_name(
        &self,
        subnet_name: &str,
        nat: &capz_controller_k8s_api::network::NatGateway,
    ) -> String {
        nat.public_ip
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("pip-{}-{subnet_name}-natgw", self.cluster_name))
    }

    fn control_plane_subnet_id(&self) -> Result<Option<String>, ScopeError> {
        let (vnet_name, vnet_group) = self.vnet()?;
        Ok(self
            .cluster
            .spec
            .network_spec
            .control_plane_subnet()
            .map(|s| {
                resource_id::subnet_id(
                    self.clients.subscription_id(),
                    &vnet_group,
                    &vnet_name,
                    &s.name,
                )
            }))
    }

    fn frontend_ip_names(&self, lb: &LoadBalancerSpec, purpose: &str) -> Vec<String> {
        let count = lb.frontend_ips_count.unwrap_or(1).max(1);
        (0..count)
            .map(|i| {
                if i == 0 {
                    format!("pip-{}-{purpose}", self.cluster_name)
                } else {
                    format!("pip-{}-{purpose}-{i}", self.cluster_name)
                }
            })
            .collect()
    }

    fn lb_spec(
        &self,
        lb: &LoadBalancerSpec,
        role: specs::LoadBalancerRole,
        frontend: specs::FrontendKind,
        frontend_public_ip_names: Vec<String>,
        subnet_id: Option<String>,
    ) -> specs::LoadBalancerSpec {
        specs::LoadBalancerSpec {
            name: lb.name.clone(),
            resource_group: self.cluster.spec.resource_group.clone(),
            location: self.cluster.spec.location.clone(),
            role,
            frontend,
            frontend_public_ip_names,
            subnet_id,
            private_ip: lb.private_ip.clone(),
            backend_pool_name: lb.backend_pool_name(role == specs::LoadBalancerRole::Outbound),
            idle_timeout_in_minutes: lb.idle_timeout_in_minutes,
            subscription_id: self.clients.subscription_id().to_string(),
            tags: self.tags(),
        }
    }
}

/// Appends the SSH and Kubernetes API ingress rules unless rules with those
/// names already exist. Re-running never duplicates.
fn inject_default_control_plane_rules(rules: &mut Vec<SecurityRule>) {
    let default_rule = |name: &str, priority: i32, port: &str, description: &str| SecurityRule {
        name: name.to_string(),
        description: description.to_string(),
        protocol: "Tcp".to_string(),
        direction: SecurityRuleDirection::Inbound,
        priority: Some(priority),
        source: Some("*".to_string()),
        source_ports: Some("*".to_string()),
        destination: Some("*".to_string()),
        destination_ports: Some(port.to_string()),
        action: SecurityRuleAccess::Allow,
    };

    for rule in [
        default_rule("allow_ssh", 2200, "22", "Allow SSH"),
        default_rule("allow_apiserver", 2201, "6443", "Allow Kubernetes API server"),
    ] {
        if !rules.iter().any(|r| r.name == rule.name) {
            rules.push(rule);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capz_controller_core::Environment;
    use capz_controller_k8s_api::{
        cluster::AzureClusterSpec,
        network::{NatGateway, NetworkSpec, SecurityGroup, VnetSpec},
        ObjectMeta,
    };
    use pretty_assertions::assert_eq;

    fn scope_with(spec: AzureClusterSpec) -> ClusterScope {
        let cluster = AzureCluster {
            metadata: ObjectMeta {
                name: Some("my-cluster".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        };
        let clients = ClientsContext::new("sub-1", Environment::public_cloud());
        ClusterScope::new(clients, cluster).unwrap()
    }

    fn base_spec() -> AzureClusterSpec {
        AzureClusterSpec {
            subscription_id: "sub-1".to_string(),
            location: "eastus".to_string(),
            resource_group: "my-rg".to_string(),
            network_spec: NetworkSpec {
                vnet: VnetSpec { name: "my-vnet".to_string(), ..Default::default() },
                subnets: vec![
                    SubnetSpec {
                        name: "control-plane-subnet".to_string(),
                        role: SubnetRole::ControlPlane,
                        security_group: Some(SecurityGroup {
                            name: "cp-nsg".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    SubnetSpec { name: "subnet1".to_string(), ..Default::default() },
                ],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn second_group_emitted_for_remote_vnet() {
        let mut spec = base_spec();
        spec.network_spec.vnet.resource_group = Some("Vnet_RG".to_string());
        let scope = scope_with(spec);

        let groups = scope.resource_group_specs().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].handle, "my-rg");
        assert_eq!(groups[1].name, "Vnet_RG");
        assert_eq!(groups[1].handle, "vnet-rg");
    }

    #[test]
    fn vnet_recovered_from_bare_id() {
        let mut spec = base_spec();
        spec.network_spec.vnet = VnetSpec {
            id: Some(
                "/subscriptions/sub-1/resourceGroups/other-rg/providers/Microsoft.Network/virtualNetworks/shared-vnet"
                    .to_string(),
            ),
            ..Default::default()
        };
        let scope = scope_with(spec);

        assert_eq!(
            scope.vnet().unwrap(),
            ("shared-vnet".to_string(), "other-rg".to_string())
        );
    }

    #[test]
    fn vnet_managed_cached_per_reconcile() {
        let scope = scope_with(base_spec());
        let mut owned = BTreeMap::new();
        let (key, value) = names::cluster_owned_tag("my-cluster");
        owned.insert(key, value);

        assert!(scope.is_vnet_managed(Some(&owned)));
        // The second observation is ignored; the first answer is cached.
        assert!(scope.is_vnet_managed(Some(&BTreeMap::new())));

        let fresh = scope_with(base_spec());
        assert!(!fresh.is_vnet_managed(Some(&BTreeMap::new())));
        // Missing VNet means we are about to create it.
        assert!(scope_with(base_spec()).is_vnet_managed(None));
    }

    #[test]
    fn default_ingress_rules_injected_once() {
        let scope = scope_with(base_spec());
        let nsgs = scope.security_group_specs().unwrap();
        let cp = nsgs.iter().find(|n| n.name == "cp-nsg").unwrap();

        let names: Vec<&str> = cp.security_rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["allow_ssh", "allow_apiserver"]);
        assert_eq!(cp.security_rules[1].destination_ports.as_deref(), Some("6443"));

        // A user-supplied rule with the same name suppresses the default.
        let mut spec = base_spec();
        spec.network_spec.subnets[0].security_group = Some(SecurityGroup {
            name: "cp-nsg".to_string(),
            security_rules: vec![SecurityRule {
                name: "allow_ssh".to_string(),
                priority: Some(100),
                ..Default::default()
            }],
            ..Default::default()
        });
        let nsgs = scope_with(spec).security_group_specs().unwrap();
        let cp = nsgs.iter().find(|n| n.name == "cp-nsg").unwrap();
        let ssh: Vec<_> = cp.security_rules.iter().filter(|r| r.name == "allow_ssh").collect();
        assert_eq!(ssh.len(), 1);
        assert_eq!(ssh[0].priority, Some(100));
    }

    #[test]
    fn node_outbound_lb_suppressed_by_nat_gateway() {
        let mut spec = base_spec();
        spec.network_spec.node_outbound_lb = Some(LoadBalancerSpec {
            name: "outbound-lb".to_string(),
            ..Default::default()
        });
        let lbs = scope_with(spec.clone()).lb_specs().unwrap();
        assert!(lbs.iter().any(|lb| lb.name == "outbound-lb"));

        spec.network_spec.subnets[1].nat_gateway =
            Some(NatGateway { name: "nat-1".to_string(), public_ip: None });
        let lbs = scope_with(spec).lb_specs().unwrap();
        assert!(!lbs.iter().any(|lb| lb.name == "outbound-lb"));
    }

    #[test]
    fn internal_api_lb_gets_control_plane_outbound() {
        let mut spec = base_spec();
        spec.network_spec.api_server_lb = LoadBalancerSpec {
            name: "api-lb".to_string(),
            lb_type: LoadBalancerType::Internal,
            ..Default::default()
        };
        spec.network_spec.control_plane_outbound_lb =
            Some(LoadBalancerSpec::default());

        let lbs = scope_with(spec).lb_specs().unwrap();
        assert_eq!(lbs.len(), 2);
        assert_eq!(lbs[0].frontend, specs::FrontendKind::Internal);
        assert!(lbs[0].subnet_id.as_deref().unwrap().ends_with("/subnets/control-plane-subnet"));
        assert_eq!(lbs[1].name, "my-cluster-outbound-lb");
        assert_eq!(lbs[1].role, specs::LoadBalancerRole::Outbound);
    }

    #[test]
    fn public_ips_cover_lbs_and_nat_gateways() {
        let mut spec = base_spec();
        spec.network_spec.subnets[1].nat_gateway =
            Some(NatGateway { name: "nat-1".to_string(), public_ip: None });
        let ips = scope_with(spec).public_ip_specs().unwrap();

        let names: Vec<&str> = ips.iter().map(|ip| ip.name.as_str()).collect();
        assert!(names.contains(&"pip-my-cluster-apiserver"));
        assert!(names.contains(&"pip-my-cluster-subnet1-natgw"));
    }

    #[test]
    fn private_endpoints_link_the_owning_subnet() {
        let mut spec = base_spec();
        spec.network_spec.subnets[1].private_endpoints =
            vec![capz_controller_k8s_api::network::PrivateEndpoint {
                name: "pe-1".to_string(),
                ..Default::default()
            }];
        let endpoints = scope_with(spec).private_endpoint_specs().unwrap();

        assert_eq!(endpoints.len(), 1);
        assert_eq!(
            endpoints[0].subnet_id,
            "/subscriptions/sub-1/resourceGroups/my-rg/providers/Microsoft.Network/virtualNetworks/my-vnet/subnets/subnet1"
        );
    }

    #[test]
    fn tags_carry_the_ownership_marker() {
        let scope = scope_with(base_spec());
        let tags = scope.tags();
        assert_eq!(
            tags.get("sigs.k8s.io_cluster-api-provider-azure_cluster_my-cluster"),
            Some(&"owned".to_string())
        );
    }
}
