//! Typed Azure resource specs.
//!
//! Each value here describes exactly one Azure resource, fully named and
//! parameterized, ready for an executor to CreateOrUpdate. `parameters`
//! returns `None` when the live resource already matches the desired state,
//! which is how no-op reconciles avoid ARM write calls.

use capz_controller_azure::ResourceSpec;
use capz_controller_core::{annotations::LastAppliedSecurityRules, CloudError};
use capz_controller_k8s_api::network::{
    PrivateLinkServiceConnection, SecurityRule, SecurityRuleAccess, SecurityRuleDirection,
    ServiceEndpoint,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

fn tags_value(tags: &Tags) -> Value {
    json!(tags)
}

/// An Azure resource group.
///
/// `handle` is the kubernetes-normalized form used to key the group inside the
/// provider; `name` is what Azure sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceGroupSpec {
    pub handle: String,
    pub name: String,
    pub location: String,
    pub tags: Tags,
}

impl ResourceSpec for ResourceGroupSpec {
    fn service_name(&self) -> &'static str {
        "group"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.name.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        // Existing groups are never mutated; they may be shared or
        // user-managed.
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "location": self.location,
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualNetworkSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub cidr_blocks: Vec<String>,
    pub tags: Tags,
}

impl ResourceSpec for VirtualNetworkSpec {
    fn service_name(&self) -> &'static str {
        "virtualnetworks"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        // A VNet that already exists is either ours from a previous reconcile
        // or unmanaged; neither is updated in place.
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "location": self.location,
            "properties": {
                "addressSpace": { "addressPrefixes": self.cidr_blocks },
            },
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetSpec {
    pub name: String,
    pub vnet_name: String,
    pub vnet_resource_group: String,
    pub cidr_blocks: Vec<String>,
    pub security_group_name: Option<String>,
    pub route_table_name: Option<String>,
    pub nat_gateway_name: Option<String>,
    pub service_endpoints: Vec<ServiceEndpoint>,
    pub subscription_id: String,
    pub is_vnet_managed: bool,
}

impl ResourceSpec for SubnetSpec {
    fn service_name(&self) -> &'static str {
        "subnets"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.vnet_resource_group.clone()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.vnet_name.clone())
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        if !self.is_vnet_managed {
            // Unmanaged VNet: the subnet must already exist and must not be
            // touched.
            return match existing {
                Some(_) => Ok(None),
                None => Err(CloudError::InvalidConfig(format!(
                    "subnet {} not found in unmanaged virtual network {}",
                    self.name, self.vnet_name
                ))),
            };
        }
        if existing.is_some() {
            return Ok(None);
        }

        let resource_id = |provider_type: &str, name: &str| {
            format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/{provider_type}/{name}",
                self.subscription_id, self.vnet_resource_group
            )
        };

        let mut properties = json!({
            "addressPrefixes": self.cidr_blocks,
            "serviceEndpoints": self
                .service_endpoints
                .iter()
                .map(|e| json!({"service": e.service, "locations": e.locations}))
                .collect::<Vec<_>>(),
        });
        if let Some(nsg) = &self.security_group_name {
            properties["networkSecurityGroup"] =
                json!({"id": resource_id("networkSecurityGroups", nsg)});
        }
        if let Some(rt) = &self.route_table_name {
            properties["routeTable"] = json!({"id": resource_id("routeTables", rt)});
        }
        if let Some(nat) = &self.nat_gateway_name {
            properties["natGateway"] = json!({"id": resource_id("natGateways", nat)});
        }
        Ok(Some(json!({ "properties": properties })))
    }
}

/// A network security group, carrying the rules applied by the previous
/// reconcile so that user-added rules survive updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub security_rules: Vec<SecurityRule>,
    pub last_applied: LastAppliedSecurityRules,
    pub tags: Tags,
}

impl SecurityGroupSpec {
    fn rule_value(rule: &SecurityRule) -> Value {
        json!({
            "name": rule.name,
            "properties": {
                "description": rule.description,
                "protocol": rule.protocol,
                "direction": match rule.direction {
                    SecurityRuleDirection::Inbound => "Inbound",
                    SecurityRuleDirection::Outbound => "Outbound",
                },
                "priority": rule.priority,
                "sourceAddressPrefix": rule.source,
                "sourcePortRange": rule.source_ports,
                "destinationAddressPrefix": rule.destination,
                "destinationPortRange": rule.destination_ports,
                "access": match rule.action {
                    SecurityRuleAccess::Allow => "Allow",
                    SecurityRuleAccess::Deny => "Deny",
                },
            },
        })
    }

    /// Merges desired rules with live ones. A live rule is kept when it was
    /// not written by us (absent from the last-applied set); rules we wrote
    /// before but no longer want are dropped.
    fn merged_rules(&self, existing: Option<&Value>) -> Vec<Value> {
        let mut rules: Vec<Value> = self.security_rules.iter().map(Self::rule_value).collect();

        let live = existing
            .and_then(|e| e.pointer("/properties/securityRules"))
            .and_then(Value::as_array);
        if let Some(live) = live {
            for rule in live {
                let Some(name) = rule.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let ours = self.security_rules.iter().any(|r| r.name == name);
                if !ours && !self.last_applied.contains_key(name) {
                    rules.push(rule.clone());
                }
            }
        }
        rules
    }
}

impl ResourceSpec for SecurityGroupSpec {
    fn service_name(&self) -> &'static str {
        "securitygroups"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(Some(json!({
            "location": self.location,
            "properties": { "securityRules": self.merged_rules(existing.as_ref()) },
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTableSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
}

impl ResourceSpec for RouteTableSpec {
    fn service_name(&self) -> &'static str {
        "routetables"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        // Routes are written by the cloud provider at runtime; only the
        // table's existence is reconciled.
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({ "location": self.location })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NatGatewaySpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub public_ip_name: String,
    pub subscription_id: String,
    pub tags: Tags,
}

impl ResourceSpec for NatGatewaySpec {
    fn service_name(&self) -> &'static str {
        "natgateways"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let ip_id = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses/{}",
            self.subscription_id, self.resource_group, self.public_ip_name
        );
        Ok(Some(json!({
            "location": self.location,
            "sku": { "name": "Standard" },
            "properties": { "publicIpAddresses": [ { "id": ip_id } ] },
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicIpSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub dns_name: Option<String>,
    pub tags: Tags,
}

impl ResourceSpec for PublicIpSpec {
    fn service_name(&self) -> &'static str {
        "publicips"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let mut properties = json!({ "publicIPAllocationMethod": "Static" });
        if let Some(dns) = &self.dns_name {
            properties["dnsSettings"] = json!({ "domainNameLabel": dns });
        }
        Ok(Some(json!({
            "location": self.location,
            "sku": { "name": "Standard" },
            "properties": properties,
            "tags": tags_value(&self.tags),
        })))
    }
}

/// What a load balancer fronts; drives its frontend and rule layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadBalancerRole {
    ApiServer,
    Outbound,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrontendKind {
    Public,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub role: LoadBalancerRole,
    pub frontend: FrontendKind,
    /// Public IP names backing the frontends; empty for internal LBs.
    pub frontend_public_ip_names: Vec<String>,
    /// Subnet hosting the frontend of an internal LB.
    pub subnet_id: Option<String>,
    pub private_ip: Option<String>,
    pub backend_pool_name: String,
    pub idle_timeout_in_minutes: Option<i32>,
    pub subscription_id: String,
    pub tags: Tags,
}

impl ResourceSpec for LoadBalancerSpec {
    fn service_name(&self) -> &'static str {
        "loadbalancers"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let frontends: Vec<Value> = match self.frontend {
            FrontendKind::Public => self
                .frontend_public_ip_names
                .iter()
                .enumerate()
                .map(|(i, ip)| {
                    let name = if i == 0 {
                        format!("{}-frontEnd", self.name)
                    } else {
                        format!("{}-frontEnd-{i}", self.name)
                    };
                    let ip_id = format!(
                        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses/{ip}",
                        self.subscription_id, self.resource_group
                    );
                    json!({
                        "name": name,
                        "properties": { "publicIPAddress": { "id": ip_id } },
                    })
                })
                .collect(),
            FrontendKind::Internal => vec![json!({
                "name": format!("{}-frontEnd", self.name),
                "properties": {
                    "subnet": { "id": self.subnet_id },
                    "privateIPAddress": self.private_ip,
                    "privateIPAllocationMethod":
                        if self.private_ip.is_some() { "Static" } else { "Dynamic" },
                },
            })],
        };

        let mut properties = json!({
            "frontendIPConfigurations": frontends,
            "backendAddressPools": [ { "name": self.backend_pool_name } ],
        });
        if self.role == LoadBalancerRole::ApiServer {
            properties["loadBalancingRules"] = json!([{
                "name": "LBRuleHTTPS",
                "properties": {
                    "protocol": "Tcp",
                    "frontendPort": 6443,
                    "backendPort": 6443,
                    "idleTimeoutInMinutes": self.idle_timeout_in_minutes.unwrap_or(4),
                    "disableOutboundSnat": true,
                },
            }]);
        }
        if self.frontend == FrontendKind::Public {
            properties["outboundRules"] = json!([{
                "name": "OutboundNATAllProtocols",
                "properties": {
                    "protocol": "All",
                    "idleTimeoutInMinutes": self.idle_timeout_in_minutes.unwrap_or(4),
                },
            }]);
        }

        Ok(Some(json!({
            "location": self.location,
            "sku": { "name": "Standard" },
            "properties": properties,
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateEndpointSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    /// ARM ID of the subnet the endpoint NIC lands in.
    pub subnet_id: String,
    pub connections: Vec<PrivateLinkServiceConnection>,
    pub manual_approval: bool,
    pub tags: Tags,
}

impl ResourceSpec for PrivateEndpointSpec {
    fn service_name(&self) -> &'static str {
        "privateendpoints"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let connections: Vec<Value> = self
            .connections
            .iter()
            .map(|c| {
                json!({
                    "name": c.name.clone().unwrap_or_else(|| self.name.clone()),
                    "properties": {
                        "privateLinkServiceId": c.private_link_service_id,
                        "groupIds": c.group_ids,
                    },
                })
            })
            .collect();
        let connection_key = if self.manual_approval {
            "manualPrivateLinkServiceConnections"
        } else {
            "privateLinkServiceConnections"
        };
        Ok(Some(json!({
            "location": self.location,
            "properties": {
                "subnet": { "id": self.subnet_id },
                connection_key: connections,
            },
            "tags": tags_value(&self.tags),
        })))
    }
}

/// A machine NIC together with its load-balancer wiring.
///
/// Empty strings mean "not wired": a worker NIC behind a NAT gateway carries
/// no LB names at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NicSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub subscription_id: String,
    pub vnet_name: String,
    pub vnet_resource_group: String,
    pub subnet_name: String,
    pub public_lb_name: String,
    pub public_lb_address_pool_name: String,
    pub public_lb_nat_rule_name: String,
    pub internal_lb_name: String,
    pub internal_lb_address_pool_name: String,
    pub public_ip_name: String,
    pub accelerated_networking: Option<bool>,
    pub ip_config_count: i32,
    pub dns_servers: Vec<String>,
    pub tags: Tags,
}

impl NicSpec {
    fn subnet_id(&self) -> String {
        capz_controller_core::resource_id::subnet_id(
            &self.subscription_id,
            &self.vnet_resource_group,
            &self.vnet_name,
            &self.subnet_name,
        )
    }

    fn lb_id(&self, lb: &str, child_type: &str, child: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/loadBalancers/{lb}/{child_type}/{child}",
            self.subscription_id, self.resource_group
        )
    }
}

impl ResourceSpec for NicSpec {
    fn service_name(&self) -> &'static str {
        "networkinterfaces"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        let mut pools = Vec::new();
        if !self.public_lb_name.is_empty() {
            pools.push(json!({
                "id": self.lb_id(
                    &self.public_lb_name,
                    "backendAddressPools",
                    &self.public_lb_address_pool_name,
                )
            }));
        }
        if !self.internal_lb_name.is_empty() {
            pools.push(json!({
                "id": self.lb_id(
                    &self.internal_lb_name,
                    "backendAddressPools",
                    &self.internal_lb_address_pool_name,
                )
            }));
        }

        let mut ip_configs = Vec::new();
        for i in 0..self.ip_config_count.max(1) {
            let primary = i == 0;
            let mut config = json!({
                "name": if primary { "pipConfig".to_string() } else { format!("pipConfig-{i}") },
                "properties": {
                    "subnet": { "id": self.subnet_id() },
                    "primary": primary,
                    "privateIPAllocationMethod": "Dynamic",
                },
            });
            if primary {
                config["properties"]["loadBalancerBackendAddressPools"] = json!(pools);
                if !self.public_lb_nat_rule_name.is_empty() {
                    config["properties"]["loadBalancerInboundNatRules"] = json!([{
                        "id": self.lb_id(
                            &self.public_lb_name,
                            "inboundNatRules",
                            &self.public_lb_nat_rule_name,
                        )
                    }]);
                }
                if !self.public_ip_name.is_empty() {
                    let ip_id = format!(
                        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses/{}",
                        self.subscription_id, self.resource_group, self.public_ip_name
                    );
                    config["properties"]["publicIPAddress"] = json!({ "id": ip_id });
                }
            }
            ip_configs.push(config);
        }

        let mut properties = json!({
            "ipConfigurations": ip_configs,
            "enableAcceleratedNetworking": self.accelerated_networking,
        });
        if !self.dns_servers.is_empty() {
            properties["dnsSettings"] = json!({ "dnsServers": self.dns_servers });
        }
        Ok(Some(json!({
            "location": self.location,
            "properties": properties,
            "tags": tags_value(&self.tags),
        })))
    }
}

/// A per-machine inbound NAT rule on the API-server load balancer, giving
/// each control-plane machine an SSH path through the public frontend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundNatSpec {
    pub name: String,
    pub load_balancer_name: String,
    pub resource_group: String,
    pub frontend_ip_config_id: String,
}

impl ResourceSpec for InboundNatSpec {
    fn service_name(&self) -> &'static str {
        "inboundnatrules"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.load_balancer_name.clone())
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "properties": {
                "frontendIPConfiguration": { "id": self.frontend_ip_config_id },
                "protocol": "Tcp",
                "backendPort": 22,
            },
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleAssignmentSpec {
    /// ARM ID of the resource whose identity is granted the role, or of the
    /// principal's user-assigned identity.
    pub principal_resource_id: String,
    /// ARM scope the role applies to.
    pub scope: String,
    /// Role-definition ARM ID (a fixed GUID under the subscription).
    pub role_definition_id: String,
    /// Assignment name; a deterministic GUID when the caller picked one.
    pub name: Option<String>,
}

impl ResourceSpec for RoleAssignmentSpec {
    fn service_name(&self) -> &'static str {
        "roleassignments"
    }

    fn resource_name(&self) -> String {
        self.name.clone().unwrap_or_default()
    }

    fn resource_group(&self) -> String {
        // Role assignments are scoped by ARM ID, not by group.
        String::new()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.scope.clone())
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "properties": {
                "roleDefinitionId": self.role_definition_id,
                "principalResourceId": self.principal_resource_id,
            },
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmExtensionSpec {
    pub name: String,
    pub vm_name: String,
    pub resource_group: String,
    pub location: String,
    pub publisher: String,
    pub version: String,
    pub settings: BTreeMap<String, String>,
    pub protected_settings: BTreeMap<String, String>,
}

impl ResourceSpec for VmExtensionSpec {
    fn service_name(&self) -> &'static str {
        "vmextensions"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn owner_name(&self) -> Option<String> {
        Some(self.vm_name.clone())
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(Some(json!({
            "location": self.location,
            "properties": {
                "publisher": self.publisher,
                "type": self.name,
                "typeHandlerVersion": self.version,
                "settings": self.settings,
                "protectedSettings": self.protected_settings,
            },
        })))
    }
}

/// A managed disk. Disks are created implicitly with their VM; the provider
/// only ever deletes them, so there is nothing to put.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskSpec {
    pub name: String,
    pub resource_group: String,
}

impl ResourceSpec for DiskSpec {
    fn service_name(&self) -> &'static str {
        "disks"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, _existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        Ok(None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailabilitySetSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub tags: Tags,
}

impl ResourceSpec for AvailabilitySetSpec {
    fn service_name(&self) -> &'static str {
        "availabilitysets"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "location": self.location,
            "sku": { "name": "Aligned" },
            "properties": { "platformFaultDomainCount": 3, "platformUpdateDomainCount": 5 },
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAssignedIdentitySpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub tags: Tags,
}

impl ResourceSpec for UserAssignedIdentitySpec {
    fn service_name(&self) -> &'static str {
        "identities"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "location": self.location,
            "tags": tags_value(&self.tags),
        })))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyVaultSpec {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub tenant_id: String,
    pub tags: Tags,
}

impl ResourceSpec for KeyVaultSpec {
    fn service_name(&self) -> &'static str {
        "vaults"
    }

    fn resource_name(&self) -> String {
        self.name.clone()
    }

    fn resource_group(&self) -> String {
        self.resource_group.clone()
    }

    fn parameters(&self, existing: Option<Value>) -> Result<Option<Value>, CloudError> {
        if existing.is_some() {
            return Ok(None);
        }
        Ok(Some(json!({
            "location": self.location,
            "properties": {
                "tenantId": self.tenant_id,
                "sku": { "family": "A", "name": "standard" },
                "enableRbacAuthorization": true,
                "enablePurgeProtection": true,
            },
            "tags": tags_value(&self.tags),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(name: &str, priority: i32) -> SecurityRule {
        SecurityRule {
            name: name.to_string(),
            priority: Some(priority),
            protocol: "Tcp".to_string(),
            ..SecurityRule::default()
        }
    }

    #[test]
    fn resource_group_put_skipped_when_live() {
        let spec = ResourceGroupSpec {
            handle: "my-rg".into(),
            name: "My_RG".into(),
            location: "eastus".into(),
            tags: Tags::new(),
        };
        assert!(spec.parameters(Some(json!({"location": "eastus"}))).unwrap().is_none());
        let body = spec.parameters(None).unwrap().unwrap();
        assert_eq!(body["location"], "eastus");
    }

    #[test]
    fn subnet_in_unmanaged_vnet_must_exist() {
        let spec = SubnetSpec {
            name: "snet".into(),
            vnet_name: "vnet".into(),
            vnet_resource_group: "rg".into(),
            cidr_blocks: vec!["10.0.0.0/24".into()],
            security_group_name: None,
            route_table_name: None,
            nat_gateway_name: None,
            service_endpoints: vec![],
            subscription_id: "sub".into(),
            is_vnet_managed: false,
        };
        assert!(spec.parameters(Some(json!({}))).unwrap().is_none());
        assert!(spec.parameters(None).is_err());
    }

    #[test]
    fn nsg_merge_preserves_user_rules() {
        let mut last_applied = LastAppliedSecurityRules::new();
        last_applied.insert("stale_rule".to_string(), json!({"priority": 300}));

        let spec = SecurityGroupSpec {
            name: "nsg".into(),
            resource_group: "rg".into(),
            location: "eastus".into(),
            security_rules: vec![rule("allow_ssh", 2200)],
            last_applied,
            tags: Tags::new(),
        };

        let existing = json!({
            "properties": { "securityRules": [
                // Written by us previously, no longer desired: dropped.
                { "name": "stale_rule", "properties": { "priority": 300 } },
                // Added by the user out of band: preserved.
                { "name": "user_rule", "properties": { "priority": 400 } },
                // Still desired: replaced by the desired version.
                { "name": "allow_ssh", "properties": { "priority": 9999 } },
            ]},
        });

        let body = spec.parameters(Some(existing)).unwrap().unwrap();
        let rules = body["properties"]["securityRules"].as_array().unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["allow_ssh", "user_rule"]);
        assert_eq!(rules[0]["properties"]["priority"], 2200);
    }

    #[test]
    fn nic_wires_backend_pools_and_nat_rule() {
        let spec = NicSpec {
            name: "machine-name-nic".into(),
            resource_group: "my-rg".into(),
            location: "eastus".into(),
            subscription_id: "sub".into(),
            vnet_name: "vnet".into(),
            vnet_resource_group: "my-rg".into(),
            subnet_name: "subnet1".into(),
            public_lb_name: "api-lb".into(),
            public_lb_address_pool_name: "api-lb-backendPool".into(),
            public_lb_nat_rule_name: "machine-name".into(),
            ip_config_count: 1,
            ..NicSpec::default()
        };
        let body = spec.parameters(None).unwrap().unwrap();
        let config = &body["properties"]["ipConfigurations"][0]["properties"];
        assert_eq!(
            config["loadBalancerBackendAddressPools"][0]["id"],
            "/subscriptions/sub/resourceGroups/my-rg/providers/Microsoft.Network/loadBalancers/api-lb/backendAddressPools/api-lb-backendPool"
        );
        assert_eq!(
            config["loadBalancerInboundNatRules"][0]["id"],
            "/subscriptions/sub/resourceGroups/my-rg/providers/Microsoft.Network/loadBalancers/api-lb/inboundNatRules/machine-name"
        );
        assert!(config.get("publicIPAddress").is_none());
    }

    #[test]
    fn unwired_nic_has_no_pools() {
        let spec = NicSpec {
            name: "worker-nic".into(),
            resource_group: "rg".into(),
            subscription_id: "sub".into(),
            vnet_name: "vnet".into(),
            vnet_resource_group: "rg".into(),
            subnet_name: "nodes".into(),
            ip_config_count: 1,
            ..NicSpec::default()
        };
        let body = spec.parameters(None).unwrap().unwrap();
        let config = &body["properties"]["ipConfigurations"][0]["properties"];
        assert_eq!(config["loadBalancerBackendAddressPools"], json!([]));
        assert!(config.get("loadBalancerInboundNatRules").is_none());
    }

    #[test]
    fn disks_have_no_put_body() {
        let spec = DiskSpec { name: "vm-0_OSDisk".into(), resource_group: "rg".into() };
        assert!(spec.parameters(None).unwrap().is_none());
    }
}
