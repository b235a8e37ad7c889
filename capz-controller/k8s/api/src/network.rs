use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The cluster's virtual-network layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    pub vnet: VnetSpec,
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,
    #[serde(rename = "apiServerLB", default)]
    pub api_server_lb: LoadBalancerSpec,
    #[serde(rename = "nodeOutboundLB")]
    pub node_outbound_lb: Option<LoadBalancerSpec>,
    #[serde(rename = "controlPlaneOutboundLB")]
    pub control_plane_outbound_lb: Option<LoadBalancerSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VnetSpec {
    /// ARM ID of a pre-existing VNet. When only an ID is given, the name and
    /// resource group are recovered from it.
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Resource group holding the VNet when it differs from the cluster's.
    pub resource_group: Option<String>,
    #[serde(rename = "cidrBlocks", default)]
    pub cidr_blocks: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SubnetRole {
    #[serde(rename = "control-plane")]
    ControlPlane,
    #[default]
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "bastion")]
    Bastion,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub name: String,
    #[serde(default)]
    pub role: SubnetRole,
    #[serde(rename = "cidrBlocks", default)]
    pub cidr_blocks: Vec<String>,
    pub security_group: Option<SecurityGroup>,
    pub route_table: Option<RouteTable>,
    pub nat_gateway: Option<NatGateway>,
    #[serde(default)]
    pub service_endpoints: Vec<ServiceEndpoint>,
    #[serde(default)]
    pub private_endpoints: Vec<PrivateEndpoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub name: String,
    #[serde(default)]
    pub security_rules: Vec<SecurityRule>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `Tcp`, `Udp`, or `*`.
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub direction: SecurityRuleDirection,
    pub priority: Option<i32>,
    pub source: Option<String>,
    pub source_ports: Option<String>,
    pub destination: Option<String>,
    pub destination_ports: Option<String>,
    #[serde(default)]
    pub action: SecurityRuleAccess,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityRuleDirection {
    #[default]
    Inbound,
    Outbound,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityRuleAccess {
    #[default]
    Allow,
    Deny,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTable {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NatGateway {
    pub name: String,
    #[serde(rename = "ip")]
    pub public_ip: Option<PublicIpRef>,
}

/// A user-facing reference to a public IP by name and optional DNS label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpRef {
    pub name: String,
    pub dns_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub service: String,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateEndpoint {
    pub name: String,
    #[serde(default)]
    pub private_link_service_connections: Vec<PrivateLinkServiceConnection>,
    #[serde(default)]
    pub manual_approval: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateLinkServiceConnection {
    pub name: Option<String>,
    #[serde(rename = "privateLinkServiceID", default)]
    pub private_link_service_id: String,
    #[serde(rename = "groupIDs", default)]
    pub group_ids: Vec<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LoadBalancerType {
    #[default]
    Public,
    Internal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub lb_type: LoadBalancerType,
    pub frontend_ips_count: Option<i32>,
    pub idle_timeout_in_minutes: Option<i32>,
    pub backend_pool: Option<BackendPool>,
    /// Static private frontend for internal load balancers.
    pub private_ip: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendPool {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    pub name: Option<String>,
    pub subnet: Option<SubnetSpec>,
    pub public_ip: Option<PublicIpRef>,
    pub sku: Option<String>,
}

// === impl NetworkSpec ===

impl NetworkSpec {
    pub fn control_plane_subnet(&self) -> Option<&SubnetSpec> {
        self.subnets.iter().find(|s| s.role == SubnetRole::ControlPlane)
    }

    pub fn node_subnets(&self) -> impl Iterator<Item = &SubnetSpec> {
        self.subnets.iter().filter(|s| s.role == SubnetRole::Node)
    }

    pub fn subnet(&self, name: &str) -> Option<&SubnetSpec> {
        self.subnets.iter().find(|s| s.name == name)
    }
}

// === impl LoadBalancerSpec ===

impl LoadBalancerSpec {
    /// The conventional backend pool name when the user did not pick one:
    /// `<lb>-backendPool` for API-server LBs and `<lb>-outboundBackendPool`
    /// for outbound-only LBs.
    pub fn backend_pool_name(&self, outbound: bool) -> String {
        match &self.backend_pool {
            Some(pool) if !pool.name.is_empty() => pool.name.clone(),
            _ if outbound => format!("{}-outboundBackendPool", self.name),
            _ => format!("{}-backendPool", self.name),
        }
    }

    /// The conventional frontend IP configuration name.
    pub fn frontend_ip_name(&self) -> String {
        format!("{}-frontEnd", self.name)
    }
}
