use std::fmt;

/// The `azure://` scheme prefixed to ARM IDs when they are surfaced as node
/// provider IDs.
pub const PROVIDER_ID_PREFIX: &str = "azure://";

/// A parsed ARM resource ID.
///
/// The canonical grammar is
/// `/subscriptions/<sub>/resourceGroups/<rg>/providers/<provider>/<type>/<name>`
/// optionally followed by one `<child-type>/<child-name>` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub subscription: String,
    pub resource_group: String,
    pub provider: String,
    pub resource_type: String,
    pub name: String,
    pub child: Option<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid ARM resource ID {0:?}")]
pub struct InvalidResourceId(pub String);

// === impl ResourceId ===

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self, InvalidResourceId> {
        let err = || InvalidResourceId(id.to_string());

        let mut parts = id.strip_prefix('/').ok_or_else(err)?.split('/');
        if !parts.next().is_some_and(|s| s.eq_ignore_ascii_case("subscriptions")) {
            return Err(err());
        }
        let subscription = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        if !parts.next().is_some_and(|s| s.eq_ignore_ascii_case("resourceGroups")) {
            return Err(err());
        }
        let resource_group = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        if !parts.next().is_some_and(|s| s.eq_ignore_ascii_case("providers")) {
            return Err(err());
        }
        let provider = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        let resource_type = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;
        let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(err)?;

        let child = match (parts.next(), parts.next()) {
            (Some(kind), Some(name)) if !kind.is_empty() && !name.is_empty() => {
                Some((kind.to_string(), name.to_string()))
            }
            (None, _) => None,
            _ => return Err(err()),
        };
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self {
            subscription: subscription.to_string(),
            resource_group: resource_group.to_string(),
            provider: provider.to_string(),
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            child,
        })
    }

    /// The name of the leaf resource: the child name when a child pair is
    /// present, the resource name otherwise.
    pub fn leaf_name(&self) -> &str {
        match &self.child {
            Some((_, name)) => name,
            None => &self.name,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription, self.resource_group, self.provider, self.resource_type, self.name
        )?;
        if let Some((kind, name)) = &self.child {
            write!(f, "/{kind}/{name}")?;
        }
        Ok(())
    }
}

/// Builds the ARM ID of a subnet within a virtual network.
pub fn subnet_id(subscription: &str, resource_group: &str, vnet: &str, subnet: &str) -> String {
    format!(
        "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.Network/virtualNetworks/{vnet}/subnets/{subnet}"
    )
}

/// Builds the ARM ID of a load balancer's frontend IP configuration.
pub fn frontend_ip_config_id(
    subscription: &str,
    resource_group: &str,
    load_balancer: &str,
    frontend: &str,
) -> String {
    format!(
        "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.Network/loadBalancers/{load_balancer}/frontendIPConfigurations/{frontend}"
    )
}

/// Builds the ARM ID of a managed (AKS) cluster.
pub fn managed_cluster_id(subscription: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.ContainerService/managedClusters/{name}"
    )
}

/// Builds the `azure://` provider ID for a virtual machine.
pub fn vm_provider_id(subscription: &str, resource_group: &str, name: &str) -> String {
    format!(
        "azure:///subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.Compute/virtualMachines/{name}"
    )
}

/// Extracts the VM (or VMSS-instance, or user-assigned-identity) name from a
/// provider ID.
///
/// Accepts the three `azure://` forms the provider has historically written;
/// anything without the scheme, or with an empty trailing segment, yields an
/// empty string.
pub fn vm_name_from_provider_id(provider_id: &str) -> String {
    let Some(path) = provider_id.strip_prefix(PROVIDER_ID_PREFIX) else {
        return String::new();
    };
    match path.rsplit('/').next() {
        Some(name) => name.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_ids() {
        let id = ResourceId::parse(
            "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Compute/virtualMachines/vm-1",
        )
        .unwrap();
        assert_eq!(id.subscription, "sub-1");
        assert_eq!(id.resource_group, "rg-1");
        assert_eq!(id.provider, "Microsoft.Compute");
        assert_eq!(id.resource_type, "virtualMachines");
        assert_eq!(id.name, "vm-1");
        assert_eq!(id.child, None);
        assert_eq!(id.leaf_name(), "vm-1");
    }

    #[test]
    fn parses_child_resources() {
        let raw = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet-x/subnets/snet-y";
        let id = ResourceId::parse(raw).unwrap();
        assert_eq!(id.name, "vnet-x");
        assert_eq!(id.child, Some(("subnets".to_string(), "snet-y".to_string())));
        assert_eq!(id.leaf_name(), "snet-y");
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in [
            "",
            "/",
            "subscriptions/s/resourceGroups/rg/providers/p/t/n",
            "/subscriptions//resourceGroups/rg/providers/p/t/n",
            "/subscriptions/s/resourceGroups/rg/providers/p/t",
            "/subscriptions/s/resourceGroups/rg/providers/p/t/n/orphan",
        ] {
            assert!(ResourceId::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn provider_id_tail() {
        assert_eq!(
            vm_name_from_provider_id(
                "azure:///subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/machine-0"
            ),
            "machine-0"
        );
        assert_eq!(
            vm_name_from_provider_id(
                "azure:///subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachineScaleSets/pool0/virtualMachines/0"
            ),
            "0"
        );
        assert_eq!(
            vm_name_from_provider_id(
                "azure:///subscriptions/s/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/mi-0"
            ),
            "mi-0"
        );
    }

    #[test]
    fn provider_id_requires_scheme() {
        assert_eq!(
            vm_name_from_provider_id(
                "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm"
            ),
            ""
        );
        assert_eq!(vm_name_from_provider_id("aws:///instances/i-123"), "");
    }

    #[test]
    fn builders_match_the_grammar() {
        let id = subnet_id("s", "rg", "vnet", "snet");
        assert_eq!(ResourceId::parse(&id).unwrap().leaf_name(), "snet");

        let id = frontend_ip_config_id("s", "rg", "api-lb", "api-lb-frontEnd");
        assert_eq!(ResourceId::parse(&id).unwrap().leaf_name(), "api-lb-frontEnd");

        let id = vm_provider_id("s", "rg", "vm-0");
        assert_eq!(vm_name_from_provider_id(&id), "vm-0");
    }
}
