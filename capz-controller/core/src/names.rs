//! Deterministic Azure resource-name derivation.
//!
//! Every function here is pure: the same user inputs always produce the same
//! Azure names, which is what makes reconciles idempotent.

/// The OS type of a machine or pool template.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

/// Derives the Azure VM name for a machine.
///
/// Windows computer names are limited to 15 characters (NetBIOS); long names
/// keep their first eight-or-nine characters and their last five so that
/// ordinal suffixes survive the truncation.
pub fn vm_name(machine_name: &str, os: OsType) -> String {
    if os == OsType::Linux || machine_name.len() <= 15 {
        return machine_name.to_string();
    }
    let head = machine_name[..9].trim_end_matches('-');
    let tail = &machine_name[machine_name.len() - 5..];
    format!("{head}-{tail}")
}

/// Derives the VM scale set name for a machine pool.
///
/// Windows pool names cannot exceed 9 characters; long names are replaced by
/// `win-` plus the last five characters, which keeps distinct generated pool
/// names distinct.
pub fn vmss_name(pool_name: &str, os: OsType) -> String {
    if os == OsType::Windows && pool_name.len() > 9 {
        return format!("win-{}", &pool_name[pool_name.len() - 5..]);
    }
    pool_name.to_string()
}

/// The NIC name for a machine: `<machine>-nic` for a single interface,
/// `<machine>-nic-<index>` when the machine has several.
pub fn nic_name(machine_name: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        format!("{machine_name}-nic")
    } else {
        format!("{machine_name}-nic-{index}")
    }
}

pub fn public_ip_name(machine_name: &str) -> String {
    format!("pip-{machine_name}")
}

pub fn os_disk_name(vm_name: &str) -> String {
    format!("{vm_name}_OSDisk")
}

pub fn data_disk_name(vm_name: &str, suffix: &str) -> String {
    format!("{vm_name}_{suffix}")
}

pub fn availability_set_name(cluster_name: &str, base: &str) -> String {
    format!("{cluster_name}_{base}-as")
}

/// The internal handle for a resource group: Azure group names are
/// case-insensitive and may contain underscores, but the handle is used as a
/// Kubernetes-ish key.
pub fn kubernetes_normalized(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

/// The ownership tag this provider writes on resources it manages.
pub fn cluster_owned_tag(cluster_name: &str) -> (String, String) {
    (
        format!("sigs.k8s.io_cluster-api-provider-azure_cluster_{cluster_name}"),
        "owned".to_string(),
    )
}

/// The legacy in-tree cloud-provider ownership tag, still written on NICs.
pub fn legacy_cluster_owned_tag(cluster_name: &str) -> (String, String) {
    (format!("kubernetes.io_cluster_{cluster_name}"), "owned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("machine", OsType::Linux, "machine")]
    #[case("machine-with-a-very-long-name", OsType::Linux, "machine-with-a-very-long-name")]
    #[case("machine-90123456", OsType::Windows, "machine-9-23456")]
    #[case("short-win", OsType::Windows, "short-win")]
    #[case("12345678-0123456789", OsType::Windows, "12345678-56789")]
    fn vm_names(#[case] machine: &str, #[case] os: OsType, #[case] want: &str) {
        let got = vm_name(machine, os);
        assert_eq!(got, want);
        assert!(os == OsType::Linux || got.len() <= 15);
        // Pure function: re-derivation is stable.
        assert_eq!(vm_name(machine, os), got);
    }

    #[rstest]
    #[case("pool0", OsType::Linux, "pool0")]
    #[case("a-rather-long-pool", OsType::Linux, "a-rather-long-pool")]
    #[case("winpool-00", OsType::Windows, "win-ol-00")]
    #[case("win9chars", OsType::Windows, "win9chars")]
    fn pool_names(#[case] pool: &str, #[case] os: OsType, #[case] want: &str) {
        assert_eq!(vmss_name(pool, os), want);
        assert!(vmss_name(pool, os).len() <= 9 || os == OsType::Linux);
    }

    #[test]
    fn nic_names() {
        assert_eq!(nic_name("machine-name", 0, 1), "machine-name-nic");
        assert_eq!(nic_name("machine-name", 0, 2), "machine-name-nic-0");
        assert_eq!(nic_name("machine-name", 1, 2), "machine-name-nic-1");
    }

    #[test]
    fn normalized_group_handle() {
        assert_eq!(kubernetes_normalized("My_Group"), "my-group");
        assert_eq!(kubernetes_normalized("plain-rg"), "plain-rg");
    }

    #[test]
    fn disk_and_tag_names() {
        assert_eq!(os_disk_name("vm-0"), "vm-0_OSDisk");
        assert_eq!(data_disk_name("vm-0", "etcd"), "vm-0_etcd");
        assert_eq!(availability_set_name("cluster", "control-plane"), "cluster_control-plane-as");
        assert_eq!(
            cluster_owned_tag("my-cluster").0,
            "sigs.k8s.io_cluster-api-provider-azure_cluster_my-cluster"
        );
        assert_eq!(legacy_cluster_owned_tag("my-cluster").0, "kubernetes.io_cluster_my-cluster");
    }
}
