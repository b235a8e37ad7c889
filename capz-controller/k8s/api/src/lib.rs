#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod aro;
pub mod cluster;
pub mod identity;
pub mod labels;
pub mod machine;
pub mod machine_pool;
pub mod managed;
pub mod network;

pub use self::{
    aro::AroControlPlane,
    cluster::AzureCluster,
    identity::AzureClusterIdentity,
    labels::Labels,
    machine::AzureMachine,
    machine_pool::{AzureMachinePool, AzureMachinePoolMachine},
    managed::{AzureManagedCluster, AzureManagedMachinePool},
};
pub use k8s_openapi::api::core::v1::{Namespace, Secret};
pub use kube::api::{Api, ObjectMeta, Patch, PatchParams, ResourceExt};
pub use kube::Client;

/// Label naming the Cluster API cluster an object belongs to.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Present (with any value) on control-plane machines.
pub const MACHINE_CONTROL_PLANE_LABEL: &str = "cluster.x-k8s.io/control-plane";

/// Label naming the machine pool an instance mirror belongs to.
pub const MACHINE_POOL_NAME_LABEL: &str = "cluster.x-k8s.io/machine-pool-name";

/// Label naming the machine deployment a machine was stamped from.
pub const MACHINE_DEPLOYMENT_NAME_LABEL: &str = "cluster.x-k8s.io/deployment-name";

/// Label naming the machine set a machine was stamped from.
pub const MACHINE_SET_NAME_LABEL: &str = "cluster.x-k8s.io/set-name";

/// When present, an external autoscaler owns the pool's replica count and
/// the provider must never scale mirrors down.
pub const REPLICAS_MANAGED_BY_ANNOTATION: &str = "cluster.x-k8s.io/replicas-managed-by";

/// Annotation selecting the Windows container runtime for a machine.
pub const WINDOWS_RUNTIME_ANNOTATION: &str = "runtime";

/// Annotation selecting the Windows server version for a machine.
pub const WINDOWS_SERVER_VERSION_ANNOTATION: &str = "windowsServerVersion";
