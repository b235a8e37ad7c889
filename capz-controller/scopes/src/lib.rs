//! Per-reconcile scope objects and the typed Azure resource specs they emit.
//!
//! A scope binds one user resource (cluster, machine, machine pool, managed
//! cluster, or ARO control plane) to a credential context and derives, as pure
//! values, the exact Azure resources that must exist. Scopes hold no state
//! across reconciles; everything that must survive is written back through the
//! status controller or as annotations.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod aro;
pub mod cluster;
pub mod machine;
pub mod machine_pool;
pub mod managed;
pub mod specs;
pub mod status;
pub mod version;

pub use self::{
    aro::AroScope,
    cluster::ClusterScope,
    machine::MachineScope,
    machine_pool::{MachinePoolScope, VmssInstance, VmssState},
    managed::ManagedClusterScope,
    status::{StatusController, StatusDelta, StatusTarget, Update},
};

use capz_controller_core::CloudError;

/// Derivation failures. All of these are configuration problems: requeueing
/// cannot fix them, so they surface as `InvalidConfiguration` conditions.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("resource has no {0}")]
    MissingMetadata(&'static str),

    #[error("subnet {0:?} is not defined in the cluster network spec")]
    SubnetNotFound(String),

    #[error("invalid Kubernetes version {0:?}")]
    InvalidVersion(String),

    #[error("agent pool {pool_name:?} version {pool} exceeds control plane version {control_plane}")]
    PoolVersionExceedsControlPlane {
        pool_name: String,
        pool: String,
        control_plane: String,
    },

    #[error("at least one agent pool must have mode System")]
    SystemPoolRequired,

    #[error("containerd is not supported on Windows for Kubernetes versions below v1.22")]
    ContainerdUnsupportedOnPre122,

    #[error("invalid max surge value {0:?}")]
    InvalidMaxSurge(String),

    #[error(transparent)]
    InvalidResourceId(#[from] capz_controller_core::resource_id::InvalidResourceId),

    #[error("subnet ARM ID {0:?} does not match the expected grammar")]
    InvalidSubnetId(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl From<ScopeError> for CloudError {
    fn from(e: ScopeError) -> Self {
        CloudError::InvalidConfig(e.to_string())
    }
}
