//! Core types for the Azure infrastructure provider.
//!
//! Everything in this crate is pure data and pure derivation: cloud
//! environment bundles, ARM resource-ID parsing, long-running-operation
//! futures, conditions, the error taxonomy, and the name-derivation rules
//! shared by the scope layer. Nothing here talks to Kubernetes or Azure.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
pub mod condition;
pub mod environment;
pub mod error;
pub mod future;
pub mod names;
pub mod resource_id;

pub use self::{
    condition::{Condition, ConditionStatus, Conditions, ProvisioningState},
    environment::{Environment, EnvironmentError, ResourceIdentifiers},
    error::CloudError,
    future::{FutureKind, Futures, OperationFuture},
    resource_id::ResourceId,
};
