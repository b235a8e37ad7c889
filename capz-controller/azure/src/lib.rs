//! Azure credential and context plumbing.
//!
//! This crate turns an `AzureClusterIdentity` plus secret material into a
//! token credential bound to a cloud environment, enforces the per-identity
//! namespace allow-list, and bundles (subscription, environment, credential)
//! into the `ClientsContext` every scope embeds. The actual ARM HTTP call
//! sites live behind the `AzureExecutor` trait and are not implemented here.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod clients;
mod credentials;
mod executor;

pub use self::{
    clients::ClientsContext,
    credentials::{namespace_allowed, CredentialError, CredentialProvider, TokenCredential},
    executor::{AzureExecutor, OperationResult, ResourceSpec},
};
