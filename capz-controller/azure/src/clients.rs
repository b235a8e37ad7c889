use crate::credentials::{CredentialError, CredentialProvider, TokenCredential};
use capz_controller_core::{Environment, EnvironmentError};
use capz_controller_k8s_api::cluster::IdentityRef;
use std::sync::Arc;

/// Binds subscription, environment, and credential for one reconcile.
///
/// Every scope embeds one of these; it is built once during scope
/// construction and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct ClientsContext {
    subscription_id: String,
    environment: Environment,
    credential: Option<Arc<TokenCredential>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientsError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

// === impl ClientsContext ===

impl ClientsContext {
    pub fn new(subscription_id: impl Into<String>, environment: Environment) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            environment,
            credential: None,
        }
    }

    /// Resolves the environment by name and materializes the identity's
    /// credential. Idempotent: a context that already holds a credential is
    /// returned unchanged.
    pub async fn set_credentials_with_provider(
        subscription_id: &str,
        environment_name: &str,
        identity_ref: &IdentityRef,
        cluster_namespace: &str,
        provider: &CredentialProvider,
    ) -> Result<Self, ClientsError> {
        let environment = if environment_name.is_empty() {
            Environment::public_cloud()
        } else {
            Environment::from_name(environment_name)?
        };
        let credential = provider
            .token_credential(identity_ref, cluster_namespace, &environment)
            .await?;

        Ok(Self {
            subscription_id: subscription_id.to_string(),
            environment,
            credential: Some(credential),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn cloud_name(&self) -> &str {
        &self.environment.name
    }

    pub fn resource_manager_endpoint(&self) -> &str {
        &self.environment.resource_manager_endpoint
    }

    pub fn token_credential(&self) -> Option<&Arc<TokenCredential>> {
        self.credential.as_ref()
    }
}
