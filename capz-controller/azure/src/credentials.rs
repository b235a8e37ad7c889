use ahash::AHashMap as HashMap;
use capz_controller_core::Environment;
use capz_controller_k8s_api::{
    self as k8s,
    cluster::IdentityRef,
    identity::{AllowedNamespaces, AzureClusterIdentitySpec, IdentityType},
    Labels,
};
use kube::api::PostParams;
use parking_lot::Mutex;
use std::sync::Arc;

/// Key under which service-principal secrets store their payload.
const SECRET_DATA_KEY: &str = "clientSecret";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("identity {namespace}/{name} not found")]
    IdentityNotFound { namespace: String, name: String },

    #[error("identity type does not support this operation")]
    IdentityTypeInvalid,

    #[error("identity is not authorized in namespace {0:?}")]
    NotAuthorizedInNamespace(String),

    #[error("secret {namespace}/{name} missing key {key:?}")]
    SecretInvalid { namespace: String, name: String, key: String },

    #[error("certificate payload is not PEM")]
    CertificateInvalid,

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// A materialized credential, keyed to the endpoints it was minted for.
///
/// The ARM call sites consume this; within this crate it is an inert value
/// so that credential resolution stays testable without network access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenCredential {
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
        authority_host: String,
        token_audience: String,
    },
    ClientCertificate {
        tenant_id: String,
        client_id: String,
        certificate_pem: Vec<u8>,
        authority_host: String,
        token_audience: String,
    },
    ManagedIdentity {
        client_id: String,
    },
    WorkloadIdentity {
        tenant_id: String,
        client_id: String,
        authority_host: String,
        token_audience: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    identity_namespace: String,
    identity_name: String,
    resource_manager_endpoint: String,
    active_directory_endpoint: String,
    tenant_id: String,
}

/// Resolves `AzureClusterIdentity` references into token credentials.
///
/// The cache is the only process-wide shared state in the provider; entries
/// are keyed by identity and endpoint triple so that clusters in different
/// clouds never share a credential.
#[derive(Clone)]
pub struct CredentialProvider {
    client: kube::Client,
    cache: Arc<Mutex<HashMap<CacheKey, Arc<TokenCredential>>>>,
}

// === impl CredentialProvider ===

impl CredentialProvider {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolves the identity referenced by a cluster into a token credential
    /// for the given environment.
    ///
    /// `cluster_namespace` doubles as the default identity namespace and as
    /// the namespace checked against the identity's allow-list.
    pub async fn token_credential(
        &self,
        identity_ref: &IdentityRef,
        cluster_namespace: &str,
        environment: &Environment,
    ) -> Result<Arc<TokenCredential>, CredentialError> {
        let identity_namespace = if identity_ref.namespace.is_empty() {
            cluster_namespace
        } else {
            identity_ref.namespace.as_str()
        };

        let api =
            k8s::Api::<k8s::AzureClusterIdentity>::namespaced(self.client.clone(), identity_namespace);
        let identity = match api.get_opt(&identity_ref.name).await? {
            Some(identity) => identity,
            None => {
                return Err(CredentialError::IdentityNotFound {
                    namespace: identity_namespace.to_string(),
                    name: identity_ref.name.clone(),
                })
            }
        };

        self.authorize(&identity.spec.allowed_namespaces, cluster_namespace)
            .await?;

        let key = CacheKey {
            identity_namespace: identity_namespace.to_string(),
            identity_name: identity_ref.name.clone(),
            resource_manager_endpoint: environment.resource_manager_endpoint.clone(),
            active_directory_endpoint: environment.active_directory_endpoint.clone(),
            tenant_id: identity.spec.tenant_id.clone(),
        };
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.clone());
        }

        let credential = Arc::new(
            self.build_credential(&identity.spec, identity_namespace, environment)
                .await?,
        );
        self.cache.lock().insert(key, credential.clone());
        Ok(credential)
    }

    /// Applies the identity's allowed-namespaces policy to the cluster's
    /// namespace, consulting the live Namespace object when a selector is
    /// configured.
    async fn authorize(
        &self,
        policy: &Option<AllowedNamespaces>,
        namespace: &str,
    ) -> Result<(), CredentialError> {
        let needs_labels = policy
            .as_ref()
            .is_some_and(|p| p.selector.is_some());
        let labels = if needs_labels {
            let api = k8s::Api::<k8s::Namespace>::all(self.client.clone());
            let ns = api.get_opt(namespace).await?;
            Labels::from(ns.and_then(|ns| ns.metadata.labels))
        } else {
            Labels::default()
        };

        if namespace_allowed(policy.as_ref(), namespace, &labels) {
            Ok(())
        } else {
            Err(CredentialError::NotAuthorizedInNamespace(namespace.to_string()))
        }
    }

    async fn build_credential(
        &self,
        spec: &AzureClusterIdentitySpec,
        identity_namespace: &str,
        environment: &Environment,
    ) -> Result<TokenCredential, CredentialError> {
        let authority_host = environment.active_directory_endpoint.clone();
        let token_audience = environment.token_audience.clone();

        match spec.type_ {
            IdentityType::ServicePrincipal | IdentityType::ManualServicePrincipal => {
                let client_secret = self.secret_payload(spec, identity_namespace).await?;
                let client_secret = String::from_utf8(client_secret)
                    .map_err(|_| CredentialError::IdentityTypeInvalid)?;
                if spec.type_ == IdentityType::ServicePrincipal {
                    self.ensure_shadow_secret(spec, identity_namespace, &client_secret)
                        .await?;
                }
                Ok(TokenCredential::ClientSecret {
                    tenant_id: spec.tenant_id.clone(),
                    client_id: spec.client_id.clone(),
                    client_secret,
                    authority_host,
                    token_audience,
                })
            }
            IdentityType::ServicePrincipalCertificate => {
                let certificate_pem = self.secret_payload(spec, identity_namespace).await?;
                if !certificate_pem.starts_with(b"-----BEGIN") {
                    return Err(CredentialError::CertificateInvalid);
                }
                Ok(TokenCredential::ClientCertificate {
                    tenant_id: spec.tenant_id.clone(),
                    client_id: spec.client_id.clone(),
                    certificate_pem,
                    authority_host,
                    token_audience,
                })
            }
            IdentityType::UserAssignedManagedIdentity => Ok(TokenCredential::ManagedIdentity {
                client_id: spec.client_id.clone(),
            }),
            IdentityType::WorkloadIdentity => Ok(TokenCredential::WorkloadIdentity {
                tenant_id: spec.tenant_id.clone(),
                client_id: spec.client_id.clone(),
                authority_host,
                token_audience,
            }),
        }
    }

    async fn secret_payload(
        &self,
        spec: &AzureClusterIdentitySpec,
        identity_namespace: &str,
    ) -> Result<Vec<u8>, CredentialError> {
        let secret_ref = spec
            .client_secret
            .as_ref()
            .ok_or(CredentialError::IdentityTypeInvalid)?;
        let namespace = if secret_ref.namespace.is_empty() {
            identity_namespace
        } else {
            secret_ref.namespace.as_str()
        };

        let api = k8s::Api::<k8s::Secret>::namespaced(self.client.clone(), namespace);
        let secret = api.get(&secret_ref.name).await?;
        secret
            .data
            .and_then(|mut data| data.remove(SECRET_DATA_KEY))
            .map(|bytes| bytes.0)
            .ok_or_else(|| CredentialError::SecretInvalid {
                namespace: namespace.to_string(),
                name: secret_ref.name.clone(),
                key: SECRET_DATA_KEY.to_string(),
            })
    }

    /// Writes the shadow copy of a service principal's secret that the
    /// cloud-provider components in the workload cluster read. A conflict
    /// means another reconcile already created it.
    async fn ensure_shadow_secret(
        &self,
        spec: &AzureClusterIdentitySpec,
        identity_namespace: &str,
        client_secret: &str,
    ) -> Result<(), CredentialError> {
        let Some(secret_ref) = spec.client_secret.as_ref() else {
            return Ok(());
        };

        let shadow = k8s::Secret {
            metadata: k8s::ObjectMeta {
                name: Some(format!("{}-shadow", secret_ref.name)),
                namespace: Some(identity_namespace.to_string()),
                ..Default::default()
            },
            string_data: Some(
                [(SECRET_DATA_KEY.to_string(), client_secret.to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };

        let api = k8s::Api::<k8s::Secret>::namespaced(self.client.clone(), identity_namespace);
        match api.create(&PostParams::default(), &shadow).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
            Err(e) => {
                tracing::warn!(%e, "Failed to create shadow secret");
                Err(e.into())
            }
        }
    }
}

/// The allowed-namespaces predicate, factored out of the provider so it can
/// be evaluated without a live cluster.
///
/// - policy absent: deny.
/// - policy present but empty: allow.
/// - namespace list: membership test.
/// - selector: matched against the namespace's labels; an empty selector
///   matches nothing.
pub fn namespace_allowed(
    policy: Option<&AllowedNamespaces>,
    namespace: &str,
    namespace_labels: &Labels,
) -> bool {
    let Some(policy) = policy else {
        return false;
    };

    if policy.namespace_list.is_none() && policy.selector.is_none() {
        return true;
    }

    if let Some(list) = &policy.namespace_list {
        if list.iter().any(|n| n == namespace) {
            return true;
        }
    }

    if let Some(selector) = &policy.selector {
        if selector.matches(namespace_labels) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    fn policy(
        namespace_list: Option<Vec<&str>>,
        selector: Option<k8s::labels::Selector>,
    ) -> AllowedNamespaces {
        AllowedNamespaces {
            namespace_list: namespace_list
                .map(|l| l.into_iter().map(str::to_string).collect()),
            selector,
        }
    }

    #[test]
    fn absent_policy_denies() {
        assert!(!namespace_allowed(None, "default", &Labels::default()));
    }

    #[test]
    fn empty_policy_allows() {
        assert!(namespace_allowed(
            Some(&policy(None, None)),
            "default",
            &Labels::default()
        ));
    }

    #[test]
    fn empty_list_denies() {
        assert!(!namespace_allowed(
            Some(&policy(Some(vec![]), None)),
            "default",
            &Labels::default()
        ));
    }

    #[test]
    fn list_membership() {
        let p = policy(Some(vec!["a", "b"]), None);
        assert!(namespace_allowed(Some(&p), "a", &Labels::default()));
        assert!(!namespace_allowed(Some(&p), "c", &Labels::default()));
    }

    #[test]
    fn selector_against_namespace_labels() {
        let p = policy(None, Some(k8s::labels::Selector::from_iter(Some(("c", "d")))));
        assert!(namespace_allowed(
            Some(&p),
            "ns8",
            &Labels::from_iter(Some(("c", "d")))
        ));
        assert!(!namespace_allowed(
            Some(&p),
            "ns8",
            &Labels::from_iter(Some(("x", "y")))
        ));
    }

    #[test]
    fn empty_selector_matches_nothing() {
        let p = policy(None, Some(k8s::labels::Selector::default()));
        assert!(!namespace_allowed(
            Some(&p),
            "ns8",
            &Labels::from_iter(Some(("c", "d")))
        ));
    }
}
