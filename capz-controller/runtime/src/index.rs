//! Watch-stream indexes.
//!
//! Each watched resource kind lands here. The index validates what can be
//! validated without talking to Azure (scope construction, version rules,
//! provisioning-state mapping) and forwards the resulting condition to the
//! status controller. Everything requiring ARM calls belongs to the
//! executor layer, not the watch path.

use crate::k8s::{self, ResourceExt};
use ahash::AHashMap as HashMap;
use capz_controller_azure::ClientsContext;
use capz_controller_core::{Condition, ConditionStatus, Environment};
use capz_controller_scopes::{
    status::{StatusDelta, StatusTarget, Update},
    version::KubernetesVersion,
    AroScope, ClusterScope, ManagedClusterScope,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

const SCOPE_CONDITION: &str = "ScopeReady";

pub type SharedIndex = Arc<RwLock<Index>>;

pub struct Index {
    environment: Environment,
    updates: UnboundedSender<Update>,

    clusters: HashMap<(String, String), k8s::AzureCluster>,
    reported: HashMap<(StatusTarget, String, String), (ConditionStatus, String)>,
}

// === impl Index ===

impl Index {
    pub fn shared(environment: Environment, updates: UnboundedSender<Update>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            environment,
            updates,
            clusters: HashMap::new(),
            reported: HashMap::new(),
        }))
    }

    fn clients(&self, subscription_id: &str) -> ClientsContext {
        ClientsContext::new(subscription_id, self.environment.clone())
    }

    /// Sends a condition patch unless the same (status, reason) pair was
    /// already reported for this resource.
    fn push(&mut self, target: StatusTarget, namespace: String, name: String, condition: Condition) {
        let key = (target, namespace.clone(), name.clone());
        let fingerprint = (condition.status, condition.reason.clone());
        if self.reported.get(&key) == Some(&fingerprint) {
            return;
        }
        self.reported.insert(key, fingerprint);

        let mut delta = StatusDelta::default();
        delta.set_condition(condition);
        if let Some(update) = delta.into_update(target, namespace, name) {
            if self.updates.send(update).is_err() {
                tracing::warn!("Status controller is gone; dropping update");
            }
        }
    }

    fn forget(&mut self, target: StatusTarget, namespace: &str, name: &str) {
        self.reported
            .remove(&(target, namespace.to_string(), name.to_string()));
    }
}

impl kubert::index::IndexNamespacedResource<k8s::AzureCluster> for Index {
    fn apply(&mut self, cluster: k8s::AzureCluster) {
        let namespace = cluster.namespace().unwrap_or_default();
        let name = cluster.name_unchecked();

        let clients = self.clients(&cluster.spec.subscription_id);
        let condition = match ClusterScope::new(clients, cluster.clone()) {
            Ok(_) => Condition::true_(SCOPE_CONDITION, "Succeeded"),
            Err(error) => {
                tracing::info!(%namespace, %name, %error, "AzureCluster rejected");
                Condition::false_(SCOPE_CONDITION, "InvalidConfiguration", error.to_string())
            }
        };

        self.clusters
            .insert((namespace.clone(), name.clone()), cluster);
        self.push(StatusTarget::Cluster, namespace, name, condition);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.clusters.remove(&(namespace.clone(), name.clone()));
        self.forget(StatusTarget::Cluster, &namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<k8s::AzureManagedCluster> for Index {
    fn apply(&mut self, managed: k8s::AzureManagedCluster) {
        let namespace = managed.namespace().unwrap_or_default();
        let name = managed.name_unchecked();

        let cluster_name = managed
            .labels()
            .get(k8s::CLUSTER_NAME_LABEL)
            .cloned()
            .unwrap_or_else(|| name.clone());
        let Some(cluster) = self
            .clusters
            .get(&(namespace.clone(), cluster_name.clone()))
            .cloned()
        else {
            // The owning AzureCluster watch has not caught up yet; this
            // object is revisited when it does.
            tracing::debug!(%namespace, %name, %cluster_name, "Owning cluster not indexed yet");
            return;
        };

        let clients = self.clients(&cluster.spec.subscription_id);
        let condition = ClusterScope::new(clients, cluster)
            .and_then(|scope| {
                ManagedClusterScope::new(&scope, managed.clone())?;
                KubernetesVersion::parse(&managed.spec.version)?;
                Ok(())
            })
            .map_or_else(
                |error| {
                    tracing::info!(%namespace, %name, %error, "AzureManagedCluster rejected");
                    Condition::false_(SCOPE_CONDITION, "InvalidConfiguration", error.to_string())
                },
                |()| Condition::true_(SCOPE_CONDITION, "Succeeded"),
            );

        self.push(StatusTarget::ManagedCluster, namespace, name, condition);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.forget(StatusTarget::ManagedCluster, &namespace, &name);
    }
}

impl kubert::index::IndexNamespacedResource<k8s::AroControlPlane> for Index {
    fn apply(&mut self, control_plane: k8s::AroControlPlane) {
        let namespace = control_plane.namespace().unwrap_or_default();
        let name = control_plane.name_unchecked();

        let provisioning_state = control_plane
            .status
            .as_ref()
            .and_then(|s| s.provisioning_state.as_deref());
        let condition = AroScope::ready_condition(provisioning_state);

        self.push(StatusTarget::AroControlPlane, namespace, name, condition);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.forget(StatusTarget::AroControlPlane, &namespace, &name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capz_controller_k8s_api::{
        aro::{AroControlPlaneSpec, AroControlPlaneStatus},
        cluster::AzureClusterSpec,
        network::{NetworkSpec, VnetSpec},
        ObjectMeta,
    };
    use kubert::index::IndexNamespacedResource;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn cluster(name: &str) -> k8s::AzureCluster {
        k8s::AzureCluster {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec: AzureClusterSpec {
                subscription_id: "sub-1".to_string(),
                location: "eastus".to_string(),
                resource_group: "rg-1".to_string(),
                network_spec: NetworkSpec {
                    vnet: VnetSpec { name: "vnet".to_string(), ..Default::default() },
                    ..Default::default()
                },
                ..Default::default()
            },
            status: None,
        }
    }

    #[test]
    fn valid_cluster_reports_scope_ready_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let index = Index::shared(Environment::public_cloud(), tx);

        index.write().apply(cluster("c1"));
        let update = rx.try_recv().unwrap();
        assert_eq!(update.target, StatusTarget::Cluster);
        assert_eq!(update.name, "c1");

        // Re-applying the same state is not re-reported.
        index.write().apply(cluster("c1"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cluster_without_namespace_is_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let index = Index::shared(Environment::public_cloud(), tx);

        let mut broken = cluster("c1");
        broken.metadata.namespace = None;
        index.write().apply(broken);

        let update = rx.try_recv().unwrap();
        let k8s::Patch::Merge(body) = &update.patch else {
            panic!("expected a merge patch");
        };
        assert_eq!(
            body["status"]["conditions"][0]["reason"],
            serde_json::json!("InvalidConfiguration")
        );
    }

    #[test]
    fn aro_provisioning_state_maps_to_ready() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let index = Index::shared(Environment::public_cloud(), tx);

        let control_plane = k8s::AroControlPlane {
            metadata: ObjectMeta {
                name: Some("aro-1".to_string()),
                namespace: Some("ns-1".to_string()),
                ..Default::default()
            },
            spec: AroControlPlaneSpec::default(),
            status: Some(AroControlPlaneStatus {
                provisioning_state: Some("Succeeded".to_string()),
                ..Default::default()
            }),
        };
        index.write().apply(control_plane);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.target, StatusTarget::AroControlPlane);
        let k8s::Patch::Merge(body) = &update.patch else {
            panic!("expected a merge patch");
        };
        assert_eq!(body["status"]["conditions"][0]["status"], serde_json::json!("True"));
    }
}
