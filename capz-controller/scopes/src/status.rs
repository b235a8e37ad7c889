//! Status propagation.
//!
//! Scopes never write status inline. They accumulate a [`StatusDelta`]
//! during the reconcile and flush it on close as an [`Update`] message; a
//! single [`StatusController`] task owns all `patch_status` traffic.

use capz_controller_core::{
    CloudError, Condition, Conditions, FutureKind, Futures, OperationFuture,
};
use capz_controller_k8s_api as k8s;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

/// Which user resource an update patches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatusTarget {
    Cluster,
    Machine,
    MachinePool,
    MachinePoolMachine,
    ManagedCluster,
    ManagedMachinePool,
    AroControlPlane,
}

impl StatusTarget {
    fn kind(&self) -> &'static str {
        match self {
            Self::Cluster => "AzureCluster",
            Self::Machine => "AzureMachine",
            Self::MachinePool => "AzureMachinePool",
            Self::MachinePoolMachine => "AzureMachinePoolMachine",
            Self::ManagedCluster => "AzureManagedCluster",
            Self::ManagedMachinePool => "AzureManagedMachinePool",
            Self::AroControlPlane => "AroControlPlane",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub target: StatusTarget,
    pub namespace: String,
    pub name: String,
    pub patch: k8s::Patch<serde_json::Value>,
}

/// Accumulated status mutations for one resource within one reconcile.
///
/// Seeded from the resource's current status so that gets observe earlier
/// sets and the flushed patch carries the full lists rather than diffs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusDelta {
    futures: Futures,
    conditions: Conditions,
    ready: Option<bool>,
    provisioning_state: Option<String>,
    dirty: bool,
}

// === impl StatusDelta ===

impl StatusDelta {
    pub fn new(futures: Futures, conditions: Conditions) -> Self {
        Self {
            futures,
            conditions,
            ready: None,
            provisioning_state: None,
            dirty: false,
        }
    }

    pub fn set_long_running_operation_state(&mut self, future: OperationFuture) {
        self.futures.set(future);
        self.dirty = true;
    }

    pub fn get_long_running_operation_state(
        &self,
        service: &str,
        name: &str,
        kind: FutureKind,
    ) -> Option<&OperationFuture> {
        self.futures.get(service, name, kind)
    }

    pub fn delete_long_running_operation_state(
        &mut self,
        service: &str,
        name: &str,
        kind: FutureKind,
    ) {
        self.futures.delete(service, name, kind);
        self.dirty = true;
    }

    pub fn set_condition(&mut self, condition: Condition) {
        self.conditions.set(condition);
        self.dirty = true;
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = Some(ready);
        self.dirty = true;
    }

    pub fn set_provisioning_state(&mut self, state: impl Into<String>) {
        self.provisioning_state = Some(state.into());
        self.dirty = true;
    }

    /// Records the outcome of a create-or-update call against `service`.
    ///
    /// A pending operation persists its future and reports progress; a
    /// conflict on create is treated as success with no state change.
    pub fn update_put_status(
        &mut self,
        condition_type: &str,
        service: &str,
        err: Option<&CloudError>,
    ) {
        match err {
            None => self.set_condition(Condition::true_(condition_type, "Succeeded")),
            Some(CloudError::AlreadyExists) => {}
            Some(error) => {
                if let CloudError::OperationNotDone(future) = error {
                    self.set_long_running_operation_state(future.clone());
                }
                self.set_condition(Condition::false_(
                    condition_type,
                    error.condition_reason(),
                    format!("{service}: {error}"),
                ));
            }
        }
    }

    /// Records the outcome of a delete call against `service`.
    pub fn update_delete_status(
        &mut self,
        condition_type: &str,
        service: &str,
        err: Option<&CloudError>,
    ) {
        match err {
            None => self.set_condition(Condition::false_(
                condition_type,
                "Deleted",
                format!("{service} deleted"),
            )),
            Some(error) => {
                if let CloudError::OperationNotDone(future) = error {
                    self.set_long_running_operation_state(future.clone());
                }
                let reason = match error {
                    CloudError::Upstream { .. } => "DeletionFailed",
                    _ => error.condition_reason(),
                };
                self.set_condition(Condition::false_(
                    condition_type,
                    reason,
                    format!("{service}: {error}"),
                ));
            }
        }
    }

    /// Records the outcome of a patch call against `service`.
    pub fn update_patch_status(
        &mut self,
        condition_type: &str,
        service: &str,
        err: Option<&CloudError>,
    ) {
        self.update_put_status(condition_type, service, err);
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Builds the flushed update, or `None` when nothing changed.
    pub fn into_update(
        self,
        target: StatusTarget,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Option<Update> {
        if !self.dirty {
            return None;
        }
        let mut status = json!({
            "conditions": self.conditions,
            "longRunningOperationStates": self.futures,
        });
        if let Some(ready) = self.ready {
            status["ready"] = json!(ready);
        }
        if let Some(state) = &self.provisioning_state {
            status["provisioningState"] = json!(state);
        }
        Some(Update {
            target,
            namespace: namespace.into(),
            name: name.into(),
            patch: k8s::Patch::Merge(json!({ "status": status })),
        })
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PatchLabels {
    kind: String,
}

pub struct ControllerMetrics {
    patches: Family<PatchLabels, Counter>,
    patch_failures: Family<PatchLabels, Counter>,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patches = Family::default();
        prom.register(
            "patches",
            "Count of status patches applied",
            patches.clone(),
        );

        let patch_failures = Family::default();
        prom.register(
            "patch_failures",
            "Count of status patches rejected by the API server",
            patch_failures.clone(),
        );

        Self { patches, patch_failures }
    }
}

pub struct StatusController {
    client: k8s::Client,
    updates: UnboundedReceiver<Update>,
    metrics: ControllerMetrics,
}

// === impl StatusController ===

impl StatusController {
    pub fn new(
        client: k8s::Client,
        updates: UnboundedReceiver<Update>,
        metrics: ControllerMetrics,
    ) -> Self {
        Self { client, updates, metrics }
    }

    pub async fn process_updates(mut self) {
        let patch_params = k8s::PatchParams::apply("capz-controller");

        while let Some(update) = self.updates.recv().await {
            let labels = PatchLabels { kind: update.target.kind().to_string() };
            self.metrics.patches.get_or_create(&labels).inc();
            if let Err(error) = self.apply(&patch_params, &update).await {
                self.metrics.patch_failures.get_or_create(&labels).inc();
                tracing::error!(
                    namespace = %update.namespace,
                    name = %update.name,
                    kind = %update.target.kind(),
                    %error,
                    "Failed to patch status",
                );
            }
        }
    }

    async fn apply(
        &self,
        params: &k8s::PatchParams,
        Update { target, namespace, name, patch }: &Update,
    ) -> kube::Result<()> {
        let client = self.client.clone();
        match target {
            StatusTarget::Cluster => {
                let api = k8s::Api::<k8s::AzureCluster>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
            StatusTarget::Machine => {
                let api = k8s::Api::<k8s::AzureMachine>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
            StatusTarget::MachinePool => {
                let api = k8s::Api::<k8s::AzureMachinePool>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
            StatusTarget::MachinePoolMachine => {
                let api =
                    k8s::Api::<k8s::AzureMachinePoolMachine>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
            StatusTarget::ManagedCluster => {
                let api = k8s::Api::<k8s::AzureManagedCluster>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
            StatusTarget::ManagedMachinePool => {
                let api = k8s::Api::<k8s::AzureManagedMachinePool>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
            StatusTarget::AroControlPlane => {
                let api = k8s::Api::<k8s::AroControlPlane>::namespaced(client, namespace);
                api.patch_status(name, params, patch).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capz_controller_core::ConditionStatus;
    use pretty_assertions::assert_eq;

    fn pending(service: &str, name: &str, kind: FutureKind) -> CloudError {
        CloudError::OperationNotDone(OperationFuture::new(service, name, kind, "token"))
    }

    #[test]
    fn clean_delta_produces_no_update() {
        let delta = StatusDelta::default();
        assert_eq!(delta.into_update(StatusTarget::Cluster, "ns", "c"), None);
    }

    #[test]
    fn conflict_on_create_is_a_silent_success() {
        let mut delta = StatusDelta::default();
        delta.update_put_status("VNetReady", "virtualnetworks", Some(&CloudError::AlreadyExists));
        assert_eq!(delta.into_update(StatusTarget::Cluster, "ns", "c"), None);
    }

    #[test]
    fn pending_put_persists_the_future() {
        let mut delta = StatusDelta::default();
        delta.update_put_status(
            "VNetReady",
            "virtualnetworks",
            Some(&pending("virtualnetworks", "my-vnet", FutureKind::Create)),
        );

        assert!(delta
            .get_long_running_operation_state("virtualnetworks", "my-vnet", FutureKind::Create)
            .is_some());
        let condition = delta.conditions().get("VNetReady").unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "Creating");
        assert!(condition.message.contains("virtualnetworks"));
    }

    #[test]
    fn successful_put_reports_ready() {
        let mut delta = StatusDelta::default();
        delta.update_put_status("VNetReady", "virtualnetworks", None);
        let condition = delta.conditions().get("VNetReady").unwrap();
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, "Succeeded");
    }

    #[test]
    fn upstream_delete_failure_reads_deletion_failed() {
        let mut delta = StatusDelta::default();
        delta.update_delete_status(
            "DisksReady",
            "disks",
            Some(&CloudError::Upstream { status: 500, message: "boom".to_string() }),
        );
        let condition = delta.conditions().get("DisksReady").unwrap();
        assert_eq!(condition.reason, "DeletionFailed");
    }

    #[test]
    fn completed_operation_clears_the_future() {
        let mut delta = StatusDelta::new(Futures::default(), Conditions::default());
        delta.set_long_running_operation_state(OperationFuture::new(
            "scalesets",
            "pool0",
            FutureKind::Update,
            "token",
        ));
        delta.delete_long_running_operation_state("scalesets", "pool0", FutureKind::Update);
        assert!(delta
            .get_long_running_operation_state("scalesets", "pool0", FutureKind::Update)
            .is_none());

        // Deleting is still a status change that must be flushed.
        let update = delta.into_update(StatusTarget::MachinePool, "ns", "pool0").unwrap();
        let k8s::Patch::Merge(body) = &update.patch else {
            panic!("expected a merge patch");
        };
        assert_eq!(body["status"]["longRunningOperationStates"], json!([]));
    }

    #[test]
    fn flushed_patch_carries_ready_and_provisioning_state() {
        let mut delta = StatusDelta::default();
        delta.update_put_status("Ready", "openshiftclusters", None);
        delta.set_ready(true);
        delta.set_provisioning_state("Succeeded");

        let update = delta.into_update(StatusTarget::AroControlPlane, "ns", "aro-1").unwrap();
        assert_eq!(update.target, StatusTarget::AroControlPlane);
        let k8s::Patch::Merge(body) = &update.patch else {
            panic!("expected a merge patch");
        };
        assert_eq!(body["status"]["ready"], json!(true));
        assert_eq!(body["status"]["provisioningState"], json!("Succeeded"));
        assert_eq!(body["status"]["conditions"][0]["type"], json!("Ready"));
    }
}
