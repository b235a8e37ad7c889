use crate::credentials::TokenCredential;
use capz_controller_core::{CloudError, OperationFuture};

/// A desired Azure resource, described fully enough for an executor to
/// issue a CreateOrUpdate.
///
/// Every spec a scope emits implements this. `parameters` receives the
/// resource's current Azure representation (when one exists) so that specs
/// can avoid clobbering fields owned by other writers.
pub trait ResourceSpec: Send + Sync {
    /// The Azure service the spec belongs to, e.g. `"virtualnetworks"`.
    fn service_name(&self) -> &'static str;

    fn resource_name(&self) -> String;

    fn resource_group(&self) -> String;

    /// Name of the parent resource, for child resources like subnets.
    fn owner_name(&self) -> Option<String> {
        None
    }

    /// The desired ARM request body; `None` means the existing resource is
    /// already in the desired state and no call should be made.
    fn parameters(
        &self,
        existing: Option<serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, CloudError>;
}

/// The outcome of an executor call: either the operation finished within the
/// reconcile, or it is still running and the caller must persist the future.
#[derive(Clone, Debug)]
pub enum OperationResult<T> {
    Done(T),
    Pending(OperationFuture),
}

impl<T> OperationResult<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// The Azure call surface, implemented outside this core.
#[async_trait::async_trait]
pub trait AzureExecutor: Send + Sync {
    async fn create_or_update(
        &self,
        spec: &dyn ResourceSpec,
        credential: &TokenCredential,
    ) -> Result<OperationResult<serde_json::Value>, CloudError>;

    async fn get(
        &self,
        spec: &dyn ResourceSpec,
        credential: &TokenCredential,
    ) -> Result<serde_json::Value, CloudError>;

    async fn delete(
        &self,
        spec: &dyn ResourceSpec,
        credential: &TokenCredential,
    ) -> Result<OperationResult<()>, CloudError>;
}
