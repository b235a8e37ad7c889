use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of Azure operation a stored future resumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum FutureKind {
    Create,
    Update,
    Delete,
}

/// A serializable long-running-operation token.
///
/// Futures are persisted on the owning resource's status so that a later
/// reconcile can resume polling instead of re-issuing the operation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationFuture {
    /// The Azure service that issued the operation (e.g. "virtualnetworks").
    pub service: String,

    /// The Azure resource the operation targets.
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FutureKind,

    /// Opaque resumption token handed back by the Azure API.
    pub data: String,

    pub created_at: DateTime<Utc>,
}

impl OperationFuture {
    pub fn new(service: impl Into<String>, name: impl Into<String>, kind: FutureKind, data: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            kind,
            data: data.into(),
            created_at: Utc::now(),
        }
    }
}

/// The list of in-flight futures stored on a resource status.
///
/// Keyed by (service, name, kind); setting an existing key replaces the
/// stored token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct Futures(Vec<OperationFuture>);

// === impl Futures ===

impl Futures {
    pub fn get(&self, service: &str, name: &str, kind: FutureKind) -> Option<&OperationFuture> {
        self.0
            .iter()
            .find(|f| f.service == service && f.name == name && f.kind == kind)
    }

    pub fn set(&mut self, future: OperationFuture) {
        match self
            .0
            .iter_mut()
            .find(|f| f.service == future.service && f.name == future.name && f.kind == future.kind)
        {
            Some(slot) => *slot = future,
            None => self.0.push(future),
        }
    }

    pub fn delete(&mut self, service: &str, name: &str, kind: FutureKind) {
        self.0
            .retain(|f| !(f.service == service && f.name == name && f.kind == kind));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationFuture> {
        self.0.iter()
    }
}
