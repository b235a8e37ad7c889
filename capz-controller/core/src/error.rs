use crate::future::OperationFuture;

/// The error classes surfaced by the derivation and executor layers.
///
/// `OperationNotDone` is a normal return case, not a failure: the caller
/// persists the future and requeues.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("operation on {service}/{name} not done", service = .0.service, name = .0.name)]
    OperationNotDone(OperationFuture),

    #[error("credential failure: {0}")]
    Credential(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Azure API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("resource already exists")]
    AlreadyExists,
}

impl CloudError {
    pub fn is_operation_not_done(&self) -> bool {
        matches!(self, Self::OperationNotDone(_))
    }

    /// True when the error should not be retried by requeueing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Credential(_) | Self::InvalidConfig(_))
    }

    /// The condition reason written for this error class.
    pub fn condition_reason(&self) -> &'static str {
        match self {
            Self::OperationNotDone(f) => match f.kind {
                crate::future::FutureKind::Create => "Creating",
                crate::future::FutureKind::Update => "Updating",
                crate::future::FutureKind::Delete => "Deleting",
            },
            Self::Credential(_) => "IdentityNotAuthorized",
            Self::InvalidConfig(_) => "InvalidConfiguration",
            Self::Upstream { .. } => "Failed",
            Self::AlreadyExists => "Succeeded",
        }
    }
}
