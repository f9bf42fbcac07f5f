use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Schema violation: {0}")]
    Validation(String),

    #[error("Field '{0}' cannot be changed")]
    ImmutableField(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Plan '{0}' not found")]
    NotFound(String),

    #[error("Plan '{0}' already exists")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlanError {
    /// Caller mistakes that are reported back and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson(_)
                | Self::Validation(_)
                | Self::ImmutableField(_)
                | Self::Unauthorized(_)
                | Self::NotFound(_)
                | Self::Conflict(_)
                | Self::PreconditionFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}
