use crate::transition::TransitionError;
use crate::types::{RecordId, ResourceKind};
use crate::upload::ImageError;

pub type MarketResult<T> = Result<T, MarketError>;

#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("request carries no authenticated identity")]
    Unauthorized,
    #[error("not authorized to {action} this {kind}")]
    Forbidden {
        kind: ResourceKind,
        action: &'static str,
    },
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: RecordId },
    #[error("invalid status {value:?} for {kind}")]
    InvalidStatus { kind: ResourceKind, value: String },
    #[error("{kind} cannot move from {from} to {to}")]
    IllegalTransition {
        kind: ResourceKind,
        from: String,
        to: String,
    },
    #[error("{kind} {id} is {status} and can no longer be edited")]
    Finalized {
        kind: ResourceKind,
        id: RecordId,
        status: String,
    },
    #[error("missing or invalid field: {0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    InvalidImage(#[from] ImageError),
    #[error("entity store failure")]
    Store(#[from] sled::Error),
    #[error("record encoding failed: {0}")]
    Codec(String),
}

impl MarketError {
    pub fn forbidden(kind: ResourceKind, action: &'static str) -> Self {
        Self::Forbidden { kind, action }
    }

    pub fn not_found(kind: ResourceKind, id: RecordId) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// HTTP status the handler layer answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::InvalidStatus { .. } | Self::Validation(_) | Self::InvalidImage(_) => 400,
            Self::IllegalTransition { .. } | Self::Finalized { .. } | Self::Conflict(_) => 409,
            Self::Store(_) | Self::Codec(_) => 500,
        }
    }

    /// Client errors are never retried; only collaborator failures may be.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<TransitionError> for MarketError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::InvalidStatus { kind, value } => Self::InvalidStatus { kind, value },
            TransitionError::IllegalTransition { kind, from, to } => Self::IllegalTransition {
                kind,
                from: from.to_string(),
                to: to.to_string(),
            },
        }
    }
}
