use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::product::ProductId;
use crate::domain::quote::{QuoteId, QuoteStatus};
use crate::domain::user::UserId;

/// Rule violations raised by the domain entities themselves.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote transition from {from} to {to}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("quote {id} expired on {expired_at} and can no longer be approved")]
    QuoteExpired { id: QuoteId, expired_at: DateTime<Utc> },
}

/// Opaque persistence failure surfaced by a storage collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid quote request: {0}")]
    InvalidRequest(String),
    #[error("product {0} not found or inactive")]
    ProductNotFound(ProductId),
    #[error("quote {0} not found")]
    QuoteNotFound(QuoteId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("quote {id} is {status} and cannot be deleted")]
    ProtectedQuote { id: QuoteId, status: QuoteStatus },
    #[error("quote {id} is {status}; only pending quotes can be approved with provisioning")]
    NotPending { id: QuoteId, status: QuoteStatus },
    #[error("quote {id} was not submitted through the public channel")]
    NotPublic { id: QuoteId },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// The referenced entity does not exist (404-equivalent).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_) | Self::QuoteNotFound(_) | Self::UserNotFound(_)
        )
    }

    /// The target exists but the action violates a business rule
    /// (400-equivalent); never worth retrying.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::Domain(_)
                | Self::ProtectedQuote { .. }
                | Self::NotPending { .. }
                | Self::NotPublic { .. }
        )
    }
}
