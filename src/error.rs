//! Core fault taxonomy.
//!
//! Expected domain outcomes (validation, not-found, conflicts) are typed
//! errors returned to the caller; consistency faults indicate a broken
//! fee/tier configuration and are fatal to the operation that hit them.

use crate::ledger::transaction::TransactionStatus;
use crate::payments::error::PaymentError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate id: {id}")]
    DuplicateId { id: String },

    #[error("customer reference already in use: {reference}")]
    DuplicateReference { reference: String },

    #[error("transaction {id} already finalized as {status}")]
    AlreadyFinalized {
        id: String,
        status: TransactionStatus,
    },

    #[error("provider error: {0}")]
    Provider(#[from] PaymentError),

    #[error("consistency fault: {message}")]
    Consistency { message: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        CoreError::Consistency {
            message: message.into(),
        }
    }

    /// Stable machine-readable fault kind for the read/write surface.
    pub fn fault_kind(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "validation_fault",
            CoreError::NotFound { .. } => "not_found_fault",
            CoreError::DuplicateId { .. }
            | CoreError::DuplicateReference { .. }
            | CoreError::AlreadyFinalized { .. } => "conflict_fault",
            CoreError::Provider(_) => "provider_fault",
            CoreError::Consistency { .. } => "consistency_fault",
        }
    }

    /// Consistency faults are configuration bugs; everything else is an
    /// expected, recoverable condition.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::Consistency { .. })
    }
}
