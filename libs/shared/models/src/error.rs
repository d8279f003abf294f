use thiserror::Error;

/// Outcome of a store mutation that could not be applied.
///
/// A failed mutation leaves the collection untouched and produces no
/// notification, broadcast or flush.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        StoreError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
