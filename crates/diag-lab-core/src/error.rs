//! Workflow error taxonomy.

use thiserror::Error;

use crate::db::DbError;

/// Errors raised by billing and reporting operations.
#[derive(Error, Debug)]
pub enum LabError {
    /// A precondition failed before anything was written.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The store failed; the transaction was rolled back.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

pub type LabResult<T> = Result<T, LabError>;

impl LabError {
    pub fn validation(message: impl Into<String>) -> Self {
        LabError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        LabError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, LabError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LabError::NotFound { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, LabError::Persistence(_))
    }
}

impl From<DbError> for LabError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => LabError::NotFound {
                entity: "record",
                id: what,
            },
            // Reference guards (e.g. deleting a billed test) are caller mistakes.
            DbError::Constraint(reason) => LabError::Validation(reason),
            other => LabError::Persistence(other.to_string()),
        }
    }
}
