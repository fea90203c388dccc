//! Workflow error types for expense approval.
//!
//! Every failure is surfaced synchronously to the caller; the engine never
//! retries on its own.

use outlay_shared::{AppError, InvalidReference};
use thiserror::Error;

use crate::workflow::store::StoreError;
use crate::workflow::types::ExpenseStatus;

/// Errors that can occur during approval workflow operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Malformed identifier or invalid rule input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing rule, request, expense or user, or an approver acting on a
    /// request assigned to someone else.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Decision submitted against a request that is no longer pending.
    #[error("Approval request {0} has already been processed")]
    AlreadyProcessed(String),

    /// Approval flow initiated for an expense that is not pending.
    #[error("Approval flow for expense {expense_id} already started (status {status})")]
    FlowAlreadyStarted {
        /// The expense.
        expense_id: String,
        /// Its current status.
        status: ExpenseStatus,
    },

    /// A collaborator store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApprovalError {
    /// Creates a not found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns true for errors caused by the current workflow state.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyProcessed(_) | Self::FlowAlreadyStarted { .. }
        )
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::AlreadyProcessed(_) | Self::FlowAlreadyStarted { .. } => 409,
            Self::Store(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyProcessed(_) => "REQUEST_ALREADY_PROCESSED",
            Self::FlowAlreadyStarted { .. } => "FLOW_ALREADY_STARTED",
            Self::Store(_) => "DATABASE_ERROR",
        }
    }
}

impl From<InvalidReference> for ApprovalError {
    fn from(err: InvalidReference) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ApprovalError> for AppError {
    fn from(err: ApprovalError) -> Self {
        let message = err.to_string();
        match err {
            ApprovalError::Validation(_) => Self::Validation(message),
            ApprovalError::NotFound { .. } => Self::NotFound(message),
            ApprovalError::AlreadyProcessed(_) | ApprovalError::FlowAlreadyStarted { .. } => {
                Self::Conflict(message)
            }
            ApprovalError::Store(_) => Self::Database(message),
        }
    }
}
