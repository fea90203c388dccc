//! Expense approval workflow.
//!
//! This module implements amount-based rule matching, approval flow
//! initiation, decision recording and the expense status state machine.
//!
//! # Modules
//!
//! - `types` - Workflow domain types (ExpenseStatus, ApprovalRule, ApprovalRequest)
//! - `error` - Workflow-specific error types
//! - `catalog` - Rule applicability, ordering and input validation
//! - `initiator` - Initial approval requests for a submitted expense
//! - `decision` - Recording a single approver's decision
//! - `evaluator` - Expense status evaluation
//! - `store` - Persistence and user directory seams
//! - `memory` - In-memory store
//! - `lock` - Per-expense serialization
//! - `service` - The approval service tying the above together

pub mod catalog;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod initiator;
pub mod lock;
pub mod memory;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod catalog_props;
#[cfg(test)]
mod evaluator_props;

pub use catalog::RuleCatalog;
pub use decision::DecisionRecorder;
pub use error::ApprovalError;
pub use evaluator::{Evaluation, EvaluationOutcome, StatusEvaluator};
pub use initiator::{InitiationPlan, WorkflowInitiator};
pub use lock::{ExpenseGuard, ExpenseLocks};
pub use memory::InMemoryApprovalStore;
pub use service::{ApprovalFlow, ApprovalService};
pub use store::{
    ApprovalRequestStore, ApprovalStore, ExpenseStore, RuleStore, StoreError, UserDirectory,
};
pub use types::{
    ApprovalRequest, ApprovalRule, ApprovalRuleInput, Company, Decision, Expense, ExpenseStatus,
    RequestStatus, RuleApprover, RuleKind, User, UserRole,
};
