//! Collaborator seams for persistence and user lookup.
//!
//! The engine reads and writes through these traits only. Implementations
//! must make [`ApprovalRequestStore::save_workflow`] atomic: either every
//! request row and the expense row land, or none do.

use async_trait::async_trait;
use outlay_shared::types::{ApprovalRequestId, ApprovalRuleId, CompanyId, ExpenseId, UserId};
use thiserror::Error;

use crate::workflow::types::{ApprovalRequest, ApprovalRule, Expense, User};

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A record could not be mapped to or from its stored form.
    #[error("Corrupt record: {0}")]
    Decode(String),
}

/// Approval rule persistence.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Inserts a new rule.
    async fn insert_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError>;

    /// Replaces an existing rule.
    async fn update_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError>;

    /// Finds a rule by id.
    async fn find_rule(&self, id: ApprovalRuleId) -> Result<Option<ApprovalRule>, StoreError>;

    /// Lists every rule of a company, active or not, in creation order.
    async fn list_rules(&self, company_id: CompanyId) -> Result<Vec<ApprovalRule>, StoreError>;
}

/// Approval request persistence.
#[async_trait]
pub trait ApprovalRequestStore: Send + Sync {
    /// Finds a request by id.
    async fn find_request(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Lists every request of an expense in creation order.
    async fn list_requests_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// Lists an approver's pending requests.
    async fn list_pending_for_approver(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<ApprovalRequest>, StoreError>;

    /// Upserts `requests` and saves `expense` in one atomic write.
    async fn save_workflow(
        &self,
        requests: &[ApprovalRequest],
        expense: &Expense,
    ) -> Result<(), StoreError>;
}

/// Expense persistence owned by the expense-submission collaborator.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Finds an expense by id.
    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError>;

    /// Saves an expense.
    async fn save_expense(&self, expense: &Expense) -> Result<(), StoreError>;
}

/// User lookup owned by the identity collaborator.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves a user, including manager relationship and role.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

/// Every seam the approval service needs, implemented by one backend.
pub trait ApprovalStore: RuleStore + ApprovalRequestStore + ExpenseStore + UserDirectory {}

impl<T> ApprovalStore for T where T: RuleStore + ApprovalRequestStore + ExpenseStore + UserDirectory {}
