//! Approval flow initiation.
//!
//! Decides, at submission time, which approval requests an expense needs
//! and the status it starts the workflow in.

use chrono::{DateTime, Utc};

use crate::workflow::error::ApprovalError;
use crate::workflow::types::{
    ApprovalRequest, ApprovalRule, Expense, ExpenseStatus, RuleKind, User,
};

/// Step of the manager request created when no rule applies.
pub const MANAGER_ONLY_STEP: u32 = 1;

/// Step of the manager request placed ahead of a sequential rule's approvers.
pub const MANAGER_PRE_STEP: u32 = 0;

/// Step every approver of a non-sequential rule is flattened to.
pub const FLAT_STEP: u32 = 1;

/// Requests to create and the status the expense moves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiationPlan {
    /// New pending requests, in creation order.
    pub requests: Vec<ApprovalRequest>,
    /// Status the expense moves to.
    pub status: ExpenseStatus,
}

impl InitiationPlan {
    /// Returns true if the expense needs no approval at all.
    #[must_use]
    pub fn is_auto_approved(&self) -> bool {
        self.status == ExpenseStatus::Approved && self.requests.is_empty()
    }
}

/// Stateless planner for the start of an approval flow.
pub struct WorkflowInitiator;

impl WorkflowInitiator {
    /// Plans the initial approval requests for a pending expense.
    ///
    /// # Arguments
    /// * `expense` - The expense, still `Pending`
    /// * `employee` - The submitting employee
    /// * `rules` - The rules applicable to the expense amount
    /// * `now` - Creation time for the requests
    ///
    /// # Returns
    /// * `Ok(InitiationPlan)` with the requests of **every** applicable rule
    /// * `Err(ApprovalError::FlowAlreadyStarted)` if the expense is not pending
    pub fn plan(
        expense: &Expense,
        employee: &User,
        rules: &[ApprovalRule],
        now: DateTime<Utc>,
    ) -> Result<InitiationPlan, ApprovalError> {
        if expense.status != ExpenseStatus::Pending {
            return Err(ApprovalError::FlowAlreadyStarted {
                expense_id: expense.id.to_string(),
                status: expense.status,
            });
        }

        let manager = employee.approving_manager();

        if rules.is_empty() {
            return Ok(match manager {
                Some(manager_id) => InitiationPlan {
                    requests: vec![ApprovalRequest::pending(
                        expense.id,
                        manager_id,
                        MANAGER_ONLY_STEP,
                        now,
                    )],
                    status: ExpenseStatus::InProgress,
                },
                None => InitiationPlan {
                    requests: Vec::new(),
                    status: ExpenseStatus::Approved,
                },
            });
        }

        let mut requests = Vec::new();
        for rule in rules {
            match rule.kind {
                RuleKind::Sequential => {
                    if let Some(manager_id) = manager {
                        requests.push(ApprovalRequest::pending(
                            expense.id,
                            manager_id,
                            MANAGER_PRE_STEP,
                            now,
                        ));
                    }
                    requests.extend(rule.approvers.iter().map(|approver| {
                        ApprovalRequest::pending(expense.id, approver.user_id, approver.step, now)
                    }));
                }
                RuleKind::Percentage { .. }
                | RuleKind::SpecificApprover { .. }
                | RuleKind::Hybrid { .. } => {
                    requests.extend(rule.approvers.iter().map(|approver| {
                        ApprovalRequest::pending(expense.id, approver.user_id, FLAT_STEP, now)
                    }));
                }
            }
        }

        Ok(InitiationPlan {
            requests,
            status: ExpenseStatus::InProgress,
        })
    }
}
