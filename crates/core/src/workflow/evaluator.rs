//! Expense status evaluation.
//!
//! Recomputes an in-progress expense's status from the full set of its
//! approval requests and the rules applicable to its amount. Evaluation is
//! pure; the service persists the result.
//!
//! Precedence, highest first:
//! 1. Any rejected request rejects the expense.
//! 2. The conditional predicate of the **first** applicable rule.
//! 3. Sequential completion of the active step.

use outlay_shared::types::UserId;
use rust_decimal::Decimal;

use crate::workflow::types::{ApprovalRequest, ApprovalRule, Expense, ExpenseStatus, RuleKind};

/// Why an evaluation produced its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// The expense is not in progress; nothing was evaluated.
    NotInProgress,
    /// Still waiting on decisions at the active step.
    Unchanged,
    /// A request was rejected.
    Rejected,
    /// The first applicable rule's conditional predicate holds.
    ConditionallyApproved,
    /// Every step has been cleared.
    SequenceCompleted,
    /// One or more steps were cleared; the given step is now active.
    AdvancedToStep(u32),
}

/// Result of evaluating an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Status the expense should have.
    pub status: ExpenseStatus,
    /// Active sequential step the expense should have.
    pub current_approval_step: u32,
    /// Why.
    pub outcome: EvaluationOutcome,
}

impl Evaluation {
    fn keep(expense: &Expense, outcome: EvaluationOutcome) -> Self {
        Self {
            status: expense.status,
            current_approval_step: expense.current_approval_step,
            outcome,
        }
    }

    fn approved(expense: &Expense, outcome: EvaluationOutcome) -> Self {
        Self {
            status: ExpenseStatus::Approved,
            current_approval_step: expense.current_approval_step,
            outcome,
        }
    }

    /// Writes the evaluation into `expense`.
    ///
    /// # Returns
    /// `true` if the status or the active step changed.
    pub fn apply_to(&self, expense: &mut Expense) -> bool {
        let changed = expense.status != self.status
            || expense.current_approval_step != self.current_approval_step;
        expense.status = self.status;
        expense.current_approval_step = self.current_approval_step;
        changed
    }
}

/// Stateless evaluator of the expense state machine.
pub struct StatusEvaluator;

impl StatusEvaluator {
    /// Evaluates an expense against its requests.
    ///
    /// Only `InProgress` expenses move; terminal statuses are left to an
    /// admin override.
    ///
    /// # Arguments
    /// * `expense` - The expense under approval
    /// * `requests` - Every request ever created for the expense
    /// * `applicable_rules` - Rules applicable to the amount, in catalog order
    #[must_use]
    pub fn evaluate(
        expense: &Expense,
        requests: &[ApprovalRequest],
        applicable_rules: &[ApprovalRule],
    ) -> Evaluation {
        if expense.status != ExpenseStatus::InProgress {
            return Evaluation::keep(expense, EvaluationOutcome::NotInProgress);
        }

        if requests.iter().any(ApprovalRequest::is_rejected) {
            return Evaluation {
                status: ExpenseStatus::Rejected,
                current_approval_step: expense.current_approval_step,
                outcome: EvaluationOutcome::Rejected,
            };
        }

        if let Some(rule) = applicable_rules.first()
            && Self::conditional_approval(&rule.kind, requests)
        {
            return Evaluation::approved(expense, EvaluationOutcome::ConditionallyApproved);
        }

        Self::sequential(expense, requests)
    }

    /// The conditional-approval predicate of a rule type.
    ///
    /// Sequential rules never approve conditionally.
    #[must_use]
    pub fn conditional_approval(kind: &RuleKind, requests: &[ApprovalRequest]) -> bool {
        match kind {
            RuleKind::Sequential => false,
            RuleKind::Percentage {
                approval_percentage,
            } => Self::percentage_reached(*approval_percentage, requests),
            RuleKind::SpecificApprover {
                specific_approver_id,
            } => Self::specific_approver_approved(*specific_approver_id, requests),
            RuleKind::Hybrid {
                approval_percentage,
                specific_approver_id,
            } => {
                Self::percentage_reached(*approval_percentage, requests)
                    || Self::specific_approver_approved(*specific_approver_id, requests)
            }
        }
    }

    /// True iff `approved / total * 100 >= threshold` over all requests.
    ///
    /// Compared as `approved * 100 >= threshold * total` so no division or
    /// rounding happens. No requests never reaches a threshold.
    #[must_use]
    pub fn percentage_reached(threshold: Decimal, requests: &[ApprovalRequest]) -> bool {
        let total = requests.len();
        if total == 0 {
            return false;
        }
        let approved = requests.iter().filter(|r| r.is_approved()).count();
        Decimal::from(approved) * Decimal::ONE_HUNDRED >= threshold * Decimal::from(total)
    }

    /// True iff any request of `approver_id` is approved.
    #[must_use]
    pub fn specific_approver_approved(approver_id: UserId, requests: &[ApprovalRequest]) -> bool {
        requests
            .iter()
            .any(|r| r.approver_id == approver_id && r.is_approved())
    }

    /// Clears fully approved steps starting at the active one.
    fn sequential(expense: &Expense, requests: &[ApprovalRequest]) -> Evaluation {
        let mut step = expense.current_approval_step;
        loop {
            let Some(cohort) = Self::next_step(requests, step) else {
                return Evaluation::approved(expense, EvaluationOutcome::SequenceCompleted);
            };

            let cleared = requests
                .iter()
                .filter(|r| r.step == cohort)
                .all(ApprovalRequest::is_approved);

            if !cleared {
                if step == expense.current_approval_step {
                    return Evaluation::keep(expense, EvaluationOutcome::Unchanged);
                }
                return Evaluation {
                    status: ExpenseStatus::InProgress,
                    current_approval_step: step,
                    outcome: EvaluationOutcome::AdvancedToStep(step),
                };
            }

            match cohort.checked_add(1).and_then(|s| Self::next_step(requests, s)) {
                Some(next) => step = next,
                None => {
                    return Evaluation::approved(expense, EvaluationOutcome::SequenceCompleted);
                }
            }
        }
    }

    /// Smallest request step at or above `from`.
    fn next_step(requests: &[ApprovalRequest], from: u32) -> Option<u32> {
        requests.iter().map(|r| r.step).filter(|s| *s >= from).min()
    }
}
