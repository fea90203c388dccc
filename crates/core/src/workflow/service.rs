//! Approval service: the entry point for every workflow operation.
//!
//! Loads state from the [`ApprovalStore`], runs the pure planners in this
//! module's siblings and writes the result back. Everything that touches one
//! expense's requests or status runs under that expense's lock.

use std::sync::Arc;

use chrono::Utc;
use outlay_shared::Reference;
use outlay_shared::types::{ApprovalRequestId, ApprovalRuleId, CompanyId, ExpenseId, UserId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::workflow::catalog::RuleCatalog;
use crate::workflow::decision::DecisionRecorder;
use crate::workflow::error::ApprovalError;
use crate::workflow::evaluator::{Evaluation, StatusEvaluator};
use crate::workflow::initiator::WorkflowInitiator;
use crate::workflow::lock::ExpenseLocks;
use crate::workflow::store::ApprovalStore;
use crate::workflow::types::{
    ApprovalRequest, ApprovalRule, ApprovalRuleInput, Company, Decision, Expense, User, UserRole,
};

/// An expense together with its approval requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalFlow {
    /// The expense after the operation.
    pub expense: Expense,
    /// Requests of the expense, in creation order.
    pub requests: Vec<ApprovalRequest>,
}

/// Expense approval workflow service.
pub struct ApprovalService<S> {
    store: Arc<S>,
    locks: ExpenseLocks,
}

impl<S: ApprovalStore> ApprovalService<S> {
    /// Creates a service over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: ExpenseLocks::new(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========================================================================
    // Rule administration
    // ========================================================================

    /// Creates an approval rule for a company.
    ///
    /// # Returns
    /// * `Ok(ApprovalRule)` - The stored rule, active unless the input says otherwise
    /// * `Err(ApprovalError::Validation)` - Malformed input or approver from another company
    /// * `Err(ApprovalError::NotFound)` - Unknown or inactive approver
    pub async fn create_approval_rule(
        &self,
        company: &Reference<Company>,
        input: ApprovalRuleInput,
    ) -> Result<ApprovalRule, ApprovalError> {
        let company_id = company.resolve()?;
        self.validate_rule(company_id, &input).await?;

        let now = Utc::now();
        let rule = ApprovalRule {
            id: ApprovalRuleId::new(),
            company_id,
            name: input.name,
            kind: input.kind,
            approvers: input.approvers,
            min_amount: input.min_amount,
            max_amount: input.max_amount,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_rule(&rule).await?;

        info!(
            company_id = %company_id,
            rule_id = %rule.id,
            rule_type = %rule.kind,
            "Approval rule created"
        );
        Ok(rule)
    }

    /// Lists a company's active rules, ascending by minimum amount.
    pub async fn get_approval_rules(
        &self,
        company: &Reference<Company>,
    ) -> Result<Vec<ApprovalRule>, ApprovalError> {
        let company_id = company.resolve()?;
        let rules = self.store.list_rules(company_id).await?;
        Ok(RuleCatalog::active_rules(&rules))
    }

    /// Replaces the editable fields of a rule.
    ///
    /// Setting `is_active` to `false` deactivates the rule; rules are never
    /// deleted.
    pub async fn update_approval_rule(
        &self,
        id: ApprovalRuleId,
        input: ApprovalRuleInput,
    ) -> Result<ApprovalRule, ApprovalError> {
        let existing = self
            .store
            .find_rule(id)
            .await?
            .ok_or_else(|| ApprovalError::not_found(ApprovalRuleId::KIND, id))?;
        self.validate_rule(existing.company_id, &input).await?;

        let rule = ApprovalRule {
            name: input.name,
            kind: input.kind,
            approvers: input.approvers,
            min_amount: input.min_amount,
            max_amount: input.max_amount,
            is_active: input.is_active.unwrap_or(existing.is_active),
            updated_at: Utc::now(),
            ..existing
        };
        self.store.update_rule(&rule).await?;

        info!(rule_id = %id, is_active = rule.is_active, "Approval rule updated");
        Ok(rule)
    }

    /// Rules applicable to an amount, in catalog order.
    pub async fn get_applicable_rules(
        &self,
        company_id: CompanyId,
        amount: Decimal,
    ) -> Result<Vec<ApprovalRule>, ApprovalError> {
        let rules = self.store.list_rules(company_id).await?;
        let applicable = RuleCatalog::applicable_rules(&rules, amount);
        debug!(
            company_id = %company_id,
            amount = %amount,
            matched = applicable.len(),
            "Matched approval rules"
        );
        Ok(applicable)
    }

    async fn validate_rule(
        &self,
        company_id: CompanyId,
        input: &ApprovalRuleInput,
    ) -> Result<(), ApprovalError> {
        RuleCatalog::validate_input(input)?;

        for user_id in RuleCatalog::referenced_users(input) {
            let user = self
                .store
                .find_user(user_id)
                .await?
                .filter(|u| u.is_active)
                .ok_or_else(|| ApprovalError::not_found(UserId::KIND, user_id))?;

            if user.company_id != company_id {
                return Err(ApprovalError::validation(format!(
                    "Approver {user_id} does not belong to company {company_id}"
                )));
            }
            if user.role == UserRole::Employee {
                return Err(ApprovalError::validation(format!(
                    "Approver {user_id} must have the manager or admin role"
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Workflow
    // ========================================================================

    /// Starts the approval flow of a freshly submitted expense.
    ///
    /// # Arguments
    /// * `expense` - The pending expense
    /// * `employee` - The submitter; a bare id is resolved through the user directory
    ///
    /// # Returns
    /// * `Ok(ApprovalFlow)` - The expense in its initial status and the created requests
    /// * `Err(ApprovalError::FlowAlreadyStarted)` - The expense is not pending
    pub async fn initiate_approval_flow(
        &self,
        expense: &Reference<Expense>,
        employee: &Reference<User>,
    ) -> Result<ApprovalFlow, ApprovalError> {
        let expense_id = expense.resolve()?;
        let employee = self.resolve_user(employee).await?;

        let _guard = self.locks.acquire(expense_id).await;
        let mut expense = self.load_expense(expense_id).await?;

        if expense.employee_id != employee.id {
            return Err(ApprovalError::validation(format!(
                "User {} did not submit expense {expense_id}",
                employee.id
            )));
        }

        let rules = self
            .get_applicable_rules(expense.company_id()?, expense.converted_amount)
            .await?;
        let plan = WorkflowInitiator::plan(&expense, &employee, &rules, Utc::now()).inspect_err(
            |e| warn!(expense_id = %expense_id, error = %e, "Approval flow not started"),
        )?;

        expense.status = plan.status;
        // A flow whose rules produced no requests settles immediately.
        StatusEvaluator::evaluate(&expense, &plan.requests, &rules).apply_to(&mut expense);
        self.store.save_workflow(&plan.requests, &expense).await?;

        info!(
            expense_id = %expense_id,
            status = %expense.status,
            rules = rules.len(),
            requests = plan.requests.len(),
            "Approval flow initiated"
        );
        Ok(ApprovalFlow {
            expense,
            requests: plan.requests,
        })
    }

    /// An approver's pending requests, newest first.
    pub async fn get_pending_approvals(
        &self,
        approver: &Reference<User>,
    ) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let approver_id = approver.resolve()?;
        let mut pending = self.store.list_pending_for_approver(approver_id).await?;
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    /// Records an approver's decision and re-evaluates the expense.
    ///
    /// The decided request and the re-evaluated expense are written together.
    ///
    /// # Returns
    /// * `Ok(ApprovalRequest)` - The decided request
    /// * `Err(ApprovalError::NotFound)` - No such request for this approver
    /// * `Err(ApprovalError::AlreadyProcessed)` - The request was decided before
    pub async fn process_approval(
        &self,
        request_id: ApprovalRequestId,
        approver_id: UserId,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let found = self.store.find_request(request_id).await?;
        let expense_id = DecisionRecorder::authorize(found, request_id, approver_id)?.expense_id;

        let _guard = self.locks.acquire(expense_id).await;

        // Re-read under the lock; a concurrent decision may have landed.
        let found = self.store.find_request(request_id).await?;
        let mut request = DecisionRecorder::authorize(found, request_id, approver_id)?;
        DecisionRecorder::apply(&mut request, decision, comments, Utc::now()).inspect_err(|e| {
            warn!(
                request_id = %request_id,
                approver_id = %approver_id,
                error = %e,
                "Decision refused"
            );
        })?;

        let mut expense = self.load_expense(expense_id).await?;
        let mut requests = self.store.list_requests_for_expense(expense_id).await?;
        if let Some(slot) = requests.iter_mut().find(|r| r.id == request_id) {
            slot.clone_from(&request);
        }

        let evaluation = self.evaluate_with(&expense, &requests).await?;
        evaluation.apply_to(&mut expense);
        self.store
            .save_workflow(std::slice::from_ref(&request), &expense)
            .await?;

        info!(
            expense_id = %expense_id,
            request_id = %request_id,
            approver_id = %approver_id,
            decision = %decision,
            status = %expense.status,
            step = expense.current_approval_step,
            "Approval decision recorded"
        );
        Ok(request)
    }

    /// Re-evaluates an expense and persists any change.
    ///
    /// Calling this again without new decisions changes nothing.
    pub async fn evaluate(
        &self,
        expense: &Reference<Expense>,
    ) -> Result<Evaluation, ApprovalError> {
        let expense_id = expense.resolve()?;
        let _guard = self.locks.acquire(expense_id).await;

        let mut expense = self.load_expense(expense_id).await?;
        let requests = self.store.list_requests_for_expense(expense_id).await?;
        let evaluation = self.evaluate_with(&expense, &requests).await?;

        if evaluation.apply_to(&mut expense) {
            self.store.save_workflow(&[], &expense).await?;
            info!(
                expense_id = %expense_id,
                status = %expense.status,
                step = expense.current_approval_step,
                "Expense status re-evaluated"
            );
        }
        Ok(evaluation)
    }

    /// Forces an expense to approved or rejected, bypassing the rules.
    ///
    /// Requests are left untouched.
    pub async fn override_approval(
        &self,
        expense: &Reference<Expense>,
        decision: Decision,
    ) -> Result<Expense, ApprovalError> {
        let expense_id = expense.resolve()?;
        let _guard = self.locks.acquire(expense_id).await;

        let mut expense = self.load_expense(expense_id).await?;
        let previous = expense.status;
        expense.status = decision.expense_status();
        self.store.save_expense(&expense).await?;

        info!(
            expense_id = %expense_id,
            from = %previous,
            status = %expense.status,
            "Approval overridden"
        );
        Ok(expense)
    }

    /// Loads an expense and its requests.
    pub async fn get_approval_flow(
        &self,
        expense: &Reference<Expense>,
    ) -> Result<ApprovalFlow, ApprovalError> {
        let expense_id = expense.resolve()?;
        let expense = self.load_expense(expense_id).await?;
        let requests = self.store.list_requests_for_expense(expense_id).await?;
        Ok(ApprovalFlow { expense, requests })
    }

    async fn evaluate_with(
        &self,
        expense: &Expense,
        requests: &[ApprovalRequest],
    ) -> Result<Evaluation, ApprovalError> {
        let rules = self
            .get_applicable_rules(expense.company_id()?, expense.converted_amount)
            .await?;
        let evaluation = StatusEvaluator::evaluate(expense, requests, &rules);
        debug!(
            expense_id = %expense.id,
            outcome = ?evaluation.outcome,
            "Evaluated expense"
        );
        Ok(evaluation)
    }

    async fn load_expense(&self, id: ExpenseId) -> Result<Expense, ApprovalError> {
        self.store
            .find_expense(id)
            .await?
            .ok_or_else(|| ApprovalError::not_found(ExpenseId::KIND, id))
    }

    async fn resolve_user(&self, user: &Reference<User>) -> Result<User, ApprovalError> {
        if let Some(record) = user.record() {
            return Ok(record.clone());
        }
        let id = user.resolve()?;
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ApprovalError::not_found(UserId::KIND, id))
    }
}
