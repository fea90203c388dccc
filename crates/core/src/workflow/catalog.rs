//! Approval rule catalog.
//!
//! This module implements amount-range rule matching, rule ordering and
//! validation of administrator rule input.

use std::collections::BTreeSet;

use outlay_shared::types::UserId;
use rust_decimal::Decimal;

use crate::workflow::error::ApprovalError;
use crate::workflow::types::{ApprovalRule, ApprovalRuleInput};

/// Stateless catalog for selecting and validating approval rules.
pub struct RuleCatalog;

impl RuleCatalog {
    /// Selects the rules that apply to an amount.
    ///
    /// A rule applies iff it is active and `min_amount <= amount <= max_amount`,
    /// an absent bound being unbounded on that side.
    ///
    /// # Returns
    /// The applicable rules ordered ascending by `min_amount` (absent first),
    /// ties broken by creation order.
    #[must_use]
    pub fn applicable_rules(rules: &[ApprovalRule], amount: Decimal) -> Vec<ApprovalRule> {
        let mut applicable: Vec<_> = rules
            .iter()
            .filter(|r| r.applies_to(amount))
            .cloned()
            .collect();

        Self::sort(&mut applicable);
        applicable
    }

    /// Selects the active rules, ordered like [`Self::applicable_rules`].
    #[must_use]
    pub fn active_rules(rules: &[ApprovalRule]) -> Vec<ApprovalRule> {
        let mut active: Vec<_> = rules.iter().filter(|r| r.is_active).cloned().collect();
        Self::sort(&mut active);
        active
    }

    /// Orders rules by lower bound, then creation time.
    ///
    /// `Option` orders `None` before any `Some`, which is exactly "absent
    /// minimum is minus infinity". The sort is stable, so rules created in
    /// the same instant keep store order.
    pub fn sort(rules: &mut [ApprovalRule]) {
        rules.sort_by(|a, b| {
            a.min_amount
                .cmp(&b.min_amount)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
    }

    /// Validates administrator input for a rule.
    ///
    /// # Returns
    /// * `Ok(())` if the input is well formed
    /// * `Err(ApprovalError::Validation)` describing the first problem found
    pub fn validate_input(input: &ApprovalRuleInput) -> Result<(), ApprovalError> {
        if input.name.trim().is_empty() {
            return Err(ApprovalError::validation("Rule name is required"));
        }

        if input.approvers.is_empty() {
            return Err(ApprovalError::validation("Rule needs at least one approver"));
        }

        if let Some(percentage) = input.kind.approval_percentage()
            && (percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED)
        {
            return Err(ApprovalError::validation(format!(
                "Approval percentage {percentage} must be greater than 0 and at most 100"
            )));
        }

        for (label, bound) in [("Minimum", input.min_amount), ("Maximum", input.max_amount)] {
            if let Some(value) = bound
                && value.is_sign_negative()
            {
                return Err(ApprovalError::validation(format!(
                    "{label} amount {value} must not be negative"
                )));
            }
        }

        if let (Some(min), Some(max)) = (input.min_amount, input.max_amount)
            && min > max
        {
            return Err(ApprovalError::validation(format!(
                "Minimum amount {min} exceeds maximum amount {max}"
            )));
        }

        Ok(())
    }

    /// Every user a rule references: its approvers and its specific approver.
    #[must_use]
    pub fn referenced_users(input: &ApprovalRuleInput) -> BTreeSet<UserId> {
        input
            .approvers
            .iter()
            .map(|a| a.user_id)
            .chain(input.kind.specific_approver_id())
            .collect()
    }
}
