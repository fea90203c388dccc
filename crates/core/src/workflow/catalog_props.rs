//! Property-based tests for RuleCatalog.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use outlay_shared::types::{ApprovalRuleId, CompanyId};

use crate::workflow::catalog::RuleCatalog;
use crate::workflow::types::{ApprovalRule, RuleKind};

/// Strategy for amounts with two decimal places, negatives included.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..100_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Strategy for an optional bound.
fn arb_bound() -> impl Strategy<Value = Option<Decimal>> {
    prop_oneof![Just(None), arb_amount().prop_map(Some)]
}

/// Strategy for rules with arbitrary bounds, activity and age.
fn arb_rule() -> impl Strategy<Value = ApprovalRule> {
    (arb_bound(), arb_bound(), any::<bool>(), 0i64..10_000).prop_map(
        |(min_amount, max_amount, is_active, age)| {
            let created_at = Utc::now() - Duration::seconds(age);
            ApprovalRule {
                id: ApprovalRuleId::new(),
                company_id: CompanyId::new(),
                name: format!("Rule {age}"),
                kind: RuleKind::Sequential,
                approvers: vec![],
                min_amount,
                max_amount,
                is_active,
                created_at,
                updated_at: created_at,
            }
        },
    )
}

fn within(rule: &ApprovalRule, amount: Decimal) -> bool {
    rule.min_amount.is_none_or(|min| min <= amount)
        && rule.max_amount.is_none_or(|max| amount <= max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Applicability
    // =========================================================================

    /// A rule is applicable iff active and the amount is within its bounds
    #[test]
    fn prop_applicable_iff_active_and_in_range(
        rules in prop::collection::vec(arb_rule(), 0..12),
        amount in arb_amount(),
    ) {
        let applicable = RuleCatalog::applicable_rules(&rules, amount);

        for rule in &rules {
            let expected = rule.is_active && within(rule, amount);
            let selected = applicable.iter().any(|r| r.id == rule.id);
            prop_assert_eq!(selected, expected, "rule {:?} amount {}", rule, amount);
        }
        prop_assert!(applicable.len() <= rules.len());
    }

    /// Unbounded active rules apply to every amount
    #[test]
    fn prop_unbounded_rule_always_applies(amount in arb_amount()) {
        prop_assert_eq!(RuleCatalog::applicable_rules(&[catch_all_rule()], amount).len(), 1);
    }

    // =========================================================================
    // Property 2: Ordering
    // =========================================================================

    /// Applicable rules are sorted by minimum amount, then creation time
    #[test]
    fn prop_applicable_rules_are_ordered(
        rules in prop::collection::vec(arb_rule(), 0..12),
        amount in arb_amount(),
    ) {
        let applicable = RuleCatalog::applicable_rules(&rules, amount);
        for pair in applicable.windows(2) {
            let key = |r: &ApprovalRule| (r.min_amount, r.created_at);
            prop_assert!(key(&pair[0]) <= key(&pair[1]));
        }
    }
}

fn catch_all_rule() -> ApprovalRule {
    let now = Utc::now();
    ApprovalRule {
        id: ApprovalRuleId::new(),
        company_id: CompanyId::new(),
        name: "Catch-all".to_string(),
        kind: RuleKind::Sequential,
        approvers: vec![],
        min_amount: None,
        max_amount: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
