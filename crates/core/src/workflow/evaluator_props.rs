//! Property-based tests for StatusEvaluator.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use outlay_shared::Reference;
use outlay_shared::types::{ApprovalRuleId, CompanyId, ExpenseId, UserId};

use crate::workflow::evaluator::{EvaluationOutcome, StatusEvaluator};
use crate::workflow::types::{
    ApprovalRequest, ApprovalRule, Expense, ExpenseStatus, RequestStatus, RuleKind,
};

/// Strategy for request statuses.
fn arb_request_status() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Pending),
        Just(RequestStatus::Approved),
        Just(RequestStatus::Rejected),
    ]
}

/// Strategy for percentage thresholds with two decimal places in (0, 100].
fn arb_percentage() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Strategy for any rule kind.
fn arb_rule_kind() -> impl Strategy<Value = RuleKind> {
    prop_oneof![
        Just(RuleKind::Sequential),
        arb_percentage().prop_map(|approval_percentage| RuleKind::Percentage {
            approval_percentage
        }),
        Just(RuleKind::SpecificApprover {
            specific_approver_id: UserId::new()
        }),
        arb_percentage().prop_map(|approval_percentage| RuleKind::Hybrid {
            approval_percentage,
            specific_approver_id: UserId::new(),
        }),
    ]
}

fn in_progress() -> Expense {
    Expense {
        id: ExpenseId::new(),
        company: Reference::from_id(CompanyId::new()),
        employee_id: UserId::new(),
        converted_amount: Decimal::ONE_HUNDRED,
        status: ExpenseStatus::InProgress,
        current_approval_step: 0,
    }
}

fn rule(kind: RuleKind) -> ApprovalRule {
    let now = Utc::now();
    ApprovalRule {
        id: ApprovalRuleId::new(),
        company_id: CompanyId::new(),
        name: kind.as_str().to_string(),
        kind,
        approvers: vec![],
        min_amount: None,
        max_amount: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn requests(expense: &Expense, specs: &[(u32, RequestStatus)]) -> Vec<ApprovalRequest> {
    specs
        .iter()
        .map(|(step, status)| {
            let mut req = ApprovalRequest::pending(expense.id, UserId::new(), *step, Utc::now());
            req.status = *status;
            req
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Percentage Threshold
    // =========================================================================

    /// k of n approvals approve iff k * 100 >= p * n
    #[test]
    fn prop_percentage_threshold(
        total in 1usize..12,
        approved_seed in any::<usize>(),
        threshold in arb_percentage(),
    ) {
        let approved = approved_seed % (total + 1);
        let expense = in_progress();
        let specs: Vec<_> = (0..total)
            .map(|i| (1, if i < approved { RequestStatus::Approved } else { RequestStatus::Pending }))
            .collect();
        let reqs = requests(&expense, &specs);
        let rules = vec![rule(RuleKind::Percentage { approval_percentage: threshold })];

        let eval = StatusEvaluator::evaluate(&expense, &reqs, &rules);

        let reached = Decimal::from(approved) * Decimal::ONE_HUNDRED
            >= threshold * Decimal::from(total);
        let expected = if reached || approved == total {
            ExpenseStatus::Approved
        } else {
            ExpenseStatus::InProgress
        };
        prop_assert_eq!(eval.status, expected);
    }

    // =========================================================================
    // Property 2: Rejection Dominance
    // =========================================================================

    /// One rejection rejects the expense whatever else holds
    #[test]
    fn prop_any_rejection_rejects(
        specs in prop::collection::vec((0u32..4, arb_request_status()), 0..10),
        rejected_step in 0u32..4,
        kind in arb_rule_kind(),
    ) {
        let expense = in_progress();
        let mut reqs = requests(&expense, &specs);
        reqs.extend(requests(&expense, &[(rejected_step, RequestStatus::Rejected)]));

        let eval = StatusEvaluator::evaluate(&expense, &reqs, &[rule(kind)]);
        prop_assert_eq!(eval.status, ExpenseStatus::Rejected);
        prop_assert_eq!(eval.outcome, EvaluationOutcome::Rejected);
    }

    /// Terminal expenses never move
    #[test]
    fn prop_terminal_is_sticky(
        specs in prop::collection::vec((0u32..4, arb_request_status()), 0..10),
        approved in any::<bool>(),
        kind in arb_rule_kind(),
    ) {
        let mut expense = in_progress();
        expense.status = if approved { ExpenseStatus::Approved } else { ExpenseStatus::Rejected };
        let reqs = requests(&expense, &specs);

        let eval = StatusEvaluator::evaluate(&expense, &reqs, &[rule(kind)]);
        prop_assert_eq!(eval.status, expense.status);
        prop_assert!(!eval.apply_to(&mut expense.clone()));
    }

    // =========================================================================
    // Property 3: Idempotence
    // =========================================================================

    /// Evaluating twice without new decisions changes nothing the second time
    #[test]
    fn prop_evaluate_is_idempotent(
        specs in prop::collection::vec((0u32..5, arb_request_status()), 0..12),
        kind in arb_rule_kind(),
        start_step in 0u32..3,
    ) {
        let mut expense = in_progress();
        expense.current_approval_step = start_step;
        let reqs = requests(&expense, &specs);
        let rules = vec![rule(kind)];

        let first = StatusEvaluator::evaluate(&expense, &reqs, &rules);
        first.apply_to(&mut expense);
        let second = StatusEvaluator::evaluate(&expense, &reqs, &rules);

        prop_assert!(!second.apply_to(&mut expense));
    }

    // =========================================================================
    // Property 4: Sequential Progression
    // =========================================================================

    /// Approving steps 1..=n in order walks the active step up, then approves
    #[test]
    fn prop_sequential_steps_in_order(steps in 1u32..8) {
        let mut expense = in_progress();
        let specs: Vec<_> = (1..=steps).map(|s| (s, RequestStatus::Pending)).collect();
        let mut reqs = requests(&expense, &specs);
        let rules = vec![rule(RuleKind::Sequential)];

        for (i, step) in (1..=steps).enumerate() {
            prop_assert_eq!(expense.status, ExpenseStatus::InProgress);
            reqs[i].status = RequestStatus::Approved;
            StatusEvaluator::evaluate(&expense, &reqs, &rules).apply_to(&mut expense);

            if step < steps {
                prop_assert_eq!(expense.status, ExpenseStatus::InProgress);
                prop_assert_eq!(expense.current_approval_step, step + 1);
            }
        }
        prop_assert_eq!(expense.status, ExpenseStatus::Approved);
    }

    /// A pending request at the active step blocks later approved steps
    #[test]
    fn prop_pending_active_step_blocks(later in prop::collection::vec(2u32..6, 0..5)) {
        let expense = in_progress();
        let mut specs = vec![(1, RequestStatus::Pending)];
        specs.extend(later.iter().map(|s| (*s, RequestStatus::Approved)));
        let reqs = requests(&expense, &specs);

        let eval = StatusEvaluator::evaluate(&expense, &reqs, &[rule(RuleKind::Sequential)]);
        prop_assert_eq!(eval.status, ExpenseStatus::InProgress);
        prop_assert_eq!(eval.current_approval_step, 0);
    }
}
