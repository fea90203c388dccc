//! Integration tests for the PostgreSQL approval store.
//!
//! These tests need a PostgreSQL database. Set `DATABASE_URL` (or
//! `OUTLAY__DATABASE__URL`); without one every test returns early.
//!
//! These tests verify that:
//! - Rules, requests and expenses survive a round trip through the schema
//! - The approval service runs end to end on top of the store
//! - Concurrent decisions on one expense persist every decision

#![allow(clippy::items_after_statements)]

use std::env;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::sync::OnceCell;

use outlay_core::workflow::{
    ApprovalError, ApprovalRequestStore, ApprovalRuleInput, ApprovalService, Company, Decision,
    Expense, ExpenseStatus, ExpenseStore, RequestStatus, RuleApprover, RuleKind, RuleStore, User,
    UserDirectory, UserRole,
};
use outlay_db::SeaOrmApprovalStore;
use outlay_db::migration::Migrator;
use outlay_shared::Reference;
use outlay_shared::types::{CompanyId, ExpenseId, UserId};

static MIGRATED: OnceCell<()> = OnceCell::const_new();

fn database_url() -> Option<String> {
    env::var("DATABASE_URL")
        .or_else(|_| env::var("OUTLAY__DATABASE__URL"))
        .ok()
}

async fn connect() -> Option<DatabaseConnection> {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let db = Database::connect(&url)
        .await
        .expect("Failed to connect to database");

    MIGRATED
        .get_or_init(|| async {
            Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
        })
        .await;

    Some(db)
}

struct Fixture {
    store: Arc<SeaOrmApprovalStore>,
    service: ApprovalService<SeaOrmApprovalStore>,
    company: Company,
}

impl Fixture {
    async fn new(db: DatabaseConnection) -> Self {
        let store = Arc::new(SeaOrmApprovalStore::new(db));
        let company = Company {
            id: CompanyId::new(),
            name: "Acme Corp".to_string(),
            currency: "USD".to_string(),
        };
        store.insert_company(&company).await.unwrap();

        Self {
            service: ApprovalService::new(Arc::clone(&store)),
            store,
            company,
        }
    }

    async fn user(&self, name: &str, manager_id: Option<UserId>) -> User {
        let user = User {
            id: UserId::new(),
            company_id: self.company.id,
            name: name.to_string(),
            role: if manager_id.is_some() {
                UserRole::Employee
            } else {
                UserRole::Manager
            },
            manager_id,
            is_manager_approver: manager_id.is_some(),
            is_active: true,
        };
        self.store.insert_user(&user).await.unwrap();
        user
    }

    async fn submit(&self, employee: &User, amount: rust_decimal::Decimal) -> Expense {
        let expense = Expense {
            id: ExpenseId::new(),
            company: Reference::from_id(self.company.id),
            employee_id: employee.id,
            converted_amount: amount,
            status: ExpenseStatus::Pending,
            current_approval_step: 0,
        };
        self.store.save_expense(&expense).await.unwrap();
        expense
    }

    fn company_ref(&self) -> Reference<Company> {
        Reference::from_id(self.company.id)
    }
}

fn approvers_at(users: &[&User], step: u32) -> Vec<RuleApprover> {
    users
        .iter()
        .map(|u| RuleApprover { user_id: u.id, step })
        .collect()
}

#[tokio::test]
async fn test_rule_round_trip() {
    let Some(db) = connect().await else { return };
    let fx = Fixture::new(db).await;
    let cfo = fx.user("CFO", None).await;
    let lead = fx.user("Lead", None).await;

    let created = fx
        .service
        .create_approval_rule(
            &fx.company_ref(),
            ApprovalRuleInput {
                name: "Large spend".to_string(),
                kind: RuleKind::Hybrid {
                    approval_percentage: dec!(66.67),
                    specific_approver_id: cfo.id,
                },
                approvers: approvers_at(&[&cfo, &lead], 1),
                min_amount: Some(dec!(1000)),
                max_amount: Some(dec!(50000.5)),
                is_active: None,
            },
        )
        .await
        .unwrap();

    let loaded = fx.store.find_rule(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.kind, created.kind);
    assert_eq!(loaded.approvers, created.approvers);
    assert_eq!(loaded.min_amount, Some(dec!(1000)));
    assert_eq!(loaded.max_amount, Some(dec!(50000.5)));
    assert!(loaded.is_active);

    let listed = fx.store.list_rules(fx.company.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
}

#[tokio::test]
async fn test_deactivated_rule_is_persisted() {
    let Some(db) = connect().await else { return };
    let fx = Fixture::new(db).await;
    let approver = fx.user("Approver", None).await;

    let input = ApprovalRuleInput {
        name: "Everything".to_string(),
        kind: RuleKind::Sequential,
        approvers: approvers_at(&[&approver], 1),
        min_amount: None,
        max_amount: None,
        is_active: None,
    };
    let rule = fx
        .service
        .create_approval_rule(&fx.company_ref(), input.clone())
        .await
        .unwrap();

    fx.service
        .update_approval_rule(
            rule.id,
            ApprovalRuleInput {
                is_active: Some(false),
                ..input
            },
        )
        .await
        .unwrap();

    assert!(!fx.store.find_rule(rule.id).await.unwrap().unwrap().is_active);
    assert!(
        fx.service
            .get_approval_rules(&fx.company_ref())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_user_lookup() {
    let Some(db) = connect().await else { return };
    let fx = Fixture::new(db).await;
    let manager = fx.user("Manager", None).await;
    let employee = fx.user("Employee", Some(manager.id)).await;

    let found = fx.store.find_user(employee.id).await.unwrap().unwrap();
    assert_eq!(found, employee);
    assert!(fx.store.find_user(UserId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sequential_flow_end_to_end() {
    let Some(db) = connect().await else { return };
    let fx = Fixture::new(db).await;
    let manager = fx.user("Manager", None).await;
    let employee = fx.user("Employee", Some(manager.id)).await;
    let finance = fx.user("Finance", None).await;

    fx.service
        .create_approval_rule(
            &fx.company_ref(),
            ApprovalRuleInput {
                name: "Finance review".to_string(),
                kind: RuleKind::Sequential,
                approvers: approvers_at(&[&finance], 1),
                min_amount: None,
                max_amount: None,
                is_active: None,
            },
        )
        .await
        .unwrap();

    let expense = fx.submit(&employee, dec!(250)).await;
    let flow = fx
        .service
        .initiate_approval_flow(&Reference::from(expense.clone()), &Reference::from_id(employee.id))
        .await
        .unwrap();
    assert_eq!(flow.expense.status, ExpenseStatus::InProgress);
    assert_eq!(flow.requests.len(), 2);

    // Manager pre-step first, then finance.
    let pending = fx
        .service
        .get_pending_approvals(&Reference::from_id(manager.id))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].step, 0);

    fx.service
        .process_approval(pending[0].id, manager.id, Decision::Approved, None)
        .await
        .unwrap();
    let stored = fx.store.find_expense(expense.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExpenseStatus::InProgress);
    assert_eq!(stored.current_approval_step, 1);

    let finance_request = fx
        .service
        .get_pending_approvals(&Reference::from_id(finance.id))
        .await
        .unwrap()
        .remove(0);
    let decided = fx
        .service
        .process_approval(
            finance_request.id,
            finance.id,
            Decision::Approved,
            Some("Receipts attached".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);
    assert!(decided.processed_at.is_some());

    let flow = fx
        .service
        .get_approval_flow(&Reference::from_id(expense.id))
        .await
        .unwrap();
    assert_eq!(flow.expense.status, ExpenseStatus::Approved);
    assert!(flow.requests.iter().all(|r| r.status == RequestStatus::Approved));
    assert_eq!(
        flow.requests
            .iter()
            .find(|r| r.id == finance_request.id)
            .and_then(|r| r.comments.as_deref()),
        Some("Receipts attached")
    );

    let again = fx
        .service
        .process_approval(finance_request.id, finance.id, Decision::Rejected, None)
        .await;
    assert!(matches!(again, Err(ApprovalError::AlreadyProcessed(_))));
}

#[tokio::test]
async fn test_rejection_and_override_persist() {
    let Some(db) = connect().await else { return };
    let fx = Fixture::new(db).await;
    let manager = fx.user("Manager", None).await;
    let employee = fx.user("Employee", Some(manager.id)).await;

    let rejected = fx.submit(&employee, dec!(80)).await;
    let flow = fx
        .service
        .initiate_approval_flow(&Reference::from_id(rejected.id), &Reference::from_id(employee.id))
        .await
        .unwrap();
    fx.service
        .process_approval(flow.requests[0].id, manager.id, Decision::Rejected, None)
        .await
        .unwrap();
    let stored = fx.store.find_expense(rejected.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExpenseStatus::Rejected);

    let overridden = fx.submit(&employee, dec!(90)).await;
    fx.service
        .initiate_approval_flow(&Reference::from_id(overridden.id), &Reference::from_id(employee.id))
        .await
        .unwrap();
    fx.service
        .override_approval(&Reference::from_id(overridden.id), Decision::Approved)
        .await
        .unwrap();
    let stored = fx.store.find_expense(overridden.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExpenseStatus::Approved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_percentage_decisions() {
    let Some(db) = connect().await else { return };
    let fx = Arc::new(Fixture::new(db).await);
    let employee = fx.user("Employee", None).await;

    let mut approvers = Vec::new();
    for i in 0..4 {
        approvers.push(fx.user(&format!("Approver {i}"), None).await);
    }
    let refs: Vec<&User> = approvers.iter().collect();

    fx.service
        .create_approval_rule(
            &fx.company_ref(),
            ApprovalRuleInput {
                name: "Committee".to_string(),
                kind: RuleKind::Percentage {
                    approval_percentage: dec!(100),
                },
                approvers: approvers_at(&refs, 1),
                min_amount: None,
                max_amount: None,
                is_active: None,
            },
        )
        .await
        .unwrap();

    let expense = fx.submit(&employee, dec!(5000)).await;
    let flow = fx
        .service
        .initiate_approval_flow(&Reference::from_id(expense.id), &Reference::from_id(employee.id))
        .await
        .unwrap();
    assert_eq!(flow.requests.len(), 4);

    let tasks = flow.requests.iter().map(|request| {
        let fx = Arc::clone(&fx);
        let (id, approver) = (request.id, request.approver_id);
        tokio::spawn(async move {
            fx.service
                .process_approval(id, approver, Decision::Approved, None)
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    // Every decision landed, so the full threshold was reached.
    let requests = fx.store.list_requests_for_expense(expense.id).await.unwrap();
    assert!(requests.iter().all(|r| r.status == RequestStatus::Approved));
    let stored = fx.store.find_expense(expense.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExpenseStatus::Approved);
}
