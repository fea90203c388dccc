//! Demo data seeder for Outlay development.
//!
//! Seeds one company with a small org chart and two approval rules, then
//! walks a sample expense through the first step of its approval flow so
//! the pending queues are not empty.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use outlay_core::workflow::{
    ApprovalRuleInput, ApprovalService, Company, Decision, Expense, ExpenseStatus, ExpenseStore,
    RuleApprover, RuleKind, User, UserDirectory, UserRole,
};
use outlay_db::SeaOrmApprovalStore;
use outlay_shared::config::LoggingConfig;
use outlay_shared::types::{CompanyId, ExpenseId, UserId};
use outlay_shared::{AppConfig, Reference};

const DEMO_COMPANY: CompanyId = CompanyId::from_uuid(Uuid::from_u128(0x1));
const ADMIN: UserId = UserId::from_uuid(Uuid::from_u128(0x10));
const MANAGER: UserId = UserId::from_uuid(Uuid::from_u128(0x11));
const EMPLOYEE: UserId = UserId::from_uuid(Uuid::from_u128(0x12));
const FINANCE: UserId = UserId::from_uuid(Uuid::from_u128(0x13));
const DIRECTOR: UserId = UserId::from_uuid(Uuid::from_u128(0x14));
const CFO: UserId = UserId::from_uuid(Uuid::from_u128(0x15));
const SAMPLE_EXPENSE: ExpenseId = ExpenseId::from_uuid(Uuid::from_u128(0x100));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let db = outlay_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let store = Arc::new(SeaOrmApprovalStore::new(db));
    if store.find_user(ADMIN).await?.is_some() {
        info!("Demo data already present, skipping");
        return Ok(());
    }

    seed_directory(&store).await?;

    let service = ApprovalService::new(Arc::clone(&store));
    seed_rules(&service).await?;
    seed_sample_expense(&service).await?;

    info!("Seeding complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.filter.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Seeds the demo company and its users.
async fn seed_directory(store: &SeaOrmApprovalStore) -> anyhow::Result<()> {
    store
        .insert_company(&Company {
            id: DEMO_COMPANY,
            name: "Outlay Demo Co".to_string(),
            currency: "USD".to_string(),
        })
        .await?;

    let people = [
        (ADMIN, "Ada Admin", UserRole::Admin, None, false),
        (MANAGER, "Max Manager", UserRole::Manager, None, false),
        (EMPLOYEE, "Eve Employee", UserRole::Employee, Some(MANAGER), true),
        (FINANCE, "Fin Reviewer", UserRole::Manager, None, false),
        (DIRECTOR, "Dee Director", UserRole::Manager, None, false),
        (CFO, "Cy CFO", UserRole::Manager, None, false),
    ];
    for (id, name, role, manager_id, is_manager_approver) in people {
        store
            .insert_user(&User {
                id,
                company_id: DEMO_COMPANY,
                name: name.to_string(),
                role,
                manager_id,
                is_manager_approver,
                is_active: true,
            })
            .await?;
        info!(user_id = %id, role = role.as_str(), "Seeded user {name}");
    }
    Ok(())
}

/// Seeds a sequential rule for small expenses and a hybrid rule above it.
async fn seed_rules(service: &ApprovalService<SeaOrmApprovalStore>) -> anyhow::Result<()> {
    let company = Reference::from_id(DEMO_COMPANY);

    let small = service
        .create_approval_rule(
            &company,
            ApprovalRuleInput {
                name: "Everyday spend".to_string(),
                kind: RuleKind::Sequential,
                approvers: vec![RuleApprover {
                    user_id: FINANCE,
                    step: 1,
                }],
                min_amount: None,
                max_amount: Some(dec!(999.99)),
                is_active: None,
            },
        )
        .await?;
    info!(rule_id = %small.id, "Seeded rule {}", small.name);

    let large = service
        .create_approval_rule(
            &company,
            ApprovalRuleInput {
                name: "Large spend".to_string(),
                kind: RuleKind::Hybrid {
                    approval_percentage: dec!(60),
                    specific_approver_id: CFO,
                },
                approvers: [FINANCE, DIRECTOR, CFO]
                    .into_iter()
                    .map(|user_id| RuleApprover { user_id, step: 1 })
                    .collect(),
                min_amount: Some(dec!(1000)),
                max_amount: None,
                is_active: None,
            },
        )
        .await?;
    info!(rule_id = %large.id, "Seeded rule {}", large.name);
    Ok(())
}

/// Submits a sample expense and approves its manager pre-step.
async fn seed_sample_expense(service: &ApprovalService<SeaOrmApprovalStore>) -> anyhow::Result<()> {
    let expense = Expense {
        id: SAMPLE_EXPENSE,
        company: Reference::from_id(DEMO_COMPANY),
        employee_id: EMPLOYEE,
        converted_amount: dec!(420.00),
        status: ExpenseStatus::Pending,
        current_approval_step: 0,
    };
    service.store().save_expense(&expense).await?;

    let flow = service
        .initiate_approval_flow(&Reference::from(expense), &Reference::from_id(EMPLOYEE))
        .await?;

    let manager_request = flow
        .requests
        .iter()
        .find(|r| r.approver_id == MANAGER)
        .context("Sample expense has no manager request")?;
    service
        .process_approval(
            manager_request.id,
            MANAGER,
            Decision::Approved,
            Some("Looks fine, over to finance".to_string()),
        )
        .await?;

    let flow = service
        .get_approval_flow(&Reference::from_id(SAMPLE_EXPENSE))
        .await?;
    info!(
        expense_id = %SAMPLE_EXPENSE,
        status = %flow.expense.status,
        step = flow.expense.current_approval_step,
        "Sample expense waiting on finance"
    );
    Ok(())
}
