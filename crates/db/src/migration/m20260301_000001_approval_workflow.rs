//! Approval workflow migration.
//!
//! Creates companies, users and expenses as the workflow sees them, plus
//! approval rules and approval requests.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: COLLABORATOR TABLES
        // ============================================================
        db.execute_unprepared(COMPANIES_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;
        db.execute_unprepared(EXPENSES_SQL).await?;

        // ============================================================
        // PART 2: APPROVAL WORKFLOW
        // ============================================================
        db.execute_unprepared(APPROVAL_RULES_SQL).await?;
        db.execute_unprepared(APPROVAL_REQUESTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS approval_requests, approval_rules, expenses, users, companies CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const COMPANIES_SQL: &str = r"
CREATE TABLE companies (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    role VARCHAR(20) NOT NULL CHECK (role IN ('admin', 'manager', 'employee')),
    manager_id UUID REFERENCES users(id) ON DELETE SET NULL,
    is_manager_approver BOOLEAN NOT NULL DEFAULT false,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_users_company ON users(company_id);
";

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    employee_id UUID NOT NULL REFERENCES users(id),
    converted_amount NUMERIC(19, 4) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'in_progress', 'approved', 'rejected')),
    current_approval_step INTEGER NOT NULL DEFAULT 0 CHECK (current_approval_step >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_expenses_company ON expenses(company_id, status);
";

const APPROVAL_RULES_SQL: &str = r"
CREATE TABLE approval_rules (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    rule_type VARCHAR(32) NOT NULL
        CHECK (rule_type IN ('sequential', 'percentage', 'specific_approver', 'hybrid')),
    approvers JSONB NOT NULL DEFAULT '[]'::jsonb,
    approval_percentage NUMERIC(5, 2)
        CHECK (approval_percentage > 0 AND approval_percentage <= 100),
    specific_approver_id UUID REFERENCES users(id),
    min_amount NUMERIC(19, 4),
    max_amount NUMERIC(19, 4),
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_range CHECK (max_amount IS NULL OR min_amount IS NULL OR max_amount >= min_amount),
    CONSTRAINT chk_percentage_param CHECK (
        rule_type NOT IN ('percentage', 'hybrid') OR approval_percentage IS NOT NULL
    ),
    CONSTRAINT chk_specific_approver_param CHECK (
        rule_type NOT IN ('specific_approver', 'hybrid') OR specific_approver_id IS NOT NULL
    )
);

CREATE INDEX idx_approval_rules_company ON approval_rules(company_id, created_at) WHERE is_active = true;
";

const APPROVAL_REQUESTS_SQL: &str = r"
CREATE TABLE approval_requests (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    approver_id UUID NOT NULL REFERENCES users(id),
    step INTEGER NOT NULL CHECK (step >= 0),
    status VARCHAR(20) NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected')),
    comments TEXT,
    processed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_processed_at CHECK ((status = 'pending') = (processed_at IS NULL))
);

-- All requests of an expense (evaluation)
CREATE INDEX idx_approval_requests_expense ON approval_requests(expense_id, created_at);

-- Approver inbox
CREATE INDEX idx_approval_requests_inbox ON approval_requests(approver_id, created_at DESC)
    WHERE status = 'pending';
";
