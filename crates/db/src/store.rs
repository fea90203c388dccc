//! PostgreSQL approval store.
//!
//! Implements the workflow store traits over `SeaORM`. Workflow writes run
//! inside one database transaction so a decision and the re-evaluated
//! expense land together or not at all.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use outlay_core::workflow::{
    ApprovalRequest, ApprovalRequestStore, ApprovalRule, Company, Expense, ExpenseStatus,
    ExpenseStore, RequestStatus, RuleApprover, RuleKind, RuleStore, StoreError, User,
    UserDirectory, UserRole,
};
use outlay_shared::Reference;
use outlay_shared::types::{ApprovalRequestId, ApprovalRuleId, CompanyId, ExpenseId, UserId};

use crate::entities::{approval_requests, approval_rules, companies, expenses, users};

/// Workflow store backed by a `SeaORM` connection.
#[derive(Debug, Clone)]
pub struct SeaOrmApprovalStore {
    db: DatabaseConnection,
}

impl SeaOrmApprovalStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Inserts a company.
    pub async fn insert_company(&self, company: &Company) -> Result<(), StoreError> {
        companies::ActiveModel {
            id: Set(company.id.into_inner()),
            name: Set(company.name.clone()),
            currency: Set(company.currency.clone()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Inserts a user into the directory.
    pub async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        users::ActiveModel {
            id: Set(user.id.into_inner()),
            company_id: Set(user.company_id.into_inner()),
            name: Set(user.name.clone()),
            role: Set(user.role.as_str().to_string()),
            manager_id: Set(user.manager_id.map(UserId::into_inner)),
            is_manager_approver: Set(user.is_manager_approver),
            is_active: Set(user.is_active),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl RuleStore for SeaOrmApprovalStore {
    async fn insert_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        rule_to_active(rule)?
            .insert(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        rule_to_active(rule)?
            .update(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_rule(&self, id: ApprovalRuleId) -> Result<Option<ApprovalRule>, StoreError> {
        approval_rules::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(rule_from_model)
            .transpose()
    }

    async fn list_rules(&self, company_id: CompanyId) -> Result<Vec<ApprovalRule>, StoreError> {
        approval_rules::Entity::find()
            .filter(approval_rules::Column::CompanyId.eq(company_id.into_inner()))
            .order_by_asc(approval_rules::Column::CreatedAt)
            .order_by_asc(approval_rules::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(rule_from_model)
            .collect()
    }
}

#[async_trait]
impl ApprovalRequestStore for SeaOrmApprovalStore {
    async fn find_request(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        approval_requests::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(request_from_model)
            .transpose()
    }

    async fn list_requests_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        approval_requests::Entity::find()
            .filter(approval_requests::Column::ExpenseId.eq(expense_id.into_inner()))
            .order_by_asc(approval_requests::Column::CreatedAt)
            .order_by_asc(approval_requests::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(request_from_model)
            .collect()
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        approval_requests::Entity::find()
            .filter(approval_requests::Column::ApproverId.eq(approver_id.into_inner()))
            .filter(approval_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
            .order_by_desc(approval_requests::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(request_from_model)
            .collect()
    }

    async fn save_workflow(
        &self,
        requests: &[ApprovalRequest],
        expense: &Expense,
    ) -> Result<(), StoreError> {
        // Dropping an uncommitted transaction rolls it back.
        let txn = self.db.begin().await.map_err(db_err)?;

        upsert_expense(&txn, expense).await?;
        for request in requests {
            upsert_request(&txn, request).await?;
        }

        txn.commit().await.map_err(db_err)?;

        debug!(
            expense_id = %expense.id,
            requests = requests.len(),
            status = %expense.status,
            "Saved approval workflow"
        );
        Ok(())
    }
}

#[async_trait]
impl ExpenseStore for SeaOrmApprovalStore {
    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        expenses::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(expense_from_model)
            .transpose()
    }

    async fn save_expense(&self, expense: &Expense) -> Result<(), StoreError> {
        upsert_expense(&self.db, expense).await
    }
}

#[async_trait]
impl UserDirectory for SeaOrmApprovalStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(user_from_model)
            .transpose()
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn upsert_expense<C: ConnectionTrait>(conn: &C, expense: &Expense) -> Result<(), StoreError> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let step = step_to_db(expense.current_approval_step)?;

    let existing = expenses::Entity::find_by_id(expense.id.into_inner())
        .one(conn)
        .await
        .map_err(db_err)?;

    if let Some(existing) = existing {
        let mut active: expenses::ActiveModel = existing.into();
        active.status = Set(expense.status.as_str().to_string());
        active.current_approval_step = Set(step);
        active.updated_at = Set(now);
        active.update(conn).await.map_err(db_err)?;
    } else {
        let company_id = expense
            .company_id()
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        expenses::ActiveModel {
            id: Set(expense.id.into_inner()),
            company_id: Set(company_id.into_inner()),
            employee_id: Set(expense.employee_id.into_inner()),
            converted_amount: Set(expense.converted_amount),
            status: Set(expense.status.as_str().to_string()),
            current_approval_step: Set(step),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

async fn upsert_request<C: ConnectionTrait>(
    conn: &C,
    request: &ApprovalRequest,
) -> Result<(), StoreError> {
    let existing = approval_requests::Entity::find_by_id(request.id.into_inner())
        .one(conn)
        .await
        .map_err(db_err)?;

    if let Some(existing) = existing {
        // Only the decision fields ever change.
        let mut active: approval_requests::ActiveModel = existing.into();
        active.status = Set(request.status.as_str().to_string());
        active.comments = Set(request.comments.clone());
        active.processed_at = Set(request.processed_at.map(Into::into));
        active.update(conn).await.map_err(db_err)?;
    } else {
        approval_requests::ActiveModel {
            id: Set(request.id.into_inner()),
            expense_id: Set(request.expense_id.into_inner()),
            approver_id: Set(request.approver_id.into_inner()),
            step: Set(step_to_db(request.step)?),
            status: Set(request.status.as_str().to_string()),
            comments: Set(request.comments.clone()),
            processed_at: Set(request.processed_at.map(Into::into)),
            created_at: Set(request.created_at.into()),
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

// ============================================================================
// Conversions
// ============================================================================

fn db_err(e: DbErr) -> StoreError {
    StoreError::Database(e.to_string())
}

fn step_to_db(step: u32) -> Result<i32, StoreError> {
    i32::try_from(step).map_err(|_| StoreError::Decode(format!("step {step} is out of range")))
}

fn step_from_db(step: i32) -> Result<u32, StoreError> {
    u32::try_from(step).map_err(|_| StoreError::Decode(format!("negative step {step}")))
}

fn rule_to_active(rule: &ApprovalRule) -> Result<approval_rules::ActiveModel, StoreError> {
    let approvers = serde_json::to_value(&rule.approvers)
        .map_err(|e| StoreError::Decode(format!("approval rule {}: {e}", rule.id)))?;

    Ok(approval_rules::ActiveModel {
        id: Set(rule.id.into_inner()),
        company_id: Set(rule.company_id.into_inner()),
        name: Set(rule.name.clone()),
        rule_type: Set(rule.kind.as_str().to_string()),
        approvers: Set(approvers),
        approval_percentage: Set(rule.kind.approval_percentage()),
        specific_approver_id: Set(rule.kind.specific_approver_id().map(UserId::into_inner)),
        min_amount: Set(rule.min_amount),
        max_amount: Set(rule.max_amount),
        is_active: Set(rule.is_active),
        created_at: Set(rule.created_at.into()),
        updated_at: Set(rule.updated_at.into()),
    })
}

fn rule_from_model(model: approval_rules::Model) -> Result<ApprovalRule, StoreError> {
    let kind = RuleKind::from_parts(
        &model.rule_type,
        model.approval_percentage,
        model.specific_approver_id.map(UserId::from_uuid),
    )
    .map_err(|e| StoreError::Decode(format!("approval rule {}: {e}", model.id)))?;

    let approvers: Vec<RuleApprover> = serde_json::from_value(model.approvers)
        .map_err(|e| StoreError::Decode(format!("approval rule {}: {e}", model.id)))?;

    Ok(ApprovalRule {
        id: ApprovalRuleId::from_uuid(model.id),
        company_id: CompanyId::from_uuid(model.company_id),
        name: model.name,
        kind,
        approvers,
        min_amount: model.min_amount,
        max_amount: model.max_amount,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn request_from_model(
    model: approval_requests::Model,
) -> Result<ApprovalRequest, StoreError> {
    let status = RequestStatus::parse(&model.status).ok_or_else(|| {
        StoreError::Decode(format!(
            "approval request {}: unknown status '{}'",
            model.id, model.status
        ))
    })?;

    Ok(ApprovalRequest {
        id: ApprovalRequestId::from_uuid(model.id),
        expense_id: ExpenseId::from_uuid(model.expense_id),
        approver_id: UserId::from_uuid(model.approver_id),
        step: step_from_db(model.step)?,
        status,
        comments: model.comments,
        processed_at: model.processed_at.map(|t| t.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn expense_from_model(model: expenses::Model) -> Result<Expense, StoreError> {
    let status = ExpenseStatus::parse(&model.status).ok_or_else(|| {
        StoreError::Decode(format!(
            "expense {}: unknown status '{}'",
            model.id, model.status
        ))
    })?;

    Ok(Expense {
        id: ExpenseId::from_uuid(model.id),
        company: Reference::from_id(CompanyId::from_uuid(model.company_id)),
        employee_id: UserId::from_uuid(model.employee_id),
        converted_amount: model.converted_amount,
        status,
        current_approval_step: step_from_db(model.current_approval_step)?,
    })
}

fn user_from_model(model: users::Model) -> Result<User, StoreError> {
    let role = UserRole::parse(&model.role).ok_or_else(|| {
        StoreError::Decode(format!("user {}: unknown role '{}'", model.id, model.role))
    })?;

    Ok(User {
        id: UserId::from_uuid(model.id),
        company_id: CompanyId::from_uuid(model.company_id),
        name: model.name,
        role,
        manager_id: model.manager_id.map(UserId::from_uuid),
        is_manager_approver: model.is_manager_approver,
        is_active: model.is_active,
    })
}
