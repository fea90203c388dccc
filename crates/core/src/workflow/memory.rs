//! In-memory store for tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use outlay_shared::types::{ApprovalRequestId, ApprovalRuleId, CompanyId, ExpenseId, UserId};
use tokio::sync::RwLock;

use crate::workflow::store::{
    ApprovalRequestStore, ExpenseStore, RuleStore, StoreError, UserDirectory,
};
use crate::workflow::types::{ApprovalRequest, ApprovalRule, Expense, User};

#[derive(Debug, Default)]
struct Tables {
    rules: Vec<ApprovalRule>,
    requests: Vec<ApprovalRequest>,
    expenses: HashMap<ExpenseId, Expense>,
    users: HashMap<UserId, User>,
}

/// Store backed by process memory.
///
/// All tables sit behind one lock, so [`ApprovalRequestStore::save_workflow`]
/// is atomic with respect to every other call.
#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    tables: RwLock<Tables>,
}

impl InMemoryApprovalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user in the directory.
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Every request in the store, in creation order.
    pub async fn all_requests(&self) -> Vec<ApprovalRequest> {
        self.tables.read().await.requests.clone()
    }
}

#[async_trait]
impl RuleStore for InMemoryApprovalStore {
    async fn insert_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        self.tables.write().await.rules.push(rule.clone());
        Ok(())
    }

    async fn update_rule(&self, rule: &ApprovalRule) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.rules.iter_mut().find(|r| r.id == rule.id) else {
            return Err(StoreError::Database(format!(
                "approval rule {} does not exist",
                rule.id
            )));
        };
        *slot = rule.clone();
        Ok(())
    }

    async fn find_rule(&self, id: ApprovalRuleId) -> Result<Option<ApprovalRule>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.rules.iter().find(|r| r.id == id).cloned())
    }

    async fn list_rules(&self, company_id: CompanyId) -> Result<Vec<ApprovalRule>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rules
            .iter()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ApprovalRequestStore for InMemoryApprovalStore {
    async fn find_request(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_requests_for_expense(
        &self,
        expense_id: ExpenseId,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .filter(|r| r.expense_id == expense_id)
            .cloned()
            .collect())
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<ApprovalRequest>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .filter(|r| r.approver_id == approver_id && r.is_pending())
            .cloned()
            .collect())
    }

    async fn save_workflow(
        &self,
        requests: &[ApprovalRequest],
        expense: &Expense,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for request in requests {
            match tables.requests.iter_mut().find(|r| r.id == request.id) {
                Some(existing) => *existing = request.clone(),
                None => tables.requests.push(request.clone()),
            }
        }
        tables.expenses.insert(expense.id, expense.clone());
        Ok(())
    }
}

#[async_trait]
impl ExpenseStore for InMemoryApprovalStore {
    async fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError> {
        Ok(self.tables.read().await.expenses.get(&id).cloned())
    }

    async fn save_expense(&self, expense: &Expense) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .expenses
            .insert(expense.id, expense.clone());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryApprovalStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }
}
