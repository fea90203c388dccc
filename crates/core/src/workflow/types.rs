//! Workflow domain types for expense approval.
//!
//! This module defines the rule, request and expense records the engine
//! reasons about, plus the status enums of both state machines.

use chrono::{DateTime, Utc};
use outlay_shared::types::{
    ApprovalRequestId, ApprovalRuleId, CompanyId, ExpenseId, Identified, InvalidReference,
    Reference, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expense status in the approval workflow.
///
/// The valid transitions are:
/// - Pending → Approved (no rule applies, no manager approval)
/// - Pending → InProgress (approval requests created)
/// - InProgress → InProgress (sequential step cleared, more steps remain)
/// - InProgress → Approved (conditional approval or final step cleared)
/// - InProgress → Rejected (any rejection)
///
/// Approved and Rejected are terminal except for an admin override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    /// Submitted, approval flow not yet initiated.
    Pending,
    /// Awaiting approver decisions.
    InProgress,
    /// Approved (terminal).
    Approved,
    /// Rejected (terminal).
    Rejected,
}

impl ExpenseStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if normal decisions can no longer move the expense.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single approver's assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting the approver's decision.
    Pending,
    /// Approved by the approver.
    Approved,
    /// Rejected by the approver.
    Rejected,
}

impl RequestStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An approver's decision on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Approve the request.
    Approved,
    /// Reject the request.
    Rejected,
}

impl Decision {
    /// The request status this decision produces.
    #[must_use]
    pub fn request_status(self) -> RequestStatus {
        match self {
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
        }
    }

    /// The expense status an admin override with this decision forces.
    #[must_use]
    pub fn expense_status(self) -> ExpenseStatus {
        match self {
            Self::Approved => ExpenseStatus::Approved,
            Self::Rejected => ExpenseStatus::Rejected,
        }
    }

    /// Parses a decision from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request_status())
    }
}

/// User role within a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Configures rules and may override decisions.
    Admin,
    /// Manages employees and approves their expenses.
    Manager,
    /// Submits expenses.
    Employee,
}

impl UserRole {
    /// Parse a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "employee" => Some(Self::Employee),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }
}

/// Evaluation semantics of an approval rule.
///
/// The parameters each semantic needs live inside its variant, so a
/// percentage rule without a threshold cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Approvers clear in increasing step order.
    Sequential,
    /// Approved once the share of approved requests reaches the threshold.
    Percentage {
        /// Threshold in percent, `0 < p <= 100`.
        approval_percentage: Decimal,
    },
    /// Approved once the designated approver approves.
    SpecificApprover {
        /// The designated approver.
        specific_approver_id: UserId,
    },
    /// Approved by either the percentage or the specific-approver condition.
    Hybrid {
        /// Threshold in percent, `0 < p <= 100`.
        approval_percentage: Decimal,
        /// The designated approver.
        specific_approver_id: UserId,
    },
}

impl RuleKind {
    /// Returns the string representation of the rule type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Percentage { .. } => "percentage",
            Self::SpecificApprover { .. } => "specific_approver",
            Self::Hybrid { .. } => "hybrid",
        }
    }

    /// Rebuilds a rule type from its flattened storage columns.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the type name is unknown or
    /// a parameter the type requires is missing.
    pub fn from_parts(
        rule_type: &str,
        approval_percentage: Option<Decimal>,
        specific_approver_id: Option<UserId>,
    ) -> Result<Self, String> {
        let missing = |field: &str| format!("{rule_type} rule is missing {field}");
        match rule_type.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "percentage" => Ok(Self::Percentage {
                approval_percentage: approval_percentage
                    .ok_or_else(|| missing("approval_percentage"))?,
            }),
            "specific_approver" => Ok(Self::SpecificApprover {
                specific_approver_id: specific_approver_id
                    .ok_or_else(|| missing("specific_approver_id"))?,
            }),
            "hybrid" => Ok(Self::Hybrid {
                approval_percentage: approval_percentage
                    .ok_or_else(|| missing("approval_percentage"))?,
                specific_approver_id: specific_approver_id
                    .ok_or_else(|| missing("specific_approver_id"))?,
            }),
            other => Err(format!("unknown rule type '{other}'")),
        }
    }

    /// The percentage threshold, for percentage and hybrid rules.
    #[must_use]
    pub fn approval_percentage(&self) -> Option<Decimal> {
        match self {
            Self::Percentage {
                approval_percentage,
            }
            | Self::Hybrid {
                approval_percentage,
                ..
            } => Some(*approval_percentage),
            Self::Sequential | Self::SpecificApprover { .. } => None,
        }
    }

    /// The designated approver, for specific-approver and hybrid rules.
    #[must_use]
    pub fn specific_approver_id(&self) -> Option<UserId> {
        match self {
            Self::SpecificApprover {
                specific_approver_id,
            }
            | Self::Hybrid {
                specific_approver_id,
                ..
            } => Some(*specific_approver_id),
            Self::Sequential | Self::Percentage { .. } => None,
        }
    }

    /// Returns true for sequential rules.
    #[must_use]
    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::Sequential)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An approver assignment declared by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApprover {
    /// The approving user.
    pub user_id: UserId,
    /// Step the approver acts at (sequential rules only).
    pub step: u32,
}

/// A company-scoped approval policy for an amount range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Unique identifier for the rule.
    pub id: ApprovalRuleId,
    /// Owning company.
    pub company_id: CompanyId,
    /// Human-readable name for the rule.
    pub name: String,
    /// Evaluation semantics.
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Ordered approver assignments.
    pub approvers: Vec<RuleApprover>,
    /// Minimum amount for this rule to apply (inclusive, None = no minimum).
    pub min_amount: Option<Decimal>,
    /// Maximum amount for this rule to apply (inclusive, None = no maximum).
    pub max_amount: Option<Decimal>,
    /// Inactive rules never apply; rules are deactivated, never deleted.
    pub is_active: bool,
    /// Creation time, the tie-breaker for rule ordering.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRule {
    /// Returns true if the rule is active and its bounds contain `amount`.
    #[must_use]
    pub fn applies_to(&self, amount: Decimal) -> bool {
        let above_min = self.min_amount.is_none_or(|min| amount >= min);
        let below_max = self.max_amount.is_none_or(|max| amount <= max);
        self.is_active && above_min && below_max
    }
}

/// Input for creating or replacing an approval rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRuleInput {
    /// Name of the approval rule.
    pub name: String,
    /// Evaluation semantics.
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Approver assignments.
    pub approvers: Vec<RuleApprover>,
    /// Minimum amount threshold (inclusive).
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    /// Maximum amount threshold (inclusive).
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    /// Active status, defaults to active.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// A single approver's assignment against one expense at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier for the request.
    pub id: ApprovalRequestId,
    /// The expense under approval.
    pub expense_id: ExpenseId,
    /// The assigned approver.
    pub approver_id: UserId,
    /// Sequential progression unit.
    pub step: u32,
    /// Decision state; changes exactly once.
    pub status: RequestStatus,
    /// Approver's comments.
    pub comments: Option<String>,
    /// When the decision was recorded.
    pub processed_at: Option<DateTime<Utc>>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Creates a pending request.
    #[must_use]
    pub fn pending(
        expense_id: ExpenseId,
        approver_id: UserId,
        step: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalRequestId::new(),
            expense_id,
            approver_id,
            step,
            status: RequestStatus::Pending,
            comments: None,
            processed_at: None,
            created_at,
        }
    }

    /// Returns true if the request is still awaiting a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Returns true if the request was approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == RequestStatus::Approved
    }

    /// Returns true if the request was rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status == RequestStatus::Rejected
    }
}

/// A company using the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Unique identifier.
    pub id: CompanyId,
    /// Company name.
    pub name: String,
    /// ISO 4217 base currency expenses are converted into.
    pub currency: String,
}

impl Identified for Company {
    type Id = CompanyId;
    const KIND: &'static str = CompanyId::KIND;

    fn id(&self) -> CompanyId {
        self.id
    }
}

/// An employee or approver as resolved by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Employing company.
    pub company_id: CompanyId,
    /// Display name.
    pub name: String,
    /// Role within the company.
    pub role: UserRole,
    /// Direct manager, if any.
    pub manager_id: Option<UserId>,
    /// Whether the manager must approve this user's expenses first.
    pub is_manager_approver: bool,
    /// Deactivated users cannot be assigned as approvers.
    pub is_active: bool,
}

impl User {
    /// The manager who approves this user's expenses, if one is required.
    #[must_use]
    pub fn approving_manager(&self) -> Option<UserId> {
        self.manager_id.filter(|_| self.is_manager_approver)
    }
}

impl Identified for User {
    type Id = UserId;
    const KIND: &'static str = UserId::KIND;

    fn id(&self) -> UserId {
        self.id
    }
}

/// The fields of an expense relevant to approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Unique identifier.
    pub id: ExpenseId,
    /// Owning company, as a bare id or an expanded record.
    pub company: Reference<Company>,
    /// Submitting employee.
    pub employee_id: UserId,
    /// Amount normalized to the company currency.
    pub converted_amount: Decimal,
    /// Workflow status.
    pub status: ExpenseStatus,
    /// Active sequential step.
    pub current_approval_step: u32,
}

impl Expense {
    /// Canonical id of the owning company.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidReference`] when the company id is malformed.
    pub fn company_id(&self) -> Result<CompanyId, InvalidReference> {
        self.company.resolve()
    }
}

impl Identified for Expense {
    type Id = ExpenseId;
    const KIND: &'static str = ExpenseId::KIND;

    fn id(&self) -> ExpenseId {
        self.id
    }
}
