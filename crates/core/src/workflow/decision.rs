//! Recording an approver's decision on a single request.

use chrono::{DateTime, Utc};
use outlay_shared::types::{ApprovalRequestId, UserId};

use crate::workflow::error::ApprovalError;
use crate::workflow::types::{ApprovalRequest, Decision};

/// Stateless rules for accepting a decision on a request.
pub struct DecisionRecorder;

impl DecisionRecorder {
    /// Checks that a request exists and belongs to the approver.
    ///
    /// A request assigned to someone else is reported as not found, so an
    /// approver cannot probe for other approvers' requests.
    ///
    /// # Returns
    /// * `Ok(ApprovalRequest)` - The request, owned by `approver_id`
    /// * `Err(ApprovalError::NotFound)` - Missing or assigned elsewhere
    pub fn authorize(
        request: Option<ApprovalRequest>,
        request_id: ApprovalRequestId,
        approver_id: UserId,
    ) -> Result<ApprovalRequest, ApprovalError> {
        request
            .filter(|r| r.approver_id == approver_id)
            .ok_or_else(|| ApprovalError::not_found(ApprovalRequestId::KIND, request_id))
    }

    /// Applies a decision to a pending request.
    ///
    /// # Arguments
    /// * `request` - The request being decided
    /// * `decision` - Approve or reject
    /// * `comments` - Optional approver comments
    /// * `now` - Decision time
    ///
    /// # Returns
    /// * `Ok(())` with status, comments and `processed_at` set
    /// * `Err(ApprovalError::AlreadyProcessed)` if the request was decided before
    pub fn apply(
        request: &mut ApprovalRequest,
        decision: Decision,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        if !request.is_pending() {
            return Err(ApprovalError::AlreadyProcessed(request.id.to_string()));
        }

        request.status = decision.request_status();
        request.comments = comments;
        request.processed_at = Some(now);
        Ok(())
    }
}
