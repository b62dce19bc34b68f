//! # Procurement Requests
//!
//! State machine of need requests. Only APPROVED requests may back a stock
//! movement.
//!
//! ```text
//!   DRAFT ──submit──► SUBMITTED ──approve──► APPROVED (sealed)
//!                         │
//!                         └──reject───► REJECTED
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::types::{NeedRequest, NeedRequestStatus};
use crate::validation::validate_required_text;

/// Moves a draft to SUBMITTED.
pub fn submit(request: &mut NeedRequest, now: DateTime<Utc>) -> CoreResult<()> {
    expect_status(request, NeedRequestStatus::Draft, "submit")?;

    request.status = NeedRequestStatus::Submitted;
    request.submitted_at = Some(now);
    request.updated_at = now;
    Ok(())
}

/// Approves a submitted request and seals it.
pub fn approve(request: &mut NeedRequest, reviewer: &str, now: DateTime<Utc>) -> CoreResult<()> {
    expect_status(request, NeedRequestStatus::Submitted, "approve")?;
    let reviewer = validate_required_text("reviewer", reviewer)?;

    request.status = NeedRequestStatus::Approved;
    request.reviewed_by = Some(reviewer);
    request.reviewed_at = Some(now);
    request.sealed_at = Some(now);
    request.updated_at = now;
    Ok(())
}

/// Rejects a submitted request with a reason.
pub fn reject(
    request: &mut NeedRequest,
    reviewer: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    expect_status(request, NeedRequestStatus::Submitted, "reject")?;
    let reviewer = validate_required_text("reviewer", reviewer)?;
    let reason = validate_required_text("rejection reason", reason)?;

    request.status = NeedRequestStatus::Rejected;
    request.reviewed_by = Some(reviewer);
    request.reviewed_at = Some(now);
    request.rejection_reason = Some(reason);
    request.updated_at = now;
    Ok(())
}

/// Gate used by stock posting.
pub fn ensure_approved(request_id: &str, status: NeedRequestStatus) -> CoreResult<()> {
    if status != NeedRequestStatus::Approved {
        return Err(CoreError::RequestNotApproved {
            request_id: request_id.to_string(),
            status,
        });
    }
    Ok(())
}

fn expect_status(request: &NeedRequest, expected: NeedRequestStatus, action: &str) -> CoreResult<()> {
    if request.status != expected {
        return Err(CoreError::InvalidRequestTransition {
            from: request.status,
            action: action.to_string(),
        });
    }
    Ok(())
}
