//! Server liveness check for previously issued request ids.

use crate::models::RecordId;

use super::SyncApi;

/// Whether the server already accepted `request_id`.
///
/// Any error counts as "not accepted" so the caller retransmits instead of
/// dropping work.
pub async fn is_accepted_by_server<A: SyncApi>(api: &A, request_id: &RecordId) -> bool {
    match api.check_request(request_id).await {
        Ok(check) => {
            tracing::debug!(%request_id, ?check, "Liveness check answered");
            check.is_success()
        }
        Err(error) => {
            tracing::warn!(%request_id, %error, "Liveness check failed; assuming not accepted");
            false
        }
    }
}
