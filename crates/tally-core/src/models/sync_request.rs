//! Sync request model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::entity::EntityType;
use super::id::RecordId;

/// Status of one push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRequestStatus {
    Pending,
    Success,
    Failed,
}

impl SyncRequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncRequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!(
                "Unknown sync request status: {other}"
            ))),
        }
    }
}

/// One attempt to transmit the pending mutations of an entity type.
///
/// The id doubles as the idempotency key sent with every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Unique identifier and idempotency key
    pub id: RecordId,
    /// Entity type covered by this request
    pub entity_name: EntityType,
    /// Current status
    pub status: SyncRequestStatus,
    /// Last time this request was touched by a push cycle (Unix ms)
    pub last_sync: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl SyncRequest {
    /// Create a new pending request for an entity type
    #[must_use]
    pub fn new(entity_name: EntityType) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: RecordId::new(),
            entity_name,
            status: SyncRequestStatus::Pending,
            last_sync: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a later push cycle still has to resolve this request
    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        matches!(
            self.status,
            SyncRequestStatus::Pending | SyncRequestStatus::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_is_pending_and_outstanding() {
        let request = SyncRequest::new(EntityType::Orders);
        assert_eq!(request.status, SyncRequestStatus::Pending);
        assert!(request.is_outstanding());
        assert_eq!(request.created_at, request.last_sync);
    }

    #[test]
    fn test_success_is_not_outstanding() {
        let mut request = SyncRequest::new(EntityType::Batch);
        request.status = SyncRequestStatus::Success;
        assert!(!request.is_outstanding());
        request.status = SyncRequestStatus::Failed;
        assert!(request.is_outstanding());
    }
}
