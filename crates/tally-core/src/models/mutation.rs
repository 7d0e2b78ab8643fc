//! Mutation log model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::entity::EntityType;
use super::id::RecordId;

/// Kind of local write captured by the mutation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationAction {
    /// `data` is the full new document
    Insert,
    /// `data` is a `{filter, update}` pair
    Update,
}

impl MutationAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            other => Err(Error::InvalidInput(format!("Unknown mutation action: {other}"))),
        }
    }
}

/// Delivery status of a mutation log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Pending,
    Pushed,
}

impl MutationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Pushed => "pushed",
        }
    }
}

impl FromStr for MutationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "pushed" => Ok(Self::Pushed),
            other => Err(Error::InvalidInput(format!("Unknown mutation status: {other}"))),
        }
    }
}

/// One local write awaiting (or done with) transmission to the server.
///
/// Serializes to the wire shape the push endpoints expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationLogEntry {
    /// Unique identifier
    #[serde(rename = "_id")]
    pub id: RecordId,
    /// Entity type the write belongs to
    pub table_name: EntityType,
    /// Insert or update
    pub action: MutationAction,
    /// Entity-specific mutation document
    pub data: serde_json::Value,
    /// Sync request that claimed this entry, if any
    pub request_id: Option<RecordId>,
    /// Delivery status
    pub status: MutationStatus,
    /// Creation timestamp (Unix ms)
    pub timestamp: i64,
}

impl MutationLogEntry {
    /// Create a new, unclaimed pending entry
    #[must_use]
    pub fn new(table_name: EntityType, action: MutationAction, data: serde_json::Value) -> Self {
        Self {
            id: RecordId::new(),
            table_name,
            action,
            data,
            request_id: None,
            status: MutationStatus::Pending,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Convenience constructor for an update mutation
    #[must_use]
    pub fn update(
        table_name: EntityType,
        filter: serde_json::Value,
        update: serde_json::Value,
    ) -> Self {
        Self::new(
            table_name,
            MutationAction::Update,
            serde_json::json!({ "filter": filter, "update": update }),
        )
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.status, MutationStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_entry_is_unclaimed_and_pending() {
        let entry = MutationLogEntry::new(
            EntityType::Orders,
            MutationAction::Insert,
            serde_json::json!({ "total": 12.5 }),
        );
        assert!(entry.is_pending());
        assert!(entry.request_id.is_none());
        assert!(entry.timestamp > 0);
    }

    #[test]
    fn test_update_wraps_filter_and_patch() {
        let entry = MutationLogEntry::update(
            EntityType::Customer,
            serde_json::json!({ "_id": "c1" }),
            serde_json::json!({ "name": "Asha" }),
        );
        assert_eq!(entry.action, MutationAction::Update);
        assert_eq!(entry.data["filter"]["_id"], "c1");
        assert_eq!(entry.data["update"]["name"], "Asha");
    }

    #[test]
    fn test_entry_wire_shape() {
        let mut entry = MutationLogEntry::new(
            EntityType::StockHistory,
            MutationAction::Insert,
            serde_json::json!({ "qty": 3 }),
        );
        entry.id = "65f1c0ffee00112233445566".parse().unwrap();
        entry.timestamp = 1_700_000_000_000;

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "_id": "65f1c0ffee00112233445566",
                "tableName": "stock-history",
                "action": "INSERT",
                "data": { "qty": 3 },
                "requestId": null,
                "status": "pending",
                "timestamp": 1_700_000_000_000_i64,
            })
        );
    }

    #[test]
    fn test_action_parse_is_case_insensitive() {
        assert_eq!(
            "update".parse::<MutationAction>().unwrap(),
            MutationAction::Update
        );
        assert!("DELETE".parse::<MutationAction>().is_err());
    }
}
