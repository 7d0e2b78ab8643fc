//! Remote sync API: push endpoints and request liveness checks.

mod client;
mod liveness;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{EntityType, MutationLogEntry, RecordId};

pub use client::HttpSyncApi;
pub use liveness::is_accepted_by_server;

/// Value of `PushResponse::message` that signals acceptance.
pub const ACCEPTED_MESSAGE: &str = "accepted";

/// Sentinel returned by the liveness endpoint for unknown request ids.
pub const NO_REQUEST_SENTINEL: &str = "NO_REQUEST";

/// Remote push endpoint descriptor for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Path relative to the API base URL
    pub path: String,
    /// HTTP method, `POST` unless configured otherwise
    #[serde(default = "default_method")]
    pub method: String,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
        }
    }

    /// `POST /sync/<entity-name>`
    #[must_use]
    pub fn default_for(entity: EntityType) -> Self {
        Self::new(format!("/sync/{}", entity.as_str()), default_method())
    }
}

fn default_method() -> String {
    "POST".to_string()
}

/// Body of a page transmission; `request_id` is the idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub request_id: RecordId,
    pub operations: Vec<MutationLogEntry>,
}

/// Push endpoint reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub message: Option<String>,
}

impl PushResponse {
    pub fn accepted() -> Self {
        Self {
            message: Some(ACCEPTED_MESSAGE.to_string()),
        }
    }

    /// Only an explicit `"accepted"` message counts as success.
    pub fn is_accepted(&self) -> bool {
        self.message.as_deref() == Some(ACCEPTED_MESSAGE)
    }
}

/// What the server knows about a previously issued request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestCheck {
    /// The server has a record with this status
    Found { status: String },
    /// The server has never seen the request id
    NoRequest,
}

impl RequestCheck {
    /// Interpret a liveness payload: `{"status": ...}` or the bare sentinel.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(text) if text == NO_REQUEST_SENTINEL => Some(Self::NoRequest),
            serde_json::Value::Object(map) => {
                if map.get("status").and_then(serde_json::Value::as_str) == Some(NO_REQUEST_SENTINEL)
                {
                    return Some(Self::NoRequest);
                }
                let status = map
                    .get("status")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some(Self::Found { status })
            }
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Found { status } if status == "success")
    }
}

/// Remote API consumed by the push orchestrator.
#[allow(async_fn_in_trait)]
pub trait SyncApi {
    /// Transmit one page of operations to an entity's endpoint
    async fn push(&self, endpoint: &Endpoint, request: &PushRequest) -> Result<PushResponse>;

    /// Ask whether a request id was already accepted
    async fn check_request(&self, request_id: &RecordId) -> Result<RequestCheck>;
}
