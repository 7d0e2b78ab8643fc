//! Data models for Tally

mod entity;
mod id;
mod mutation;
mod sync_request;

pub use entity::EntityType;
pub use id::RecordId;
pub use mutation::{MutationAction, MutationLogEntry, MutationStatus};
pub use sync_request::{SyncRequest, SyncRequestStatus};
