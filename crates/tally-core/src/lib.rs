//! tally-core - Core library for Tally
//!
//! This crate contains the offline data layer of the point-of-sale app: the
//! mutation log, the sync request tracker, media upload resolution, and the
//! push orchestrator that reconciles local writes with the remote server.

pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod remote;
pub mod services;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    EntityType, MutationAction, MutationLogEntry, MutationStatus, RecordId, SyncRequest,
    SyncRequestStatus,
};
