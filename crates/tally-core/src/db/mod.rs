//! Local store for the mutation log and sync request tracker

mod connection;
mod migrations;
mod mutation_log_repository;
mod sync_request_repository;

pub use connection::Database;
pub use mutation_log_repository::{
    LibSqlMutationLogRepository, MutationLogFilter, MutationLogRepository,
};
pub use sync_request_repository::{LibSqlSyncRequestRepository, SyncRequestTracker};
