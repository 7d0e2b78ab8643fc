//! Sync request tracker implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{EntityType, MutationStatus, RecordId, SyncRequest, SyncRequestStatus};
use libsql::Connection;

use super::connection::finish_transaction;
use super::mutation_log_repository::{LibSqlMutationLogRepository, MutationLogRepository};

const SELECT_COLUMNS: &str =
    "SELECT id, entity_name, status, last_sync, created_at, updated_at FROM sync_requests";

/// Trait for sync request tracking (async)
///
/// One row per push attempt per entity type. Requests left `pending` or
/// `failed` by an interrupted cycle stay discoverable through
/// [`SyncRequestTracker::find_latest_outstanding`].
#[allow(async_fn_in_trait)]
pub trait SyncRequestTracker {
    /// Most recent `pending` or `failed` request for an entity type
    async fn find_latest_outstanding(&self, entity: EntityType) -> Result<Option<SyncRequest>>;

    /// Create a new `pending` request
    async fn create(&self, entity: EntityType) -> Result<SyncRequest>;

    /// Get a request by ID
    async fn get(&self, id: &RecordId) -> Result<Option<SyncRequest>>;

    /// Mark a request `success` and every entry it claimed `pushed`, atomically.
    ///
    /// Returns the number of entries marked pushed.
    async fn mark_success(&self, id: &RecordId) -> Result<u64>;

    /// Mark a request `failed`; it stays resumable.
    async fn mark_failed(&self, id: &RecordId) -> Result<()>;

    /// Put a resumed request back to `pending` and bump `last_sync`
    async fn reopen(&self, id: &RecordId) -> Result<()>;

    /// Stamp every pending entry of `entity` with `request_id`.
    ///
    /// Idempotent. Fails without claiming anything unless `request_id` names a
    /// `pending` request for the same entity type.
    async fn claim_pending(&self, entity: EntityType, request_id: &RecordId) -> Result<u64>;

    /// Recent requests, newest first
    async fn list_recent(&self, entity: Option<EntityType>, limit: usize)
        -> Result<Vec<SyncRequest>>;
}

/// libSQL implementation of `SyncRequestTracker`
pub struct LibSqlSyncRequestRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncRequestRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_requests(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<SyncRequest>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut requests = Vec::new();
        while let Some(row) = rows.next().await? {
            requests.push(Self::parse_request(&row)?);
        }
        Ok(requests)
    }

    /// Parse a request from a database row
    fn parse_request(row: &libsql::Row) -> Result<SyncRequest> {
        let id: String = row.get(0)?;
        let entity_name: String = row.get(1)?;
        let status: String = row.get(2)?;

        Ok(SyncRequest {
            id: id.parse()?,
            entity_name: entity_name.parse()?,
            status: status.parse()?,
            last_sync: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    async fn set_status(&self, id: &RecordId, status: SyncRequestStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let updated = self
            .conn
            .execute(
                "UPDATE sync_requests SET status = ?, last_sync = ?, updated_at = ? WHERE id = ?",
                libsql::params![status.as_str(), now, now, id.as_str()],
            )
            .await?;

        if updated == 0 {
            return Err(Error::NotFound(format!("sync request {id}")));
        }
        Ok(())
    }

    async fn mark_success_inner(&self, id: &RecordId) -> Result<u64> {
        self.set_status(id, SyncRequestStatus::Success).await?;
        LibSqlMutationLogRepository::new(self.conn)
            .update_status_by_request_id(id, MutationStatus::Pushed)
            .await
    }

    async fn claim_pending_inner(&self, entity: EntityType, request_id: &RecordId) -> Result<u64> {
        let request = self
            .get(request_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync request {request_id}")))?;

        if request.entity_name != entity {
            return Err(Error::InvalidInput(format!(
                "Sync request {request_id} belongs to {}, not {entity}",
                request.entity_name
            )));
        }
        if request.status != SyncRequestStatus::Pending {
            return Err(Error::InvalidInput(format!(
                "Sync request {request_id} is {} and cannot claim entries",
                request.status
            )));
        }

        LibSqlMutationLogRepository::new(self.conn)
            .update_request_id_for_pending_by_table(entity, request_id)
            .await
    }
}

impl SyncRequestTracker for LibSqlSyncRequestRepository<'_> {
    async fn find_latest_outstanding(&self, entity: EntityType) -> Result<Option<SyncRequest>> {
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE entity_name = ? AND status IN ('pending', 'failed')
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1"
        );
        let mut requests = self.query_requests(&sql, [entity.as_str()]).await?;
        Ok(requests.pop())
    }

    async fn create(&self, entity: EntityType) -> Result<SyncRequest> {
        let request = SyncRequest::new(entity);
        self.conn
            .execute(
                "INSERT INTO sync_requests (id, entity_name, status, last_sync, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                libsql::params![
                    request.id.as_str(),
                    request.entity_name.as_str(),
                    request.status.as_str(),
                    request.last_sync,
                    request.created_at,
                    request.updated_at
                ],
            )
            .await?;
        Ok(request)
    }

    async fn get(&self, id: &RecordId) -> Result<Option<SyncRequest>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let mut requests = self.query_requests(&sql, [id.as_str()]).await?;
        Ok(requests.pop())
    }

    async fn mark_success(&self, id: &RecordId) -> Result<u64> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        let result = self.mark_success_inner(id).await;
        finish_transaction(self.conn, result).await
    }

    async fn mark_failed(&self, id: &RecordId) -> Result<()> {
        self.set_status(id, SyncRequestStatus::Failed).await
    }

    async fn reopen(&self, id: &RecordId) -> Result<()> {
        self.set_status(id, SyncRequestStatus::Pending).await
    }

    async fn claim_pending(&self, entity: EntityType, request_id: &RecordId) -> Result<u64> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        let result = self.claim_pending_inner(entity, request_id).await;
        finish_transaction(self.conn, result).await
    }

    async fn list_recent(
        &self,
        entity: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<SyncRequest>> {
        match entity {
            Some(entity) => {
                let sql = format!(
                    "{SELECT_COLUMNS} WHERE entity_name = ? ORDER BY created_at DESC, rowid DESC LIMIT ?"
                );
                self.query_requests(&sql, libsql::params![entity.as_str(), limit as i64])
                    .await
            }
            None => {
                let sql = format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?");
                self.query_requests(&sql, [limit as i64]).await
            }
        }
    }
}
