//! Shared local store service used by the push orchestrator and clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlMutationLogRepository, LibSqlSyncRequestRepository, MutationLogFilter,
    MutationLogRepository, SyncRequestTracker,
};
use crate::models::{
    EntityType, MutationAction, MutationLogEntry, RecordId, SyncRequest,
};
use crate::{Error, Result};

/// Thread-safe service over the mutation log and sync request tracker.
///
/// Every operation holds the database lock for its whole duration, so claim
/// and mark steps never interleave with each other.
#[derive(Clone)]
pub struct SyncStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl SyncStore {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Detected invalid local DB file at {}: {}. Quarantining and retrying once.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "tally.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale local DB sidecar {}", path.display());
            }
        }

        Ok(())
    }

    /// Record a local write in the mutation log.
    pub async fn record_mutation(
        &self,
        entity: EntityType,
        action: MutationAction,
        data: Value,
    ) -> Result<MutationLogEntry> {
        let entry = MutationLogEntry::new(entity, action, data);
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .append(&entry)
            .await?;
        tracing::debug!(entity = %entity, mutation_id = %entry.id, "Recorded mutation");
        Ok(entry)
    }

    /// Fetch a mutation log entry by id.
    pub async fn get_mutation(&self, id: &RecordId) -> Result<Option<MutationLogEntry>> {
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .get(id)
            .await
    }

    /// Number of pending entries for an entity type.
    pub async fn pending_count(&self, entity: EntityType) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .count_pending_by_table(entity)
            .await
    }

    /// Number of pending entries for an entity type that no request has claimed.
    pub async fn unclaimed_count(&self, entity: EntityType) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .count_unclaimed_by_table(entity)
            .await
    }

    /// All pending entries for an entity type, oldest first.
    pub async fn pending_mutations(&self, entity: EntityType) -> Result<Vec<MutationLogEntry>> {
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .find_pending_by_table(entity)
            .await
    }

    /// Entries claimed by a sync request, oldest first.
    pub async fn mutations_for_request(
        &self,
        request_id: &RecordId,
    ) -> Result<Vec<MutationLogEntry>> {
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .find_by_request_id(request_id)
            .await
    }

    /// One page of entries claimed by `request_id` for `entity`.
    pub async fn claimed_page(
        &self,
        entity: EntityType,
        request_id: RecordId,
        skip: usize,
        take: usize,
    ) -> Result<Vec<MutationLogEntry>> {
        let db = self.db.lock().await;
        LibSqlMutationLogRepository::new(db.connection())
            .find(&MutationLogFilter::claimed_by(entity, request_id), skip, take)
            .await
    }

    /// Most recent unresolved request for an entity type.
    pub async fn find_latest_outstanding(&self, entity: EntityType) -> Result<Option<SyncRequest>> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .find_latest_outstanding(entity)
            .await
    }

    /// Create a new pending sync request.
    pub async fn create_request(&self, entity: EntityType) -> Result<SyncRequest> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .create(entity)
            .await
    }

    /// Fetch a sync request by id.
    pub async fn get_request(&self, id: &RecordId) -> Result<Option<SyncRequest>> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .get(id)
            .await
    }

    /// Claim every pending entry of `entity` for `request_id`.
    pub async fn claim_pending(&self, entity: EntityType, request_id: &RecordId) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .claim_pending(entity, request_id)
            .await
    }

    /// Resolve a request and push every entry it claimed.
    pub async fn mark_success(&self, request_id: &RecordId) -> Result<usize> {
        let db = self.db.lock().await;
        let pushed = LibSqlSyncRequestRepository::new(db.connection())
            .mark_success(request_id)
            .await?;
        usize::try_from(pushed)
            .map_err(|_| Error::Database(format!("Invalid pushed entry count: {pushed}")))
    }

    /// Mark a request failed; it stays resumable.
    pub async fn mark_failed(&self, request_id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .mark_failed(request_id)
            .await
    }

    /// Reopen a resumed request so it can claim and transmit again.
    pub async fn reopen_request(&self, request_id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .reopen(request_id)
            .await
    }

    /// Recent requests, newest first.
    pub async fn list_requests(
        &self,
        entity: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<SyncRequest>> {
        let db = self.db.lock().await;
        LibSqlSyncRequestRepository::new(db.connection())
            .list_recent(entity, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MutationStatus, SyncRequestStatus};

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_record_claim_and_resolve() {
        let store = SyncStore::open_in_memory().await.unwrap();

        let entry = store
            .record_mutation(
                EntityType::Orders,
                MutationAction::Insert,
                serde_json::json!({ "total": 4 }),
            )
            .await
            .unwrap();
        assert_eq!(store.pending_count(EntityType::Orders).await.unwrap(), 1);

        let request = store.create_request(EntityType::Orders).await.unwrap();
        assert_eq!(
            store
                .claim_pending(EntityType::Orders, &request.id)
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.mark_success(&request.id).await.unwrap(), 1);

        let entry = store.get_mutation(&entry.id).await.unwrap().unwrap();
        assert_eq!(entry.status, MutationStatus::Pushed);
        assert_eq!(entry.request_id, Some(request.id));
        let request = store.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(request.status, SyncRequestStatus::Success);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("tally.db");

        let request_id = {
            let store = SyncStore::open_path(&db_path).await.unwrap();
            store
                .record_mutation(
                    EntityType::Batch,
                    MutationAction::Insert,
                    serde_json::json!({ "code": "B-1" }),
                )
                .await
                .unwrap();
            let request = store.create_request(EntityType::Batch).await.unwrap();
            store
                .claim_pending(EntityType::Batch, &request.id)
                .await
                .unwrap();
            request.id
        };

        let store = SyncStore::open_path(&db_path).await.unwrap();
        let outstanding = store
            .find_latest_outstanding(EntityType::Batch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outstanding.id, request_id);
        assert_eq!(store.mutations_for_request(&request_id).await.unwrap().len(), 1);
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("tally.db");
        let wal_path = tmp.path().join("tally.db-wal");
        let shm_path = tmp.path().join("tally.db-shm");

        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();
        std::fs::write(&shm_path, b"shm").unwrap();

        SyncStore::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        assert!(!shm_path.exists());

        let found_backup = std::fs::read_dir(tmp.path()).unwrap().any(|entry| {
            entry
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("tally.db.corrupt-")
        });
        assert!(found_backup);
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(SyncStore::is_corrupted_db_error(&crate::Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!SyncStore::is_corrupted_db_error(
            &crate::Error::InvalidInput("bad entity".to_string())
        ));
    }
}
