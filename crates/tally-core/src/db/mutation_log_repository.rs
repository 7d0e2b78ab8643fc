//! Mutation log repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{EntityType, MutationLogEntry, MutationStatus, RecordId};
use libsql::params::Params;
use libsql::{Connection, Value};

const SELECT_COLUMNS: &str =
    "SELECT id, table_name, action, data, request_id, status, timestamp FROM mutation_log";

/// Filter for paged mutation log queries; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationLogFilter {
    pub table_name: Option<EntityType>,
    pub request_id: Option<RecordId>,
    pub status: Option<MutationStatus>,
}

impl MutationLogFilter {
    /// Entries claimed by `request_id` for one entity type
    #[must_use]
    pub const fn claimed_by(table_name: EntityType, request_id: RecordId) -> Self {
        Self {
            table_name: Some(table_name),
            request_id: Some(request_id),
            status: None,
        }
    }
}

/// Trait for mutation log storage operations (async)
#[allow(async_fn_in_trait)]
pub trait MutationLogRepository {
    /// Append a new entry to the log
    async fn append(&self, entry: &MutationLogEntry) -> Result<()>;

    /// Get an entry by ID
    async fn get(&self, id: &RecordId) -> Result<Option<MutationLogEntry>>;

    /// All pending entries for an entity type, oldest first
    async fn find_pending_by_table(&self, table_name: EntityType) -> Result<Vec<MutationLogEntry>>;

    /// Number of pending entries for an entity type
    async fn count_pending_by_table(&self, table_name: EntityType) -> Result<usize>;

    /// Number of pending entries for an entity type not yet claimed by any request
    async fn count_unclaimed_by_table(&self, table_name: EntityType) -> Result<usize>;

    /// All entries claimed by a sync request, oldest first
    async fn find_by_request_id(&self, request_id: &RecordId) -> Result<Vec<MutationLogEntry>>;

    /// Paged query in stable `(timestamp, id)` order
    async fn find(
        &self,
        filter: &MutationLogFilter,
        skip: usize,
        take: usize,
    ) -> Result<Vec<MutationLogEntry>>;

    /// Set the status of every entry claimed by a sync request
    async fn update_status_by_request_id(
        &self,
        request_id: &RecordId,
        status: MutationStatus,
    ) -> Result<u64>;

    /// Stamp every pending entry of an entity type with a sync request id
    async fn update_request_id_for_pending_by_table(
        &self,
        table_name: EntityType,
        request_id: &RecordId,
    ) -> Result<u64>;
}

/// libSQL implementation of `MutationLogRepository`
pub struct LibSqlMutationLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlMutationLogRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_entries(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<MutationLogEntry>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    async fn count(&self, sql: &str, table_name: EntityType) -> Result<usize> {
        let mut rows = self.conn.query(sql, [table_name.as_str()]).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database(format!("Invalid row count: {count}")))
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &libsql::Row) -> Result<MutationLogEntry> {
        let id: String = row.get(0)?;
        let table_name: String = row.get(1)?;
        let action: String = row.get(2)?;
        let data: String = row.get(3)?;
        let request_id = match row.get_value(4)? {
            Value::Text(text) => Some(text.parse()?),
            Value::Null => None,
            other => {
                return Err(Error::Database(format!(
                    "Unexpected request_id value for mutation {id}: {other:?}"
                )))
            }
        };
        let status: String = row.get(5)?;

        Ok(MutationLogEntry {
            id: id.parse()?,
            table_name: table_name.parse()?,
            action: action.parse()?,
            data: serde_json::from_str(&data)?,
            request_id,
            status: status.parse()?,
            timestamp: row.get(6)?,
        })
    }
}

impl MutationLogRepository for LibSqlMutationLogRepository<'_> {
    async fn append(&self, entry: &MutationLogEntry) -> Result<()> {
        if entry.request_id.is_some() || !entry.is_pending() {
            return Err(Error::InvalidInput(
                "New mutation log entries must be pending and unclaimed".to_string(),
            ));
        }

        let data = serde_json::to_string(&entry.data)?;
        self.conn
            .execute(
                "INSERT INTO mutation_log (id, table_name, action, data, request_id, status, timestamp)
                 VALUES (?, ?, ?, ?, NULL, ?, ?)",
                libsql::params![
                    entry.id.as_str(),
                    entry.table_name.as_str(),
                    entry.action.as_str(),
                    data,
                    entry.status.as_str(),
                    entry.timestamp
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &RecordId) -> Result<Option<MutationLogEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let mut entries = self.query_entries(&sql, [id.as_str()]).await?;
        Ok(entries.pop())
    }

    async fn find_pending_by_table(&self, table_name: EntityType) -> Result<Vec<MutationLogEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE table_name = ? AND status = 'pending' ORDER BY timestamp ASC, rowid ASC"
        );
        self.query_entries(&sql, [table_name.as_str()]).await
    }

    async fn count_pending_by_table(&self, table_name: EntityType) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM mutation_log WHERE table_name = ? AND status = 'pending'",
            table_name,
        )
        .await
    }

    async fn count_unclaimed_by_table(&self, table_name: EntityType) -> Result<usize> {
        self.count(
            "SELECT COUNT(*) FROM mutation_log
             WHERE table_name = ? AND status = 'pending' AND request_id IS NULL",
            table_name,
        )
        .await
    }

    async fn find_by_request_id(&self, request_id: &RecordId) -> Result<Vec<MutationLogEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE request_id = ? ORDER BY timestamp ASC, rowid ASC");
        self.query_entries(&sql, [request_id.as_str()]).await
    }

    async fn find(
        &self,
        filter: &MutationLogFilter,
        skip: usize,
        take: usize,
    ) -> Result<Vec<MutationLogEntry>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(table_name) = filter.table_name {
            clauses.push("table_name = ?");
            values.push(Value::Text(table_name.as_str().to_string()));
        }
        if let Some(request_id) = filter.request_id {
            clauses.push("request_id = ?");
            values.push(Value::Text(request_id.as_str()));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        values.push(Value::Integer(take as i64));
        values.push(Value::Integer(skip as i64));

        let sql = format!(
            "{SELECT_COLUMNS}{where_clause} ORDER BY timestamp ASC, rowid ASC LIMIT ? OFFSET ?"
        );
        self.query_entries(&sql, Params::Positional(values)).await
    }

    async fn update_status_by_request_id(
        &self,
        request_id: &RecordId,
        status: MutationStatus,
    ) -> Result<u64> {
        let updated = self
            .conn
            .execute(
                "UPDATE mutation_log SET status = ? WHERE request_id = ?",
                libsql::params![status.as_str(), request_id.as_str()],
            )
            .await?;
        Ok(updated)
    }

    async fn update_request_id_for_pending_by_table(
        &self,
        table_name: EntityType,
        request_id: &RecordId,
    ) -> Result<u64> {
        let updated = self
            .conn
            .execute(
                "UPDATE mutation_log SET request_id = ?
                 WHERE table_name = ? AND status = 'pending'",
                libsql::params![request_id.as_str(), table_name.as_str()],
            )
            .await?;
        Ok(updated)
    }
}
