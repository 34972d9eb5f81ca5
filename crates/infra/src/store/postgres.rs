//! Postgres-backed capacity record store.
//!
//! One row per record. The full record lives in a JSONB `body`; `version`,
//! `kind`, `status` and `window_start` are mirrored into columns for the
//! conditional write and for search.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` on insert |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |
//! | elapsed `store_timeout` | N/A | `Timeout` |
//!
//! ## Sync boundary
//!
//! `CapacityStore` is synchronous. Calls are driven on the runtime handle the
//! store was built with, so they must come from a thread outside the async
//! executor (`spawn_blocking`, the sweeper thread).

use std::future::Future;
use std::time::Duration;

use sqlx::{PgPool, Row};
use tokio::runtime::Handle;
use tracing::instrument;

use tripstay_core::{EntryId, ExpectedVersion, RecordId};
use tripstay_reservations::CapacityRecord;

use super::r#trait::{CapacityStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_capacity_records.sql");

#[derive(Debug, Clone)]
pub struct PostgresCapacityStore {
    pool: PgPool,
    handle: Handle,
    timeout: Duration,
}

impl PostgresCapacityStore {
    pub fn new(pool: PgPool, handle: Handle, timeout: Duration) -> Self {
        Self {
            pool,
            handle,
            timeout,
        }
    }

    /// Create tables and indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout = self.timeout;
        self.handle.block_on(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(timeout)),
            }
        })
    }

    #[instrument(skip(self), fields(record_id = %record_id), err)]
    async fn load_async(&self, record_id: RecordId) -> Result<CapacityRecord, StoreError> {
        let row = sqlx::query("SELECT version, body FROM capacity_records WHERE id = $1")
            .bind(record_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load", e))?
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id}")))?;

        decode_row(&row)
    }

    #[instrument(skip(self, record), fields(record_id = %record.record_id()), err)]
    async fn insert_async(&self, record: CapacityRecord) -> Result<CapacityRecord, StoreError> {
        let record = record.with_version(1);
        let body = encode(&record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO capacity_records (id, version, kind, status, window_start, body)
            VALUES ($1, 1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.record_id().as_uuid())
        .bind(record.capacity().kind())
        .bind(record.status().as_str())
        .bind(record.window_start())
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(record.record_id()));
        }
        Ok(record)
    }

    #[instrument(
        skip(self, record),
        fields(record_id = %record.record_id(), expected = ?expected),
        err
    )]
    async fn compare_and_swap_async(
        &self,
        record: CapacityRecord,
        expected: ExpectedVersion,
    ) -> Result<CapacityRecord, StoreError> {
        let record_id = record.record_id();
        let expected_version: Option<i64> = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(to_i64(v)?),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: i64 = sqlx::query("SELECT version FROM capacity_records WHERE id = $1 FOR UPDATE")
            .bind(record_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_row", e))?
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id}")))?
            .try_get("version")
            .map_err(|e| map_sqlx_error("lock_row", e))?;

        if expected_version.is_some_and(|v| v != current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency {
                expected,
                actual: from_i64(current),
            });
        }

        // Encoded after the bump so the stored JSON carries the new version.
        let next = record.with_version(from_i64(current) + 1);
        let body = encode(&next)?;

        sqlx::query(
            r#"
            UPDATE capacity_records
               SET version = $2, status = $3, window_start = $4, body = $5, updated_at = now()
             WHERE id = $1 AND version = $6
            "#,
        )
        .bind(record_id.as_uuid())
        .bind(current + 1)
        .bind(next.status().as_str())
        .bind(next.window_start())
        .bind(&body)
        .bind(current)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(next)
    }

    async fn locate_entry_async(&self, entry_id: EntryId) -> Result<RecordId, StoreError> {
        let containment = serde_json::json!([{ "id": entry_id }]);
        let row = sqlx::query("SELECT id FROM capacity_records WHERE body -> 'entries' @> $1 LIMIT 1")
            .bind(&containment)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("locate_entry", e))?
            .ok_or_else(|| StoreError::NotFound(format!("entry {entry_id}")))?;

        let id: uuid::Uuid = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("locate_entry", e))?;
        Ok(RecordId::from_uuid(id))
    }

    async fn list_expirable_async(&self) -> Result<Vec<RecordId>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM capacity_records
             WHERE status IN ('open', 'locked')
               AND jsonb_path_exists(body, '$.entries[*] ? (@.status == "pending" || @.status == "reserved")')
             ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_expirable", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<uuid::Uuid, _>("id")
                    .map(RecordId::from_uuid)
                    .map_err(|e| map_sqlx_error("list_expirable", e))
            })
            .collect()
    }

    async fn list_open_trips_async(&self) -> Result<Vec<CapacityRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT version, body FROM capacity_records WHERE kind = 'trip' AND status = 'open' AND window_start > now()",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_open_trips", e))?;

        rows.iter().map(decode_row).collect()
    }
}

impl CapacityStore for PostgresCapacityStore {
    fn load(&self, record_id: RecordId) -> Result<CapacityRecord, StoreError> {
        self.run(self.load_async(record_id))
    }

    fn insert(&self, record: CapacityRecord) -> Result<CapacityRecord, StoreError> {
        self.run(self.insert_async(record))
    }

    fn compare_and_swap(
        &self,
        record: CapacityRecord,
        expected: ExpectedVersion,
    ) -> Result<CapacityRecord, StoreError> {
        self.run(self.compare_and_swap_async(record, expected))
    }

    fn locate_entry(&self, entry_id: EntryId) -> Result<RecordId, StoreError> {
        self.run(self.locate_entry_async(entry_id))
    }

    fn list_expirable(&self) -> Result<Vec<RecordId>, StoreError> {
        self.run(self.list_expirable_async())
    }

    fn list_open_trips(&self) -> Result<Vec<CapacityRecord>, StoreError> {
        self.run(self.list_open_trips_async())
    }
}

fn encode(record: &CapacityRecord) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record)
        .map_err(|e| StoreError::Backend(format!("record serialization failed: {e}")))
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<CapacityRecord, StoreError> {
    let version: i64 = row
        .try_get("version")
        .map_err(|e| map_sqlx_error("decode", e))?;
    let body: serde_json::Value = row.try_get("body").map_err(|e| map_sqlx_error("decode", e))?;
    let record: CapacityRecord = serde_json::from_value(body)
        .map_err(|e| StoreError::Backend(format!("record deserialization failed: {e}")))?;

    // The column is authoritative.
    Ok(record.with_version(from_i64(version)))
}

fn to_i64(v: u64) -> Result<i64, StoreError> {
    i64::try_from(v).map_err(|_| StoreError::Backend(format!("version {v} out of range")))
}

fn from_i64(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Backend(format!("connection pool timed out in {operation}"))
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
