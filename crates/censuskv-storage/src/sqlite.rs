//! SQLite store backend.
//!
//! Persists tables and items to a single SQLite file. Each table's spec is
//! kept in a catalog; items live in one shared table keyed by
//! `(table_name, partition_key, sort_key)` with the full item stored as JSON.
//! A batch write runs in one transaction, so a failed group leaves nothing
//! behind.
//!
//! # Usage
//! ```rust,no_run
//! use censuskv_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./censuskv.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use censuskv_core::error::StoreError;
use censuskv_core::item::Item;
use censuskv_core::partition::{WriteGroup, WriteRequest};
use censuskv_core::store::{BatchWriteOutput, KvStore};
use censuskv_core::table::{KeySchema, TableDescription, TableSpec, TableStatus};

use crate::validate::validate_group;

fn internal(e: impl std::fmt::Display) -> StoreError {
    StoreError::InternalServerError(e.to_string())
}

fn not_found(table: &str) -> StoreError {
    StoreError::ResourceNotFound(format!(
        "Requested resource not found: Table: {table} not found"
    ))
}

/// SQLite-backed key-value store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./censuskv.db"`) or a full
    /// SQLite URL (`"sqlite:./censuskv.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(internal)?;

        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&pool)
            .await
            .map_err(internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Limited to one connection so every query sees the same database.
    /// All data is lost when the store is dropped.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_tables (
                name      TEXT NOT NULL PRIMARY KEY,
                spec_json TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_items (
                table_name    TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                sort_key      TEXT NOT NULL,
                item_json     TEXT NOT NULL,
                PRIMARY KEY (table_name, partition_key, sort_key)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }

    // ─── Catalog ────────────────────────────────────────────────────────────────

    /// Load the spec of `table`, if it exists.
    pub async fn table_spec(&self, table: &str) -> Result<Option<TableSpec>, StoreError> {
        let row = sqlx::query("SELECT spec_json FROM kv_tables WHERE name = ?")
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;

        row.map(|r| {
            let json: String = r.get("spec_json");
            serde_json::from_str(&json).map_err(internal)
        })
        .transpose()
    }

    async fn table_key(&self, table: &str) -> Result<KeySchema, StoreError> {
        let spec = self.table_spec(table).await?.ok_or_else(|| not_found(table))?;
        spec.key()
            .ok_or_else(|| internal(format!("catalog entry for {table} has no primary key")))
    }

    /// Names of all tables, sorted.
    pub async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT name FROM kv_tables ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
    }

    // ─── Items ──────────────────────────────────────────────────────────────────

    /// Number of items stored in `table`.
    pub async fn item_count(&self, table: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM kv_items WHERE table_name = ?")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Fetch an item by its primary key values.
    pub async fn get_item(
        &self,
        table: &str,
        partition_key: &str,
        sort_key: &str,
    ) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(
            "SELECT item_json FROM kv_items
             WHERE table_name = ? AND partition_key = ? AND sort_key = ?",
        )
        .bind(table)
        .bind(partition_key)
        .bind(sort_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.map(|r| {
            let json: String = r.get("item_json");
            serde_json::from_str(&json).map_err(internal)
        })
        .transpose()
    }
}

// ─── KvStore impl ────────────────────────────────────────────────────────────

#[async_trait]
impl KvStore for SqliteStore {
    async fn batch_write(&self, group: &WriteGroup) -> Result<BatchWriteOutput, StoreError> {
        let key = self.table_key(&group.table).await?;
        let keys = validate_group(group, &key)?;

        let mut tx = self.pool.begin().await.map_err(internal)?;
        for (request, (pk, sk)) in group.requests.iter().zip(&keys) {
            match request {
                WriteRequest::Put { item } => {
                    let json = serde_json::to_string(item).map_err(internal)?;
                    sqlx::query(
                        "INSERT OR REPLACE INTO kv_items
                         (table_name, partition_key, sort_key, item_json)
                         VALUES (?, ?, ?, ?)",
                    )
                    .bind(&group.table)
                    .bind(pk)
                    .bind(sk)
                    .bind(&json)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                }
                WriteRequest::Delete { .. } => {
                    sqlx::query(
                        "DELETE FROM kv_items
                         WHERE table_name = ? AND partition_key = ? AND sort_key = ?",
                    )
                    .bind(&group.table)
                    .bind(pk)
                    .bind(sk)
                    .execute(&mut *tx)
                    .await
                    .map_err(internal)?;
                }
            }
        }
        tx.commit().await.map_err(internal)?;

        debug!(table = %group.table, batch = group.index, items = keys.len(), "batch committed");
        Ok(BatchWriteOutput::all_processed())
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableDescription, StoreError> {
        if spec.key().is_none() {
            return Err(StoreError::Validation(
                "Key schema must contain a HASH and a RANGE key".into(),
            ));
        }
        if self.table_spec(&spec.name).await?.is_some() {
            return Err(StoreError::ResourceInUse(format!(
                "Table already exists: {}",
                spec.name
            )));
        }

        let json = serde_json::to_string(spec).map_err(internal)?;
        sqlx::query("INSERT INTO kv_tables (name, spec_json) VALUES (?, ?)")
            .bind(&spec.name)
            .bind(&json)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        debug!(table = %spec.name, "table created");
        Ok(TableDescription {
            spec: spec.clone(),
            status: TableStatus::Active,
            item_count: 0,
        })
    }

    async fn delete_table(&self, name: &str) -> Result<TableDescription, StoreError> {
        let spec = self.table_spec(name).await?.ok_or_else(|| not_found(name))?;
        let item_count = self.item_count(name).await?;

        let mut tx = self.pool.begin().await.map_err(internal)?;
        sqlx::query("DELETE FROM kv_items WHERE table_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        sqlx::query("DELETE FROM kv_tables WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(internal)?;
        tx.commit().await.map_err(internal)?;

        debug!(table = name, items = item_count, "table deleted");
        Ok(TableDescription {
            spec,
            status: TableStatus::Deleting,
            item_count,
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
