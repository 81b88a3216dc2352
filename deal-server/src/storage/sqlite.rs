//! SQLite storage backend for dealsync-server.

use super::{RowFailure, SqlValue, Table, UpsertReport};
use crate::error::StorageError;
use sqlx::query::{Query, QueryAs};
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions,
};
use std::path::Path;
use std::str::FromStr;

/// SQLite-based deal storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;
        let options = SqliteConnectOptions::from_str(path_str)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create both tables if absent. Safe to run on every start.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deals (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                price_type INTEGER NOT NULL,
                date_create TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deals_products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                deal_id INTEGER NOT NULL REFERENCES deals(id),
                product_id INTEGER NOT NULL,
                product_name TEXT NOT NULL,
                price REAL NOT NULL,
                discount REAL NOT NULL,
                UNIQUE(deal_id, product_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_deals_products_deal_id ON deals_products(deal_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Write records, replacing any stored row with the same unique key.
    ///
    /// All rows go through one transaction. A failing row is logged and
    /// reported but does not stop the rest; the batch fails only when no row
    /// could be written.
    pub async fn upsert_many<T: Table>(&self, records: &[T]) -> Result<UpsertReport, StorageError> {
        if records.is_empty() {
            return Err(StorageError::EmptyBatch { table: T::NAME });
        }

        let sql = upsert_sql::<T>();
        let mut report = UpsertReport::default();
        let mut tx = self.pool.begin().await?;

        for (index, record) in records.iter().enumerate() {
            let query = record
                .values()
                .into_iter()
                .fold(sqlx::query(&sql), bind_value);
            match query.execute(&mut *tx).await {
                Ok(_) => report.applied += 1,
                Err(e) => {
                    tracing::warn!(table = T::NAME, index, error = %e, "row upsert failed");
                    report.failed.push(RowFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.applied == 0 {
            tx.rollback().await?;
            let first = report
                .failed
                .first()
                .map(|f| f.error.clone())
                .unwrap_or_default();
            return Err(StorageError::BatchFailed {
                table: T::NAME,
                count: records.len(),
                first,
            });
        }

        tx.commit().await?;
        tracing::debug!(
            table = T::NAME,
            applied = report.applied,
            failed = report.failed.len(),
            "upsert batch committed"
        );
        Ok(report)
    }

    /// Write one record, replacing any stored row with the same unique key.
    pub async fn upsert_one<T: Table>(&self, record: &T) -> Result<(), StorageError> {
        let sql = upsert_sql::<T>();
        record
            .values()
            .into_iter()
            .fold(sqlx::query(&sql), bind_value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Every row of `T`'s table, in primary-key order.
    pub async fn get_all<T: Table>(&self) -> Result<Vec<T>, StorageError> {
        self.get_filtered::<T>(&[]).await
    }

    /// Rows whose columns equal every `(column, value)` pair, in primary-key order.
    pub async fn get_filtered<T: Table>(
        &self,
        filter: &[(&str, SqlValue)],
    ) -> Result<Vec<T>, StorageError> {
        let mut sql = format!("SELECT {} FROM {}", T::READ_COLUMNS.join(", "), T::NAME);
        for (i, (column, _)) in filter.iter().enumerate() {
            if !T::READ_COLUMNS.contains(column) {
                return Err(StorageError::UnknownColumn {
                    table: T::NAME,
                    column: column.to_string(),
                });
            }
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(column);
            sql.push_str(" = ?");
        }
        sql.push_str(&format!(" ORDER BY {} ASC", T::PRIMARY_KEY));

        let rows = filter
            .iter()
            .map(|(_, value)| value.clone())
            .fold(sqlx::query_as::<_, T::Row>(&sql), bind_value_as)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(T::from_row).collect()
    }

    /// Number of rows in `T`'s table.
    pub async fn count<T: Table>(&self) -> Result<u64, StorageError> {
        let sql = format!("SELECT COUNT(*) FROM {}", T::NAME);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

/// `INSERT ... ON CONFLICT(key) DO UPDATE` over every written column.
fn upsert_sql<T: Table>() -> String {
    let placeholders = vec!["?"; T::COLUMNS.len()].join(", ");
    let updates = T::COLUMNS
        .iter()
        .filter(|c| !T::CONFLICT_KEY.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        T::NAME,
        T::COLUMNS.join(", "),
        placeholders,
        T::CONFLICT_KEY.join(", "),
        updates
    )
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    }
}

fn bind_value_as<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    value: SqlValue,
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    match value {
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    }
}
