//! Storage layer for dealsync-server.
//!
//! Two tables, `deals` and `deals_products`, written only through
//! replace-on-conflict upserts and read back in primary-key order.
//!
//! Each stored record type implements [`Table`], which declares its table
//! name, written columns and conflict key, so the SQLite backend can build
//! one statement per table without per-type SQL.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use chrono::NaiveDate;
use deal_types::{Deal, DealLineItem, DEAL_COLUMNS, LINE_ITEM_COLUMNS};
use sqlx::sqlite::SqliteRow;

/// A value bound into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Text(v.format("%Y-%m-%d").to_string())
    }
}

/// A record type stored in one table.
pub trait Table: Sized + Send + Sync + 'static {
    /// Table name.
    const NAME: &'static str;
    /// Columns written on upsert, in the order of [`Table::values`].
    const COLUMNS: &'static [&'static str];
    /// Unique key used for replace-on-conflict.
    const CONFLICT_KEY: &'static [&'static str];
    /// Columns that can be read and filtered on.
    const READ_COLUMNS: &'static [&'static str];
    /// Primary key, used for read ordering.
    const PRIMARY_KEY: &'static str;

    /// Row type decoded by sqlx.
    type Row: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin + 'static;

    /// Values for [`Table::COLUMNS`].
    fn values(&self) -> Vec<SqlValue>;

    /// Convert a decoded row back into the record.
    fn from_row(row: Self::Row) -> Result<Self, StorageError>;
}

/// Outcome of a batch upsert.
#[derive(Debug, Default)]
pub struct UpsertReport {
    /// Rows written.
    pub applied: usize,
    /// Rows that failed, by input position.
    pub failed: Vec<RowFailure>,
}

impl UpsertReport {
    /// Whether every row was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One row that could not be written.
#[derive(Debug)]
pub struct RowFailure {
    /// Index of the record in the input slice.
    pub index: usize,
    /// Database error text.
    pub error: String,
}

/// Internal row type for `deals`.
#[derive(sqlx::FromRow)]
pub struct DealRow {
    id: i64,
    title: String,
    category_id: i64,
    price_type: i64,
    date_create: NaiveDate,
}

impl Table for Deal {
    const NAME: &'static str = "deals";
    const COLUMNS: &'static [&'static str] = &DEAL_COLUMNS;
    const CONFLICT_KEY: &'static [&'static str] = &["id"];
    const READ_COLUMNS: &'static [&'static str] = &DEAL_COLUMNS;
    const PRIMARY_KEY: &'static str = "id";

    type Row = DealRow;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.title.as_str().into(),
            self.category_id.into(),
            self.price_type.into(),
            self.date_create.into(),
        ]
    }

    fn from_row(row: DealRow) -> Result<Self, StorageError> {
        Ok(Deal {
            id: row.id,
            title: row.title,
            category_id: row.category_id,
            price_type: row.price_type,
            date_create: row.date_create,
        })
    }
}

/// Internal row type for `deals_products`.
#[derive(sqlx::FromRow)]
pub struct LineItemRow {
    id: i64,
    deal_id: i64,
    product_id: i64,
    product_name: String,
    price: f64,
    discount: f64,
}

impl Table for DealLineItem {
    const NAME: &'static str = "deals_products";
    const COLUMNS: &'static [&'static str] = &LINE_ITEM_COLUMNS;
    const CONFLICT_KEY: &'static [&'static str] = &["deal_id", "product_id"];
    const READ_COLUMNS: &'static [&'static str] = &[
        "id",
        "deal_id",
        "product_id",
        "product_name",
        "price",
        "discount",
    ];
    const PRIMARY_KEY: &'static str = "id";

    type Row = LineItemRow;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.deal_id.into(),
            self.product_id.into(),
            self.product_name.as_str().into(),
            self.price.into(),
            self.discount.into(),
        ]
    }

    fn from_row(row: LineItemRow) -> Result<Self, StorageError> {
        if !row.price.is_finite() || !row.discount.is_finite() {
            return Err(StorageError::InvalidRow {
                table: Self::NAME,
                reason: format!("non-finite amount in row {}", row.id),
            });
        }
        Ok(DealLineItem {
            id: Some(row.id),
            deal_id: row.deal_id,
            product_id: row.product_id,
            product_name: row.product_name,
            price: row.price,
            discount: row.discount,
        })
    }
}
