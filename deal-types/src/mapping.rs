//! Remote → local field mapping tables.
//!
//! The CRM speaks in upper-case field names (`ID`, `TITLE`, `PRICE_BRUTTO`)
//! and usually sends numbers as JSON strings. The tables here declare, once,
//! which remote field feeds which local column; records are converted by
//! walking the table rather than by ad-hoc key lookups at call sites.
//!
//! The only configurable entry is the deal's price-type field, which is a
//! per-portal custom field (`UF_CRM_...`). [`DealFieldMap::new`] validates the
//! complete deal table before it can be used.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use crate::{Deal, DealLineItem, MappingError};

/// One remote field feeding one local column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    /// CRM field name.
    pub remote: &'static str,
    /// Local column name.
    pub local: &'static str,
}

const fn field(remote: &'static str, local: &'static str) -> FieldMapping {
    FieldMapping { remote, local }
}

/// Fixed part of the deal mapping. `price_type` is added by [`DealFieldMap`].
pub const DEAL_FIELDS: [FieldMapping; 4] = [
    field("ID", "id"),
    field("TITLE", "title"),
    field("CATEGORY_ID", "category_id"),
    field("DATE_CREATE", "date_create"),
];

/// Columns of the `deals` table, in insert order.
pub const DEAL_COLUMNS: [&str; 5] = ["id", "title", "category_id", "price_type", "date_create"];

/// Line-item mapping (`crm.deal.productrows.get` rows).
pub const LINE_ITEM_FIELDS: [FieldMapping; 4] = [
    field("PRODUCT_ID", "product_id"),
    field("PRODUCT_NAME", "product_name"),
    field("PRICE_BRUTTO", "price"),
    field("DISCOUNT_SUM", "discount"),
];

/// Columns of the `deals_products` table written on upsert, in insert order.
pub const LINE_ITEM_COLUMNS: [&str; 5] =
    ["deal_id", "product_id", "product_name", "price", "discount"];

/// Validated deal mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealFieldMap {
    entries: Vec<(String, &'static str)>,
}

impl DealFieldMap {
    /// Build the deal table with the portal's price-type field and validate it.
    pub fn new(price_type_field: &str) -> Result<Self, MappingError> {
        let mut entries: Vec<(String, &'static str)> = DEAL_FIELDS
            .iter()
            .map(|m| (m.remote.to_string(), m.local))
            .collect();
        entries.push((price_type_field.to_string(), "price_type"));

        let map = Self { entries };
        map.validate()?;
        Ok(map)
    }

    /// Check that every `deals` column has exactly one well-formed remote source.
    pub fn validate(&self) -> Result<(), MappingError> {
        for (remote, _) in &self.entries {
            if !is_field_name(remote) {
                return Err(MappingError::InvalidFieldName(remote.clone()));
            }
        }
        for (i, (remote, _)) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|(r, _)| r == remote) {
                return Err(MappingError::DuplicateRemoteField(remote.clone()));
            }
        }
        for column in DEAL_COLUMNS {
            if self.remote_field(column).is_none() {
                return Err(MappingError::Unmapped(column.to_string()));
            }
        }
        Ok(())
    }

    /// Remote field feeding a local column.
    pub fn remote_field(&self, local: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, l)| *l == local)
            .map(|(r, _)| r.as_str())
    }

    /// The portal-specific price-type field.
    pub fn price_type_field(&self) -> &str {
        self.remote_field("price_type").unwrap_or_default()
    }

    /// Remote field names to request in `select`.
    pub fn select_fields(&self) -> Vec<String> {
        self.entries.iter().map(|(r, _)| r.clone()).collect()
    }

    /// Convert one remote deal object into a [`Deal`].
    pub fn deal_from_remote(&self, record: &Value) -> Result<Deal, MappingError> {
        let obj = record.as_object().ok_or(MappingError::NotAnObject)?;
        let id_field = self.source("id")?;
        let id = int_field(obj, id_field)?;
        if id <= 0 {
            return Err(invalid(id_field, &Value::from(id)));
        }
        Ok(Deal {
            id,
            title: text_field(obj, self.source("title")?)?,
            category_id: int_field(obj, self.source("category_id")?)?,
            price_type: int_field(obj, self.source("price_type")?)?,
            date_create: date_field(obj, self.source("date_create")?)?,
        })
    }

    fn source(&self, local: &str) -> Result<&str, MappingError> {
        self.remote_field(local)
            .ok_or_else(|| MappingError::Unmapped(local.to_string()))
    }
}

/// Convert one remote product row into a [`DealLineItem`] for `deal_id`.
pub fn line_item_from_remote(deal_id: i64, record: &Value) -> Result<DealLineItem, MappingError> {
    let obj = record.as_object().ok_or(MappingError::NotAnObject)?;
    let [product_id, product_name, price, discount] = LINE_ITEM_FIELDS;
    Ok(DealLineItem {
        id: None,
        deal_id,
        product_id: int_field(obj, product_id.remote)?,
        product_name: text_field(obj, product_name.remote)?,
        price: decimal_field(obj, price.remote)?,
        discount: decimal_field(obj, discount.remote)?,
    })
}

/// CRM field identifiers: upper-case ASCII, digits and underscores.
fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn present<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a Value, MappingError> {
    match obj.get(name) {
        Some(Value::Null) | None => Err(MappingError::MissingField {
            field: name.to_string(),
        }),
        Some(v) => Ok(v),
    }
}

fn invalid(name: &str, value: &Value) -> MappingError {
    MappingError::InvalidValue {
        field: name.to_string(),
        value: value.to_string(),
    }
}

fn int_field(obj: &Map<String, Value>, name: &str) -> Result<i64, MappingError> {
    let value = present(obj, name)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(name, value))
}

/// A float that is a whole number inside the `i64` range.
fn whole_i64(f: f64) -> Option<i64> {
    // i64::MIN is exactly -2^63; 2^63 itself is out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then_some(f as i64)
}

fn decimal_field(obj: &Map<String, Value>, name: &str) -> Result<f64, MappingError> {
    let value = present(obj, name)?;
    let parsed: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(name, value))
}

fn text_field(obj: &Map<String, Value>, name: &str) -> Result<String, MappingError> {
    match obj.get(name) {
        // Untitled deals come back as null.
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(invalid(name, other)),
    }
}

fn date_field(obj: &Map<String, Value>, name: &str) -> Result<NaiveDate, MappingError> {
    let value = present(obj, name)?;
    let text = value.as_str().ok_or_else(|| invalid(name, value))?;
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| invalid(name, value))
}
