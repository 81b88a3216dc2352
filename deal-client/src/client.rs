//! DealClient - the remote side of dealsync.
//!
//! This module provides [`DealClient`], which turns CRM REST responses into
//! local [`Deal`] and [`DealLineItem`] records.
//!
//! # Architecture
//!
//! ```text
//! DealSync → DealClient → Transport → CRM webhook
//!                ↓
//!          DealFieldMap (remote → local mapping)
//! ```
//!
//! # Pagination
//!
//! `crm.deal.list` returns at most [`PAGE_SIZE`] records per call together
//! with the total number of matches. The client requests offsets `0, 50,
//! 100, ...` until `offset >= total`. A page that contradicts the running
//! total (total changes mid-listing, an empty page before the end, more
//! records than announced) aborts the listing with
//! [`ClientError::Protocol`] instead of looping or silently truncating.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use deal_types::{
    line_item_from_remote, Deal, DealFieldMap, DealLineItem, EligibilityRule, MappingError,
};

use crate::transport::{Transport, TransportError};

/// Records per `crm.deal.list` page. Fixed by the CRM.
pub const PAGE_SIZE: u64 = 50;

const METHOD_GET: &str = "crm.deal.get";
const METHOD_LIST: &str = "crm.deal.list";
const METHOD_PRODUCT_ROWS: &str = "crm.deal.productrows.get";

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A remote record could not be mapped to the local schema.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The remote response broke the API contract.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_transient())
    }
}

/// Equality filter for `crm.deal.list`, all entries AND-ed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealFilter {
    entries: Vec<(String, Value)>,
}

impl DealFilter {
    /// An empty filter (matches every deal).
    pub fn new() -> Self {
        Self::default()
    }

    /// The filter selecting deals that pass `rule`.
    pub fn for_rule(fields: &DealFieldMap, rule: &EligibilityRule) -> Self {
        let category = fields.remote_field("category_id").unwrap_or("CATEGORY_ID");
        Self::new()
            .equals(category, rule.category_id)
            .equals(fields.price_type_field(), rule.price_type)
    }

    /// Add an equality condition on a remote field.
    pub fn equals(mut self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field.to_string(), value)),
        }
        self
    }

    fn to_json(&self) -> Value {
        let map: Map<String, Value> = self.entries.iter().cloned().collect();
        Value::Object(map)
    }
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    result: Vec<Value>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    result: Value,
}

/// Client for the CRM deal endpoints.
pub struct DealClient<T: Transport> {
    transport: T,
    fields: DealFieldMap,
}

impl<T: Transport> DealClient<T> {
    /// Create a client over a transport with a validated field map.
    pub fn new(transport: T, fields: DealFieldMap) -> Self {
        Self { transport, fields }
    }

    /// The field map used to translate records.
    pub fn fields(&self) -> &DealFieldMap {
        &self.fields
    }

    /// Fetch one deal by id.
    ///
    /// Returns `Ok(None)` when the CRM reports the deal does not exist.
    pub async fn get_deal(&self, id: i64) -> Result<Option<Deal>, ClientError> {
        let body = match self.transport.call(METHOD_GET, &json!({ "id": id })).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let body: ResultBody = serde_json::from_value(body)
            .map_err(|e| ClientError::Protocol(format!("{METHOD_GET}: {e}")))?;
        match body.result {
            Value::Null => Ok(None),
            Value::Array(ref items) if items.is_empty() => Ok(None),
            record => Ok(Some(self.fields.deal_from_remote(&record)?)),
        }
    }

    /// List every deal matching `filter`, one page of [`PAGE_SIZE`] at a time.
    ///
    /// Records that cannot be mapped are logged and skipped; they still count
    /// toward the announced total.
    pub async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, ClientError> {
        let mut deals = Vec::new();
        let mut received: u64 = 0;
        let mut expected_total: Option<u64> = None;
        let mut offset: u64 = 0;

        loop {
            let page = self.fetch_page(filter, offset).await?;
            let total = page
                .total
                .ok_or_else(|| ClientError::Protocol(format!("{METHOD_LIST}: missing total")))?;

            match expected_total {
                None => expected_total = Some(total),
                Some(first) if first != total => {
                    return Err(ClientError::Protocol(format!(
                        "{METHOD_LIST}: total changed from {first} to {total} at offset {offset}"
                    )))
                }
                Some(_) => {}
            }

            if page.result.is_empty() && offset < total {
                return Err(ClientError::Protocol(format!(
                    "{METHOD_LIST}: empty page at offset {offset} of {total}"
                )));
            }

            received += page.result.len() as u64;
            if received > total {
                return Err(ClientError::Protocol(format!(
                    "{METHOD_LIST}: received {received} records, total is {total}"
                )));
            }

            tracing::debug!(offset, count = page.result.len(), total, "deal page");
            for record in &page.result {
                match self.fields.deal_from_remote(record) {
                    Ok(deal) => deals.push(deal),
                    Err(e) => tracing::warn!(offset, error = %e, "skipping unmappable deal"),
                }
            }

            if total < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
            if offset >= total {
                break;
            }
        }

        let total = expected_total.unwrap_or_default();
        if received != total {
            return Err(ClientError::Protocol(format!(
                "{METHOD_LIST}: received {received} records, total is {total}"
            )));
        }
        Ok(deals)
    }

    /// Fetch the product rows of one deal.
    ///
    /// Rows that cannot be mapped are logged and skipped.
    pub async fn get_line_items(&self, deal_id: i64) -> Result<Vec<DealLineItem>, ClientError> {
        let body = self
            .transport
            .call(METHOD_PRODUCT_ROWS, &json!({ "id": deal_id }))
            .await?;
        let body: ResultBody = serde_json::from_value(body)
            .map_err(|e| ClientError::Protocol(format!("{METHOD_PRODUCT_ROWS}: {e}")))?;

        let rows = match body.result {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => {
                return Err(ClientError::Protocol(format!(
                    "{METHOD_PRODUCT_ROWS}: expected array, got {other}"
                )))
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            match line_item_from_remote(deal_id, row) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(deal_id, error = %e, "skipping unmappable line item"),
            }
        }
        Ok(items)
    }

    async fn fetch_page(&self, filter: &DealFilter, offset: u64) -> Result<ListPage, ClientError> {
        let params = json!({
            "filter": filter.to_json(),
            "select": self.fields.select_fields(),
            "order": { "ID": "ASC" },
            "start": offset,
        });
        let body = self.transport.call(METHOD_LIST, &params).await?;
        serde_json::from_value(body)
            .map_err(|e| ClientError::Protocol(format!("{METHOD_LIST}: {e}")))
    }
}
