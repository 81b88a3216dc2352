//! Deal and line-item records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Ineligible;

/// A CRM sales opportunity, in the local schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    /// Remote-assigned identifier (primary key, immutable once stored).
    pub id: i64,
    /// Deal title.
    pub title: String,
    /// CRM pipeline category.
    pub category_id: i64,
    /// CRM price type.
    pub price_type: i64,
    /// Creation date reported by the CRM.
    pub date_create: NaiveDate,
}

/// A priced product row attached to a [`Deal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealLineItem {
    /// Local synthetic id. `None` until the row has been stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owning deal.
    pub deal_id: i64,
    /// CRM product id (0 for free-form rows).
    pub product_id: i64,
    /// Product display name.
    pub product_name: String,
    /// Gross unit price.
    pub price: f64,
    /// Discount amount.
    pub discount: f64,
}

/// The category/price-type gate a deal must pass to enter the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRule {
    /// Accepted `category_id`.
    pub category_id: i64,
    /// Accepted `price_type`.
    pub price_type: i64,
}

impl EligibilityRule {
    /// Create a rule accepting exactly one category and one price type.
    pub fn new(category_id: i64, price_type: i64) -> Self {
        Self {
            category_id,
            price_type,
        }
    }

    /// Check a deal against the rule.
    ///
    /// Category is checked first, so a deal failing both reports `category_id`.
    pub fn check(&self, deal: &Deal) -> Result<(), Ineligible> {
        if deal.category_id != self.category_id {
            return Err(Ineligible {
                deal_id: deal.id,
                field: "category_id",
                expected: self.category_id,
                actual: deal.category_id,
            });
        }
        if deal.price_type != self.price_type {
            return Err(Ineligible {
                deal_id: deal.id,
                field: "price_type",
                expected: self.price_type,
                actual: deal.price_type,
            });
        }
        Ok(())
    }

    /// Whether the deal passes the rule.
    pub fn accepts(&self, deal: &Deal) -> bool {
        self.check(deal).is_ok()
    }
}
