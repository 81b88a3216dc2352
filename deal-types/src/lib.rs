//! # deal-types
//!
//! Record types shared by the dealsync crates.
//!
//! This crate provides:
//! - [`Deal`], [`DealLineItem`] - the local shape of CRM records
//! - [`EligibilityRule`] - the category/price-type gate a deal must pass before it is stored
//! - [`DealFieldMap`], [`LINE_ITEM_FIELDS`] - statically declared remote → local field tables
//! - [`MappingError`], [`Ineligible`] - error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod deal;
mod error;
mod mapping;

pub use deal::{Deal, DealLineItem, EligibilityRule};
pub use error::{Ineligible, MappingError};
pub use mapping::{
    line_item_from_remote, DealFieldMap, FieldMapping, DEAL_COLUMNS, DEAL_FIELDS,
    LINE_ITEM_COLUMNS, LINE_ITEM_FIELDS,
};
