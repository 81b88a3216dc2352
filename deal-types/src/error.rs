//! Error types for dealsync records.

use thiserror::Error;

/// Errors raised while translating a remote CRM record into a local one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The remote record was not a JSON object.
    #[error("remote record is not an object")]
    NotAnObject,

    /// A required remote field was absent or null.
    #[error("missing remote field: {field}")]
    MissingField {
        /// Remote field name.
        field: String,
    },

    /// A remote field could not be converted to the local type.
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Remote field name.
        field: String,
        /// The offending value, as JSON text.
        value: String,
    },

    /// A configured remote field name is not a valid CRM field identifier.
    #[error("invalid remote field name: {0:?}")]
    InvalidFieldName(String),

    /// Two local columns were mapped from the same remote field.
    #[error("remote field {0} is mapped more than once")]
    DuplicateRemoteField(String),

    /// A local column has no remote source.
    #[error("local column {0} has no remote field")]
    Unmapped(String),
}

/// A deal that failed the category/price-type eligibility check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("deal {deal_id} is not eligible: {field} is {actual}, expected {expected}")]
pub struct Ineligible {
    /// The rejected deal.
    pub deal_id: i64,
    /// Local column that failed the check.
    pub field: &'static str,
    /// Accepted value.
    pub expected: i64,
    /// Value carried by the deal.
    pub actual: i64,
}
