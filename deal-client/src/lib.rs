//! # deal-client
//!
//! Client for the CRM deal REST webhook.
//!
//! The webhook URL is the only credential; every call is a JSON `POST` to
//! `{webhook}/{method}.json`.
//!
//! ## Features
//!
//! - **Single deal fetch**: absent deals come back as `Ok(None)`
//! - **Filtered listing**: pages of [`PAGE_SIZE`] until the reported total is reached
//! - **Line items**: product rows for one deal
//! - **Transport Abstraction**: reqwest over HTTPS, or a scripted mock for tests
//!
//! ## Example
//!
//! ```ignore
//! use dealsync_client::{DealClient, DealFilter, HttpTransport};
//! use dealsync_types::DealFieldMap;
//!
//! let transport = HttpTransport::new(&webhook_url, Duration::from_secs(20))?;
//! let client = DealClient::new(transport, DealFieldMap::new("UF_CRM_PRICE_TYPE")?);
//!
//! let deal = client.get_deal(17).await?;
//! let deals = client.list_deals(&DealFilter::new().equals("CATEGORY_ID", 0)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod transport;

pub use client::{ClientError, DealClient, DealFilter, PAGE_SIZE};
pub use transport::{HttpTransport, MockTransport, Transport, TransportError};
