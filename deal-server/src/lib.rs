//! # dealsync-server
//!
//! Keeps a local SQLite copy of CRM deals and their product line items.
//!
//! The server:
//! - Holds the CRM webhook URL only in encrypted form on disk
//! - Pulls deals that match the configured eligibility rule
//! - Pulls line items for every stored deal
//! - Serves the stored deals with their line items over HTTP
//!
//! ## Architecture
//!
//! ```text
//!   HTTP client
//!        │
//!   ┌────┴──────────────────────────────┐
//!   │          dealsync-server          │
//!   │  http ──► sync::DealSync          │
//!   │             │          │          │
//!   │   credentials (vault)  DealClient ├──► CRM REST webhook
//!   │             │                     │
//!   │  ┌──────────┴──────────────┐      │
//!   │  │ SQLite: deals,          │      │
//!   │  │         deals_products  │      │
//!   │  └─────────────────────────┘      │
//!   └───────────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `GET /deals`: stored deals with line items
//! - `POST /deals/:id`: fetch and store one eligible deal
//! - `POST /deals/pull`: fetch and store all eligible deals
//! - `POST /deals/products/pull`: fetch and store line items for stored deals
//! - `POST /credential`: encrypt and store the webhook URL

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod storage;
pub mod sync;
