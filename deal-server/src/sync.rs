//! Deal synchronization orchestrator.
//!
//! [`DealSync`] runs one sync operation per call and keeps no state between
//! calls beyond the local store and the credential file:
//!
//! ```text
//! credential file → decrypt → DealClient → remote records
//!                                  ↓
//!                    eligibility / mapping → SqliteStorage upsert
//! ```
//!
//! Failure policy: a single-deal add surfaces every failure to the caller.
//! Bulk pulls degrade remote failures to empty results and log the shortfall.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use deal_client::{DealClient, DealFilter, HttpTransport, Transport, TransportError};
use deal_types::{Deal, DealFieldMap, DealLineItem, EligibilityRule};
use deal_vault::VaultError;
use serde::Serialize;

use crate::credentials::CredentialStore;
use crate::error::{StorageError, SyncError, SyncResult};
use crate::storage::{SqliteStorage, UpsertReport};

/// Builds a transport for a decrypted webhook URL.
pub trait TransportFactory: Send + Sync + 'static {
    /// Transport produced by this factory.
    type Transport: Transport + 'static;

    /// Create a transport bound to `webhook_url`.
    fn connect(&self, webhook_url: &str) -> Result<Self::Transport, TransportError>;
}

/// Factory for [`HttpTransport`] with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    timeout: Duration,
}

impl HttpTransportFactory {
    /// Create a factory whose transports time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for HttpTransportFactory {
    type Transport = HttpTransport;

    fn connect(&self, webhook_url: &str) -> Result<HttpTransport, TransportError> {
        HttpTransport::new(webhook_url, self.timeout)
    }
}

/// A stored deal with its line items, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncedDeal {
    /// Deal id.
    pub deal_id: i64,
    /// Creation date (`YYYY-MM-DD`).
    pub date_create: NaiveDate,
    /// Deal title.
    pub deal_title: String,
    /// Stored line items of the deal.
    pub line_items: Vec<LineItemView>,
}

/// Line item fields exposed in [`SyncedDeal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemView {
    /// CRM product id.
    pub product_id: i64,
    /// Product display name.
    pub product_name: String,
    /// Gross unit price.
    pub price: f64,
    /// Discount amount.
    pub discount: f64,
}

impl From<DealLineItem> for LineItemView {
    fn from(item: DealLineItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name,
            price: item.price,
            discount: item.discount,
        }
    }
}

/// Result of pulling line items for every stored deal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemPull {
    /// Number of stored deals processed.
    pub total: usize,
    /// The stored deals processed.
    pub deals: Vec<Deal>,
    /// Line items written.
    pub line_items: usize,
    /// Deals whose remote fetch failed.
    pub failed_deals: usize,
}

/// The sync orchestrator.
pub struct DealSync<F: TransportFactory = HttpTransportFactory> {
    storage: SqliteStorage,
    credentials: CredentialStore,
    fields: DealFieldMap,
    rule: EligibilityRule,
    factory: F,
}

impl<F: TransportFactory> std::fmt::Debug for DealSync<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DealSync")
            .field("storage", &self.storage)
            .field("credentials", &self.credentials)
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

impl<F: TransportFactory> DealSync<F> {
    /// Create an orchestrator.
    pub fn new(
        storage: SqliteStorage,
        credentials: CredentialStore,
        fields: DealFieldMap,
        rule: EligibilityRule,
        factory: F,
    ) -> Self {
        Self {
            storage,
            credentials,
            fields,
            rule,
            factory,
        }
    }

    /// Get access to the storage layer.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Load and decrypt the credential, then bind a client to it.
    async fn client(&self) -> SyncResult<DealClient<F::Transport>> {
        let credential = self
            .credentials
            .load()
            .await?
            .ok_or(SyncError::CredentialMissing)?;
        let webhook_url = credential.decrypt().map_err(SyncError::Decryption)?;
        let transport = self
            .factory
            .connect(&webhook_url)
            .map_err(deal_client::ClientError::from)?;
        Ok(DealClient::new(transport, self.fields.clone()))
    }

    /// Fetch one deal, check eligibility and store it.
    ///
    /// Every failure is surfaced: absent deal, unreachable CRM, ineligible
    /// deal (nothing is written) or store failure.
    pub async fn add_deal_by_id(&self, id: i64) -> SyncResult<Deal> {
        if id <= 0 {
            return Err(SyncError::Validation(format!("deal id must be positive, got {id}")));
        }
        let client = self.client().await?;

        let deal = match client.get_deal(id).await {
            Ok(Some(deal)) => deal,
            Ok(None) => return Err(SyncError::NotFound(id)),
            Err(e) => {
                tracing::error!(deal_id = id, error = %e, transient = e.is_transient(), "deal fetch failed");
                return Err(e.into());
            }
        };

        if let Err(ineligible) = self.rule.check(&deal) {
            tracing::warn!(deal_id = id, reason = %ineligible, "deal rejected");
            return Err(ineligible.into());
        }

        self.storage.upsert_one(&deal).await?;
        tracing::info!(deal_id = id, "deal stored");
        Ok(deal)
    }

    /// Fetch every deal matching the eligibility rule and store them.
    ///
    /// A failed listing degrades to an empty result. Returns the deals that
    /// were written.
    pub async fn pull_eligible_deals(&self) -> SyncResult<Vec<Deal>> {
        let client = self.client().await?;
        let filter = DealFilter::for_rule(&self.fields, &self.rule);

        let fetched = match client.list_deals(&filter).await {
            Ok(deals) => deals,
            Err(e) => {
                tracing::warn!(error = %e, "deal listing failed, nothing pulled");
                Vec::new()
            }
        };

        let (eligible, rejected): (Vec<Deal>, Vec<Deal>) =
            fetched.into_iter().partition(|d| self.rule.accepts(d));
        for deal in &rejected {
            if let Err(reason) = self.rule.check(deal) {
                tracing::warn!(deal_id = deal.id, %reason, "skipping ineligible deal");
            }
        }

        if eligible.is_empty() {
            tracing::info!(rejected = rejected.len(), "no eligible deals to store");
            return Ok(eligible);
        }

        let report = self.storage.upsert_many(&eligible).await?;
        tracing::info!(
            stored = report.applied,
            failed = report.failed.len(),
            rejected = rejected.len(),
            "eligible deals pulled"
        );
        Ok(applied_only(eligible, &report))
    }

    /// Fetch and store line items for every stored deal.
    ///
    /// A deal whose fetch fails is logged and counted in `failed_deals`; the
    /// other deals are still processed.
    pub async fn pull_line_items_for_stored_deals(&self) -> SyncResult<LineItemPull> {
        let client = self.client().await?;
        let deals: Vec<Deal> = self.storage.get_all().await?;

        let mut items = Vec::new();
        let mut failed_deals = 0;
        for deal in &deals {
            match client.get_line_items(deal.id).await {
                Ok(fetched) => items.extend(fetched),
                Err(e) => {
                    failed_deals += 1;
                    tracing::warn!(deal_id = deal.id, error = %e, "line item fetch failed");
                }
            }
        }

        let line_items = if items.is_empty() {
            0
        } else {
            self.storage.upsert_many(&items).await?.applied
        };

        tracing::info!(
            deals = deals.len(),
            line_items,
            failed_deals,
            "line items pulled"
        );
        Ok(LineItemPull {
            total: deals.len(),
            deals,
            line_items,
            failed_deals,
        })
    }

    /// Every stored deal with its stored line items, in deal id order.
    pub async fn list_synced_deals_with_line_items(&self) -> SyncResult<Vec<SyncedDeal>> {
        let deals: Vec<Deal> = self.storage.get_all().await?;
        let items: Vec<DealLineItem> = self.storage.get_all().await?;

        let mut by_deal: BTreeMap<i64, Vec<LineItemView>> = BTreeMap::new();
        for item in items {
            by_deal.entry(item.deal_id).or_default().push(item.into());
        }

        Ok(deals
            .into_iter()
            .map(|deal| SyncedDeal {
                line_items: by_deal.remove(&deal.id).unwrap_or_default(),
                deal_id: deal.id,
                date_create: deal.date_create,
                deal_title: deal.title,
            })
            .collect())
    }

    /// Seal `webhook_url` under a fresh key and IV and save it.
    ///
    /// Replaces any existing credential.
    pub async fn initialize_credential(&self, webhook_url: &str) -> SyncResult<()> {
        let webhook_url = webhook_url.trim();
        if webhook_url.is_empty() {
            return Err(SyncError::Validation("webhook_url is required".into()));
        }
        if let Err(e) = self.factory.connect(webhook_url) {
            return Err(SyncError::Validation(format!("webhook_url rejected: {e}")));
        }

        let credential = deal_vault::initialize(webhook_url).map_err(|e| match e {
            VaultError::EmptySecret => SyncError::Validation("webhook_url is required".into()),
            other => SyncError::Encryption(other),
        })?;
        self.credentials.save(&credential).await?;
        Ok(())
    }

    /// Number of stored deals.
    pub async fn stored_deal_count(&self) -> Result<u64, StorageError> {
        self.storage.count::<Deal>().await
    }
}

/// Drop the records whose row failed in `report`.
fn applied_only<T>(records: Vec<T>, report: &UpsertReport) -> Vec<T> {
    if report.is_complete() {
        return records;
    }
    records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !report.failed.iter().any(|f| f.index == *i))
        .map(|(_, r)| r)
        .collect()
}

#[cfg(test)]
impl TransportFactory for deal_client::MockTransport {
    type Transport = deal_client::MockTransport;

    fn connect(&self, webhook_url: &str) -> Result<Self::Transport, TransportError> {
        if !webhook_url.starts_with("http") {
            return Err(TransportError::InvalidUrl);
        }
        Ok(self.clone())
    }
}
