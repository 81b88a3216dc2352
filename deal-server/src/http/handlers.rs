//! Sync route handlers.

use super::AppState;
use crate::error::SyncError;
use crate::sync::TransportFactory;
use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

/// Body of `POST /credential`.
#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    /// Plaintext CRM webhook URL.
    pub webhook_url: String,
}

/// `GET /deals`
pub async fn list_deals<F: TransportFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
) -> Response {
    state
        .run(
            "list_deals",
            state.sync.list_synced_deals_with_line_items(),
        )
        .await
}

/// `POST /deals/:id`
pub async fn add_deal<F: TransportFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
    Path(id): Path<String>,
) -> Response {
    let id: i64 = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return SyncError::Validation(format!("deal id must be an integer, got {id:?}"))
                .into_response()
        }
    };
    state.run("add_deal", state.sync.add_deal_by_id(id)).await
}

/// `POST /deals/pull`
pub async fn pull_deals<F: TransportFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
) -> Response {
    state
        .run("pull_deals", state.sync.pull_eligible_deals())
        .await
}

/// `POST /deals/products/pull`
pub async fn pull_line_items<F: TransportFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
) -> Response {
    state
        .run(
            "pull_line_items",
            state.sync.pull_line_items_for_stored_deals(),
        )
        .await
}

/// `POST /credential`
pub async fn initialize_credential<F: TransportFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
    body: Result<Json<CredentialRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return SyncError::Validation(rejection.body_text()).into_response();
        }
    };
    state
        .run(
            "initialize_credential",
            state.sync.initialize_credential(&request.webhook_url),
        )
        .await
}
