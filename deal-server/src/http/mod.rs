//! HTTP endpoints for dealsync-server.
//!
//! Every sync route runs one [`DealSync`] operation under the configured call
//! timeout and answers with an [`ApiResponse`]:
//!
//! ```json
//! { "success": true,  "data": ... }
//! { "success": false, "message": "..." }
//! ```

pub mod health;
mod handlers;

use crate::error::{SyncError, SyncResult};
use crate::sync::{DealSync, TransportFactory};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use health::HealthStatus;

/// Shared state for all handlers.
pub struct AppState<F: TransportFactory> {
    sync: DealSync<F>,
    call_timeout: Duration,
}

impl<F: TransportFactory> AppState<F> {
    /// Wrap an orchestrator with the per-call timeout.
    pub fn new(sync: DealSync<F>, call_timeout: Duration) -> Self {
        Self { sync, call_timeout }
    }

    /// The orchestrator.
    pub fn sync(&self) -> &DealSync<F> {
        &self.sync
    }

    /// Run one sync operation under the call timeout.
    ///
    /// On timeout the operation future is dropped, which cancels any in-flight
    /// request and rolls back an open transaction.
    async fn run<T, Fut>(&self, operation: &'static str, fut: Fut) -> Response
    where
        T: Serialize,
        Fut: Future<Output = SyncResult<T>>,
    {
        let result = match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.call_timeout.as_secs())),
        };
        match result {
            Ok(data) => {
                tracing::debug!(operation, "sync call succeeded");
                ApiResponse::success(data).into_response()
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "sync call failed");
                e.into_response()
            }
        }
    }
}

/// Body of every sync response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation result, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure description, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// A successful response carrying `data`.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    /// A failed response carrying `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ApiResponse::failure(self.public_message()))).into_response()
    }
}

/// Build the HTTP router with all endpoints.
pub fn build_router<F: TransportFactory>(state: Arc<AppState<F>>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler::<F>))
        .route("/deals", get(handlers::list_deals::<F>))
        .route("/deals/pull", post(handlers::pull_deals::<F>))
        .route("/deals/products/pull", post(handlers::pull_line_items::<F>))
        .route("/deals/:id", post(handlers::add_deal::<F>))
        .route("/credential", post(handlers::initialize_credential::<F>))
        .layer(Extension(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::storage::SqliteStorage;
    use crate::sync::tests::{remote_deal, remote_row, PRICE_FIELD, WEBHOOK};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use deal_client::{MockTransport, Transport, TransportError};
    use deal_types::{Deal, DealFieldMap, DealLineItem, EligibilityRule};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        state: Arc<AppState<MockTransport>>,
        transport: MockTransport,
        _dir: TempDir,
    }

    /// Delays every call before answering from the wrapped mock.
    #[derive(Debug, Clone)]
    struct SlowTransport {
        inner: MockTransport,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Transport for SlowTransport {
        async fn call(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
            tokio::time::sleep(self.delay).await;
            self.inner.call(method, params).await
        }
    }

    impl TransportFactory for SlowTransport {
        type Transport = SlowTransport;

        fn connect(&self, webhook_url: &str) -> Result<Self::Transport, TransportError> {
            self.inner.connect(webhook_url)?;
            Ok(self.clone())
        }
    }

    async fn test_app(with_credential: bool, call_timeout: Duration) -> TestApp {
        let transport = MockTransport::new();
        let (router, state, dir) =
            build_app(transport.clone(), with_credential, call_timeout).await;
        TestApp {
            router,
            state,
            transport,
            _dir: dir,
        }
    }

    async fn build_app<F: TransportFactory>(
        factory: F,
        with_credential: bool,
        call_timeout: Duration,
    ) -> (Router, Arc<AppState<F>>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::new(dir.path().join("credential.json"));
        if with_credential {
            credentials
                .save(&deal_vault::initialize(WEBHOOK).unwrap())
                .await
                .unwrap();
        }
        let sync = DealSync::new(
            SqliteStorage::in_memory().await.unwrap(),
            credentials,
            DealFieldMap::new(PRICE_FIELD).unwrap(),
            EligibilityRule::new(3, 1),
            factory,
        );
        let state = Arc::new(AppState::new(sync, call_timeout));
        (build_router(state.clone()), state, dir)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = test_app(false, Duration::from_secs(5)).await;

        let (status, body) = send(&app.router, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stored_deals"], 0);
    }

    #[tokio::test]
    async fn add_deal_returns_the_stored_deal() {
        let app = test_app(true, Duration::from_secs(5)).await;
        app.transport
            .queue_response(json!({ "result": remote_deal(17, 3, 1) }));

        let (status, body) = send(&app.router, "POST", "/deals/17", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 17);
        assert_eq!(body["data"]["date_create"], "2024-03-01");
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn add_ineligible_deal_is_unprocessable() {
        let app = test_app(true, Duration::from_secs(5)).await;
        app.transport
            .queue_response(json!({ "result": remote_deal(17, 8, 1) }));

        let (status, body) = send(&app.router, "POST", "/deals/17", None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("category_id"));
    }

    #[tokio::test]
    async fn add_deal_with_bad_id_is_bad_request() {
        let app = test_app(true, Duration::from_secs(5)).await;

        let (status, body) = send(&app.router, "POST", "/deals/abc", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(app.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn add_missing_deal_is_not_found() {
        let app = test_app(true, Duration::from_secs(5)).await;
        app.transport.queue_error(TransportError::Api {
            code: "NOT_FOUND".into(),
            description: "Not found".into(),
        });

        let (status, _) = send(&app.router, "POST", "/deals/3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_without_credential_is_conflict() {
        let app = test_app(false, Duration::from_secs(5)).await;

        let (status, body) = send(&app.router, "POST", "/deals/pull", None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "no credential configured");
    }

    #[tokio::test]
    async fn pull_then_list_shows_deals_with_line_items() {
        let app = test_app(true, Duration::from_secs(5)).await;
        app.transport.queue_response(json!({
            "result": [remote_deal(1, 3, 1), remote_deal(2, 3, 1)],
            "total": 2,
        }));
        app.transport
            .queue_response(json!({ "result": [remote_row(10, 12.5)] }));
        app.transport.queue_response(json!({ "result": [] }));

        let (status, body) = send(&app.router, "POST", "/deals/pull", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app.router, "POST", "/deals/products/pull", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["line_items"], 1);

        let (status, body) = send(&app.router, "GET", "/deals", None).await;
        assert_eq!(status, StatusCode::OK);
        let deals = body["data"].as_array().unwrap();
        assert_eq!(deals[0]["deal_id"], 1);
        assert_eq!(deals[0]["deal_title"], "Deal 1");
        assert_eq!(deals[0]["line_items"][0]["price"], 12.5);
        assert!(deals[1]["line_items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn credential_endpoint_initializes_the_vault() {
        let app = test_app(false, Duration::from_secs(5)).await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/credential",
            Some(json!({ "webhook_url": WEBHOOK })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        app.transport
            .queue_response(json!({ "result": remote_deal(4, 3, 1) }));
        let (status, _) = send(&app.router, "POST", "/deals/4", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.state.sync().stored_deal_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn credential_endpoint_rejects_missing_body() {
        let app = test_app(false, Duration::from_secs(5)).await;

        let (status, body) = send(&app.router, "POST", "/credential", Some(json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let app = test_app(true, Duration::from_millis(1)).await;
        let result = app
            .state
            .run("slow", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, SyncError>(())
            })
            .await;

        assert_eq!(result.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn timed_out_deal_pull_writes_nothing() {
        let mock = MockTransport::new();
        mock.queue_response(json!({
            "result": [remote_deal(1, 3, 1), remote_deal(2, 3, 1)],
            "total": 2,
        }));
        let slow = SlowTransport {
            inner: mock.clone(),
            delay: Duration::from_millis(300),
        };
        let (router, state, _dir) = build_app(slow, true, Duration::from_millis(50)).await;

        let (status, body) = send(&router, "POST", "/deals/pull", None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["success"], false);

        // The dropped call must not finish in the background.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(state.sync().stored_deal_count().await.unwrap(), 0);
        assert_eq!(mock.pending(), 1);
    }

    #[tokio::test]
    async fn timed_out_line_item_pull_writes_nothing() {
        let mock = MockTransport::new();
        let slow = SlowTransport {
            inner: mock.clone(),
            delay: Duration::from_millis(100),
        };
        let (router, state, _dir) = build_app(slow, true, Duration::from_millis(250)).await;

        let deals: Vec<Deal> = (1..=3)
            .map(|id| Deal {
                id,
                title: format!("Deal {id}"),
                category_id: 3,
                price_type: 1,
                date_create: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            })
            .collect();
        state.sync().storage().upsert_many(&deals).await.unwrap();
        for product_id in [10, 11, 12] {
            mock.queue_response(json!({ "result": [remote_row(product_id, 5.0)] }));
        }

        // Three fetches at 100ms each overrun the 250ms budget on the third.
        let (status, _) = send(&router, "POST", "/deals/products/pull", None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let storage = state.sync().storage();
        assert_eq!(storage.count::<Deal>().await.unwrap(), 3);
        assert_eq!(storage.count::<DealLineItem>().await.unwrap(), 0);
    }

    #[test]
    fn failure_response_omits_data() {
        let json = serde_json::to_value(ApiResponse::failure("nope")).unwrap();
        assert_eq!(json, json!({"success": false, "message": "nope"}));
    }
}
