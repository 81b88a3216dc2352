//! Mock transport for testing.
//!
//! Allows queueing responses and capturing calls for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// REST method name.
    pub method: String,
    /// JSON parameters.
    pub params: Value,
}

/// Mock transport for testing.
///
/// Responses are handed out in FIFO order regardless of method. Clones share
/// state, so a test can keep a handle after moving one into a client.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    calls: Vec<RecordedCall>,
    responses: VecDeque<Result<Value, TransportError>>,
    fail_next: Option<TransportError>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a body to be returned by the next `call()`.
    pub fn queue_response(&self, body: Value) {
        self.inner().responses.push_back(Ok(body));
    }

    /// Queue an error to be returned in FIFO position.
    pub fn queue_error(&self, error: TransportError) {
        self.inner().responses.push_back(Err(error));
    }

    /// Cause the next `call()` to fail, ahead of anything queued.
    pub fn fail_next(&self, error: TransportError) {
        self.inner().fail_next = Some(error);
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner().calls.clone()
    }

    /// Calls made to one method.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.inner()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// The most recent call.
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.inner().calls.last().cloned()
    }

    /// Number of queued responses not yet consumed.
    pub fn pending(&self) -> usize {
        self.inner().responses.len()
    }

    /// Clear all state (calls, queue, injected failure).
    pub fn reset(&self) {
        *self.inner() = MockTransportInner::default();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        let mut inner = self.inner();
        inner.calls.push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
        });

        if let Some(error) = inner.fail_next.take() {
            return Err(error);
        }

        inner
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::ConnectionFailed("no queued response".into())))
    }
}
