//! reqwest transport for the CRM REST webhook.
//!
//! The webhook URL embeds the access token, so it is never written to logs or
//! error messages. reqwest errors are stripped of their URL before they are
//! turned into [`TransportError`]s.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{Transport, TransportError};

/// HTTP transport posting JSON to `{webhook}/{method}.json`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for a webhook URL with a per-request timeout.
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let parsed = Url::parse(webhook_url.trim()).map_err(|_| TransportError::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(TransportError::InvalidUrl);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.without_url().to_string()))?;

        let base_url = webhook_url.trim().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}.json", self.base_url, method)
    }

    fn host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_default()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("host", &self.host())
            .finish_non_exhaustive()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Decode(err.without_url().to_string())
    } else {
        TransportError::ConnectionFailed(err.without_url().to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        tracing::debug!(method, host = %self.host(), "crm call");

        let resp = self
            .http
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(map_reqwest_error)?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(TransportError::Decode(e.to_string())),
        };

        if let Some(api_error) = TransportError::from_api_body(&body) {
            tracing::debug!(method, error = %api_error, "crm api error");
            return Err(api_error);
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBHOOK: &str = "https://portal.example.com/rest/1/s3cr3t-token/";

    #[test]
    fn method_url_joins_without_double_slash() {
        let transport = HttpTransport::new(WEBHOOK, Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.method_url("crm.deal.list"),
            "https://portal.example.com/rest/1/s3cr3t-token/crm.deal.list.json"
        );
    }

    #[test]
    fn debug_output_hides_the_token() {
        let transport = HttpTransport::new(WEBHOOK, Duration::from_secs(5)).unwrap();
        let debug = format!("{transport:?}");
        assert!(debug.contains("portal.example.com"));
        assert!(!debug.contains("s3cr3t-token"));
    }

    #[test]
    fn rejects_non_http_urls() {
        for url in ["", "not a url", "ftp://portal.example.com/rest/", "mailto:a@b"] {
            assert_eq!(
                HttpTransport::new(url, Duration::from_secs(5)).unwrap_err(),
                TransportError::InvalidUrl
            );
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transient_error() {
        // Port 9 on localhost (discard) is closed on any sane test machine.
        let transport =
            HttpTransport::new("http://127.0.0.1:9/rest/1/x/", Duration::from_secs(2)).unwrap();
        let err = transport
            .call("crm.deal.get", &serde_json::json!({"id": 1}))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(!err.to_string().contains("/rest/1/x"));
    }
}
