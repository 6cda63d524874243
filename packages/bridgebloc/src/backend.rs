//! Relay Backend Client
//!
//! Registers a confirmed deposit with the relay backend so it can settle the
//! transfer on the destination chain, and fetches the route table.
//!
//! Endpoints:
//! - POST {base}/conversions/cctp   (Authorization: `Signature <address>:<signature>`)
//! - GET  {base}/conversions/routes
//!
//! The backend is idempotent on `tx_hash`, so transient failures are retried.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::types::Authorization;

/// Destination routes per source chain: `source -> destination -> route name`
pub type RouteTable = BTreeMap<String, BTreeMap<String, String>>;

#[async_trait]
pub trait BackendNotifier: Send + Sync {
    /// Register `tx_hash` for settlement and return the backend's tracking id
    async fn notify(
        &self,
        authorization: &Authorization,
        tx_hash: TxHash,
        source_chain: &str,
        destination_chain: &str,
    ) -> Result<String, TransferError>;
}

/// Request body for a conversion registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionRequest {
    pub tx_hash: String,
    pub source_chain: String,
    pub destination_chain: String,
}

/// Backend response wrapper
#[derive(Debug, Clone, Deserialize)]
struct BackendResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct ConversionCreated {
    id: serde_json::Value,
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    /// Path of the conversion registration endpoint
    pub conversion_path: String,
    pub timeout_ms: u64,
    /// Attempts for transient failures (connection errors, 5xx); at least 1
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl HttpBackendConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            conversion_path: "/conversions/cctp".to_string(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

/// reqwest-backed [`BackendNotifier`]
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Fetch the route table
    pub async fn fetch_routes(&self) -> Result<RouteTable, TransferError> {
        let url = self.url("/conversions/routes");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransferError::NetworkUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let body: BackendResponse<RouteTable> = resp.json().await.map_err(|e| {
            TransferError::BackendRejected {
                status: status.as_u16(),
                message: format!("malformed routes response: {}", e),
            }
        })?;
        Ok(body.data)
    }

    async fn post_conversion(
        &self,
        authorization: &Authorization,
        request: &ConversionRequest,
    ) -> Result<String, TransferError> {
        let url = self.url(&self.config.conversion_path);
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization.header_value())
            .json(request)
            .send()
            .await
            .map_err(|e| TransferError::NetworkUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let body: BackendResponse<ConversionCreated> =
            resp.json().await.map_err(|e| TransferError::BackendRejected {
                status: status.as_u16(),
                message: format!("malformed conversion response: {}", e),
            })?;

        match body.data.id {
            serde_json::Value::String(id) if !id.is_empty() => Ok(id),
            serde_json::Value::Number(id) => Ok(id.to_string()),
            other => Err(TransferError::BackendRejected {
                status: status.as_u16(),
                message: format!("unexpected conversion id: {}", other),
            }),
        }
    }
}

/// 5xx is worth retrying, everything else is a rejection
fn status_error(status: u16, body: String) -> TransferError {
    if status >= 500 {
        TransferError::NetworkUnavailable(format!("backend returned status {}: {}", status, body))
    } else {
        TransferError::BackendRejected {
            status,
            message: body,
        }
    }
}

#[async_trait]
impl BackendNotifier for HttpBackend {
    async fn notify(
        &self,
        authorization: &Authorization,
        tx_hash: TxHash,
        source_chain: &str,
        destination_chain: &str,
    ) -> Result<String, TransferError> {
        let request = ConversionRequest {
            tx_hash: tx_hash.to_string(),
            source_chain: source_chain.to_string(),
            destination_chain: destination_chain.to_string(),
        };
        let attempts = self.config.retry_attempts.max(1);

        for attempt in 1..=attempts {
            debug!(tx_hash = %tx_hash, attempt, "Posting conversion to backend");
            match self.post_conversion(authorization, &request).await {
                Ok(id) => {
                    info!(tx_hash = %tx_hash, tracking_id = %id, "Conversion registered");
                    return Ok(id);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        tx_hash = %tx_hash,
                        attempt,
                        error = %e,
                        "Backend unavailable, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(TransferError::NetworkUnavailable(format!(
            "conversion for {} not registered after {} attempts",
            tx_hash, attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = HttpBackendConfig::new("https://api.bridgebloc.xyz/");
        assert_eq!(config.base_url, "https://api.bridgebloc.xyz");
        let backend = HttpBackend::new(config);
        assert_eq!(
            backend.url("/conversions/routes"),
            "https://api.bridgebloc.xyz/conversions/routes"
        );
    }

    #[test]
    fn test_status_error_classification() {
        assert!(matches!(
            status_error(401, "bad signature".into()),
            TransferError::BackendRejected { status: 401, .. }
        ));
        assert!(matches!(
            status_error(503, String::new()),
            TransferError::NetworkUnavailable(_)
        ));
    }

    #[test]
    fn test_conversion_request_shape() {
        let request = ConversionRequest {
            tx_hash: "0xabc".into(),
            source_chain: "ethereum".into(),
            destination_chain: "arbitrum".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tx_hash": "0xabc",
                "source_chain": "ethereum",
                "destination_chain": "arbitrum"
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_unavailable() {
        let mut config = HttpBackendConfig::new("http://127.0.0.1:9");
        config.retry_attempts = 2;
        config.retry_delay_ms = 1;
        config.timeout_ms = 500;
        let backend = HttpBackend::new(config);
        let auth = Authorization::new(alloy::primitives::Address::ZERO, "0xsig");

        let err = backend
            .notify(&auth, TxHash::ZERO, "ethereum", "arbitrum")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::NetworkUnavailable(_)));
    }
}
