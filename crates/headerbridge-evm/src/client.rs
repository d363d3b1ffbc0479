//! HTTP JSON-RPC chain client backed by `reqwest`.
//!
//! Only `eth_getBlockByNumber` is used. There is no retry here: the polling
//! listener retries on its next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use headerbridge_core::error::ChainClientError;
use headerbridge_core::types::{BlockSelector, Header};
use headerbridge_core::ChainClient;

use crate::rpc::{Call, Reply};

/// Configuration for `HttpChainClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Reads headers from an EVM node over HTTP JSON-RPC.
pub struct HttpChainClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpChainClient {
    /// Create a client for the JSON-RPC endpoint at `url`.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, ChainClientError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChainClientError::Unavailable(format!(
                "unsupported endpoint '{url}', expected http(s)://"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChainClientError::Unavailable(e.to_string()))?;

        Ok(Self {
            url,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, ChainClientError> {
        Self::new(url, HttpClientConfig::default())
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ChainClientError> {
        let req = Call::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainClientError::Rpc(format!("HTTP {status}: {body}")));
        }

        let resp = resp
            .json::<Reply>()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))?;
        resp.into_result()
            .map_err(|e| ChainClientError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn header_by_number(
        &self,
        selector: BlockSelector,
    ) -> Result<Option<Header>, ChainClientError> {
        let block = self
            .call(
                "eth_getBlockByNumber",
                vec![Value::String(selector.as_tag()), Value::Bool(false)],
            )
            .await?;

        if block.is_null() {
            tracing::debug!(url = %self.url, %selector, "node returned no block");
            return Ok(None);
        }
        header_from_json(&block).map(Some)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Parse a `0x`-prefixed (or bare) hex quantity.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// Convert an `eth_getBlockByNumber` result into a `Header`.
pub fn header_from_json(v: &Value) -> Result<Header, ChainClientError> {
    let field = |name: &str| {
        v[name]
            .as_str()
            .ok_or_else(|| ChainClientError::Malformed(format!("missing field '{name}'")))
    };
    let quantity = |name: &str| {
        let raw = field(name)?;
        parse_hex_u64(raw)
            .ok_or_else(|| ChainClientError::Malformed(format!("bad hex in '{name}': {raw}")))
    };

    Ok(Header {
        number: quantity("number")?,
        hash: field("hash")?.to_string(),
        parent_hash: field("parentHash")?.to_string(),
        timestamp: i64::try_from(quantity("timestamp")?).map_err(|_| {
            ChainClientError::Malformed("block timestamp out of range".into())
        })?,
    })
}
