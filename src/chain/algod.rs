//! [`ChainClient`] backed by the algod REST API (v2).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use super::{Address, ChainClient, ChainError, normalize};
use crate::domain::MicroAlgos;

/// Header carrying the algod API token.
const TOKEN_HEADER: &str = "X-Algo-API-Token";

/// Connection settings for an algod node.
#[derive(Debug, Clone)]
pub struct AlgodConfig {
    /// Base URL of the node, e.g. `https://testnet-api.algonode.cloud`.
    pub base_url: String,
    /// API token, if the node requires one.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How many times to look a transaction up before giving up on
    /// confirmation. At least one lookup is always made.
    pub confirmation_attempts: u32,
    /// Pause between lookups of an unconfirmed transaction.
    pub confirmation_interval: Duration,
}

impl Default for AlgodConfig {
    fn default() -> Self {
        Self {
            base_url: "https://testnet-api.algonode.cloud".to_string(),
            api_token: None,
            timeout: Duration::from_secs(10),
            confirmation_attempts: 5,
            confirmation_interval: Duration::from_secs(1),
        }
    }
}

/// HTTP client for an algod node.
#[derive(Debug, Clone)]
pub struct AlgodClient {
    http: reqwest::Client,
    base_url: Url,
    config: AlgodConfig,
}

impl AlgodClient {
    /// Creates a client for the configured node.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Unavailable`] if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: AlgodConfig) -> Result<Self, ChainError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ChainError::Unavailable(format!("invalid algod url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ChainError::Unavailable(format!(
                "algod url cannot be a base: {}",
                config.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChainError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Builds `<base>/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Performs a GET and parses the JSON body. `Ok(None)` means the node
    /// reported the resource as unknown.
    async fn get_json(&self, url: Url) -> Result<Option<Value>, ChainError> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.config.api_token {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ChainError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => return Ok(None),
            status if !status.is_success() => {
                return Err(ChainError::Unavailable(format!("algod returned {status}")));
            }
            _ => {}
        }

        response
            .json::<Value>()
            .await
            .map(Some)
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for AlgodClient {
    async fn pending_transaction(&self, tx_id: &str) -> Result<Value, ChainError> {
        let attempts = self.config.confirmation_attempts.max(1);
        let url = self.endpoint(&["v2", "transactions", "pending", tx_id]);

        for attempt in 1..=attempts {
            let Some(response) = self.get_json(url.clone()).await? else {
                return Err(ChainError::TransactionNotFound(tx_id.to_string()));
            };

            if let Some(reason) = normalize::pool_error(&response) {
                return Err(ChainError::Rejected {
                    tx_id: tx_id.to_string(),
                    reason: reason.to_string(),
                });
            }

            if let Some(round) = normalize::confirmed_round(&response) {
                tracing::debug!(tx_id, round, attempt, "transaction confirmed");
                return Ok(response);
            }

            if attempt < attempts {
                tracing::debug!(tx_id, attempt, "transaction still pending");
                tokio::time::sleep(self.config.confirmation_interval).await;
            }
        }

        Err(ChainError::NotConfirmed {
            tx_id: tx_id.to_string(),
            attempts,
        })
    }

    async fn account_balance(&self, address: &Address) -> Result<MicroAlgos, ChainError> {
        let encoded = address.encode();
        let mut url = self.endpoint(&["v2", "accounts", &encoded]);
        url.query_pairs_mut().append_pair("exclude", "all");

        let response = self.get_json(url).await?.ok_or_else(|| {
            ChainError::InvalidResponse(format!("account {encoded} not found"))
        })?;

        response
            .get("amount")
            .and_then(Value::as_u64)
            .map(MicroAlgos::new)
            .ok_or_else(|| ChainError::InvalidResponse("account has no amount".to_string()))
    }
}
