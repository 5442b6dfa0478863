//! Exchange REST client.
//!
//! Public endpoints (markets, summaries) need no credentials. Private
//! endpoints (orders, balances) carry `apikey` + `nonce` query parameters
//! and an `apisign` header: HMAC-SHA512 of the full request URI keyed with
//! the API secret.

use anyhow::{anyhow, bail, Context, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha512;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::models::{ApiResponse, BalanceInfo, MarketInfo, MarketSummary, OrderPlaced};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.bittrex.com/api/v1.1";

#[derive(Debug, Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

/// REST client for the exchange API.
pub struct ExchangeClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ExchangeClient {
    /// A client for public endpoints only.
    pub fn public() -> Self {
        Self::build(None)
    }

    /// A client that can also call the signed private endpoints.
    pub fn with_credentials(api_key: String, api_secret: String) -> Self {
        Self::build(Some(Credentials { api_key, api_secret }))
    }

    fn build(credentials: Option<Credentials>) -> Self {
        let base_url =
            std::env::var("EXCHANGE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            credentials,
        }
    }

    /// All currently listed markets, by name.
    pub async fn get_markets(&self) -> Result<Vec<MarketInfo>> {
        self.get_public::<Vec<MarketInfo>>("/public/getmarkets")
            .await
            .context("Failed to fetch markets")
    }

    /// Latest ticker summary for every market.
    pub async fn get_market_summaries(&self) -> Result<Vec<MarketSummary>> {
        self.get_public::<Vec<MarketSummary>>("/public/getmarketsummaries")
            .await
            .context("Failed to fetch market summaries")
    }

    /// Place a limit buy. Returns the exchange order id.
    pub async fn buy_limit(&self, market: &str, quantity: f64, rate: f64) -> Result<String> {
        let placed: OrderPlaced = self
            .get_signed(
                "/market/buylimit",
                &[
                    ("market", market.to_string()),
                    ("quantity", format!("{:.8}", quantity)),
                    ("rate", format!("{:.8}", rate)),
                ],
            )
            .await
            .with_context(|| format!("Buy order for {} failed", market))?;

        info!("Buy order placed for {}: {}", market, placed.uuid);
        Ok(placed.uuid)
    }

    /// Place a limit sell. Returns the exchange order id.
    pub async fn sell_limit(&self, market: &str, quantity: f64, rate: f64) -> Result<String> {
        let placed: OrderPlaced = self
            .get_signed(
                "/market/selllimit",
                &[
                    ("market", market.to_string()),
                    ("quantity", format!("{:.8}", quantity)),
                    ("rate", format!("{:.8}", rate)),
                ],
            )
            .await
            .with_context(|| format!("Sell order for {} failed", market))?;

        info!("Sell order placed for {}: {}", market, placed.uuid);
        Ok(placed.uuid)
    }

    /// Cancel an open order by exchange id. The endpoint returns an empty
    /// result on success.
    pub async fn cancel(&self, order_id: &str) -> Result<()> {
        let _ = self
            .get_signed_envelope::<serde_json::Value>(
                "/market/cancel",
                &[("uuid", order_id.to_string())],
            )
            .await
            .with_context(|| format!("Cancel of order {} failed", order_id))?;
        info!("Cancelled order {}", order_id);
        Ok(())
    }

    /// Account balances as currency -> total amount, zero balances omitted.
    pub async fn get_balances(&self) -> Result<HashMap<String, f64>> {
        let balances: Vec<BalanceInfo> = self
            .get_signed("/account/getbalances", &[])
            .await
            .context("Failed to fetch balances")?;

        Ok(balances
            .into_iter()
            .filter(|b| b.balance != 0.0)
            .map(|b| (b.currency, b.balance))
            .collect())
    }

    async fn get_public<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;

        let envelope = Self::unwrap_envelope(endpoint, response).await?;
        envelope
            .result
            .ok_or_else(|| anyhow!("{} returned success without a result", endpoint))
    }

    async fn get_signed<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let envelope = self.get_signed_envelope(endpoint, params).await?;
        envelope
            .result
            .ok_or_else(|| anyhow!("{} returned success without a result", endpoint))
    }

    async fn get_signed_envelope<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<ApiResponse<T>> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| anyhow!("No API credentials configured for {}", endpoint))?;

        let nonce = chrono::Utc::now().timestamp_millis().to_string();
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, endpoint))
            .with_context(|| format!("Invalid endpoint URL for {}", endpoint))?;
        url.query_pairs_mut()
            .append_pair("apikey", &credentials.api_key)
            .append_pair("nonce", &nonce);
        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }

        let signature = sign(url.as_str(), &credentials.api_secret);
        debug!("GET {} (signed)", endpoint);

        let response = self
            .client
            .get(url)
            .header("apisign", signature)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", endpoint))?;

        Self::unwrap_envelope(endpoint, response).await
    }

    /// Check HTTP status and the `success` flag; the caller decides whether
    /// an empty `result` is acceptable.
    async fn unwrap_envelope<T: serde::de::DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<ApiResponse<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Request to {} failed ({}): {}", endpoint, status, body);
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", endpoint))?;

        if !envelope.success {
            bail!("{} rejected: {}", endpoint, envelope.message);
        }

        Ok(envelope)
    }
}

/// HMAC-SHA512 of the full URI, hex-encoded, as the exchange expects in the
/// `apisign` header.
fn sign(uri: &str, secret: &str) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(uri.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
