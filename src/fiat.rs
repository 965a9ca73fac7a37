//! ETH/EUR Rate Lookup - Coinbase and CoinGecko public APIs
//!
//! Sources are tried in order; the first sane answer wins. A missing rate
//! is not an error: callers simply omit the EUR figures.
//!
//! API: https://api.coinbase.com/v2/prices/ETH-EUR/spot
//! API: https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=eur

use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================
// CONSTANTS
// ============================================

pub const COINBASE_API_URL: &str = "https://api.coinbase.com";

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com";

/// Timeout for each price request
pub const DEFAULT_FIAT_TIMEOUT_SECS: u64 = 5;

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct CoinbaseResponse {
    data: CoinbasePrice,
}

#[derive(Debug, Deserialize)]
struct CoinbasePrice {
    /// Decimal string, e.g. "3012.45"
    amount: String,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoResponse {
    ethereum: CoinGeckoPrice,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    eur: f64,
}

// ============================================
// RATE
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FiatSource {
    Coinbase,
    CoinGecko,
}

impl fmt::Display for FiatSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiatSource::Coinbase => write!(f, "Coinbase"),
            FiatSource::CoinGecko => write!(f, "CoinGecko"),
        }
    }
}

/// ETH price in EUR, valid for one computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatRate {
    pub eth_eur: f64,
    pub source: FiatSource,
}

#[async_trait]
pub trait FiatRateSource: Send + Sync {
    /// `None` when no source produced a usable rate
    async fn eth_eur(&self) -> Option<FiatRate>;
}

fn sane_rate(value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(eyre!("implausible ETH/EUR rate {}", value))
    }
}

// ============================================
// HTTP CLIENT
// ============================================

pub struct FiatRateClient {
    http_client: Client,
    coinbase_url: String,
    coingecko_url: String,
}

impl FiatRateClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_urls(timeout, COINBASE_API_URL, COINGECKO_API_URL)
    }

    /// Point the sources at other hosts (a local mock in tests)
    pub fn with_base_urls(timeout: Duration, coinbase_url: &str, coingecko_url: &str) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            coinbase_url: coinbase_url.trim_end_matches('/').to_string(),
            coingecko_url: coingecko_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_from_coinbase(&self) -> Result<f64> {
        let url = format!("{}/v2/prices/ETH-EUR/spot", self.coinbase_url);

        let response: CoinbaseResponse = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rate: f64 = response
            .data
            .amount
            .trim()
            .parse()
            .map_err(|e| eyre!("Failed to parse Coinbase amount {:?}: {}", response.data.amount, e))?;

        sane_rate(rate)
    }

    async fn fetch_from_coingecko(&self) -> Result<f64> {
        let url = format!(
            "{}/api/v3/simple/price?ids=ethereum&vs_currencies=eur",
            self.coingecko_url
        );

        let response: CoinGeckoResponse = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        sane_rate(response.ethereum.eur)
    }
}

#[async_trait]
impl FiatRateSource for FiatRateClient {
    async fn eth_eur(&self) -> Option<FiatRate> {
        match self.fetch_from_coinbase().await {
            Ok(eth_eur) => {
                debug!("ETH/EUR from Coinbase: {:.2}", eth_eur);
                return Some(FiatRate {
                    eth_eur,
                    source: FiatSource::Coinbase,
                });
            }
            Err(e) => warn!("Coinbase ETH/EUR fetch failed: {}", e),
        }

        match self.fetch_from_coingecko().await {
            Ok(eth_eur) => {
                debug!("ETH/EUR from CoinGecko: {:.2}", eth_eur);
                return Some(FiatRate {
                    eth_eur,
                    source: FiatSource::CoinGecko,
                });
            }
            Err(e) => warn!("CoinGecko ETH/EUR fetch failed: {}", e),
        }

        warn!("No ETH/EUR rate available, EUR figures will be omitted");
        None
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_http;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn client(base: &str) -> FiatRateClient {
        FiatRateClient::with_base_urls(Duration::from_secs(2), base, base).unwrap()
    }

    #[tokio::test]
    async fn test_coinbase_first() {
        let app = Router::new()
            .route(
                "/v2/prices/ETH-EUR/spot",
                get(|| async { Json(json!({ "data": { "base": "ETH", "currency": "EUR", "amount": "3012.50" } })) }),
            )
            .route(
                "/api/v3/simple/price",
                get(|| async { Json(json!({ "ethereum": { "eur": 1.0 } })) }),
            );
        let base = spawn_http(app).await;

        let rate = client(&base).eth_eur().await.unwrap();
        assert_eq!(rate.source, FiatSource::Coinbase);
        assert_eq!(rate.eth_eur, 3012.5);
    }

    #[tokio::test]
    async fn test_falls_back_to_coingecko() {
        let app = Router::new()
            .route(
                "/v2/prices/ETH-EUR/spot",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/api/v3/simple/price",
                get(|| async { Json(json!({ "ethereum": { "eur": 2999.9 } })) }),
            );
        let base = spawn_http(app).await;

        let rate = client(&base).eth_eur().await.unwrap();
        assert_eq!(rate.source, FiatSource::CoinGecko);
        assert_eq!(rate.eth_eur, 2999.9);
    }

    #[tokio::test]
    async fn test_malformed_and_non_positive_rates_rejected() {
        let app = Router::new()
            .route(
                "/v2/prices/ETH-EUR/spot",
                get(|| async { Json(json!({ "data": { "amount": "not-a-number" } })) }),
            )
            .route(
                "/api/v3/simple/price",
                get(|| async { Json(json!({ "ethereum": { "eur": 0.0 } })) }),
            );
        let base = spawn_http(app).await;

        assert!(client(&base).eth_eur().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_sources_yield_none() {
        let rate = client("http://127.0.0.1:1").eth_eur().await;
        assert!(rate.is_none());
    }

    #[test]
    fn test_sane_rate() {
        assert!(sane_rate(3000.0).is_ok());
        assert!(sane_rate(-1.0).is_err());
        assert!(sane_rate(f64::NAN).is_err());
        assert!(sane_rate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_rate_serializes_camel_case() {
        let rate = FiatRate {
            eth_eur: 3000.0,
            source: FiatSource::CoinGecko,
        };
        assert_eq!(
            serde_json::to_value(rate).unwrap(),
            json!({ "ethEur": 3000.0, "source": "coingecko" })
        );
    }
}
