use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::price::PricePoint;
use super::http::{client_with_timeout, get_json, normalize_base_url};
use super::traits::{LivePriceProvider, LiveSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://api.coincap.io/v2";

const NAME: &str = "CoinCap";

/// CoinCap API provider for bitcoin prices.
///
/// - **Free**: No API key required.
/// - **Endpoints**: `/assets/bitcoin`, `/assets/bitcoin/history?interval=d1`
///
/// CoinCap returns prices as decimal strings in USD and reports no exchange rate.
pub struct CoinCapProvider {
    client: Client,
    base_url: String,
}

impl CoinCapProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: client_with_timeout(timeout),
            base_url: normalize_base_url(base_url),
        }
    }

    fn api_error(message: String) -> CoreError {
        CoreError::Api {
            provider: NAME.into(),
            message,
        }
    }

    fn parse_price(raw: &str) -> Result<f64, CoreError> {
        raw.parse::<f64>()
            .map_err(|e| Self::api_error(format!("Invalid price format '{raw}': {e}")))
    }
}

// ── CoinCap API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AssetResponse {
    data: AssetData,
}

#[derive(Deserialize)]
struct AssetData {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    data: Vec<HistoryPoint>,
}

#[derive(Deserialize)]
struct HistoryPoint {
    #[serde(rename = "priceUsd")]
    price_usd: String,
    time: i64, // unix timestamp in milliseconds
}

#[async_trait]
impl LivePriceProvider for CoinCapProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_daily(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        _currency: &str,
    ) -> Result<LiveSnapshot, CoreError> {
        let start = from
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .ok_or_else(|| Self::api_error(format!("Invalid start date {from}")))?;
        let end = to
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp_millis())
            .ok_or_else(|| Self::api_error(format!("Invalid end date {to}")))?;

        let history_url = format!(
            "{}/assets/bitcoin/history?interval=d1&start={start}&end={end}",
            self.base_url
        );
        let history: HistoryResponse = get_json(&self.client, NAME, &history_url).await?;

        let mut points = Vec::with_capacity(history.data.len());
        for p in &history.data {
            let price = Self::parse_price(&p.price_usd)?;
            let dt = chrono::DateTime::from_timestamp_millis(p.time)
                .ok_or_else(|| Self::api_error(format!("Invalid timestamp {}", p.time)))?;
            points.push(PricePoint {
                date: dt.date_naive(),
                price,
            });
        }
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        let asset_url = format!("{}/assets/bitcoin", self.base_url);
        let asset: AssetResponse = get_json(&self.client, NAME, &asset_url).await?;
        let latest_price_usd = asset
            .data
            .price_usd
            .as_deref()
            .ok_or_else(|| Self::api_error("No price data for bitcoin".into()))
            .and_then(Self::parse_price)?;

        Ok(LiveSnapshot {
            points,
            latest_price_usd,
            exchange_rate: None,
        })
    }
}
