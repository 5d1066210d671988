use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::price::PricePoint;
use super::http::{client_with_timeout, get_json, normalize_base_url};
use super::traits::{LivePriceProvider, LiveSnapshot};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const NAME: &str = "CoinGecko";

/// CoinGecko API provider, the primary live source.
///
/// - **Free**: public endpoints, no API key.
/// - **Endpoints**: `/coins/bitcoin/market_chart/range`, `/simple/price`
///
/// `/simple/price` is queried for USD and the local currency at once, which
/// also yields a USD → local exchange rate.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
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
}

// ── CoinGecko API response types ────────────────────────────────────

#[derive(Deserialize)]
struct MarketChartResponse {
    /// `[[timestamp_ms, price], ...]`
    prices: Vec<(f64, f64)>,
}

/// `{"bitcoin": {"usd": 97000.0, "jpy": 14550000.0}}`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

#[async_trait]
impl LivePriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_daily(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        currency: &str,
    ) -> Result<LiveSnapshot, CoreError> {
        let start = from
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| Self::api_error(format!("Invalid start date {from}")))?;
        let end = to
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| Self::api_error(format!("Invalid end date {to}")))?;

        let chart_url = format!(
            "{}/coins/bitcoin/market_chart/range?vs_currency=usd&from={start}&to={end}",
            self.base_url
        );
        let chart: MarketChartResponse = get_json(&self.client, NAME, &chart_url).await?;

        // Intraday samples collapse to the last sample of each day.
        let mut points: Vec<PricePoint> = Vec::new();
        for (ts, price) in chart.prices {
            let date = chrono::DateTime::from_timestamp_millis(ts as i64)
                .ok_or_else(|| Self::api_error(format!("Invalid timestamp {ts}")))?
                .date_naive();
            match points.last_mut() {
                Some(last) if last.date == date => last.price = price,
                _ => points.push(PricePoint { date, price }),
            }
        }
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        let local = currency.to_lowercase();
        let price_url = format!(
            "{}/simple/price?ids=bitcoin&vs_currencies=usd,{local}",
            self.base_url
        );
        let quote: SimplePriceResponse = get_json(&self.client, NAME, &price_url).await?;
        let bitcoin = quote
            .get("bitcoin")
            .ok_or_else(|| Self::api_error("No bitcoin entry in price response".into()))?;
        let latest_price_usd = *bitcoin
            .get("usd")
            .ok_or_else(|| Self::api_error("No USD price in response".into()))?;

        let exchange_rate = if local == "usd" {
            Some(1.0)
        } else {
            bitcoin
                .get(&local)
                .filter(|_| latest_price_usd > 0.0)
                .map(|local_price| local_price / latest_price_usd)
        };

        Ok(LiveSnapshot {
            points,
            latest_price_usd,
            exchange_rate,
        })
    }
}
