use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;
use super::http::{client_with_timeout, get_json, normalize_base_url};
use super::traits::ExchangeRateProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.dev/v1";

const NAME: &str = "Frankfurter";

/// Frankfurter API provider for fiat currency exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) data.
/// - **Endpoint**: `/latest?base={from}&symbols={to}`
pub struct FrankfurterProvider {
    client: Client,
    base_url: String,
}

impl FrankfurterProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: client_with_timeout(timeout),
            base_url: normalize_base_url(base_url),
        }
    }
}

// ── Frankfurter API response types ──────────────────────────────────

#[derive(Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

#[async_trait]
impl ExchangeRateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn get_rate(&self, from: &str, to: &str) -> Result<f64, CoreError> {
        let base = from.to_uppercase();
        let target = to.to_uppercase();

        // Same currency → rate is 1.0
        if base == target {
            return Ok(1.0);
        }

        let url = format!("{}/latest?base={base}&symbols={target}", self.base_url);
        let resp: RatesResponse = get_json(&self.client, NAME, &url).await?;

        resp.rates
            .get(&target)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| CoreError::Api {
                provider: NAME.into(),
                message: format!("No rate found for {base} → {target}"),
            })
    }
}
