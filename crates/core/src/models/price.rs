use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single observed or projected price (date → USD price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// A USD → local-currency multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Target currency code, uppercased (e.g., "JPY")
    pub currency: String,

    /// Units of local currency per 1 USD
    pub rate: f64,

    /// `true` when every rate source failed and the configured constant is in use
    pub is_default: bool,
}

impl ExchangeRate {
    pub fn new(currency: impl Into<String>, rate: f64) -> Self {
        Self {
            currency: currency.into().to_uppercase(),
            rate,
            is_default: false,
        }
    }

    /// The configured fallback rate, flagged as stale.
    pub fn fallback(currency: impl Into<String>, rate: f64) -> Self {
        Self {
            is_default: true,
            ..Self::new(currency, rate)
        }
    }
}

/// Previous-day price in USD and in the local currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviousPrice {
    pub usd: f64,
    pub local: f64,
}

/// Model valuations at January 1 of one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrice {
    pub year: i32,
    pub median_usd: f64,
    pub support_usd: f64,
    /// Stock-to-flow comparison price; `None` once issuance reaches zero
    pub stock_to_flow_usd: Option<f64>,
}
