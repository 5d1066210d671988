use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::price::PricePoint;

/// What one live provider returned for a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    /// Daily USD closes, ascending by date
    pub points: Vec<PricePoint>,

    /// Most recent USD price
    pub latest_price_usd: f64,

    /// USD → requested currency, when the provider reports one
    pub exchange_rate: Option<f64>,
}

impl LiveSnapshot {
    /// A snapshot is usable only if its latest price and every point are positive and finite.
    pub fn is_valid(&self) -> bool {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        ok(self.latest_price_usd)
            && self.points.iter().all(|p| ok(p.price))
            && self.exchange_rate.map_or(true, ok)
    }
}

/// A live bitcoin price source.
///
/// Each HTTP API implements this trait. The chart service fires all of them
/// together and picks the first success by registration priority.
#[async_trait]
pub trait LivePriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Daily prices in `[from, to]` plus the latest price.
    /// `currency` is the local currency a provider may report a USD rate for.
    async fn fetch_daily(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        currency: &str,
    ) -> Result<LiveSnapshot, CoreError>;
}

/// A USD → local-currency exchange-rate source.
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Units of `to` per one unit of `from`.
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64, CoreError>;
}
