use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::models::price::ExchangeRate;
use crate::models::settings::Settings;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::providers::traits::ExchangeRateProvider;

/// Supplies the USD → local-currency multiplier used by charts and simulations.
///
/// Providers are tried in registration order, each under its own timeout.
/// When all fail, the configured default rate is returned flagged
/// `is_default`. Successful rates are memoised for `ttl`.
pub struct CurrencyService {
    providers: Vec<Box<dyn ExchangeRateProvider>>,
    default_rate: f64,
    timeout: Duration,
    ttl: Duration,
    memo: Mutex<HashMap<String, (ExchangeRate, Instant)>>,
}

impl CurrencyService {
    pub fn new(default_rate: f64, timeout: Duration, ttl: Duration) -> Self {
        Self {
            providers: Vec::new(),
            default_rate,
            timeout,
            ttl,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Frankfurter-backed service configured from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut service = Self::new(
            settings.default_exchange_rate,
            settings.provider_timeout(),
            settings.daily_cache_ttl(),
        );
        service.register(Box::new(FrankfurterProvider::with_base_url(
            &settings.providers.frankfurter_base_url,
            settings.provider_timeout(),
        )));
        service
    }

    pub fn register(&mut self, provider: Box<dyn ExchangeRateProvider>) {
        self.providers.push(provider);
    }

    /// Units of `currency` per 1 USD. Never fails.
    pub async fn usd_rate(&self, currency: &str) -> ExchangeRate {
        let target = currency.trim().to_uppercase();
        if target == "USD" {
            return ExchangeRate::new("USD", 1.0);
        }

        if let Some(rate) = self.memoised(&target) {
            debug!(currency = %target, "Exchange rate served from memo");
            return rate;
        }

        for provider in &self.providers {
            match tokio::time::timeout(self.timeout, provider.get_rate("USD", &target)).await {
                Ok(Ok(rate)) => {
                    let rate = ExchangeRate::new(&target, rate);
                    self.remember(&target, &rate);
                    return rate;
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "Exchange rate provider failed");
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Exchange rate provider timed out"
                    );
                }
            }
        }

        warn!(currency = %target, rate = self.default_rate, "Using default exchange rate");
        ExchangeRate::fallback(&target, self.default_rate)
    }

    /// Convert a USD amount using `rate`.
    pub fn to_local(&self, usd: f64, rate: &ExchangeRate) -> f64 {
        usd * rate.rate
    }

    fn memoised(&self, currency: &str) -> Option<ExchangeRate> {
        let memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        memo.get(currency)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(rate, _)| rate.clone())
    }

    fn remember(&self, currency: &str, rate: &ExchangeRate) {
        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        memo.insert(currency.to_string(), (rate.clone(), Instant::now()));
    }
}
