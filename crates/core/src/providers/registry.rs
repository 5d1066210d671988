use std::time::Duration;

use crate::models::settings::ProviderSettings;

use super::coincap::CoinCapProvider;
use super::coingecko::CoinGeckoProvider;
use super::traits::LivePriceProvider;

/// Ordered list of live price providers.
///
/// Registration order is priority order: when several providers succeed,
/// the earliest registered one wins regardless of which answered first.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn LivePriceProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with the default providers: CoinGecko first, CoinCap second.
    pub fn new_with_defaults(settings: &ProviderSettings, timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CoinGeckoProvider::with_base_url(
            &settings.coingecko_base_url,
            timeout,
        )));
        registry.register(Box::new(CoinCapProvider::with_base_url(
            &settings.coincap_base_url,
            timeout,
        )));
        registry
    }

    /// Register a provider at the lowest priority.
    pub fn register(&mut self, provider: Box<dyn LivePriceProvider>) {
        self.providers.push(provider);
    }

    /// All providers, highest priority first.
    pub fn providers(&self) -> &[Box<dyn LivePriceProvider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
