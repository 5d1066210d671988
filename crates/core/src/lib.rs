pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{DateTime, Utc};
use models::{
    chart::ChartSeries,
    price::{ExchangeRate, ModelPrice, PricePoint},
    settings::Settings,
    simulation::SimulationRow,
    variant::{Curve, ModelVariant},
};
use providers::registry::ProviderRegistry;
use services::{
    baseline::bundled_baseline,
    chart_service::{ChartConfig, ChartService},
    currency_service::CurrencyService,
    price_model::{days_for_year, PowerLawModel, YearPricer},
    simulation_service::SimulationService,
    stock_to_flow::s2f_price,
    validation_service::{check_year_range, validate_simulation, SimulationForm, ValidationErrors},
};
use std::sync::Arc;
use storage::{
    cache::{CacheStore, MemoryCacheStore},
    manager::FileCacheStore,
};
use tracing::info;

use errors::CoreError;

/// Main entry point for the power-law forecaster core library.
/// Holds the settings, the bundled baseline and all services needed to
/// build charts and run simulations.
#[must_use]
pub struct Forecaster {
    settings: Settings,
    baseline: Vec<PricePoint>,
    chart_service: ChartService,
    currency_service: CurrencyService,
    simulation_service: SimulationService,
}

impl std::fmt::Debug for Forecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forecaster")
            .field("settings", &self.settings)
            .field("baseline_points", &self.baseline.len())
            .field("providers", &self.chart_service.provider_names())
            .finish()
    }
}

impl Forecaster {
    /// Build a forecaster with the default providers and the bundled baseline.
    ///
    /// Caches live in memory unless `settings.cache_dir` is set.
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;

        let cache: Arc<dyn CacheStore> = match &settings.cache_dir {
            Some(dir) => Arc::new(FileCacheStore::new(dir)?),
            None => Arc::new(MemoryCacheStore::new()),
        };
        let registry =
            ProviderRegistry::new_with_defaults(&settings.providers, settings.provider_timeout());
        let chart_service = ChartService::new(registry, cache, ChartConfig::from_settings(&settings));
        let currency_service = CurrencyService::from_settings(&settings);
        let baseline = bundled_baseline()?;

        info!(
            currency = %settings.currency(),
            baseline_points = baseline.len(),
            providers = ?chart_service.provider_names(),
            "Forecaster ready"
        );
        Ok(Self::with_components(settings, baseline, chart_service, currency_service))
    }

    /// Assemble a forecaster from explicit parts (used by tests and embedders).
    pub fn with_components(
        settings: Settings,
        baseline: Vec<PricePoint>,
        chart_service: ChartService,
        currency_service: CurrencyService,
    ) -> Self {
        Self {
            settings,
            baseline,
            chart_service,
            currency_service,
            simulation_service: SimulationService::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn baseline(&self) -> &[PricePoint] {
        &self.baseline
    }

    // ── Chart ───────────────────────────────────────────────────────

    /// USD → local-currency rate for the configured currency. Never fails;
    /// falls back to the configured default rate.
    pub async fn exchange_rate(&self) -> ExchangeRate {
        self.currency_service.usd_rate(&self.settings.currency()).await
    }

    /// Assemble the chart as of `now`.
    pub async fn load_chart(&self, now: DateTime<Utc>) -> ChartSeries {
        let rate = self.exchange_rate().await;
        self.chart_service.assemble_at(&self.baseline, &rate, now).await
    }

    /// Assemble the chart as of the current wall-clock time.
    pub async fn load_chart_now(&self) -> ChartSeries {
        self.load_chart(Utc::now()).await
    }

    /// Drop every cached chart and daily record.
    pub fn invalidate_cache(&self) -> Result<(), CoreError> {
        self.chart_service.invalidate_cache()
    }

    // ── Simulation ──────────────────────────────────────────────────

    /// Validate `form` and run the simulation.
    /// Returns every field problem at once as `CoreError::Validation`.
    pub fn simulate(&self, form: &SimulationForm) -> Result<Vec<SimulationRow>, CoreError> {
        let params = validate_simulation(form)?;
        self.simulation_service.simulate(&params)
    }

    // ── Model ───────────────────────────────────────────────────────

    /// Yearly model prices of the chart variant, `year_from..=year_to`.
    pub fn model_prices(&self, year_from: i32, year_to: i32) -> Result<Vec<ModelPrice>, CoreError> {
        model_prices(self.settings.chart_variant, year_from, year_to)
    }
}

/// Yearly model prices of `variant`, `year_from..=year_to`.
///
/// Both ends must lie between the first modelled year and the horizon year.
pub fn model_prices(
    variant: ModelVariant,
    year_from: i32,
    year_to: i32,
) -> Result<Vec<ModelPrice>, CoreError> {
    let mut errors = ValidationErrors::new();
    check_year_range(&mut errors, ("year_from", year_from), ("year_to", year_to));
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let model = PowerLawModel::new(variant);
    let median = YearPricer::new(model, Curve::Median);
    let support = YearPricer::new(model, Curve::Support);
    (year_from..=year_to)
        .map(|year| {
            let (Some(median_usd), Some(support_usd)) =
                (median.price_for_year(year), support.price_for_year(year))
            else {
                return Err(CoreError::Model { year, price: f64::NAN });
            };
            Ok(ModelPrice {
                year,
                median_usd,
                support_usd,
                stock_to_flow_usd: days_for_year(year).and_then(s2f_price),
            })
        })
        .collect()
}
