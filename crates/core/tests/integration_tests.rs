// ═══════════════════════════════════════════════════════════════════
// Integration Tests — Forecaster facade end to end, export
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use powerlaw_core::errors::CoreError;
use powerlaw_core::models::chart::{DataSource, Resolution};
use powerlaw_core::models::price::PricePoint;
use powerlaw_core::models::settings::Settings;
use powerlaw_core::models::simulation::{SimulationKind, SimulationRow};
use powerlaw_core::providers::registry::ProviderRegistry;
use powerlaw_core::providers::traits::{LivePriceProvider, LiveSnapshot};
use powerlaw_core::services::baseline::bundled_baseline;
use powerlaw_core::services::chart_service::{ChartConfig, ChartService};
use powerlaw_core::services::currency_service::CurrencyService;
use powerlaw_core::services::export_service::{rows_to_csv, rows_to_json};
use powerlaw_core::services::validation_service::{PhaseForm, SimulationForm};
use powerlaw_core::storage::cache::{CacheStore, MemoryCacheStore};
use powerlaw_core::storage::manager::FileCacheStore;
use powerlaw_core::Forecaster;

// ═══════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════

struct CountingProvider {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LivePriceProvider for CountingProvider {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn fetch_daily(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        _currency: &str,
    ) -> Result<LiveSnapshot, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut points = Vec::new();
        let mut d = from;
        while d <= to {
            points.push(PricePoint { date: d, price: 60_000.0 });
            d += ChronoDuration::days(1);
        }
        Ok(LiveSnapshot {
            points,
            latest_price_usd: 61_000.0,
            exchange_rate: None,
        })
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

fn forecaster_with(cache: Arc<dyn CacheStore>, calls: Arc<AtomicUsize>) -> Forecaster {
    let settings = Settings {
        resolution: Resolution::Monthly,
        ..Settings::default()
    };
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(CountingProvider { calls }));
    let chart = ChartService::new(registry, cache, ChartConfig::from_settings(&settings));
    let currency = CurrencyService::new(
        settings.default_exchange_rate,
        Duration::from_millis(100),
        settings.daily_cache_ttl(),
    );
    Forecaster::with_components(settings, bundled_baseline().unwrap(), chart, currency)
}

fn offline_forecaster() -> Forecaster {
    forecaster_with(Arc::new(MemoryCacheStore::new()), Arc::new(AtomicUsize::new(0)))
}

fn withdrawal_form() -> SimulationForm {
    let mut form = SimulationForm::new(
        SimulationKind::Withdrawal,
        PhaseForm::fixed("200000", "2027"),
        2025,
    );
    form.initial_btc = Some("1".into());
    form.exchange_rate = Some("150".into());
    form.tax_rate = Some("20.315".into());
    form.secondary = Some(PhaseForm::percentage("4", "2035"));
    form
}

// ═══════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════

mod construction {
    use super::*;

    #[test]
    fn default_settings_build() {
        let f = Forecaster::new(Settings::default()).unwrap();
        assert!(f.baseline().len() > 700);
        assert_eq!(f.settings().currency(), "JPY");
        let debug = format!("{f:?}");
        assert!(debug.contains("Forecaster"));
        assert!(debug.contains("CoinGecko"));
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = Settings {
            provider_timeout_ms: 0,
            ..Settings::default()
        };
        assert!(matches!(Forecaster::new(settings), Err(CoreError::Config(_))));
    }

    #[test]
    fn cache_dir_created() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let settings = Settings {
            cache_dir: Some(cache_dir.clone()),
            ..Settings::default()
        };
        Forecaster::new(settings).unwrap();
        assert!(cache_dir.is_dir());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Chart through the facade
// ═══════════════════════════════════════════════════════════════════

mod chart {
    use super::*;

    #[tokio::test]
    async fn offline_rate_is_flagged_default() {
        let f = offline_forecaster();
        let rate = f.exchange_rate().await;
        assert_eq!(rate.currency, "JPY");
        assert_eq!(rate.rate, 150.0);
        assert!(rate.is_default);
    }

    #[tokio::test]
    async fn chart_combines_baseline_and_live() {
        let f = offline_forecaster();
        let series = f.load_chart(now()).await;

        assert_eq!(series.source, DataSource::Provider("Counting".into()));
        assert!(!series.degraded);
        assert_eq!(series.latest_price_usd, 61_000.0);
        assert!(series.exchange_rate.is_default);
        assert!(series.r_squared.unwrap() > 0.5);
        // Bundled history reaches back to 2010.
        let first_priced = series.points.iter().find(|p| p.price.is_some()).unwrap();
        assert!(first_priced.date < NaiveDate::from_ymd_opt(2011, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn file_cache_shared_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = forecaster_with(Arc::new(FileCacheStore::new(dir.path()).unwrap()), Arc::clone(&calls));
        let original = first.load_chart(now()).await;

        let second = forecaster_with(Arc::new(FileCacheStore::new(dir.path()).unwrap()), Arc::clone(&calls));
        let cached = second.load_chart(now() + ChronoDuration::minutes(30)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.source, DataSource::Cache);
        assert_eq!(cached.timestamp_ms, original.timestamp_ms);
        assert_eq!(cached.points, original.points);
    }

    #[tokio::test]
    async fn invalidate_through_facade() {
        let calls = Arc::new(AtomicUsize::new(0));
        let f = forecaster_with(Arc::new(MemoryCacheStore::new()), Arc::clone(&calls));
        f.load_chart(now()).await;
        f.invalidate_cache().unwrap();
        f.load_chart(now()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Simulation through the facade
// ═══════════════════════════════════════════════════════════════════

mod simulation {
    use super::*;

    #[test]
    fn validated_run() {
        let rows = offline_forecaster().simulate(&withdrawal_form()).unwrap();
        assert_eq!(rows[0].year, 2025);
        assert!(!rows[0].btc_flow.is_active());
        assert!(rows[2].btc_flow.is_active());
    }

    #[test]
    fn invalid_form_reports_fields() {
        let mut form = withdrawal_form();
        form.exchange_rate = Some("0".into());
        form.tax_rate = Some("-1".into());
        match offline_forecaster().simulate(&form) {
            Err(CoreError::Validation(errors)) => {
                assert!(errors.for_field("exchange_rate").is_some());
                assert!(errors.for_field("tax_rate").is_some());
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn model_prices_use_chart_variant() {
        let prices = offline_forecaster().model_prices(2025, 2027).unwrap();
        assert_eq!(prices.len(), 3);
        assert!(prices[0].median_usd < prices[2].median_usd);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════════════

mod export {
    use super::*;

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let rows = offline_forecaster().simulate(&withdrawal_form()).unwrap();
        let csv = rows_to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), rows.len() + 1);
        assert!(lines[0].starts_with("year,modelPriceUsd,modelPriceLocalCurrency"));
        assert!(lines[1].contains("not-yet-active"));
    }

    #[test]
    fn json_round_trips() {
        let rows = offline_forecaster().simulate(&withdrawal_form()).unwrap();
        let json = rows_to_json(&rows).unwrap();
        let back: Vec<SimulationRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), rows.len());
        for (a, b) in back.iter().zip(&rows) {
            assert_eq!(a.year, b.year);
            assert_eq!(a.active_phase, b.active_phase);
            assert_eq!(a.btc_flow.is_active(), b.btc_flow.is_active());
        }
        assert!(json.contains("\"btcFlow\": \"not-yet-active\""));
    }

    #[test]
    fn empty_export() {
        assert_eq!(rows_to_json(&[]).unwrap(), "[]");
        assert_eq!(rows_to_csv(&[]).unwrap(), "");
    }
}
