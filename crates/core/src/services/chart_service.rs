use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::chart::{ChartDataPoint, ChartSeries, DataSource, Resolution};
use crate::models::price::{ExchangeRate, PreviousPrice, PricePoint};
use crate::models::settings::Settings;
use crate::models::variant::{Curve, ModelVariant};
use crate::providers::registry::ProviderRegistry;
use crate::storage::cache::{CacheKind, CacheRecord, CacheStore};
use super::analytics_service::AnalyticsService;
use super::price_model::{days_since_genesis, genesis_date, PowerLawModel, YearPricer};

/// Live data overwrites the baseline only on or after this date.
pub fn live_cutover_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("cutover date is a valid calendar date")
}

/// Last date of the projected chart.
pub fn forecast_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2045, 12, 31).expect("forecast end is a valid calendar date")
}

/// How long the last weekly anchor is carried forward when no later anchor exists.
pub const BASELINE_CARRY_DAYS: i64 = 7;

/// Latest price reported when there is no data at all.
pub const DEFAULT_LATEST_PRICE_USD: f64 = 100_000.0;

/// Knobs of one chart service instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub variant: ModelVariant,
    pub resolution: Resolution,
    pub cutover: NaiveDate,
    pub forecast_end: NaiveDate,
    /// Local currency code passed to providers that report a rate
    pub currency: String,
    pub provider_timeout: Duration,
    pub chart_ttl: Duration,
    pub daily_ttl: Duration,
}

impl ChartConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            variant: settings.chart_variant,
            resolution: settings.resolution,
            currency: settings.currency(),
            provider_timeout: settings.provider_timeout(),
            chart_ttl: settings.chart_cache_ttl(),
            daily_ttl: settings.daily_cache_ttl(),
            ..Self::default()
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            variant: settings.chart_variant,
            resolution: settings.resolution,
            cutover: live_cutover_date(),
            forecast_end: forecast_end_date(),
            currency: settings.currency(),
            provider_timeout: settings.provider_timeout(),
            chart_ttl: settings.chart_cache_ttl(),
            daily_ttl: settings.daily_cache_ttl(),
        }
    }
}

/// Live daily data from the provider that won the fallback chain.
#[derive(Debug, Clone)]
struct LiveData {
    source: String,
    points: Vec<PricePoint>,
    latest_price_usd: f64,
    exchange_rate: Option<f64>,
}

/// Median and support pricers sharing one anchor each for a whole pass.
struct ModelCurves {
    median: YearPricer,
    support: YearPricer,
}

impl ModelCurves {
    fn new(variant: ModelVariant) -> Self {
        let model = PowerLawModel::new(variant);
        Self {
            median: YearPricer::new(model, Curve::Median),
            support: YearPricer::new(model, Curve::Support),
        }
    }

    fn point(&self, date: NaiveDate, price: Option<f64>, today: NaiveDate) -> ChartDataPoint {
        ChartDataPoint {
            date,
            price,
            median_model: self.median.price_on(date),
            support_model: self.support.price_on(date),
            days_since_genesis: days_since_genesis(date),
            is_future: date > today,
        }
    }
}

/// Assembles the tracker chart: bundled weekly baseline, live provider
/// overlay, model curves and the log-log R².
///
/// Providers are fired together, each under its own timeout; the winner is
/// chosen by registry priority, never by arrival order. Provider failures
/// never escape: the baseline and finally a constant are the last resorts,
/// flagged through `ChartSeries::degraded`.
pub struct ChartService {
    registry: ProviderRegistry,
    cache: Arc<dyn CacheStore>,
    config: ChartConfig,
    analytics: AnalyticsService,
}

impl ChartService {
    pub fn new(registry: ProviderRegistry, cache: Arc<dyn CacheStore>, config: ChartConfig) -> Self {
        Self {
            registry,
            cache,
            config,
            analytics: AnalyticsService::new(),
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Drop both cache kinds.
    pub fn invalidate_cache(&self) -> Result<(), CoreError> {
        for kind in CacheKind::ALL {
            self.cache.invalidate(kind)?;
        }
        Ok(())
    }

    /// Assemble the chart as of the current wall-clock time.
    pub async fn assemble(&self, baseline: &[PricePoint], rate: &ExchangeRate) -> ChartSeries {
        self.assemble_at(baseline, rate, Utc::now()).await
    }

    /// Assemble the chart as of `now`.
    ///
    /// 1. Fresh chart-series cache → return it, no network.
    /// 2. Live data: fresh daily cache, else all providers concurrently.
    /// 3. Baseline expanded to the configured resolution.
    /// 4. Live points overlaid from the cutover date on.
    /// 5. Headline prices, R², cache write (only when not degraded).
    pub async fn assemble_at(
        &self,
        baseline: &[PricePoint],
        rate: &ExchangeRate,
        now: DateTime<Utc>,
    ) -> ChartSeries {
        let now_ms = now.timestamp_millis();
        let today = now.date_naive();

        if let Some(record) = self.fresh_record(CacheKind::ChartSeries, now_ms, self.config.chart_ttl) {
            info!(points = record.data.len(), "Chart served from cache");
            return self.series_from_record(record, rate);
        }

        let live = self.live_data(today, now_ms).await;
        let curves = ModelCurves::new(self.config.variant);

        let mut points = self.interpolate(baseline, today, &curves);
        if let Some(live) = &live {
            points = self.overlay(points, &live.points, today, &curves);
        }

        let exchange_rate = match live.as_ref().and_then(|l| l.exchange_rate) {
            Some(r) => ExchangeRate::new(&rate.currency, r),
            None => rate.clone(),
        };

        let (latest, previous_usd, source) = match &live {
            Some(l) => {
                let previous = previous_day_price(&l.points, today).unwrap_or(l.latest_price_usd);
                (l.latest_price_usd, previous, DataSource::Provider(l.source.clone()))
            }
            None => match latest_two_observed(&points, today) {
                Some((latest, previous)) => {
                    warn!("All live providers failed, using latest baseline price");
                    (latest, previous, DataSource::Baseline)
                }
                None => {
                    warn!("No price data available, using default latest price");
                    (DEFAULT_LATEST_PRICE_USD, DEFAULT_LATEST_PRICE_USD, DataSource::Default)
                }
            },
        };
        let degraded = live.is_none();

        let r_squared = self.analytics.r_squared(&points);
        let series = ChartSeries {
            timestamp_ms: now_ms,
            latest_price_usd: latest,
            previous_price: PreviousPrice {
                usd: previous_usd,
                local: previous_usd * exchange_rate.rate,
            },
            exchange_rate,
            r_squared,
            source,
            degraded,
            points,
        };

        if !degraded {
            let record = CacheRecord {
                timestamp_ms: series.timestamp_ms,
                data: series.points.clone(),
                latest_price: series.latest_price_usd,
                previous_price: series.previous_price,
                source: live.map(|l| l.source),
            };
            self.store(CacheKind::ChartSeries, record);
        }

        debug!(
            points = series.points.len(),
            source = %series.source,
            r_squared = ?series.r_squared,
            "Chart assembled"
        );
        series
    }

    /// Expand the weekly baseline to one point per resolution step from
    /// genesis to the forecast end, carrying each anchor forward.
    fn interpolate(
        &self,
        baseline: &[PricePoint],
        today: NaiveDate,
        curves: &ModelCurves,
    ) -> Vec<ChartDataPoint> {
        let steps = step_dates(self.config.resolution, self.config.forecast_end);
        let mut points = Vec::with_capacity(steps.len());

        let mut next = 0usize;
        let mut anchor: Option<&PricePoint> = None;
        for date in steps {
            while next < baseline.len() && baseline[next].date <= date {
                anchor = Some(&baseline[next]);
                next += 1;
            }
            let price = anchor.and_then(|a| {
                let more_anchors = next < baseline.len();
                let within_carry = (date - a.date).num_days() < BASELINE_CARRY_DAYS;
                (date <= today && (more_anchors || within_carry)).then_some(a.price)
            });
            points.push(curves.point(date, price, today));
        }
        points
    }

    /// Merge live points into the sorted series.
    ///
    /// On a shared date the live price wins and the model fields already
    /// computed for that point are kept. Dates without a baseline point are
    /// inserted with freshly computed model fields.
    fn overlay(
        &self,
        points: Vec<ChartDataPoint>,
        live: &[PricePoint],
        today: NaiveDate,
        curves: &ModelCurves,
    ) -> Vec<ChartDataPoint> {
        let mut live: Vec<&PricePoint> = live
            .iter()
            .filter(|p| p.date >= self.config.cutover && p.date <= today)
            .filter(|p| p.price.is_finite() && p.price > 0.0)
            .collect();
        live.sort_by_key(|p| p.date);
        // Keep the last sample of a duplicated date.
        live.reverse();
        live.dedup_by_key(|p| p.date);
        live.reverse();

        let mut merged = Vec::with_capacity(points.len() + live.len());
        let mut pending = live.into_iter().peekable();
        for mut point in points {
            while let Some(l) = pending.next_if(|l| l.date < point.date) {
                if days_since_genesis(l.date) >= 1 {
                    merged.push(curves.point(l.date, Some(l.price), today));
                }
            }
            if let Some(l) = pending.next_if(|l| l.date == point.date) {
                point.price = Some(l.price);
            }
            merged.push(point);
        }
        for l in pending {
            if days_since_genesis(l.date) >= 1 {
                merged.push(curves.point(l.date, Some(l.price), today));
            }
        }
        merged
    }

    /// Live data from the daily cache or, failing that, the providers.
    async fn live_data(&self, today: NaiveDate, now_ms: i64) -> Option<LiveData> {
        if let Some(record) = self.fresh_record(CacheKind::DailyData, now_ms, self.config.daily_ttl) {
            debug!(points = record.data.len(), "Live data served from daily cache");
            let points = record
                .data
                .iter()
                .filter_map(|p| p.price.map(|price| PricePoint { date: p.date, price }))
                .collect();
            return Some(LiveData {
                source: record.source.unwrap_or_else(|| "cache".to_string()),
                points,
                latest_price_usd: record.latest_price,
                exchange_rate: None,
            });
        }

        let live = self.fetch_live(self.config.cutover, today).await?;
        let curves = ModelCurves::new(self.config.variant);

        let previous = previous_day_price(&live.points, today).unwrap_or(live.latest_price_usd);
        let record = CacheRecord {
            timestamp_ms: now_ms,
            data: live
                .points
                .iter()
                .map(|p| curves.point(p.date, Some(p.price), today))
                .collect(),
            latest_price: live.latest_price_usd,
            previous_price: PreviousPrice {
                usd: previous,
                local: previous * live.exchange_rate.unwrap_or(1.0),
            },
            source: Some(live.source.clone()),
        };
        self.store(CacheKind::DailyData, record);
        Some(live)
    }

    /// Fire every provider at once, then take the first success in priority order.
    async fn fetch_live(&self, from: NaiveDate, to: NaiveDate) -> Option<LiveData> {
        let timeout = self.config.provider_timeout;
        let currency = self.config.currency.as_str();
        let attempts = self.registry.providers().iter().map(|provider| async move {
            match tokio::time::timeout(timeout, provider.fetch_daily(from, to, currency)).await {
                Ok(result) => result,
                Err(_) => Err(CoreError::Timeout {
                    provider: provider.name().to_string(),
                    millis: timeout.as_millis() as u64,
                }),
            }
        });
        let results = futures::future::join_all(attempts).await;

        for (provider, result) in self.registry.providers().iter().zip(results) {
            match result {
                Ok(snapshot) if snapshot.is_valid() => {
                    info!(
                        provider = provider.name(),
                        points = snapshot.points.len(),
                        latest = snapshot.latest_price_usd,
                        "Live data fetched"
                    );
                    return Some(LiveData {
                        source: provider.name().to_string(),
                        points: snapshot.points,
                        latest_price_usd: snapshot.latest_price_usd,
                        exchange_rate: snapshot.exchange_rate,
                    });
                }
                Ok(_) => {
                    warn!(provider = provider.name(), "Provider returned invalid prices");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider failed");
                }
            }
        }
        None
    }

    fn fresh_record(&self, kind: CacheKind, now_ms: i64, ttl: Duration) -> Option<CacheRecord> {
        match self.cache.get(kind) {
            Ok(Some(record)) if record.is_fresh(now_ms, ttl) => Some(record),
            Ok(Some(record)) => {
                debug!(%kind, age_ms = now_ms - record.timestamp_ms, "Cache record stale");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%kind, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn store(&self, kind: CacheKind, record: CacheRecord) {
        if let Err(e) = self.cache.put(kind, record) {
            warn!(%kind, error = %e, "Cache write failed");
        }
    }

    fn series_from_record(&self, record: CacheRecord, rate: &ExchangeRate) -> ChartSeries {
        let r_squared = self.analytics.r_squared(&record.data);
        ChartSeries {
            timestamp_ms: record.timestamp_ms,
            points: record.data,
            latest_price_usd: record.latest_price,
            previous_price: record.previous_price,
            exchange_rate: rate.clone(),
            r_squared,
            source: DataSource::Cache,
            degraded: false,
        }
    }
}

/// Every step date from just after genesis to `end`, inclusive.
fn step_dates(resolution: Resolution, end: NaiveDate) -> Vec<NaiveDate> {
    let genesis = genesis_date();
    let mut dates = Vec::new();
    let first = match resolution {
        Resolution::Daily => genesis.succ_opt(),
        Resolution::Monthly => genesis
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1))),
    };
    let mut current = first;
    while let Some(date) = current {
        if date > end {
            break;
        }
        dates.push(date);
        current = match resolution {
            Resolution::Daily => date.succ_opt(),
            Resolution::Monthly => date.checked_add_months(Months::new(1)),
        };
    }
    dates
}

/// Close of the last day strictly before `today`.
fn previous_day_price(points: &[PricePoint], today: NaiveDate) -> Option<f64> {
    points.iter().rev().find(|p| p.date < today).map(|p| p.price)
}

/// Latest observed price on or before `today` and the observation before it.
fn latest_two_observed(points: &[ChartDataPoint], today: NaiveDate) -> Option<(f64, f64)> {
    let mut observed = points
        .iter()
        .rev()
        .filter(|p| p.date <= today)
        .filter_map(|p| p.price);
    let latest = observed.next()?;
    let previous = observed.next().unwrap_or(latest);
    Some((latest, previous))
}
