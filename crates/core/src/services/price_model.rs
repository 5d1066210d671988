use chrono::{Datelike, NaiveDate};
use std::cell::OnceCell;

use crate::models::variant::{Curve, ModelVariant};

/// First calendar year in which the raw power law is replaced by the decay blend.
pub const TRANSITION_YEAR: i32 = 2040;

/// Last simulated year.
pub const HORIZON_YEAR: i32 = 2075;

/// First calendar year whose January 1 falls after genesis.
pub const FIRST_MODEL_YEAR: i32 = 2010;

/// The genesis block date, day zero of every day count.
pub fn genesis_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2009, 1, 3).expect("genesis date is a valid calendar date")
}

/// Whole days elapsed since genesis. Negative before genesis.
pub fn days_since_genesis(date: NaiveDate) -> i64 {
    (date - genesis_date()).num_days()
}

/// Day count of January 1 of `year`.
///
/// `None` when that date is not after genesis or cannot be represented.
pub fn days_for_year(year: i32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .map(days_since_genesis)
        .filter(|&days| days >= 1)
}

fn transition_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(TRANSITION_YEAR, 1, 1).expect("transition date is a valid calendar date")
}

/// Power-law anchor taken at the last pre-transition day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayAnchor {
    pub base_days: i64,
    pub base_price: f64,
}

/// Log-log power-law price model for one variant.
///
/// Before [`TRANSITION_YEAR`] the price is `10^(a + b * log10(days))`.
/// From the transition year onwards the growth relative to the anchor is
/// raised to a shrinking exponent:
///
/// ```text
/// scale(year) = targetScale + (1 - targetScale) * exp(-decayRate * (year - (T - 1)))
/// price       = basePrice * (raw(days) / raw(baseDays)) ^ scale(year)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerLawModel {
    variant: ModelVariant,
}

impl PowerLawModel {
    pub fn new(variant: ModelVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Raw power-law price. Day counts below 1 are clamped to 1.
    pub fn price(&self, days: i64, curve: Curve) -> f64 {
        let c = self.variant.coefficients(curve);
        let d = days.max(1) as f64;
        10f64.powf(c.intercept + c.slope * d.log10())
    }

    pub fn median(&self, days: i64) -> f64 {
        self.price(days, Curve::Median)
    }

    pub fn support(&self, days: i64) -> f64 {
        self.price(days, Curve::Support)
    }

    /// Exponent scale used for `year`; exactly 1.0 for the last pre-transition year.
    pub fn scale(&self, year: i32) -> f64 {
        let decay = self.variant.decay();
        let elapsed = f64::from(year - (TRANSITION_YEAR - 1));
        decay.target_scale + (1.0 - decay.target_scale) * (-decay.decay_rate * elapsed).exp()
    }

    pub fn anchor(&self, curve: Curve) -> DecayAnchor {
        let base_days = days_since_genesis(transition_date()) - 1;
        DecayAnchor {
            base_days,
            base_price: self.price(base_days, curve),
        }
    }

    /// Decay-blended price for `days` falling in calendar `year`.
    pub fn blended(&self, days: i64, year: i32, curve: Curve, anchor: &DecayAnchor) -> f64 {
        let growth = self.price(days, curve) / self.price(anchor.base_days, curve);
        anchor.base_price * growth.powf(self.scale(year))
    }

    /// Model price at January 1 of `year`, `None` for years before [`FIRST_MODEL_YEAR`].
    pub fn price_for_year(&self, year: i32, curve: Curve) -> Option<f64> {
        YearPricer::new(*self, curve).price_for_year(year)
    }

    /// Model price on an arbitrary date.
    pub fn price_on(&self, date: NaiveDate, curve: Curve) -> f64 {
        YearPricer::new(*self, curve).price_on(date)
    }
}

/// Prices one curve across many years, evaluating the decay anchor at most once.
///
/// Create one per simulation run or assembly pass so that every row of the
/// run shares the identical anchor.
#[derive(Debug)]
pub struct YearPricer {
    model: PowerLawModel,
    curve: Curve,
    anchor: OnceCell<DecayAnchor>,
}

impl YearPricer {
    pub fn new(model: PowerLawModel, curve: Curve) -> Self {
        Self {
            model,
            curve,
            anchor: OnceCell::new(),
        }
    }

    pub fn model(&self) -> PowerLawModel {
        self.model
    }

    /// The anchor, if a post-transition price has been requested yet.
    pub fn anchor(&self) -> Option<&DecayAnchor> {
        self.anchor.get()
    }

    pub fn price_for_year(&self, year: i32) -> Option<f64> {
        days_for_year(year).map(|days| self.price_at(days, year))
    }

    pub fn price_on(&self, date: NaiveDate) -> f64 {
        self.price_at(days_since_genesis(date), date.year())
    }

    fn price_at(&self, days: i64, year: i32) -> f64 {
        if year < TRANSITION_YEAR {
            return self.model.price(days, self.curve);
        }
        let anchor = self.anchor.get_or_init(|| self.model.anchor(self.curve));
        self.model.blended(days, year, self.curve, anchor)
    }
}
