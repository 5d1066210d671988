use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::simulation::{
    ActivePhase, Flow, FlowMode, InitialPosition, PhaseConfig, SimulationKind,
    SimulationParameters, SimulationRow,
};
use crate::models::variant::Curve;
use super::price_model::{PowerLawModel, YearPricer};
use super::validation_service::{check_year_range, ValidationErrors};

/// Which rule governs one year.
enum Schedule<'a> {
    /// Before the primary phase starts
    NotYetActive,
    /// Every configured phase has run its course
    Ended,
    Active(ActivePhase, &'a PhaseConfig),
}

/// Result of applying one phase to one year.
struct YearFlow {
    local: f64,
    btc: f64,
    clamped: bool,
}

/// Year-by-year projection of holdings under a deposit or withdrawal schedule.
///
/// The engine is pure: identical parameters always yield identical rows.
/// It either returns the full table or an error, never a partial table.
pub struct SimulationService;

impl SimulationService {
    pub fn new() -> Self {
        Self
    }

    /// Run the simulation from `params.first_year()` to `params.horizon_year`.
    ///
    /// Withdrawal runs stop after the first year that empties the holdings.
    /// A model price that is not a positive finite number aborts the run with
    /// [`CoreError::Model`]. Years outside the modelled span are rejected with
    /// [`CoreError::Validation`] before anything is priced.
    pub fn simulate(&self, params: &SimulationParameters) -> Result<Vec<SimulationRow>, CoreError> {
        let first_year = params.first_year();
        let first_field = match params.kind {
            SimulationKind::Investment => "primary.start_year",
            SimulationKind::Withdrawal => "current_year",
        };
        let mut errors = ValidationErrors::new();
        check_year_range(
            &mut errors,
            (first_field, first_year),
            ("horizon_year", params.horizon_year),
        );
        if !errors.is_empty() {
            return Err(errors.into());
        }
        let pricer = YearPricer::new(PowerLawModel::new(params.variant), Curve::Median);
        let prices = LocalPricer {
            pricer: &pricer,
            params,
            first_year,
        };

        let mut holdings = match params.initial {
            InitialPosition::Holdings(btc) => btc,
            InitialPosition::FiatInvestment(fiat) => {
                let (_, local) = prices.at(first_year)?;
                fiat / local
            }
        };

        let capacity = usize::try_from(params.horizon_year - first_year + 1).unwrap_or(0);
        let mut rows = Vec::with_capacity(capacity);

        for year in first_year..=params.horizon_year {
            let (usd, local) = prices.at(year)?;
            let start = holdings;

            let (flow_local, btc_flow, active_phase, clamped) = match schedule(params, year) {
                Schedule::NotYetActive => (Flow::NOT_YET_ACTIVE, Flow::NOT_YET_ACTIVE, ActivePhase::None, false),
                Schedule::Ended => (Flow::Amount(0.0), Flow::Amount(0.0), ActivePhase::None, false),
                Schedule::Active(which, phase) => {
                    let flow = year_flow(params, phase, year - first_year, start, local);
                    holdings = match params.kind {
                        SimulationKind::Investment => start + flow.btc,
                        SimulationKind::Withdrawal => (start - flow.btc).max(0.0),
                    };
                    (Flow::Amount(flow.local), Flow::Amount(flow.btc), which, flow.clamped)
                }
            };

            let effective_rate_pct = match btc_flow {
                Flow::Amount(btc) if start > 0.0 => Some(btc / start * 100.0),
                _ => None,
            };

            debug!(
                year,
                price_local = local,
                btc_flow = %btc_flow,
                holdings = holdings,
                phase = %active_phase,
                "Simulated year"
            );

            rows.push(SimulationRow {
                year,
                model_price_usd: usd,
                model_price_local_currency: local,
                flow_amount_local_currency: flow_local,
                btc_flow,
                holdings_at_year_start: start,
                holdings_at_year_end: holdings,
                valuation_at_year_start: start * local,
                effective_rate_pct,
                clamped,
                active_phase,
            });

            if params.kind == SimulationKind::Withdrawal && holdings <= 0.0 {
                debug!(year, "Holdings depleted");
                break;
            }
        }

        info!(
            kind = %params.kind,
            variant = %params.variant,
            rows = rows.len(),
            final_holdings = holdings,
            "Simulation complete"
        );
        Ok(rows)
    }
}

impl Default for SimulationService {
    fn default() -> Self {
        Self::new()
    }
}

/// Model prices of one run in USD and in inflation-adjusted local currency.
struct LocalPricer<'a> {
    pricer: &'a YearPricer,
    params: &'a SimulationParameters,
    first_year: i32,
}

impl LocalPricer<'_> {
    fn at(&self, year: i32) -> Result<(f64, f64), CoreError> {
        let usd = self
            .pricer
            .price_for_year(year)
            .ok_or(CoreError::Model { year, price: f64::NAN })?;
        if !is_positive(usd) {
            return Err(CoreError::Model { year, price: usd });
        }
        let local = usd
            * self.params.exchange_rate
            * inflation_factor(self.params.inflation_rate, year - self.first_year);
        if !is_positive(local) {
            return Err(CoreError::Model { year, price: local });
        }
        Ok((usd, local))
    }
}

fn schedule(params: &SimulationParameters, year: i32) -> Schedule<'_> {
    if year < params.primary.start_year {
        return Schedule::NotYetActive;
    }
    if let Some(secondary) = params.secondary.as_ref().filter(|s| year >= s.start_year) {
        return if secondary.is_active_in(year) {
            Schedule::Active(ActivePhase::Secondary, secondary)
        } else {
            Schedule::Ended
        };
    }
    if params.primary.is_active_in(year) {
        Schedule::Active(ActivePhase::Primary, &params.primary)
    } else {
        Schedule::Ended
    }
}

/// Local-currency and BTC flow of `phase` in a year `elapsed` years into the run.
///
/// Withdrawals are grossed up by the tax rate so that the net received
/// matches the configured amount, then capped at `holdings`. The recorded
/// local amount is the net actually received.
fn year_flow(
    params: &SimulationParameters,
    phase: &PhaseConfig,
    elapsed: i32,
    holdings: f64,
    price_local: f64,
) -> YearFlow {
    let tax_factor = 1.0 + params.tax_rate / 100.0;
    match (params.kind, phase.mode) {
        (SimulationKind::Investment, FlowMode::Fixed) => {
            let annual = phase.amount * 12.0 * inflation_factor(params.inflation_rate, elapsed);
            YearFlow {
                local: annual,
                btc: annual / price_local,
                clamped: false,
            }
        }
        (SimulationKind::Investment, FlowMode::Percentage) => {
            let btc = holdings * phase.rate / 100.0;
            YearFlow {
                local: btc * price_local,
                btc,
                clamped: false,
            }
        }
        (SimulationKind::Withdrawal, mode) => {
            let requested = match mode {
                FlowMode::Fixed => phase.amount * 12.0 * tax_factor / price_local,
                FlowMode::Percentage => holdings * phase.rate / 100.0,
            };
            let btc = requested.min(holdings);
            YearFlow {
                local: btc * price_local / tax_factor,
                btc,
                clamped: requested > holdings,
            }
        }
    }
}

/// `(1 + rate%)^years`
fn inflation_factor(rate_pct: f64, years: i32) -> f64 {
    (1.0 + rate_pct / 100.0).powi(years)
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
