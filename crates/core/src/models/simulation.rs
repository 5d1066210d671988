use serde::{Deserialize, Serialize};

use super::variant::ModelVariant;

/// Direction of the scheduled flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationKind {
    /// Periodic purchases add to holdings
    Investment,
    /// Periodic sales draw holdings down
    Withdrawal,
}

impl std::fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationKind::Investment => write!(f, "investment"),
            SimulationKind::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

/// How a phase sizes its yearly flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    /// A fixed monthly amount in local currency
    Fixed,
    /// A yearly percentage of the holdings at the start of the year
    Percentage,
}

/// One contiguous span of years governed by a single flow rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub mode: FlowMode,

    /// Monthly amount in local currency (used in `Fixed` mode)
    pub amount: f64,

    /// Yearly percentage of holdings, 0..=100 (used in `Percentage` mode)
    pub rate: f64,

    /// First calendar year the phase is active
    pub start_year: i32,

    /// Number of active years; `None` means until the horizon
    #[serde(default)]
    pub duration_years: Option<u32>,
}

impl PhaseConfig {
    pub fn fixed(amount: f64, start_year: i32) -> Self {
        Self {
            mode: FlowMode::Fixed,
            amount,
            rate: 0.0,
            start_year,
            duration_years: None,
        }
    }

    pub fn percentage(rate: f64, start_year: i32) -> Self {
        Self {
            mode: FlowMode::Percentage,
            amount: 0.0,
            rate,
            start_year,
            duration_years: None,
        }
    }

    pub fn with_duration(mut self, years: u32) -> Self {
        self.duration_years = Some(years);
        self
    }

    /// Whether the phase produces a flow in `year`.
    pub fn is_active_in(&self, year: i32) -> bool {
        if year < self.start_year {
            return false;
        }
        match self.duration_years {
            Some(n) => i64::from(year) < i64::from(self.start_year) + i64::from(n),
            None => true,
        }
    }
}

/// Starting position. Holdings and a fiat investment are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPosition {
    /// BTC already held
    Holdings(f64),
    /// Local-currency lump sum converted at the first simulated year's model price
    FiatInvestment(f64),
}

/// A fully validated simulation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub kind: SimulationKind,
    pub initial: InitialPosition,
    /// Local currency per USD
    pub exchange_rate: f64,
    /// Annual inflation in percent, compounding against the exchange rate
    pub inflation_rate: f64,
    /// Tax in percent applied to withdrawals
    pub tax_rate: f64,
    pub variant: ModelVariant,
    pub primary: PhaseConfig,
    pub secondary: Option<PhaseConfig>,
    /// First row year of a withdrawal run
    pub current_year: i32,
    /// Last row year
    pub horizon_year: i32,
}

impl SimulationParameters {
    /// Year of the first emitted row.
    pub fn first_year(&self) -> i32 {
        match self.kind {
            SimulationKind::Investment => self.primary.start_year,
            SimulationKind::Withdrawal => self.current_year,
        }
    }
}

/// Which phase governed a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivePhase {
    None,
    Primary,
    Secondary,
}

impl std::fmt::Display for ActivePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivePhase::None => write!(f, "none"),
            ActivePhase::Primary => write!(f, "primary"),
            ActivePhase::Secondary => write!(f, "secondary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    #[serde(rename = "not-yet-active")]
    NotYetActive,
}

/// A yearly flow: a number, or `"not-yet-active"` before the primary phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flow {
    Amount(f64),
    Status(FlowStatus),
}

impl Flow {
    pub const NOT_YET_ACTIVE: Flow = Flow::Status(FlowStatus::NotYetActive);

    pub fn amount(self) -> Option<f64> {
        match self {
            Flow::Amount(v) => Some(v),
            Flow::Status(_) => None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Flow::Amount(_))
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Amount(v) => write!(f, "{v}"),
            Flow::Status(FlowStatus::NotYetActive) => write!(f, "not-yet-active"),
        }
    }
}

/// One simulated calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRow {
    pub year: i32,

    pub model_price_usd: f64,

    pub model_price_local_currency: f64,

    /// Investment: amount spent. Withdrawal: net amount received after tax.
    pub flow_amount_local_currency: Flow,

    pub btc_flow: Flow,

    pub holdings_at_year_start: f64,

    pub holdings_at_year_end: f64,

    pub valuation_at_year_start: f64,

    /// BTC flow as a percentage of the year-start holdings, after clamping
    pub effective_rate_pct: Option<f64>,

    /// The requested withdrawal exceeded the holdings and was capped
    pub clamped: bool,

    pub active_phase: ActivePhase,
}
