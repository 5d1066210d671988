use serde::{Deserialize, Serialize};

use crate::models::price::PricePoint;
use crate::models::simulation::{
    FlowMode, InitialPosition, PhaseConfig, SimulationKind, SimulationParameters,
};
use crate::models::variant::ModelVariant;
use super::price_model::{FIRST_MODEL_YEAR, HORIZON_YEAR};

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field error found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First error reported for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Raw phase fields as typed by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseForm {
    pub mode: FlowMode,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub rate: Option<String>,
    #[serde(default)]
    pub start_year: Option<String>,
    #[serde(default)]
    pub duration_years: Option<String>,
}

impl PhaseForm {
    pub fn fixed(amount: &str, start_year: &str) -> Self {
        Self {
            mode: FlowMode::Fixed,
            amount: Some(amount.to_string()),
            rate: None,
            start_year: Some(start_year.to_string()),
            duration_years: None,
        }
    }

    pub fn percentage(rate: &str, start_year: &str) -> Self {
        Self {
            mode: FlowMode::Percentage,
            amount: None,
            rate: Some(rate.to_string()),
            start_year: Some(start_year.to_string()),
            duration_years: None,
        }
    }

    pub fn with_duration(mut self, years: &str) -> Self {
        self.duration_years = Some(years.to_string());
        self
    }
}

/// Raw simulation input as typed by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationForm {
    pub kind: SimulationKind,
    #[serde(default)]
    pub variant: ModelVariant,
    #[serde(default)]
    pub initial_btc: Option<String>,
    #[serde(default)]
    pub initial_investment: Option<String>,
    #[serde(default)]
    pub exchange_rate: Option<String>,
    #[serde(default)]
    pub inflation_rate: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<String>,
    pub primary: PhaseForm,
    #[serde(default)]
    pub secondary: Option<PhaseForm>,
    pub current_year: i32,
    #[serde(default = "default_horizon")]
    pub horizon_year: i32,
}

fn default_horizon() -> i32 {
    HORIZON_YEAR
}

impl SimulationForm {
    pub fn new(kind: SimulationKind, primary: PhaseForm, current_year: i32) -> Self {
        Self {
            kind,
            variant: ModelVariant::Standard,
            initial_btc: None,
            initial_investment: None,
            exchange_rate: None,
            inflation_rate: None,
            tax_rate: None,
            primary,
            secondary: None,
            current_year,
            horizon_year: HORIZON_YEAR,
        }
    }
}

fn is_blank(raw: Option<&str>) -> bool {
    raw.map_or(true, |s| s.trim().is_empty())
}

/// Parse a user-typed number. Thousands separators (`,` and `_`) are ignored.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn required_number(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<f64> {
    match raw.map(str::trim) {
        None | Some("") => {
            errors.push(field, "is required");
            None
        }
        Some(s) => {
            let value = parse_number(s);
            if value.is_none() {
                errors.push(field, format!("must be a number, got '{s}'"));
            }
            value
        }
    }
}

fn optional_number(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    default: f64,
) -> Option<f64> {
    if is_blank(raw) {
        return Some(default);
    }
    required_number(errors, field, raw)
}

fn check_range(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Option<f64> {
    let v = value?;
    if v < min || v > max {
        errors.push(field, format!("must be between {min} and {max}, got {v}"));
        return None;
    }
    Some(v)
}

fn check_non_negative(errors: &mut ValidationErrors, field: &str, value: Option<f64>) -> Option<f64> {
    let v = value?;
    if v < 0.0 {
        errors.push(field, format!("must not be negative, got {v}"));
        return None;
    }
    Some(v)
}

fn required_year(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<i32> {
    match raw.map(str::trim) {
        None | Some("") => {
            errors.push(field, "is required");
            None
        }
        Some(s) => match s.parse::<i32>() {
            Ok(y) => Some(y),
            Err(_) => {
                errors.push(field, format!("must be a whole year, got '{s}'"));
                None
            }
        },
    }
}

fn validate_phase(
    errors: &mut ValidationErrors,
    prefix: &str,
    form: &PhaseForm,
    horizon_year: i32,
) -> Option<PhaseConfig> {
    let field = |name: &str| format!("{prefix}.{name}");

    let start_year = required_year(errors, &field("start_year"), form.start_year.as_deref())
        .and_then(|y| {
            if !(FIRST_MODEL_YEAR..=horizon_year).contains(&y) {
                errors.push(
                    field("start_year"),
                    format!("must be between {FIRST_MODEL_YEAR} and {horizon_year}, got {y}"),
                );
                None
            } else {
                Some(y)
            }
        });

    let (amount, rate) = match form.mode {
        FlowMode::Fixed => {
            let amount = required_number(errors, &field("amount"), form.amount.as_deref());
            (check_non_negative(errors, &field("amount"), amount), Some(0.0))
        }
        FlowMode::Percentage => {
            let rate = required_number(errors, &field("rate"), form.rate.as_deref());
            (Some(0.0), check_range(errors, &field("rate"), rate, 0.0, 100.0))
        }
    };

    let duration_years = if is_blank(form.duration_years.as_deref()) {
        Some(None)
    } else {
        let raw = form.duration_years.as_deref().unwrap_or_default().trim();
        match raw.parse::<u32>() {
            Ok(n) if n >= 1 => Some(Some(n)),
            _ => {
                errors.push(
                    field("duration_years"),
                    format!("must be a whole number of years >= 1, got '{raw}'"),
                );
                None
            }
        }
    };

    Some(PhaseConfig {
        mode: form.mode,
        amount: amount?,
        rate: rate?,
        start_year: start_year?,
        duration_years: duration_years?,
    })
}

/// Check that `from..=to` is a non-empty span of modelled years.
///
/// Both ends must lie in `FIRST_MODEL_YEAR..=HORIZON_YEAR`. Errors are
/// reported against the given field names.
pub fn check_year_range(errors: &mut ValidationErrors, from: (&str, i32), to: (&str, i32)) {
    let (from_field, from_year) = from;
    let (to_field, to_year) = to;
    let modelled = FIRST_MODEL_YEAR..=HORIZON_YEAR;

    for (field, year) in [from, to] {
        if !modelled.contains(&year) {
            errors.push(
                field,
                format!("must be between {FIRST_MODEL_YEAR} and {HORIZON_YEAR}, got {year}"),
            );
        }
    }
    if modelled.contains(&from_year) && modelled.contains(&to_year) && from_year > to_year {
        errors.push(
            from_field,
            format!("must not be after {to_field} ({to_year}), got {from_year}"),
        );
    }
}

/// Check every field of `form` and build the engine parameters.
///
/// All problems are collected; the simulation never runs on partial input.
pub fn validate_simulation(form: &SimulationForm) -> Result<SimulationParameters, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    // Initial position: holdings XOR fiat lump sum. A zero on one side counts as absent.
    let btc_given = !is_blank(form.initial_btc.as_deref());
    let fiat_given = !is_blank(form.initial_investment.as_deref());
    let btc = if btc_given {
        let v = required_number(&mut errors, "initial_btc", form.initial_btc.as_deref());
        check_non_negative(&mut errors, "initial_btc", v)
    } else {
        None
    };
    let fiat = if fiat_given {
        let v = required_number(
            &mut errors,
            "initial_investment",
            form.initial_investment.as_deref(),
        );
        check_non_negative(&mut errors, "initial_investment", v)
    } else {
        None
    };

    let initial = match (btc, fiat) {
        _ if !btc_given && !fiat_given => {
            errors.push(
                "initial_btc",
                "either initial_btc or initial_investment is required",
            );
            None
        }
        (Some(b), Some(f)) if b > 0.0 && f > 0.0 => {
            errors.push(
                "initial_investment",
                "cannot be combined with a non-zero initial_btc",
            );
            None
        }
        (Some(_), Some(f)) if f > 0.0 => Some(InitialPosition::FiatInvestment(f)),
        (Some(b), Some(_)) => Some(InitialPosition::Holdings(b)),
        (Some(b), None) if !fiat_given => Some(InitialPosition::Holdings(b)),
        (None, Some(f)) if !btc_given => Some(InitialPosition::FiatInvestment(f)),
        // A parse error was already recorded for the other field.
        _ => None,
    };

    let exchange_rate = required_number(&mut errors, "exchange_rate", form.exchange_rate.as_deref())
        .and_then(|r| {
            if r <= 0.0 {
                errors.push("exchange_rate", format!("must be greater than 0, got {r}"));
                None
            } else {
                Some(r)
            }
        });

    let inflation = optional_number(
        &mut errors,
        "inflation_rate",
        form.inflation_rate.as_deref(),
        0.0,
    );
    let inflation = check_non_negative(&mut errors, "inflation_rate", inflation);

    let tax = match form.kind {
        SimulationKind::Withdrawal => {
            let tax = optional_number(&mut errors, "tax_rate", form.tax_rate.as_deref(), 0.0);
            check_range(&mut errors, "tax_rate", tax, 0.0, 100.0)
        }
        SimulationKind::Investment => Some(0.0),
    };

    check_year_range(
        &mut errors,
        ("current_year", form.current_year),
        ("horizon_year", form.horizon_year),
    );
    let horizon = form.horizon_year.clamp(FIRST_MODEL_YEAR, HORIZON_YEAR);

    let primary = validate_phase(&mut errors, "primary", &form.primary, horizon);
    let secondary = form
        .secondary
        .as_ref()
        .map(|s| validate_phase(&mut errors, "secondary", s, horizon));

    if let (Some(p), Some(Some(s))) = (&primary, &secondary) {
        if s.start_year <= p.start_year {
            errors.push(
                "secondary.start_year",
                format!(
                    "must be later than the primary start year {}, got {}",
                    p.start_year, s.start_year
                ),
            );
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Every branch above pushed an error when it produced `None`.
    let (Some(initial), Some(exchange_rate), Some(inflation_rate), Some(tax_rate), Some(primary)) =
        (initial, exchange_rate, inflation, tax, primary)
    else {
        errors.push("form", "incomplete input");
        return Err(errors);
    };
    let secondary = match secondary {
        Some(Some(s)) => Some(s),
        Some(None) => {
            errors.push("secondary", "incomplete input");
            return Err(errors);
        }
        None => None,
    };

    errors.into_result(SimulationParameters {
        kind: form.kind,
        initial,
        exchange_rate,
        inflation_rate,
        tax_rate,
        variant: form.variant,
        primary,
        secondary,
        current_year: form.current_year,
        horizon_year: form.horizon_year,
    })
}

/// Check a baseline series: ascending unique dates, finite positive prices.
pub fn validate_baseline(points: &[PricePoint]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (i, p) in points.iter().enumerate() {
        if !(p.price.is_finite() && p.price > 0.0) {
            errors.push(
                format!("baseline[{i}].price"),
                format!("must be a positive number, got {}", p.price),
            );
        }
        if i > 0 && p.date <= points[i - 1].date {
            errors.push(
                format!("baseline[{i}].date"),
                format!(
                    "must be after the previous date {}, got {}",
                    points[i - 1].date,
                    p.date
                ),
            );
        }
    }
    errors.into_result(())
}
