use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;

/// Which of the two curves of a variant to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// Central price estimate
    Median,
    /// Lower bound, historically rarely breached
    Support,
}

/// `log10(price) = intercept + slope * log10(days)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub intercept: f64,
    pub slope: f64,
}

/// Parameters of the post-transition exponent decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayParams {
    /// Exponent scale the blend converges to
    pub target_scale: f64,
    /// Per-year exponential decay rate of `1 - target_scale`
    pub decay_rate: f64,
}

/// Closed set of model variants. Each tag indexes one row of the coefficient table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    #[default]
    Standard,
    Conservative,
}

struct VariantTable {
    median: Coefficients,
    support: Coefficients,
    decay: DecayParams,
}

const STANDARD: VariantTable = VariantTable {
    median: Coefficients {
        intercept: -17.016,
        slope: 5.845,
    },
    support: Coefficients {
        intercept: -17.351,
        slope: 5.836,
    },
    decay: DecayParams {
        target_scale: 0.35,
        decay_rate: 0.10,
    },
};

const CONSERVATIVE: VariantTable = VariantTable {
    median: Coefficients {
        intercept: -16.600,
        slope: 5.700,
    },
    support: Coefficients {
        intercept: -16.950,
        slope: 5.690,
    },
    decay: DecayParams {
        target_scale: 0.25,
        decay_rate: 0.15,
    },
};

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Standard, ModelVariant::Conservative];

    fn table(self) -> &'static VariantTable {
        match self {
            ModelVariant::Standard => &STANDARD,
            ModelVariant::Conservative => &CONSERVATIVE,
        }
    }

    pub fn coefficients(self, curve: Curve) -> Coefficients {
        match curve {
            Curve::Median => self.table().median,
            Curve::Support => self.table().support,
        }
    }

    pub fn decay(self) -> DecayParams {
        self.table().decay
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelVariant::Standard => write!(f, "standard"),
            ModelVariant::Conservative => write!(f, "conservative"),
        }
    }
}

impl FromStr for ModelVariant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(ModelVariant::Standard),
            "conservative" => Ok(ModelVariant::Conservative),
            other => Err(CoreError::Config(format!(
                "Unknown model variant '{other}' (expected 'standard' or 'conservative')"
            ))),
        }
    }
}
