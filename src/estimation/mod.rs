//! Job duration estimation.
//!
//! Estimates are produced in two stages:
//! - the external model, when enabled and credentialed
//! - the keyword/age heuristic, whenever the model gives nothing usable
//!
//! Both stages read the same effective configuration, fetched once per call.

mod external;
mod heuristic;
mod settings;
mod store;

pub use external::{ExternalOutcome, ModelEstimator, UnavailableReason, build_user_prompt, parse_hours};
pub use heuristic::{HeuristicEstimator, clamp_hours, finalize_hours, round_to_minutes};
pub use settings::{
    ConfigView, DEFAULT_FLAGS, DEFAULT_MODEL, EstimatorConfig, KeywordRule, KeywordRuleDoc,
    ModelOverride, ModelSettings, ModelView, RuntimeOverride, YearAdjustment,
};
pub use store::ConfigStore;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Vehicle model year as sent by the booking form: a number or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleYear {
    Number(f64),
    Text(String),
}

impl VehicleYear {
    /// Integer year, read the lenient way: leading whitespace is skipped and
    /// trailing junk ignored (`"2010 model"` is 2010). Zero and unparseable
    /// input give `None`.
    pub fn parse(&self) -> Option<i64> {
        let year = match self {
            Self::Number(n) if n.is_finite() => n.trunc() as i64,
            Self::Number(_) => return None,
            Self::Text(s) => leading_int(s)?,
        };
        (year != 0).then_some(year)
    }
}

impl fmt::Display for VehicleYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

/// Facts about a job that drive its estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationInput {
    pub service_type: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: Option<VehicleYear>,
    pub description: String,
}

impl EstimationInput {
    pub fn year(&self) -> Option<i64> {
        self.vehicle_year.as_ref().and_then(VehicleYear::parse)
    }
}

/// Which stage produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateSource {
    Model,
    Heuristic,
}

impl fmt::Display for EstimateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub hours: f64,
    pub source: EstimateSource,
}

/// Entry point for estimation: model first, heuristic as fallback.
pub struct DurationEstimator {
    store: Arc<ConfigStore>,
    heuristic: HeuristicEstimator,
    model: ModelEstimator,
}

impl DurationEstimator {
    pub fn new(store: Arc<ConfigStore>, model: ModelEstimator) -> Self {
        Self {
            store,
            heuristic: HeuristicEstimator::new(),
            model,
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Estimate a job. Always yields a number; model failures fall through
    /// to the heuristic without retry.
    pub async fn estimate(&self, input: &EstimationInput) -> Estimate {
        let config = self.store.current().await;

        match self.model.estimate(&config, input).await {
            ExternalOutcome::Estimate(hours) => {
                tracing::debug!(hours, "Using model estimate");
                return Estimate {
                    hours,
                    source: EstimateSource::Model,
                };
            }
            ExternalOutcome::Unavailable(reason) => {
                tracing::debug!(%reason, "Model estimate unavailable");
            }
            ExternalOutcome::Failed(reason) => {
                tracing::warn!(%reason, "Model estimate failed, falling back to heuristic");
            }
        }

        let hours = self.heuristic.estimate(&config, input);
        tracing::debug!(hours, "Using heuristic estimate");
        Estimate {
            hours,
            source: EstimateSource::Heuristic,
        }
    }

    /// Heuristic stage alone, against the current configuration.
    pub async fn heuristic_estimate(&self, input: &EstimationInput) -> f64 {
        let config = self.store.current().await;
        self.heuristic.estimate(&config, input)
    }

    /// Model stage alone, against the current configuration.
    pub async fn external_estimate(&self, input: &EstimationInput) -> ExternalOutcome {
        let config = self.store.current().await;
        self.model.estimate(&config, input).await
    }
}
