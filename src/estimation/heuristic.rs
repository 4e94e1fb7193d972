//! Rule-based duration estimation.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::estimation::EstimationInput;
use crate::estimation::settings::{EstimatorConfig, FALLBACK_SERVICE_TYPE};

const EPSILON: f64 = 1e-9;

/// Estimates labor hours from service type, description keywords and
/// vehicle age. Pure: the same input and configuration always give the same
/// result.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl HeuristicEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(&self, config: &EstimatorConfig, input: &EstimationInput) -> f64 {
        let mut hours = config
            .service_type_base_hours
            .get(input.service_type.as_str())
            .or_else(|| config.service_type_base_hours.get(FALLBACK_SERVICE_TYPE))
            .copied()
            .unwrap_or(0.0);

        if !input.description.is_empty() {
            hours += config
                .keyword_adjustments
                .iter()
                .filter(|rule| rule.matches(&input.description))
                .map(|rule| rule.delta_hours())
                .sum::<f64>();
        }

        hours += config.year_adjustment.hours_for(input.year());

        finalize_hours(config, hours)
    }
}

/// Clamp to `[min, max]`.
pub fn clamp_hours(hours: f64, min: f64, max: f64) -> f64 {
    hours.min(max).max(min)
}

/// Round to the nearest multiple of `minutes`, halves rounding up.
/// A non-positive granularity leaves the value as is.
pub fn round_to_minutes(hours: f64, minutes: f64) -> f64 {
    if !(minutes > 0.0) {
        return hours;
    }
    let step = minutes / 60.0;
    (hours / step + 0.5).floor() * step
}

/// Two decimal places for presentation.
pub fn two_decimals(hours: f64) -> f64 {
    Decimal::from_f64(hours)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(hours)
}

/// Clamp, round to the configured granularity, and trim to two decimals.
///
/// Used for both heuristic and model estimates. When rounding lands outside
/// the bounds (a bound that is not itself a multiple of the granularity),
/// the nearest multiple inside the bounds is used; if there is none, the
/// clamped value is returned unrounded.
pub fn finalize_hours(config: &EstimatorConfig, hours: f64) -> f64 {
    let (min, max) = (config.min_hours, config.max_hours);
    let clamped = clamp_hours(hours, min, max);
    let mut rounded = round_to_minutes(clamped, config.round_to_minutes);

    if config.round_to_minutes > 0.0 {
        let step = config.round_to_minutes / 60.0;
        if rounded > max + EPSILON {
            rounded -= step;
        } else if rounded < min - EPSILON {
            rounded += step;
        }
        if rounded > max + EPSILON || rounded < min - EPSILON {
            rounded = clamped;
        }
    }

    two_decimals(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::VehicleYear;
    use crate::estimation::settings::{KeywordRuleDoc, RuntimeOverride};

    fn input(service_type: &str, year: Option<VehicleYear>, description: &str) -> EstimationInput {
        EstimationInput {
            service_type: service_type.to_string(),
            vehicle_make: "Honda".to_string(),
            vehicle_model: "CB500".to_string(),
            vehicle_year: year,
            description: description.to_string(),
        }
    }

    fn year(y: f64) -> Option<VehicleYear> {
        Some(VehicleYear::Number(y))
    }

    fn is_multiple_of_quarter(hours: f64) -> bool {
        ((hours * 4.0) - (hours * 4.0).round()).abs() < 1e-9
    }

    #[test]
    fn test_keywords_accumulate() {
        let config = EstimatorConfig::default();
        let hours = HeuristicEstimator::new().estimate(
            &config,
            &input("repair", year(2010.0), "Engine stalls and the brake lever is soft"),
        );
        // 2.5 base + 1.5 engine + 0.5 brake + 0.25 year
        assert_eq!(hours, 4.75);
    }

    #[test]
    fn test_year_boundaries() {
        let config = EstimatorConfig::default();
        let estimator = HeuristicEstimator::new();
        let cases = [
            (year(2005.0), 2.0),
            (year(2006.0), 1.75),
            (year(2012.0), 1.75),
            (year(2013.0), 1.5),
            (Some(VehicleYear::Text("abc".to_string())), 1.5),
            (Some(VehicleYear::Text(String::new())), 1.5),
            (None, 1.5),
        ];
        for (vehicle_year, expected) in cases {
            let hours = estimator.estimate(&config, &input("maintenance", vehicle_year.clone(), "Annual service"));
            assert_eq!(hours, expected, "year {:?}", vehicle_year);
        }
    }

    #[test]
    fn test_unknown_service_type_uses_other() {
        let config = EstimatorConfig::default();
        let hours = HeuristicEstimator::new().estimate(&config, &input("bodywork", None, "Scratch on tank"));
        assert_eq!(hours, 2.0);
    }

    #[test]
    fn test_clamped_to_max() {
        let config = EstimatorConfig::default().merge(&RuntimeOverride {
            keyword_adjustments: Some(vec![KeywordRuleDoc {
                pattern: "rebuild".to_string(),
                flags: "i".to_string(),
                delta_hours: 20.0,
            }]),
            ..Default::default()
        });
        let hours = HeuristicEstimator::new().estimate(&config, &input("repair", year(1999.0), "Full rebuild"));
        assert_eq!(hours, 8.0);
    }

    #[test]
    fn test_clamped_to_min() {
        let config = EstimatorConfig::default();
        let hours = HeuristicEstimator::new().estimate(
            &config,
            &input("inspection", year(2020.0), "Check tire pressure and spark plug"),
        );
        // 1.0 - 0.25 - 0.25 = 0.5, exactly the minimum
        assert_eq!(hours, 0.5);
    }

    #[test]
    fn test_results_stay_in_bounds_and_on_grid() {
        let config = EstimatorConfig::default();
        let estimator = HeuristicEstimator::new();
        let descriptions = [
            "",
            "engine wiring diagnosis intermittent",
            "brake oil leak chain tire spark plug",
            "kamrem topplock alternator däck",
            "nothing relevant here",
        ];
        for service_type in ["repair", "maintenance", "inspection", "other", "unknown"] {
            for description in descriptions {
                for y in [1990.0, 2008.0, 2020.0] {
                    let hours = estimator.estimate(&config, &input(service_type, year(y), description));
                    assert!((0.5..=8.0).contains(&hours), "{} out of bounds", hours);
                    assert!(is_multiple_of_quarter(hours), "{} not on 15 minute grid", hours);
                }
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let config = EstimatorConfig::default();
        let estimator = HeuristicEstimator::new();
        let job = input("repair", year(2003.0), "Electrical fault, intermittent stalling");
        assert_eq!(estimator.estimate(&config, &job), estimator.estimate(&config, &job));
    }

    #[test]
    fn test_round_to_minutes_half_up() {
        assert_eq!(round_to_minutes(1.125, 15.0), 1.25);
        assert_eq!(round_to_minutes(1.1, 15.0), 1.0);
        assert_eq!(round_to_minutes(1.1, 0.0), 1.1);
    }

    #[test]
    fn test_finalize_keeps_result_inside_uneven_bounds() {
        let mut config = EstimatorConfig::default();
        config.max_hours = 7.9;
        // 7.9 rounds to 8.0 on the quarter grid, which would exceed the max.
        assert_eq!(finalize_hours(&config, 12.0), 7.75);

        config.min_hours = 7.8;
        // No quarter-hour multiple in [7.8, 7.9].
        assert_eq!(finalize_hours(&config, 12.0), 7.9);
    }

    #[test]
    fn test_two_decimals() {
        assert_eq!(two_decimals(1.0 / 3.0), 0.33);
        assert_eq!(two_decimals(4.75), 4.75);
    }
}
