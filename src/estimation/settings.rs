//! Estimator configuration: built-in defaults, the runtime override document,
//! and the merge that produces the effective configuration.
//!
//! The effective configuration is never cached. [`ConfigStore`] rebuilds it
//! from the base defaults and the override file on every read.
//!
//! [`ConfigStore`]: crate::estimation::ConfigStore

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Model used when `OPENAI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Flags applied to a keyword rule that does not specify any.
pub const DEFAULT_FLAGS: &str = "i";

/// Service type used when the requested one has no base-hours entry.
pub const FALLBACK_SERVICE_TYPE: &str = "other";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a service advisor for moped/motorcycle repairs. \
Given a task description and vehicle info, output ONLY a single decimal number representing \
estimated technician hours. No units, no words, just the number. Favor realistic, conservative \
estimates.";

const DEFAULT_BASE_HOURS: &[(&str, f64)] = &[
    ("repair", 2.5),
    ("maintenance", 1.5),
    ("inspection", 1.0),
    ("other", 2.0),
];

const DEFAULT_KEYWORD_RULES: &[(&str, f64)] = &[
    ("engine|motor|topplock|kolv|kamrem", 1.5),
    ("electrical|wiring|alternator|generator", 1.0),
    ("diagnos|intermittent", 0.5),
    ("brake|broms|bromsar|skiva|belägg", 0.5),
    ("oil leak|olj[e]?läck", 0.5),
    ("tire|däck|hjul", -0.25),
    ("spark plug|tändstift", -0.25),
    ("chain|kedja|drev", 0.25),
];

/// A compiled keyword rule: when `pattern` matches the job description,
/// `delta_hours` is added to the estimate.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    matcher: Regex,
    flags: String,
    delta_hours: f64,
}

impl KeywordRule {
    /// Compile a rule from its textual pattern and flag string.
    ///
    /// Flags follow the admin UI's convention: `i`, `m` and `s` change
    /// matching; `g`, `u`, `y` and `d` are accepted and ignored. An empty
    /// flag string means [`DEFAULT_FLAGS`].
    pub fn compile(pattern: &str, flags: &str, delta_hours: f64) -> Result<Self, PatternError> {
        let flags = if flags.is_empty() { DEFAULT_FLAGS } else { flags };

        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'g' | 'u' | 'y' | 'd' => {}
                other => return Err(PatternError::UnknownFlag(other)),
            }
        }

        Ok(Self {
            matcher: builder.build()?,
            flags: flags.to_string(),
            delta_hours,
        })
    }

    /// Unanchored search anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn delta_hours(&self) -> f64 {
        self.delta_hours
    }

    /// Transport form of this rule.
    pub fn to_doc(&self) -> KeywordRuleDoc {
        KeywordRuleDoc {
            pattern: self.pattern().to_string(),
            flags: self.flags.clone(),
            delta_hours: self.delta_hours,
        }
    }
}

/// Keyword rule as it travels over the API and sits in the override file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRuleDoc {
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
    #[serde(default)]
    pub delta_hours: f64,
}

impl KeywordRuleDoc {
    pub fn compile(&self) -> Result<KeywordRule, PatternError> {
        KeywordRule::compile(&self.pattern, &self.flags, self.delta_hours)
    }
}

/// Age surcharge: older vehicles take longer to work on.
///
/// Each step is `(max_year, delta_hours)`; the first step whose `max_year`
/// is at or above the vehicle's year applies.
#[derive(Debug, Clone, PartialEq)]
pub struct YearAdjustment {
    steps: Vec<(i64, f64)>,
}

impl YearAdjustment {
    pub fn hours_for(&self, year: Option<i64>) -> f64 {
        let Some(year) = year else {
            return 0.0;
        };
        self.steps
            .iter()
            .find(|(max_year, _)| year <= *max_year)
            .map(|(_, delta)| *delta)
            .unwrap_or(0.0)
    }
}

impl Default for YearAdjustment {
    fn default() -> Self {
        Self {
            steps: vec![(2005, 0.5), (2012, 0.25)],
        }
    }
}

/// Settings for the external model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// Set to false to force heuristic-only estimation.
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
}

/// A complete estimator configuration.
///
/// The built-in defaults are one of these; so is the effective
/// configuration produced by [`EstimatorConfig::merge`].
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub service_type_base_hours: BTreeMap<String, f64>,
    /// Applied in order; every matching rule contributes.
    pub keyword_adjustments: Vec<KeywordRule>,
    pub year_adjustment: YearAdjustment,
    pub min_hours: f64,
    pub max_hours: f64,
    /// Estimates are rounded to the nearest multiple of this many minutes.
    pub round_to_minutes: f64,
    pub model: ModelSettings,
}

impl EstimatorConfig {
    /// Built-in defaults, using `model` as the external model identifier.
    pub fn defaults(model: impl Into<String>) -> Self {
        let keyword_adjustments = DEFAULT_KEYWORD_RULES
            .iter()
            .filter_map(
                |(pattern, delta)| match KeywordRule::compile(pattern, DEFAULT_FLAGS, *delta) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::error!(pattern = %pattern, error = %e, "Built-in keyword rule failed to compile");
                        None
                    }
                },
            )
            .collect();

        Self {
            service_type_base_hours: DEFAULT_BASE_HOURS
                .iter()
                .map(|(name, hours)| (name.to_string(), *hours))
                .collect(),
            keyword_adjustments,
            year_adjustment: YearAdjustment::default(),
            min_hours: 0.5,
            max_hours: 8.0,
            round_to_minutes: 15.0,
            model: ModelSettings {
                enabled: true,
                model: model.into(),
                temperature: 0.2,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
        }
    }

    /// Apply an override on top of this configuration.
    ///
    /// Scalars are replaced when present, base hours merge key by key, model
    /// settings merge field by field, and keyword rules are replaced as a
    /// whole only by a non-empty list.
    pub fn merge(&self, overrides: &RuntimeOverride) -> Self {
        let mut merged = self.clone();

        if let Some(hours) = &overrides.service_type_base_hours {
            for (service_type, base) in hours {
                merged
                    .service_type_base_hours
                    .insert(service_type.clone(), *base);
            }
        }

        if let Some(rules) = &overrides.keyword_adjustments
            && !rules.is_empty()
        {
            let compiled: Vec<KeywordRule> = rules
                .iter()
                .filter_map(|doc| match doc.compile() {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        tracing::warn!(
                            pattern = %doc.pattern,
                            error = %e,
                            "Skipping keyword rule that failed to compile"
                        );
                        None
                    }
                })
                .collect();

            if compiled.is_empty() {
                tracing::warn!("No override keyword rule compiled, keeping the previous rules");
            } else {
                merged.keyword_adjustments = compiled;
            }
        }

        if let Some(min) = usable_hours("minHours", overrides.min_hours) {
            merged.min_hours = min;
        }
        if let Some(max) = usable_hours("maxHours", overrides.max_hours) {
            merged.max_hours = max;
        }
        if let Some(minutes) = usable_hours("roundToMinutes", overrides.round_to_minutes) {
            merged.round_to_minutes = minutes;
        }

        if let Some(model) = &overrides.model {
            if let Some(enabled) = model.enabled {
                merged.model.enabled = enabled;
            }
            if let Some(name) = &model.model {
                merged.model.model = name.clone();
            }
            if let Some(temperature) = model.temperature {
                merged.model.temperature = temperature;
            }
            if let Some(prompt) = &model.system_prompt {
                merged.model.system_prompt = prompt.clone();
            }
        }

        if merged.min_hours > merged.max_hours {
            tracing::warn!(
                min_hours = merged.min_hours,
                max_hours = merged.max_hours,
                "Override has minHours above maxHours, swapping bounds"
            );
            std::mem::swap(&mut merged.min_hours, &mut merged.max_hours);
        }

        merged
    }

    /// Transport form, with patterns split into source text and flags and
    /// the model settings reduced to what the admin UI may see.
    pub fn to_view(&self) -> ConfigView {
        ConfigView {
            service_type_base_hours: self.service_type_base_hours.clone(),
            keyword_adjustments: self.keyword_adjustments.iter().map(KeywordRule::to_doc).collect(),
            min_hours: self.min_hours,
            max_hours: self.max_hours,
            round_to_minutes: self.round_to_minutes,
            model: ModelView {
                enabled: self.model.enabled,
                model: self.model.model.clone(),
                temperature: self.model.temperature,
            },
        }
    }
}

/// Override values that cannot bound or round an estimate (negative or not
/// finite) are dropped so the base value stays in effect.
fn usable_hours(key: &str, value: Option<f64>) -> Option<f64> {
    let value = value?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        tracing::warn!(key, value, "Ignoring unusable override value");
        None
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::defaults(DEFAULT_MODEL)
    }
}

/// Partial configuration saved by an admin. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type_base_hours: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_adjustments: Option<Vec<KeywordRuleDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_to_minutes: Option<f64>,
    #[serde(rename = "openAI", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Effective configuration as returned by `GET /api/ai/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub service_type_base_hours: BTreeMap<String, f64>,
    pub keyword_adjustments: Vec<KeywordRuleDoc>,
    pub min_hours: f64,
    pub max_hours: f64,
    pub round_to_minutes: f64,
    #[serde(rename = "openAI")]
    pub model: ModelView,
}

/// Model settings without the system prompt or any credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelView {
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(pattern: &str, delta: f64) -> KeywordRuleDoc {
        KeywordRuleDoc {
            pattern: pattern.to_string(),
            flags: "i".to_string(),
            delta_hours: delta,
        }
    }

    #[test]
    fn test_defaults_compile_every_rule() {
        let config = EstimatorConfig::default();
        assert_eq!(config.keyword_adjustments.len(), DEFAULT_KEYWORD_RULES.len());
        assert_eq!(config.service_type_base_hours["repair"], 2.5);
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert!(config.model.enabled);
    }

    #[test]
    fn test_keyword_rule_is_case_insensitive_by_default() {
        let rule = KeywordRule::compile("brake", "", 0.5).unwrap();
        assert_eq!(rule.flags(), "i");
        assert!(rule.matches("Front BRAKES squeal"));
    }

    #[test]
    fn test_keyword_rule_respects_case_sensitive_flags() {
        let rule = KeywordRule::compile("ABS", "g", 0.5).unwrap();
        assert!(rule.matches("ABS light on"));
        assert!(!rule.matches("abs light on"));
    }

    #[test]
    fn test_keyword_rule_rejects_unknown_flag() {
        let err = KeywordRule::compile("brake", "ix", 0.5).unwrap_err();
        assert!(matches!(err, PatternError::UnknownFlag('x')));
    }

    #[test]
    fn test_keyword_rule_rejects_bad_regex() {
        assert!(matches!(
            KeywordRule::compile("(unclosed", "i", 0.5),
            Err(PatternError::Invalid(_))
        ));
    }

    #[test]
    fn test_swedish_patterns_match() {
        let config = EstimatorConfig::default();
        let text = "Byt bromsbelägg och kedja";
        let total: f64 = config
            .keyword_adjustments
            .iter()
            .filter(|r| r.matches(text))
            .map(KeywordRule::delta_hours)
            .sum();
        assert_eq!(total, 0.75);
    }

    #[test]
    fn test_year_adjustment_boundaries() {
        let years = YearAdjustment::default();
        assert_eq!(years.hours_for(Some(2005)), 0.5);
        assert_eq!(years.hours_for(Some(2006)), 0.25);
        assert_eq!(years.hours_for(Some(2012)), 0.25);
        assert_eq!(years.hours_for(Some(2013)), 0.0);
        assert_eq!(years.hours_for(None), 0.0);
    }

    #[test]
    fn test_merge_scalar_leaves_other_fields() {
        let base = EstimatorConfig::default();
        let merged = base.merge(&RuntimeOverride {
            min_hours: Some(1.0),
            ..Default::default()
        });

        assert_eq!(merged.min_hours, 1.0);
        assert_eq!(merged.max_hours, base.max_hours);
        assert_eq!(merged.service_type_base_hours, base.service_type_base_hours);
        assert_eq!(merged.to_view().keyword_adjustments, base.to_view().keyword_adjustments);
    }

    #[test]
    fn test_merge_base_hours_key_by_key() {
        let base = EstimatorConfig::default();
        let merged = base.merge(&RuntimeOverride {
            service_type_base_hours: Some(BTreeMap::from([
                ("repair".to_string(), 3.0),
                ("warranty".to_string(), 0.75),
            ])),
            ..Default::default()
        });

        assert_eq!(merged.service_type_base_hours["repair"], 3.0);
        assert_eq!(merged.service_type_base_hours["warranty"], 0.75);
        assert_eq!(merged.service_type_base_hours["maintenance"], 1.5);
    }

    #[test]
    fn test_merge_replaces_keyword_list_wholesale() {
        let base = EstimatorConfig::default();
        let merged = base.merge(&RuntimeOverride {
            keyword_adjustments: Some(vec![rule("exhaust", 0.75)]),
            ..Default::default()
        });

        assert_eq!(merged.keyword_adjustments.len(), 1);
        assert_eq!(merged.keyword_adjustments[0].pattern(), "exhaust");
        assert!(!merged.keyword_adjustments.iter().any(|r| r.matches("engine")));
    }

    #[test]
    fn test_merge_ignores_empty_keyword_list() {
        let base = EstimatorConfig::default();
        let merged = base.merge(&RuntimeOverride {
            keyword_adjustments: Some(vec![]),
            ..Default::default()
        });
        assert_eq!(merged.keyword_adjustments.len(), base.keyword_adjustments.len());
    }

    #[test]
    fn test_merge_skips_uncompilable_rule() {
        let merged = EstimatorConfig::default().merge(&RuntimeOverride {
            keyword_adjustments: Some(vec![rule("(broken", 1.0), rule("exhaust", 0.5)]),
            ..Default::default()
        });
        assert_eq!(merged.keyword_adjustments.len(), 1);
        assert_eq!(merged.keyword_adjustments[0].pattern(), "exhaust");
    }

    #[test]
    fn test_merge_keeps_rules_when_none_compile() {
        let base = EstimatorConfig::default();
        let merged = base.merge(&RuntimeOverride {
            keyword_adjustments: Some(vec![rule("(broken", 1.0), rule("[also", 0.5)]),
            ..Default::default()
        });
        assert_eq!(merged.keyword_adjustments.len(), base.keyword_adjustments.len());
        assert!(merged.keyword_adjustments.iter().any(|r| r.matches("engine")));
    }

    #[test]
    fn test_merge_ignores_negative_and_non_finite_values() {
        let merged = EstimatorConfig::default().merge(&RuntimeOverride {
            min_hours: Some(-3.0),
            max_hours: Some(f64::INFINITY),
            round_to_minutes: Some(-15.0),
            ..Default::default()
        });
        assert_eq!(merged.min_hours, 0.5);
        assert_eq!(merged.max_hours, 8.0);
        assert_eq!(merged.round_to_minutes, 15.0);

        let merged = EstimatorConfig::default().merge(&RuntimeOverride {
            round_to_minutes: Some(0.0),
            ..Default::default()
        });
        assert_eq!(merged.round_to_minutes, 0.0);
    }

    #[test]
    fn test_merge_model_settings_field_by_field() {
        let merged = EstimatorConfig::default().merge(&RuntimeOverride {
            model: Some(ModelOverride {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(!merged.model.enabled);
        assert_eq!(merged.model.model, DEFAULT_MODEL);
        assert_eq!(merged.model.temperature, 0.2);
    }

    #[test]
    fn test_merge_swaps_inverted_bounds() {
        let merged = EstimatorConfig::default().merge(&RuntimeOverride {
            min_hours: Some(9.0),
            ..Default::default()
        });
        assert_eq!(merged.min_hours, 8.0);
        assert_eq!(merged.max_hours, 9.0);
    }

    #[test]
    fn test_override_json_shape() {
        let json = r#"{
            "minHours": 1.0,
            "keywordAdjustments": [{"pattern": "exhaust", "flags": "i", "deltaHours": 0.5}],
            "openAI": {"enabled": false}
        }"#;
        let parsed: RuntimeOverride = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.min_hours, Some(1.0));
        assert_eq!(parsed.keyword_adjustments.unwrap()[0].delta_hours, 0.5);
        assert_eq!(parsed.model.unwrap().enabled, Some(false));
        assert!(parsed.max_hours.is_none());
    }

    #[test]
    fn test_view_hides_system_prompt() {
        let value = serde_json::to_value(EstimatorConfig::default().to_view()).unwrap();
        let model = &value["openAI"];
        assert_eq!(model["model"], DEFAULT_MODEL);
        assert!(model.get("systemPrompt").is_none());
        assert_eq!(value["keywordAdjustments"][0]["flags"], "i");
    }
}
