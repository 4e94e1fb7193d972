//! Model-assisted estimation.
//!
//! Asks the configured language model for a single number of hours. Every
//! failure is absorbed here and reported as an [`ExternalOutcome`] so the
//! caller can fall back to the heuristic.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::estimation::{EstimationInput, VehicleYear};
use crate::estimation::heuristic::finalize_hours;
use crate::estimation::settings::EstimatorConfig;
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

/// A bare number needs only a handful of tokens.
const MAX_RESPONSE_TOKENS: u32 = 32;

/// Result of asking the external model.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalOutcome {
    /// A usable, clamped and rounded estimate.
    Estimate(f64),
    /// The model stage is switched off or has no credential.
    Unavailable(UnavailableReason),
    /// The call was made but produced nothing usable.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    Disabled,
    NoCredential,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled in configuration"),
            Self::NoCredential => write!(f, "no API key configured"),
        }
    }
}

/// Adapter between the estimator and an [`LlmProvider`].
pub struct ModelEstimator {
    provider: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl ModelEstimator {
    /// `provider` is `None` when no credential is configured.
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn estimate(&self, config: &EstimatorConfig, input: &EstimationInput) -> ExternalOutcome {
        if !config.model.enabled {
            return ExternalOutcome::Unavailable(UnavailableReason::Disabled);
        }
        let Some(provider) = &self.provider else {
            return ExternalOutcome::Unavailable(UnavailableReason::NoCredential);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(config.model.system_prompt.clone()),
            ChatMessage::user(build_user_prompt(input)),
        ])
        .with_model(config.model.model.clone())
        .with_temperature(config.model.temperature)
        .with_max_tokens(MAX_RESPONSE_TOKENS);

        let response = match tokio::time::timeout(self.timeout, provider.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return ExternalOutcome::Failed(e.to_string()),
            Err(_) => {
                return ExternalOutcome::Failed(format!("no response within {:?}", self.timeout));
            }
        };

        tracing::debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            finish_reason = ?response.finish_reason,
            "Model reply received"
        );
        if response.finish_reason == FinishReason::ContentFilter {
            return ExternalOutcome::Failed("reply withheld by content filter".to_string());
        }

        let content = response.content.trim();
        if content.is_empty() {
            return ExternalOutcome::Failed("empty response".to_string());
        }

        match parse_hours(content) {
            Some(hours) => ExternalOutcome::Estimate(finalize_hours(config, hours)),
            None => ExternalOutcome::Failed(format!("non-numeric response: {:?}", content)),
        }
    }
}

/// The user message: job facts, one per line, and the output instruction.
pub fn build_user_prompt(input: &EstimationInput) -> String {
    let year = match &input.vehicle_year {
        Some(year @ VehicleYear::Number(n)) if *n != 0.0 && !n.is_nan() => year.to_string(),
        Some(VehicleYear::Text(s)) if !s.is_empty() => s.clone(),
        _ => "unknown year".to_string(),
    };

    [
        format!("Service type: {}", input.service_type),
        format!("Vehicle: {} {} ({})", input.vehicle_make, input.vehicle_model, year),
        format!("Task description: {}", input.description),
        "Output only a single number in hours, e.g. 2.5".to_string(),
    ]
    .join("\n")
}

/// Extract hours from free model output.
///
/// Everything except digits and `.` is dropped, then the longest numeric
/// prefix is parsed, so `"about 2.5 h"` gives 2.5 and `"2.5.1"` gives 2.5.
pub fn parse_hours(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    let mut end = 0;
    let mut seen_dot = false;
    for (idx, c) in cleaned.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = idx + 1;
    }

    let prefix = &cleaned[..end];
    if !prefix.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
