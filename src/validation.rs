//! Input validation for estimate requests and configuration overrides.

use serde::Serialize;

use crate::error::PatternError;
use crate::estimation::{EstimatorConfig, RuntimeOverride};

/// Maximum accepted job description length in bytes.
pub const MAX_DESCRIPTION_BYTES: usize = 10 * 1024;

/// Upper bound accepted for the model sampling temperature.
const MAX_TEMPERATURE: f32 = 2.0;

/// Result of validating input.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the input is valid.
    pub is_valid: bool,
    /// Validation errors if any.
    pub errors: Vec<ValidationError>,
    /// Warnings that don't block processing.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Create a successful validation result.
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }

    /// Create a validation result with an error.
    pub fn error(error: ValidationError) -> Self {
        Self {
            is_valid: false,
            errors: vec![error],
            warnings: vec![],
        }
    }

    /// Add a warning to the result.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Merge another validation result into this one.
    pub fn merge(mut self, other: Self) -> Self {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>, code: ValidationErrorCode) {
        self.is_valid = false;
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
            code,
        });
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// A validation error.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    /// Field or aspect that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Error code for programmatic handling.
    pub code: ValidationErrorCode,
}

/// Error codes for validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    Empty,
    TooLong,
    InvalidEncoding,
    InvalidPattern,
    OutOfRange,
}

/// Text field validator.
pub struct Validator {
    /// Maximum input length.
    max_length: usize,
}

impl Validator {
    /// Create a new validator with default settings.
    pub fn new() -> Self {
        Self {
            max_length: MAX_DESCRIPTION_BYTES,
        }
    }

    /// Set maximum input length.
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = max;
        self
    }

    /// Validate a required text field. Whitespace-only counts as empty.
    pub fn validate(&self, field: &str, input: Option<&str>) -> ValidationResult {
        let input = input.unwrap_or_default();

        if input.trim().is_empty() {
            return ValidationResult::error(ValidationError {
                field: field.to_string(),
                message: format!("{} is required", field),
                code: ValidationErrorCode::Empty,
            });
        }

        let mut result = ValidationResult::ok();

        if input.len() > self.max_length {
            result.push(
                field,
                format!("{} too long: {} bytes (max {})", field, input.len(), self.max_length),
                ValidationErrorCode::TooLong,
            );
        }

        if input.contains('\x00') {
            result.push(field, format!("{} contains null bytes", field), ValidationErrorCode::InvalidEncoding);
        }

        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate an override before it is persisted.
///
/// Checks the document itself (patterns compile, numbers are finite and in
/// range) and the configuration it would produce on top of `base`
/// (`minHours <= maxHours`).
pub fn validate_override(base: &EstimatorConfig, overrides: &RuntimeOverride) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if let Some(hours) = &overrides.service_type_base_hours {
        for (service_type, base_hours) in hours {
            let field = format!("serviceTypeBaseHours.{}", service_type);
            if service_type.trim().is_empty() {
                result.push(field, "service type name is empty", ValidationErrorCode::Empty);
            } else if !base_hours.is_finite() || *base_hours < 0.0 {
                result.push(field, "base hours must be a non-negative number", ValidationErrorCode::OutOfRange);
            }
        }
    }

    if let Some(rules) = &overrides.keyword_adjustments {
        for (idx, rule) in rules.iter().enumerate() {
            let field = format!("keywordAdjustments[{}]", idx);
            if rule.pattern.is_empty() {
                result.push(&field, "pattern is empty", ValidationErrorCode::Empty);
                continue;
            }
            if !rule.delta_hours.is_finite() {
                result.push(&field, "deltaHours must be a finite number", ValidationErrorCode::OutOfRange);
            }
            match rule.compile() {
                Ok(_) => {
                    let ignored: String = rule.flags.chars().filter(|c| "guyd".contains(*c)).collect();
                    if !ignored.is_empty() {
                        result = result.with_warning(format!(
                            "{}: flags '{}' have no effect on matching",
                            field, ignored
                        ));
                    }
                }
                Err(PatternError::UnknownFlag(flag)) => {
                    result.push(
                        &field,
                        format!("unsupported flag '{}' (allowed: i, m, s, g, u, y, d)", flag),
                        ValidationErrorCode::InvalidPattern,
                    );
                }
                Err(PatternError::Invalid(e)) => {
                    result.push(
                        &field,
                        format!("pattern '{}' does not compile: {}", rule.pattern, e),
                        ValidationErrorCode::InvalidPattern,
                    );
                }
            }
        }
    }

    for (field, value) in [("minHours", overrides.min_hours), ("maxHours", overrides.max_hours)] {
        if let Some(value) = value
            && (!value.is_finite() || value < 0.0)
        {
            result.push(field, "must be a non-negative number", ValidationErrorCode::OutOfRange);
        }
    }

    if let Some(minutes) = overrides.round_to_minutes
        && (!minutes.is_finite() || minutes <= 0.0)
    {
        result.push("roundToMinutes", "must be greater than zero", ValidationErrorCode::OutOfRange);
    }

    let min = overrides.min_hours.unwrap_or(base.min_hours);
    let max = overrides.max_hours.unwrap_or(base.max_hours);
    if min > max {
        result.push(
            "minHours",
            format!("minHours ({}) must not exceed maxHours ({})", min, max),
            ValidationErrorCode::OutOfRange,
        );
    }

    if let Some(model) = &overrides.model {
        if let Some(temperature) = model.temperature
            && !(0.0..=MAX_TEMPERATURE).contains(&temperature)
        {
            result.push(
                "openAI.temperature",
                format!("must be between 0 and {}", MAX_TEMPERATURE),
                ValidationErrorCode::OutOfRange,
            );
        }
        if let Some(name) = &model.model
            && name.trim().is_empty()
        {
            result.push("openAI.model", "model identifier is empty", ValidationErrorCode::Empty);
        }
    }

    result
}
