//! Configuration validation.
//!
//! Ensures all required values are present and within valid ranges before
//! a connection to the gateway is attempted.

use thiserror::Error;

use crate::config::{ClientConfig, Config, GatewayConfig, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{} problems: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors: Vec<ValidationError> = [
            self.gateway.validate(),
            self.client.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty"];

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: field.into(),
        });
    }
    Ok(())
}

fn positive(field: &str, value: u64) -> ValidationResult<()> {
    if value == 0 {
        return Err(invalid(field, "must be greater than 0"));
    }
    Ok(())
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ValidationResult<()> {
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        return Ok(());
    }
    Err(invalid(field, format!("must be one of: {}", allowed.join(", "))))
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> ValidationResult<()> {
        required("gateway.url", &self.url)?;
        let url = url::Url::parse(&self.url).map_err(|e| invalid("gateway.url", e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(invalid(
                "gateway.url",
                format!("scheme must be ws or wss, got {}", url.scheme()),
            ));
        }

        positive("gateway.connect_timeout_secs", self.connect_timeout_secs)?;
        positive("gateway.reply_timeout_secs", self.reply_timeout_secs)?;
        if self.max_teardown_retries == 0 {
            return Err(invalid(
                "gateway.max_teardown_retries",
                "at least one retry is required",
            ));
        }
        Ok(())
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> ValidationResult<()> {
        required("client.language", &self.language)?;
        required("client.app_version", &self.app_version)?;

        if self.resolve_version {
            url::Url::parse(&self.version_source_url)
                .map_err(|e| invalid("client.version_source_url", e.to_string()))?;
            positive(
                "client.version_fetch_timeout_secs",
                self.version_fetch_timeout_secs,
            )?;
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        one_of("observability.log_level", &self.log_level, LOG_LEVELS)?;
        one_of("observability.log_format", &self.log_format, LOG_FORMATS)
    }
}
