//! Centralized error types for the Ozone application.
//!
//! This module provides a typed error hierarchy that:
//! - Separates configuration problems from sensor failures
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Sensor(e) => e.user_message(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Failed to write configuration: {0}")]
    WriteFailed(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::WriteFailed(_) => "Failed to save settings. Please try again.",
        }
    }
}

/// Failures of the sensor fetch cycle that reach the user.
///
/// Air quality, pollen and place names degrade to fallback values and never
/// show up here; only the weather reading is essential.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Weather data unavailable: {0}")]
    WeatherUnavailable(String),
}

impl SensorError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SensorError::WeatherUnavailable(_) => "Failed to load data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_non_empty() {
        let errors = [
            AppError::Config(ConfigError::Invalid("test".into())),
            AppError::Sensor(SensorError::WeatherUnavailable("test".into())),
        ];

        for err in &errors {
            assert!(!err.user_message().is_empty(), "{err} has no user message");
        }
    }

    #[test]
    fn test_app_error_conversion() {
        let sensor_err = SensorError::WeatherUnavailable("HTTP 503".into());
        let app_err: AppError = sensor_err.into();
        assert!(matches!(
            app_err,
            AppError::Sensor(SensorError::WeatherUnavailable(_))
        ));
    }

    #[test]
    fn test_weather_failure_uses_generic_message() {
        let app_err = AppError::Sensor(SensorError::WeatherUnavailable("timeout".into()));
        assert_eq!(app_err.user_message(), "Failed to load data");
        // Technical detail stays in the Display form for logs
        assert!(app_err.to_string().contains("timeout"));
    }
}
