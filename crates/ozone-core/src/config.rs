use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Prefix for environment overrides, e.g. `OZONE_REFRESH__INTERVAL_MINUTES=10`.
const ENV_PREFIX: &str = "OZONE";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Startup location and GPS handling
    pub location: LocationConfig,

    /// Background refresh settings
    pub refresh: RefreshConfig,

    /// Upstream data providers
    pub providers: ProviderConfig,

    /// Initial user preferences
    pub preferences: PreferencesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fallback latitude used until any real location signal arrives
    pub default_latitude: f64,

    /// Fallback longitude used until any real location signal arrives
    pub default_longitude: f64,

    /// City name shown for the fallback coordinate
    pub default_city: String,

    /// Minimum change in degrees (either axis) before a GPS update counts as movement
    pub movement_threshold_degrees: f64,

    /// Bound on the one-shot startup location request
    pub initial_fix_timeout_secs: u64,

    /// Bound on waiting for each continuous location update
    pub watch_timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_latitude: 40.7128,
            default_longitude: -74.0060,
            default_city: "New York".to_string(),
            movement_threshold_degrees: 0.005,
            initial_fix_timeout_secs: 10,
            watch_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Background refresh interval in minutes (0 disables it)
    pub interval_minutes: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Open-Meteo forecast API base URL
    pub forecast_url: String,

    /// Open-Meteo air-quality API base URL (also serves pollen)
    pub air_quality_url: String,

    /// Nominatim base URL for reverse and forward geocoding
    pub geocoding_url: String,

    /// User-Agent sent with every request (Nominatim rejects anonymous clients)
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1".to_string(),
            air_quality_url: "https://air-quality-api.open-meteo.com/v1".to_string(),
            geocoding_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("Ozone/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Colour scheme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// Theme at startup
    pub theme: Theme,

    /// Lower health-risk thresholds for sensitive users
    pub sensitivity_mode: bool,
}

impl Config {
    /// Load configuration from the default location plus `OZONE_*` environment overrides.
    ///
    /// A missing file is not an error: defaults apply. Nothing is written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config directory available, using defaults");
                Self::load_layers(None)
            }
        }
    }

    /// Load configuration from a specific TOML file plus environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layers(Some(path))
    }

    fn load_layers(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            tracing::debug!("Reading config from {}", path.display());
            builder = builder.add_source(
                ::config::File::from(path.to_path_buf())
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }

        let layered = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        layered
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let location = &self.location;
        if !(-90.0..=90.0).contains(&location.default_latitude) {
            result.add_error(
                "location.default_latitude",
                "Latitude must be between -90 and 90",
            );
        }
        if !(-180.0..=180.0).contains(&location.default_longitude) {
            result.add_error(
                "location.default_longitude",
                "Longitude must be between -180 and 180",
            );
        }
        if location.default_city.trim().is_empty() {
            result.add_warning(
                "location.default_city",
                "Default city is empty; it will be resolved by reverse geocoding",
            );
        }
        if location.movement_threshold_degrees <= 0.0 {
            result.add_error(
                "location.movement_threshold_degrees",
                "Movement threshold must be greater than 0",
            );
        } else if location.movement_threshold_degrees > 1.0 {
            result.add_warning(
                "location.movement_threshold_degrees",
                "Movement threshold is more than 1 degree (~110 km)",
            );
        }
        if location.initial_fix_timeout_secs == 0 {
            result.add_error(
                "location.initial_fix_timeout_secs",
                "Initial fix timeout must be greater than 0",
            );
        }
        if location.watch_timeout_secs == 0 {
            result.add_error(
                "location.watch_timeout_secs",
                "Watch timeout must be greater than 0",
            );
        }

        // Validate background refresh interval
        if self.refresh.interval_minutes == 0 {
            result.add_warning("refresh.interval_minutes", "Background refresh disabled (0 minutes)");
        } else if self.refresh.interval_minutes > 1440 {
            result.add_warning(
                "refresh.interval_minutes",
                "Background refresh interval is more than 24 hours",
            );
        }

        let providers = &self.providers;
        self.validate_url(&providers.forecast_url, "providers.forecast_url", &mut result);
        self.validate_url(
            &providers.air_quality_url,
            "providers.air_quality_url",
            &mut result,
        );
        self.validate_url(&providers.geocoding_url, "providers.geocoding_url", &mut result);

        if providers.user_agent.trim().is_empty() {
            result.add_warning(
                "providers.user_agent",
                "No User-Agent set; geocoding requests may be rejected",
            );
        }
        if providers.request_timeout_secs == 0 {
            result.add_error(
                "providers.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()
            .ok_or_else(|| ConfigError::WriteFailed("no config directory".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(e.to_string()))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::WriteFailed(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::WriteFailed(e.to_string()))
    }

    /// Directory holding the configuration file, if the platform has one
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ozone"))
    }

    /// Get the path to the configuration file
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_default_location_is_new_york() {
        let location = LocationConfig::default();
        assert_eq!(location.default_latitude, 40.7128);
        assert_eq!(location.default_longitude, -74.0060);
        assert_eq!(location.default_city, "New York");
        assert_eq!(location.movement_threshold_degrees, 0.005);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.providers.forecast_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "providers.forecast_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.providers.geocoding_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_out_of_range_default_coordinates() {
        let mut config = Config::default();
        config.location.default_latitude = 91.0;
        config.location.default_longitude = -181.0;
        let result = config.validate();
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_zero_threshold_is_error() {
        let mut config = Config::default();
        config.location.movement_threshold_degrees = 0.0;
        let result = config.validate();
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "location.movement_threshold_degrees"));
    }

    #[test]
    fn test_disabled_refresh_is_warning() {
        let mut config = Config::default();
        config.refresh.interval_minutes = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "refresh.interval_minutes"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.refresh.interval_minutes, 5);
        assert_eq!(config.preferences.theme, Theme::Light);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[preferences]\ntheme = \"dark\"\nsensitivity_mode = true\n\n[refresh]\ninterval_minutes = 15\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.preferences.theme, Theme::Dark);
        assert!(config.preferences.sensitivity_mode);
        assert_eq!(config.refresh.interval_minutes, 15);
        assert_eq!(config.location.default_city, "New York");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.location.default_city = "London".to_string();
        config.location.default_latitude = 51.5;
        config.location.default_longitude = -0.12;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.location.default_city, "London");
        assert_eq!(loaded.location.default_latitude, 51.5);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[refresh\ninterval_minutes = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
