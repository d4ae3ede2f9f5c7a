//! Runtime settings derived from the loaded configuration.

use std::time::Duration;

use ozone_core::{Config, ProviderConfig};
use ozone_env::{Location, ProviderEndpoints};

use crate::snapshot::Preferences;

/// Everything the dashboard needs from [`Config`], in runtime units.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    /// Location shown until a device fix arrives
    pub default_location: Location,
    /// Minimum coordinate change, in degrees, for a device update to count
    pub movement_threshold: f64,
    pub initial_fix_timeout: Duration,
    pub watch_timeout: Duration,
    /// Background refresh period; `None` disables the timer.
    pub refresh_interval: Option<Duration>,
    pub preferences: Preferences,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DashboardSettings {
    fn from(config: &Config) -> Self {
        let location = &config.location;
        let interval_minutes = u64::from(config.refresh.interval_minutes);

        Self {
            default_location: Location::new(
                location.default_latitude,
                location.default_longitude,
                location.default_city.clone(),
            ),
            movement_threshold: location.movement_threshold_degrees,
            initial_fix_timeout: Duration::from_secs(location.initial_fix_timeout_secs),
            watch_timeout: Duration::from_secs(location.watch_timeout_secs),
            refresh_interval: (interval_minutes > 0)
                .then(|| Duration::from_secs(interval_minutes * 60)),
            preferences: Preferences {
                theme: config.preferences.theme,
                sensitivity_mode: config.preferences.sensitivity_mode,
            },
        }
    }
}

/// Gateway endpoints for the configured providers.
pub fn provider_endpoints(providers: &ProviderConfig) -> ProviderEndpoints {
    ProviderEndpoints {
        forecast_url: providers.forecast_url.clone(),
        air_quality_url: providers.air_quality_url.clone(),
        geocoding_url: providers.geocoding_url.clone(),
        user_agent: providers.user_agent.clone(),
        timeout: Duration::from_secs(providers.request_timeout_secs),
    }
}
