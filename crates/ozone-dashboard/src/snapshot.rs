//! The published dashboard state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ozone_core::Theme;
use ozone_env::risk::{self, AqiBand, PollenRisk, PollutantStatus};
use ozone_env::{
    Advisory, AirQualityReading, Location, PollenReading, Pollutant, WeatherReading,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Preferences {
    pub theme: Theme,
    /// Lowers the lung and pollen risk thresholds
    pub sensitivity_mode: bool,
}

/// Everything a view needs to render the dashboard.
///
/// Readings are only trustworthy when [`Snapshot::is_settled`] holds; while
/// `loading` they may be stale or absent, and after a failed refresh they
/// keep their previous values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub location: Location,
    pub weather: Option<WeatherReading>,
    pub air_quality: Option<AirQualityReading>,
    pub pollen: Option<PollenReading>,
    pub loading: bool,
    /// User-facing message from the last refresh, if it failed
    pub error: Option<String>,
    pub preferences: Preferences,
    /// When readings were last replaced
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// State before the first refresh completes.
    pub fn initial(location: Location, preferences: Preferences) -> Self {
        Self {
            location,
            weather: None,
            air_quality: None,
            pollen: None,
            loading: true,
            error: None,
            preferences,
            updated_at: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.loading && self.error.is_none()
    }

    fn sensitive(&self) -> bool {
        self.preferences.sensitivity_mode
    }

    pub fn lung_risk(&self) -> Option<bool> {
        self.air_quality
            .as_ref()
            .map(|aq| risk::is_lung_risk(aq.pm25, self.sensitive()))
    }

    pub fn pollen_risk(&self) -> Option<PollenRisk> {
        self.pollen
            .as_ref()
            .map(|pollen| risk::pollen_risk(pollen.max_pollen, self.sensitive()))
    }

    pub fn aqi_band(&self) -> Option<AqiBand> {
        self.air_quality.as_ref().map(|aq| risk::aqi_band(aq.aqi))
    }

    /// Colour band of each pollutant against its limit. Empty without a reading.
    pub fn pollutant_statuses(&self) -> Vec<(Pollutant, PollutantStatus)> {
        let Some(aq) = &self.air_quality else {
            return Vec::new();
        };
        Pollutant::ALL
            .into_iter()
            .map(|pollutant| {
                let status = risk::pollutant_status(aq.concentration(pollutant), pollutant.limit());
                (pollutant, status)
            })
            .collect()
    }

    /// Headline for the air-quality card.
    pub fn status_text(&self) -> &'static str {
        self.aqi_band()
            .map(|band| band.headline())
            .unwrap_or(risk::AQI_SCANNING)
    }

    /// Offline advisory for the current place and readings.
    pub fn advisory(&self) -> Advisory {
        let aqi = self.air_quality.as_ref().map_or(0.0, |aq| aq.aqi);
        let uv = self.weather.as_ref().map_or(0.0, |w| w.uv_index);
        Advisory::local(&self.location.city_name, aqi, uv)
    }
}
