use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolved place name used when reverse geocoding could not name a coordinate.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Species name reported when no pollen is in the air.
pub const NO_DOMINANT_SPECIES: &str = "None";

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51..=57 => Self::Drizzle,
            61..=67 | 80..=82 => Self::Rain,
            71..=77 | 85 | 86 => Self::Snow,
            95..=99 => Self::Thunderstorm,
            _ => Self::Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// Where the dashboard is looking.
///
/// An empty `city_name` means the name still has to be resolved by reverse
/// geocoding; [`UNKNOWN_LOCATION`] means resolution was attempted and failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub display_name: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, city_name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            city_name: city_name.into(),
            display_name: None,
        }
    }

    /// A coordinate whose place name has not been looked up yet.
    pub fn unresolved(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, "")
    }

    /// Whether a refresh should ask the reverse geocoder for a name.
    pub fn needs_resolution(&self) -> bool {
        self.city_name.is_empty() || self.city_name == UNKNOWN_LOCATION
    }

    pub fn same_coordinates(&self, other: &Location) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// Copy of this location carrying a resolved place name.
    pub fn with_city(&self, city_name: impl Into<String>) -> Self {
        Self {
            city_name: city_name.into(),
            ..self.clone()
        }
    }
}

/// A raw device location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One entry of the hourly UV series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyUv {
    pub time: NaiveDateTime,
    pub uv_index: f64,
}

/// Current weather plus today's sun times and UV curve.
///
/// Times are local to the requested coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: f64,
    /// UV index at the present hour, sampled from `hourly_uv`
    pub uv_index: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub weather_code: i32,
    pub is_day: bool,
    pub sunrise: NaiveDateTime,
    pub sunset: NaiveDateTime,
    pub hourly_uv: Vec<HourlyUv>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReading {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_wmo_code(self.weather_code)
    }
}

/// Regulated pollutants, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pollutant {
    #[serde(rename = "PM2.5")]
    Pm25,
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "O3")]
    O3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 4] = [Self::Pm25, Self::Pm10, Self::No2, Self::O3];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pm25 => "PM2.5",
            Self::Pm10 => "PM10",
            Self::No2 => "NO2",
            Self::O3 => "O3",
        }
    }

    /// Regulatory limit in µg/m³ used to normalise concentrations.
    pub fn limit(&self) -> f64 {
        match self {
            Self::Pm25 => 15.0,
            Self::Pm10 => 45.0,
            Self::No2 => 25.0,
            Self::O3 => 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    /// US AQI
    pub aqi: f64,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub o3: f64,
    pub dominant_pollutant: Pollutant,
}

impl AirQualityReading {
    pub fn new(aqi: f64, pm25: f64, pm10: f64, no2: f64, o3: f64) -> Self {
        let mut reading = Self {
            aqi,
            pm25,
            pm10,
            no2,
            o3,
            dominant_pollutant: Pollutant::Pm25,
        };
        reading.dominant_pollutant = reading.compute_dominant();
        reading
    }

    /// Plausible reading served when the provider is unreachable.
    pub fn fallback() -> Self {
        Self::new(45.0, 15.0, 28.0, 12.0, 55.0)
    }

    pub fn concentration(&self, pollutant: Pollutant) -> f64 {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::No2 => self.no2,
            Pollutant::O3 => self.o3,
        }
    }

    /// Concentration divided by the pollutant's regulatory limit.
    pub fn limit_ratio(&self, pollutant: Pollutant) -> f64 {
        self.concentration(pollutant) / pollutant.limit()
    }

    // Strict comparison keeps the earliest pollutant on ties.
    fn compute_dominant(&self) -> Pollutant {
        let mut dominant = Pollutant::Pm25;
        for pollutant in Pollutant::ALL.into_iter().skip(1) {
            if self.limit_ratio(pollutant) > self.limit_ratio(dominant) {
                dominant = pollutant;
            }
        }
        dominant
    }
}

/// Pollen species, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollenSpecies {
    Alder,
    Birch,
    Grass,
    Mugwort,
    Olive,
    Ragweed,
}

impl PollenSpecies {
    pub const ALL: [PollenSpecies; 6] = [
        Self::Alder,
        Self::Birch,
        Self::Grass,
        Self::Mugwort,
        Self::Olive,
        Self::Ragweed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Alder => "Alder",
            Self::Birch => "Birch",
            Self::Grass => "Grass",
            Self::Mugwort => "Mugwort",
            Self::Olive => "Olive",
            Self::Ragweed => "Ragweed",
        }
    }
}

/// Pollen concentrations in grains/m³.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollenReading {
    pub alder: f64,
    pub birch: f64,
    pub grass: f64,
    pub mugwort: f64,
    pub olive: f64,
    pub ragweed: f64,
    pub max_pollen: f64,
    /// `None` when nothing is in the air
    pub dominant: Option<PollenSpecies>,
}

impl PollenReading {
    pub fn new(alder: f64, birch: f64, grass: f64, mugwort: f64, olive: f64, ragweed: f64) -> Self {
        let mut reading = Self {
            alder,
            birch,
            grass,
            mugwort,
            olive,
            ragweed,
            max_pollen: 0.0,
            dominant: None,
        };

        let mut top = PollenSpecies::Alder;
        for species in PollenSpecies::ALL.into_iter().skip(1) {
            if reading.concentration(species) > reading.concentration(top) {
                top = species;
            }
        }
        reading.max_pollen = reading.concentration(top);
        reading.dominant = (reading.max_pollen > 0.0).then_some(top);
        reading
    }

    /// All-zero reading served when pollen data is unavailable.
    pub fn empty() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn concentration(&self, species: PollenSpecies) -> f64 {
        match species {
            PollenSpecies::Alder => self.alder,
            PollenSpecies::Birch => self.birch,
            PollenSpecies::Grass => self.grass,
            PollenSpecies::Mugwort => self.mugwort,
            PollenSpecies::Olive => self.olive,
            PollenSpecies::Ragweed => self.ragweed,
        }
    }

    /// Name of the dominant species, or [`NO_DOMINANT_SPECIES`].
    pub fn dominant_species(&self) -> &'static str {
        self.dominant
            .map(|species| species.name())
            .unwrap_or(NO_DOMINANT_SPECIES)
    }
}

/// A forward-geocoding candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl Place {
    /// First comma-separated segment of the display name.
    pub fn city_name(&self) -> &str {
        self.display_name
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Turn a search hit into a fully named location.
    pub fn into_location(self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            city_name: self.city_name().to_string(),
            display_name: Some(self.display_name),
        }
    }
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

/// Upstream provider errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// What a gateway call produced.
///
/// Soft-failing gateways never return `Failed`; they hand back a deterministic
/// fallback value together with the reason it was used.
#[derive(Debug)]
pub enum GatewayOutcome<T> {
    Live(T),
    Fallback { value: T, reason: String },
    Failed(GatewayError),
}

impl<T> GatewayOutcome<T> {
    /// Convert a provider result into an outcome, substituting `fallback` on error.
    pub fn or_fallback(result: Result<T, GatewayError>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => Self::Live(value),
            Err(e) => Self::Fallback {
                value: fallback(),
                reason: e.to_string(),
            },
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Live(value) | Self::Fallback { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Live and fallback values are both usable; only `Failed` is an error.
    pub fn into_result(self) -> Result<T, GatewayError> {
        match self {
            Self::Live(value) | Self::Fallback { value, .. } => Ok(value),
            Self::Failed(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, GatewayError>> for GatewayOutcome<T> {
    fn from(result: Result<T, GatewayError>) -> Self {
        match result {
            Ok(value) => Self::Live(value),
            Err(e) => Self::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmo_code_mapping() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(48), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(63), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(81), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(75), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_wmo_code(96), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn test_wmo_code_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_location_resolution_sentinels() {
        assert!(Location::unresolved(51.5, -0.12).needs_resolution());
        assert!(Location::new(51.5, -0.12, UNKNOWN_LOCATION).needs_resolution());
        assert!(!Location::new(51.5, -0.12, "London").needs_resolution());
    }

    #[test]
    fn test_dominant_pollutant_by_limit_ratio() {
        // ratios: 2.0, 1.0, 1.0, 0.5
        let reading = AirQualityReading::new(80.0, 30.0, 45.0, 25.0, 50.0);
        assert_eq!(reading.dominant_pollutant, Pollutant::Pm25);
        assert_eq!(reading.dominant_pollutant.name(), "PM2.5");
    }

    #[test]
    fn test_dominant_pollutant_prefers_normalised_value() {
        // O3 has the largest raw value but NO2 is furthest over its limit
        let reading = AirQualityReading::new(60.0, 5.0, 20.0, 40.0, 120.0);
        assert_eq!(reading.dominant_pollutant, Pollutant::No2);
    }

    #[test]
    fn test_dominant_pollutant_tie_keeps_first_declared() {
        // PM10 and NO2 both at ratio 1.0, above the others
        let reading = AirQualityReading::new(50.0, 0.0, 45.0, 25.0, 10.0);
        assert_eq!(reading.dominant_pollutant, Pollutant::Pm10);

        let all_zero = AirQualityReading::new(0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(all_zero.dominant_pollutant, Pollutant::Pm25);
    }

    #[test]
    fn test_air_quality_fallback_values() {
        let fallback = AirQualityReading::fallback();
        assert_eq!(fallback.aqi, 45.0);
        assert_eq!(fallback.pm25, 15.0);
        assert_eq!(fallback.pm10, 28.0);
        assert_eq!(fallback.o3, 55.0);
        assert_eq!(fallback.no2, 12.0);
        assert_eq!(fallback.dominant_pollutant, Pollutant::Pm25);
    }

    #[test]
    fn test_pollen_dominant_species() {
        let reading = PollenReading::new(1.0, 40.0, 12.0, 0.0, 0.0, 3.0);
        assert_eq!(reading.max_pollen, 40.0);
        assert_eq!(reading.dominant, Some(PollenSpecies::Birch));
        assert_eq!(reading.dominant_species(), "Birch");
    }

    #[test]
    fn test_pollen_tie_keeps_first_declared() {
        let reading = PollenReading::new(0.0, 0.0, 20.0, 0.0, 0.0, 20.0);
        assert_eq!(reading.dominant, Some(PollenSpecies::Grass));
    }

    #[test]
    fn test_pollen_none_iff_zero() {
        let empty = PollenReading::empty();
        assert_eq!(empty.max_pollen, 0.0);
        assert_eq!(empty.dominant, None);
        assert_eq!(empty.dominant_species(), NO_DOMINANT_SPECIES);

        let trace = PollenReading::new(0.0, 0.0, 0.0, 0.0, 0.1, 0.0);
        assert_eq!(trace.dominant_species(), "Olive");
    }

    #[test]
    fn test_place_into_location() {
        let place = Place {
            latitude: 48.8566,
            longitude: 2.3522,
            display_name: "Paris, Île-de-France, France".to_string(),
        };
        let location = place.into_location();
        assert_eq!(location.city_name, "Paris");
        assert_eq!(
            location.display_name.as_deref(),
            Some("Paris, Île-de-France, France")
        );
        assert!(!location.needs_resolution());
    }

    #[test]
    fn test_outcome_into_result() {
        let live: GatewayOutcome<u8> = GatewayOutcome::Live(1);
        assert_eq!(live.into_result().unwrap(), 1);

        let fallback = GatewayOutcome::or_fallback(Err(GatewayError::Parse("bad".into())), || 7u8);
        assert!(fallback.is_fallback());
        assert_eq!(fallback.value(), Some(&7));

        let failed = GatewayOutcome::from(Err::<u8, _>(GatewayError::Parse("bad".into())));
        assert!(failed.value().is_none());
        assert!(failed.into_result().is_err());
    }
}
