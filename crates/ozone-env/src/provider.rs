//! Sensor gateways backed by Open-Meteo: weather with UV, air quality and pollen.
//!
//! Each call is an independent failure boundary. Weather is essential and
//! reports `Failed`; air quality and pollen degrade to fixed fallback readings.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Timelike, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::instrument;

use crate::geocode::Geocoder;
use crate::types::{
    AirQualityReading, GatewayError, GatewayOutcome, HourlyUv, PollenReading, WeatherReading,
};

const OPEN_METEO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const WEATHER_CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m,is_day";
const AIR_QUALITY_FIELDS: &str = "us_aqi,pm10,pm2_5,nitrogen_dioxide,ozone";
const POLLEN_FIELDS: &str =
    "alder_pollen,birch_pollen,grass_pollen,mugwort_pollen,olive_pollen,ragweed_pollen";

/// Where the upstream providers live and how to talk to them.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub forecast_url: String,
    pub air_quality_url: String,
    pub geocoding_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1".to_string(),
            air_quality_url: "https://air-quality-api.open-meteo.com/v1".to_string(),
            geocoding_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("Ozone/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ProviderEndpoints {
    /// Route every provider through one host (proxies, mock servers).
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            forecast_url: base.clone(),
            air_quality_url: base.clone(),
            geocoding_url: base,
            ..Self::default()
        }
    }
}

/// All upstream gateways, sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct Gateways {
    pub sensors: OpenMeteoClient,
    pub geocoder: Geocoder,
}

impl Gateways {
    pub fn new(endpoints: &ProviderEndpoints) -> Result<Self, GatewayError> {
        let client = Arc::new(build_client(endpoints)?);
        Ok(Self {
            sensors: OpenMeteoClient::with_client(client.clone(), endpoints),
            geocoder: Geocoder::with_client(client, endpoints),
        })
    }
}

pub(crate) fn build_client(endpoints: &ProviderEndpoints) -> Result<Client, GatewayError> {
    Ok(Client::builder()
        .timeout(endpoints.timeout)
        .user_agent(endpoints.user_agent.as_str())
        .build()?)
}

pub(crate) fn ensure_success(response: Response, service: &'static str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Status {
            service,
            status: status.as_u16(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    utc_offset_seconds: i64,
    current: Option<ForecastCurrent>,
    hourly: Option<ForecastHourly>,
    daily: Option<ForecastDaily>,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    #[serde(default)]
    weather_code: i32,
    wind_speed_10m: f64,
    #[serde(default)]
    is_day: u8,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    uv_index: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ForecastDaily {
    #[serde(default)]
    sunrise: Vec<String>,
    #[serde(default)]
    sunset: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    current: Option<AirQualityCurrent>,
}

#[derive(Debug, Deserialize)]
struct AirQualityCurrent {
    us_aqi: Option<f64>,
    pm10: Option<f64>,
    pm2_5: Option<f64>,
    nitrogen_dioxide: Option<f64>,
    ozone: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PollenResponse {
    current: Option<PollenCurrent>,
}

#[derive(Debug, Deserialize)]
struct PollenCurrent {
    alder_pollen: Option<f64>,
    birch_pollen: Option<f64>,
    grass_pollen: Option<f64>,
    mugwort_pollen: Option<f64>,
    olive_pollen: Option<f64>,
    ragweed_pollen: Option<f64>,
}

/// Open-Meteo client for the three sensor feeds.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Arc<Client>,
    forecast_url: String,
    air_quality_url: String,
}

impl OpenMeteoClient {
    pub fn new(endpoints: &ProviderEndpoints) -> Result<Self, GatewayError> {
        let client = Arc::new(build_client(endpoints)?);
        Ok(Self::with_client(client, endpoints))
    }

    pub fn with_client(client: Arc<Client>, endpoints: &ProviderEndpoints) -> Self {
        Self {
            client,
            forecast_url: endpoints.forecast_url.trim_end_matches('/').to_string(),
            air_quality_url: endpoints.air_quality_url.trim_end_matches('/').to_string(),
        }
    }

    /// Current weather, today's sun times and the hourly UV curve.
    ///
    /// Never falls back: a failure here is reported as `Failed`.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_weather(&self, latitude: f64, longitude: f64) -> GatewayOutcome<WeatherReading> {
        let result = self.request_weather(latitude, longitude).await;
        if let Err(e) = &result {
            tracing::error!("Weather fetch failed: {}", e);
        }
        result.into()
    }

    /// Current AQI and pollutant concentrations, or the fixed fallback reading.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_air_quality(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> GatewayOutcome<AirQualityReading> {
        let outcome = GatewayOutcome::or_fallback(
            self.request_air_quality(latitude, longitude).await,
            AirQualityReading::fallback,
        );
        if let GatewayOutcome::Fallback { reason, .. } = &outcome {
            tracing::warn!("Air quality fetch failed, using fallback: {}", reason);
        }
        outcome
    }

    /// Current pollen counts, or an all-zero reading.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_pollen(&self, latitude: f64, longitude: f64) -> GatewayOutcome<PollenReading> {
        let outcome = GatewayOutcome::or_fallback(
            self.request_pollen(latitude, longitude).await,
            PollenReading::empty,
        );
        if let GatewayOutcome::Fallback { reason, .. } = &outcome {
            tracing::warn!("Pollen fetch failed, using fallback: {}", reason);
        }
        outcome
    }

    async fn request_weather(&self, latitude: f64, longitude: f64) -> Result<WeatherReading, GatewayError> {
        let response = self
            .client
            .get(format!("{}/forecast", self.forecast_url))
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", WEATHER_CURRENT_FIELDS.to_string()),
                ("hourly", "uv_index".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .send()
            .await?;

        let body: ForecastResponse = ensure_success(response, "weather")?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let local_now = Utc::now().naive_utc() + chrono::Duration::seconds(body.utc_offset_seconds);
        parse_weather(body, local_now)
    }

    async fn request_air_quality(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AirQualityReading, GatewayError> {
        let body: AirQualityResponse = self
            .air_quality_request(latitude, longitude, AIR_QUALITY_FIELDS, "air quality")
            .await?;
        let current = body
            .current
            .ok_or_else(|| GatewayError::Parse("air quality response has no current block".into()))?;

        Ok(AirQualityReading::new(
            current.us_aqi.unwrap_or(0.0),
            current.pm2_5.unwrap_or(0.0),
            current.pm10.unwrap_or(0.0),
            current.nitrogen_dioxide.unwrap_or(0.0),
            current.ozone.unwrap_or(0.0),
        ))
    }

    async fn request_pollen(&self, latitude: f64, longitude: f64) -> Result<PollenReading, GatewayError> {
        let body: PollenResponse = self
            .air_quality_request(latitude, longitude, POLLEN_FIELDS, "pollen")
            .await?;
        let current = body
            .current
            .ok_or_else(|| GatewayError::Parse("pollen response has no current block".into()))?;

        Ok(PollenReading::new(
            current.alder_pollen.unwrap_or(0.0),
            current.birch_pollen.unwrap_or(0.0),
            current.grass_pollen.unwrap_or(0.0),
            current.mugwort_pollen.unwrap_or(0.0),
            current.olive_pollen.unwrap_or(0.0),
            current.ragweed_pollen.unwrap_or(0.0),
        ))
    }

    async fn air_quality_request<T: serde::de::DeserializeOwned>(
        &self,
        latitude: f64,
        longitude: f64,
        fields: &str,
        service: &'static str,
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(format!("{}/air-quality", self.air_quality_url))
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", fields.to_string()),
            ])
            .send()
            .await?;

        ensure_success(response, service)?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, GatewayError> {
    NaiveDateTime::parse_from_str(raw, OPEN_METEO_TIME_FORMAT)
        .map_err(|e| GatewayError::Parse(format!("bad timestamp {raw:?}: {e}")))
}

fn parse_weather(body: ForecastResponse, local_now: NaiveDateTime) -> Result<WeatherReading, GatewayError> {
    let current = body
        .current
        .ok_or_else(|| GatewayError::Parse("forecast response has no current block".into()))?;
    let daily = body
        .daily
        .ok_or_else(|| GatewayError::Parse("forecast response has no daily block".into()))?;
    let hourly = body.hourly.unwrap_or_default();

    let sunrise = daily
        .sunrise
        .first()
        .ok_or_else(|| GatewayError::Parse("missing sunrise".into()))
        .and_then(|raw| parse_time(raw))?;
    let sunset = daily
        .sunset
        .first()
        .ok_or_else(|| GatewayError::Parse("missing sunset".into()))
        .and_then(|raw| parse_time(raw))?;

    let hourly_uv: Vec<HourlyUv> = hourly
        .time
        .iter()
        .zip(hourly.uv_index.iter())
        .filter_map(|(time, uv)| match parse_time(time) {
            Ok(time) => Some(HourlyUv {
                time,
                uv_index: uv.unwrap_or(0.0),
            }),
            Err(e) => {
                tracing::debug!("Skipping hourly UV entry: {}", e);
                None
            }
        })
        .collect();

    Ok(WeatherReading {
        temperature: current.temperature_2m,
        uv_index: uv_at_hour(&hourly_uv, local_now.hour()),
        humidity: current.relative_humidity_2m,
        wind_speed: current.wind_speed_10m,
        weather_code: current.weather_code,
        is_day: current.is_day != 0,
        sunrise,
        sunset,
        hourly_uv,
        fetched_at: Utc::now(),
    })
}

/// UV index for the given hour of the day, 0 when the series has no such hour.
pub fn uv_at_hour(series: &[HourlyUv], hour: u32) -> f64 {
    series
        .iter()
        .find(|entry| entry.time.hour() == hour)
        .map(|entry| entry.uv_index)
        .unwrap_or(0.0)
}
