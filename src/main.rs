use std::sync::Arc;

use anyhow::{Context, Result};

use ozone_core::Config;
use ozone_dashboard::{provider_endpoints, Dashboard, Snapshot};
use ozone_env::{
    FixedLocationSource, Gateways, LocationSource, Position, UnavailableLocationSource,
};

/// "lat,lon" of a stationary device; without it no device location is used.
const DEVICE_POSITION_VAR: &str = "OZONE_DEVICE_POSITION";

#[tokio::main]
async fn main() -> Result<()> {
    ozone_core::init()?;

    let (config, _) = Config::load_validated().context("Failed to load configuration")?;
    let gateways = Gateways::new(&provider_endpoints(&config.providers))
        .context("Failed to build HTTP client")?;

    let dashboard = Dashboard::start(&config, gateways, location_source());
    tracing::info!("Ozone started");

    let mut updates = dashboard.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                report(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    dashboard.shutdown().await;
    Ok(())
}

fn location_source() -> Arc<dyn LocationSource> {
    let Ok(raw) = std::env::var(DEVICE_POSITION_VAR) else {
        return Arc::new(UnavailableLocationSource);
    };

    match parse_position(&raw) {
        Some(position) => Arc::new(FixedLocationSource::new(position)),
        None => {
            tracing::warn!("Ignoring malformed {}: {:?}", DEVICE_POSITION_VAR, raw);
            Arc::new(UnavailableLocationSource)
        }
    }
}

fn parse_position(raw: &str) -> Option<Position> {
    let (latitude, longitude) = raw.split_once(',')?;
    let latitude: f64 = latitude.trim().parse().ok()?;
    let longitude: f64 = longitude.trim().parse().ok()?;

    ((-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude))
        .then(|| Position::new(latitude, longitude))
}

fn report(snapshot: &Snapshot) {
    if snapshot.loading {
        tracing::info!("Loading data for {}...", snapshot.location.city_name);
        return;
    }
    if let Some(error) = &snapshot.error {
        tracing::warn!("{}: {}", snapshot.location.city_name, error);
        return;
    }

    let place = &snapshot.location.city_name;
    if let Some(weather) = &snapshot.weather {
        tracing::info!(
            "{}: {:.1}°C, {}, UV {:.1}, humidity {:.0}%",
            place,
            weather.temperature,
            weather.condition().description(),
            weather.uv_index,
            weather.humidity
        );
    }
    if let Some(aq) = &snapshot.air_quality {
        tracing::info!(
            "{}: AQI {:.0} ({}), dominant {}",
            place,
            aq.aqi,
            snapshot.status_text(),
            aq.dominant_pollutant.name()
        );
    }
    if let (Some(pollen), Some(risk)) = (&snapshot.pollen, snapshot.pollen_risk()) {
        tracing::info!(
            "{}: pollen {} ({}), {}",
            place,
            risk.label(),
            pollen.dominant_species(),
            risk.advice()
        );
    }
    tracing::info!("Advisory: {}", snapshot.advisory().text);
}
