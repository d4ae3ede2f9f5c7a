//! Offline health advisory keyed off AQI and UV thresholds.

use serde::{Deserialize, Serialize};

use crate::types::UNKNOWN_LOCATION;

const OFFLINE_SUFFIX: &str = " (Offline Mode)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// Place the advice refers to, e.g. "Paris" or "this location"
    pub place: String,
    pub text: String,
    /// Source citations; empty for locally generated advice.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Advisory {
    /// Build the deterministic advisory for a place and its current readings.
    pub fn local(city: &str, aqi: f64, uv_index: f64) -> Self {
        Self {
            place: place_term(city).to_string(),
            text: local_advisory(aqi, uv_index),
            sources: Vec::new(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.text.ends_with(OFFLINE_SUFFIX)
    }
}

/// Wording used for the place in advice text.
pub fn place_term(city: &str) -> &str {
    let city = city.trim();
    if city.is_empty() || city == UNKNOWN_LOCATION {
        "this location"
    } else {
        city
    }
}

pub fn local_advisory(aqi: f64, uv_index: f64) -> String {
    let air = if aqi > 200.0 {
        "Emergency: Air is hazardous. Keep windows closed."
    } else if aqi > 150.0 {
        "Pollution is very high. Avoid outdoor activities."
    } else if aqi > 100.0 {
        "Air is unhealthy for sensitive groups. Limit exertion."
    } else if aqi > 50.0 {
        "Air quality is moderate."
    } else {
        "Air quality is excellent."
    };

    let uv = if uv_index > 10.0 {
        Some("UV is extreme. Skin damage occurs in minutes.")
    } else if uv_index > 7.0 {
        Some("UV is very high. Extra protection required.")
    } else if uv_index > 5.0 {
        Some("UV is high. Wear sunscreen.")
    } else {
        None
    };

    let mut text = match uv {
        Some(uv) => format!("{} {}", air, uv),
        None => air.to_string(),
    };
    text.push_str(OFFLINE_SUFFIX);
    text
}
