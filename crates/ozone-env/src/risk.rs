//! Health-risk classification of raw readings.
//!
//! Every function is pure. `sensitive` is the user's sensitivity mode, which
//! lowers the thresholds.

use serde::{Deserialize, Serialize};

/// PM2.5 above this (µg/m³) is a lung risk; sensitive users use the lower value.
pub const LUNG_RISK_PM25: f64 = 35.0;
pub const LUNG_RISK_PM25_SENSITIVE: f64 = 25.0;

pub fn lung_risk_threshold(sensitive: bool) -> f64 {
    if sensitive {
        LUNG_RISK_PM25_SENSITIVE
    } else {
        LUNG_RISK_PM25
    }
}

pub fn is_lung_risk(pm25: f64, sensitive: bool) -> bool {
    pm25 > lung_risk_threshold(sensitive)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PollenRisk {
    Low,
    Moderate,
    High,
}

impl PollenRisk {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Self::Low => "Air is clear. Good for outdoor walks.",
            Self::Moderate => "Pollen is present. Carry tissues.",
            Self::High => "High Pollen Count. Keep windows closed.",
        }
    }
}

/// Returns (moderate, high) thresholds in grains/m³.
pub fn pollen_thresholds(sensitive: bool) -> (f64, f64) {
    if sensitive {
        (15.0, 60.0)
    } else {
        (30.0, 100.0)
    }
}

pub fn pollen_risk(max_pollen: f64, sensitive: bool) -> PollenRisk {
    let (moderate, high) = pollen_thresholds(sensitive);
    if max_pollen > high {
        PollenRisk::High
    } else if max_pollen > moderate {
        PollenRisk::Moderate
    } else {
        PollenRisk::Low
    }
}

/// Colour band for a concentration against its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollutantStatus {
    Ok,
    Warn,
    Danger,
}

pub fn pollutant_status(value: f64, limit: f64) -> PollutantStatus {
    if value <= limit {
        PollutantStatus::Ok
    } else if value <= limit * 1.5 {
        PollutantStatus::Warn
    } else {
        PollutantStatus::Danger
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiBand {
    Excellent,
    Moderate,
    LimitOutdoorTime,
}

impl AqiBand {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Moderate => "Moderate",
            Self::LimitOutdoorTime => "Limit outdoor time",
        }
    }

    /// Dashboard headline for the band
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent Conditions",
            Self::Moderate => "Moderate Air",
            Self::LimitOutdoorTime => "Limit Outdoor Time",
        }
    }
}

pub fn aqi_band(aqi: f64) -> AqiBand {
    if aqi <= 50.0 {
        AqiBand::Excellent
    } else if aqi <= 100.0 {
        AqiBand::Moderate
    } else {
        AqiBand::LimitOutdoorTime
    }
}

/// Headline shown before any air-quality reading has arrived.
pub const AQI_SCANNING: &str = "Scanning...";

pub fn aqi_short_label(aqi: f64) -> &'static str {
    if aqi > 50.0 {
        "Careful"
    } else {
        "Good"
    }
}

pub fn uv_exposure_label(uv_index: f64) -> &'static str {
    if uv_index > 5.0 {
        "High Exposure"
    } else {
        "Safe Levels"
    }
}
