//! Sun exposure estimates derived from the UV index and today's sun times.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fitzpatrick-style skin groups, lightest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkinType {
    Fair,
    #[default]
    Medium,
    Dark,
}

impl SkinType {
    /// 1 = fair, 2 = medium, anything else = dark.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Self::Fair,
            2 => Self::Medium,
            _ => Self::Dark,
        }
    }

    fn burn_factor(&self) -> f64 {
        match self {
            Self::Fair => 1.0,
            Self::Medium => 2.5,
            Self::Dark => 5.0,
        }
    }
}

/// Minutes of unprotected exposure before the skin burns.
pub fn burn_minutes(uv_index: f64, skin: SkinType) -> u32 {
    let uv = uv_index.max(0.1);
    (200.0 * skin.burn_factor() / uv).round() as u32
}

/// Minutes of exposure for a daily vitamin D dose.
pub fn vitamin_d_minutes(uv_index: f64, skin: SkinType) -> u32 {
    (f64::from(burn_minutes(uv_index, skin)) * 0.4).round() as u32
}

/// How far through the daylight hours `now` is, in percent (0-100).
pub fn daylight_progress(sunrise: NaiveDateTime, sunset: NaiveDateTime, now: NaiveDateTime) -> f64 {
    if now <= sunrise {
        return 0.0;
    }
    if now >= sunset {
        return 100.0;
    }

    let elapsed = (now - sunrise).num_seconds() as f64;
    let span = (sunset - sunrise).num_seconds() as f64;
    elapsed / span * 100.0
}
