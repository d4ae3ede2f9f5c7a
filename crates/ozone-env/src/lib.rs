//! Environmental data for Ozone
//!
//! Weather, air quality and pollen from Open-Meteo, place names from
//! Nominatim, device location sources, and the pure risk/solar/advisory
//! calculations applied to those readings.

pub mod advisory;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod risk;
pub mod solar;
pub mod types;

pub use advisory::Advisory;
pub use geocode::Geocoder;
pub use location::{
    ChannelLocationSource, FixedLocationSource, LocationSource, PositionUpdate, PositionWatch,
    UnavailableLocationSource,
};
pub use provider::{Gateways, OpenMeteoClient, ProviderEndpoints};
pub use types::*;
