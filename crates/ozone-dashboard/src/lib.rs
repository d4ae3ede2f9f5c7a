//! Location-driven data orchestration for the Ozone dashboard
//!
//! Tracks where the user is, fetches weather, air quality and pollen for that
//! place, and publishes the result as a [`Snapshot`] that views subscribe to.

pub mod orchestrator;
pub mod settings;
pub mod snapshot;
pub mod tracker;

pub use orchestrator::{Dashboard, DashboardHandle, RefreshOutcome};
pub use settings::{provider_endpoints, DashboardSettings};
pub use snapshot::{Preferences, Snapshot};
pub use tracker::{is_significant_move, LocationTracker};
