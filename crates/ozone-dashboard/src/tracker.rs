//! The authoritative current location.
//!
//! Device fixes pass a movement filter so GPS jitter does not start a fetch
//! cycle; manual selections replace the location outright. Every accepted
//! change is handed back to the caller, which owns the refresh.

use ozone_env::{Location, Position};

/// Whether `to` is far enough from `from` to count as a move.
pub fn is_significant_move(from: &Location, to: &Position, threshold: f64) -> bool {
    (to.latitude - from.latitude).abs() > threshold
        || (to.longitude - from.longitude).abs() > threshold
}

#[derive(Debug, Clone)]
pub struct LocationTracker {
    current: Location,
    on_default: bool,
    threshold: f64,
}

impl LocationTracker {
    pub fn new(default: Location, threshold: f64) -> Self {
        Self {
            current: default,
            on_default: true,
            threshold,
        }
    }

    pub fn current(&self) -> &Location {
        &self.current
    }

    /// True until the first location signal is accepted.
    pub fn is_on_default(&self) -> bool {
        self.on_default
    }

    /// Offer a device fix, from the one-shot request or the standing watch.
    ///
    /// Accepted unconditionally while still on the startup default, otherwise
    /// only when it moves past the threshold. An accepted fix clears the city
    /// so the next refresh resolves it.
    pub fn offer_position(&mut self, position: Position) -> Option<Location> {
        if !self.on_default && !is_significant_move(&self.current, &position, self.threshold) {
            tracing::trace!(
                "Ignoring location jitter: {:.5}, {:.5}",
                position.latitude,
                position.longitude
            );
            return None;
        }

        self.on_default = false;
        self.current = Location::unresolved(position.latitude, position.longitude);
        Some(self.current.clone())
    }

    /// Replace the location wholesale, bypassing the movement filter.
    pub fn override_location(&mut self, location: Location) -> Location {
        self.on_default = false;
        self.current = location;
        self.current.clone()
    }

    /// Store the name a refresh resolved for the current coordinates.
    ///
    /// Ignored when the tracker has since moved elsewhere.
    pub fn record_resolved_city(&mut self, resolved: &Location) {
        if self.current.needs_resolution() && self.current.same_coordinates(resolved) {
            self.current.city_name = resolved.city_name.clone();
        }
    }
}
