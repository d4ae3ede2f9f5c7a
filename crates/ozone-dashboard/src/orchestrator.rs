//! Dashboard orchestration: owns the snapshot and runs every fetch cycle.
//!
//! Location signals come from four writers (startup default, one-shot fix,
//! continuous watch, manual selection). Each accepted change triggers exactly
//! one refresh. Refreshes are tagged with a generation, taken under the
//! tracker lock together with the location they fetch; a refresh that
//! completes after a newer one was issued is discarded.

use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use ozone_core::{AppError, Config, SensorError, Theme};
use ozone_env::{
    Advisory, AirQualityReading, Gateways, Location, LocationSource, Place, PollenReading,
    Position, UNKNOWN_LOCATION,
};

use crate::settings::DashboardSettings;
use crate::snapshot::Snapshot;
use crate::tracker::LocationTracker;

/// How a refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New readings were published.
    Applied,
    /// Weather failed; the error was published and old readings kept.
    Failed,
    /// A newer refresh started first; nothing was published.
    Superseded,
}

struct Inner {
    gateways: Gateways,
    location_source: Arc<dyn LocationSource>,
    tracker: Mutex<LocationTracker>,
    state: watch::Sender<Snapshot>,
    generation: AtomicU64,
    settings: DashboardSettings,
    launched: AtomicBool,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

/// Cloneable handle to a running dashboard.
///
/// Handles are what views and background tasks hold; they never keep the
/// dashboard alive past [`Dashboard::shutdown`].
#[derive(Clone)]
pub struct DashboardHandle {
    inner: Arc<Inner>,
}

/// Owner of the dashboard and its background tasks.
///
/// Dropping it cancels every task; [`Dashboard::shutdown`] also waits for them.
pub struct Dashboard {
    handle: DashboardHandle,
}

impl Dashboard {
    /// Build an idle dashboard. No task runs until [`spawn_background_tasks`].
    ///
    /// [`spawn_background_tasks`]: Dashboard::spawn_background_tasks
    pub fn new(
        settings: DashboardSettings,
        gateways: Gateways,
        location_source: Arc<dyn LocationSource>,
    ) -> Self {
        let tracker = LocationTracker::new(
            settings.default_location.clone(),
            settings.movement_threshold,
        );
        let (state, _) = watch::channel(Snapshot::initial(
            settings.default_location.clone(),
            settings.preferences,
        ));

        Self {
            handle: DashboardHandle {
                inner: Arc::new(Inner {
                    gateways,
                    location_source,
                    tracker: Mutex::new(tracker),
                    state,
                    generation: AtomicU64::new(0),
                    settings,
                    launched: AtomicBool::new(false),
                    tasks: TaskTracker::new(),
                    shutdown: CancellationToken::new(),
                }),
            },
        }
    }

    /// Build a dashboard from configuration and start it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &Config,
        gateways: Gateways,
        location_source: Arc<dyn LocationSource>,
    ) -> Self {
        Self::start_with_settings(DashboardSettings::from(config), gateways, location_source)
    }

    pub fn start_with_settings(
        settings: DashboardSettings,
        gateways: Gateways,
        location_source: Arc<dyn LocationSource>,
    ) -> Self {
        let dashboard = Self::new(settings, gateways, location_source);
        dashboard.spawn_background_tasks();
        dashboard
    }

    /// Start the initial refresh, the one-shot fix, the location watch and
    /// the periodic timer. Later calls do nothing.
    pub fn spawn_background_tasks(&self) {
        let inner = &self.handle.inner;
        if inner.launched.swap(true, Ordering::SeqCst) {
            return;
        }

        let (location, generation) = self.handle.issue_tracked_refresh(false);
        let handle = self.handle.clone();
        self.handle.spawn_task("initial refresh", async move {
            handle.run_refresh(location, generation).await;
        });

        let handle = self.handle.clone();
        self.handle
            .spawn_task("initial fix", async move { handle.acquire_initial_fix().await });

        let handle = self.handle.clone();
        self.handle
            .spawn_task("location watch", async move { handle.watch_location().await });

        if let Some(period) = inner.settings.refresh_interval.filter(|p| !p.is_zero()) {
            let handle = self.handle.clone();
            self.handle.spawn_task("periodic refresh", async move {
                handle.run_periodic_refresh(period).await
            });
        }

        tracing::info!("Dashboard started");
    }

    pub fn handle(&self) -> DashboardHandle {
        self.handle.clone()
    }

    /// Cancel every background task and wait for them to finish.
    ///
    /// Location subscriptions and timers are released before this returns.
    pub async fn shutdown(&self) {
        let inner = &self.handle.inner;
        inner.shutdown.cancel();
        inner.tasks.close();
        inner.tasks.wait().await;
        tracing::info!("Dashboard stopped");
    }
}

impl Deref for Dashboard {
    type Target = DashboardHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.handle.inner.shutdown.cancel();
        self.handle.inner.tasks.close();
    }
}

impl DashboardHandle {
    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.state.subscribe()
    }

    /// The tracker's current location, which may be ahead of the snapshot's.
    pub fn location(&self) -> Location {
        self.inner.tracker.lock().current().clone()
    }

    /// Foreground refresh of the current location.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (location, generation) = self.issue_tracked_refresh(false);
        self.run_refresh(location, generation).await
    }

    /// Fetch all readings for `location` and publish them.
    ///
    /// A foreground refresh raises `loading` until it completes; a background
    /// one leaves it alone. Weather failure publishes the user-facing error and
    /// keeps the previous readings. Place-name resolution never fails the
    /// refresh.
    pub async fn refresh_location(&self, location: Location, background: bool) -> RefreshOutcome {
        let generation = self.begin_refresh(background);
        self.run_refresh(location, generation).await
    }

    async fn run_refresh(&self, location: Location, generation: u64) -> RefreshOutcome {
        tracing::debug!(
            generation,
            "Refreshing {:.4}, {:.4}",
            location.latitude,
            location.longitude
        );

        let (latitude, longitude) = (location.latitude, location.longitude);
        let sensors = &self.inner.gateways.sensors;
        let geocoder = &self.inner.gateways.geocoder;
        let resolve_city = async {
            if location.needs_resolution() {
                Some(geocoder.reverse(latitude, longitude).await)
            } else {
                None
            }
        };

        let (weather, air_quality, pollen, city) = tokio::join!(
            sensors.fetch_weather(latitude, longitude),
            sensors.fetch_air_quality(latitude, longitude),
            sensors.fetch_pollen(latitude, longitude),
            resolve_city,
        );

        let resolved = match city {
            Some(outcome) => location.with_city(
                outcome
                    .into_result()
                    .unwrap_or_else(|_| UNKNOWN_LOCATION.to_string()),
            ),
            None => location,
        };

        let weather = match weather.into_result() {
            Ok(weather) => weather,
            Err(e) => {
                let error = AppError::from(SensorError::WeatherUnavailable(e.to_string()));
                tracing::error!("Refresh failed: {}", error);

                let published = self.publish_if_current(generation, |snapshot| {
                    snapshot.location = resolved.clone();
                    snapshot.loading = false;
                    snapshot.error = Some(error.user_message().to_string());
                });
                if published {
                    self.inner.tracker.lock().record_resolved_city(&resolved);
                    return RefreshOutcome::Failed;
                }
                return RefreshOutcome::Superseded;
            }
        };
        let air_quality = air_quality
            .into_result()
            .unwrap_or_else(|_| AirQualityReading::fallback());
        let pollen = pollen.into_result().unwrap_or_else(|_| PollenReading::empty());

        let published = self.publish_if_current(generation, |snapshot| {
            snapshot.location = resolved.clone();
            snapshot.weather = Some(weather);
            snapshot.air_quality = Some(air_quality);
            snapshot.pollen = Some(pollen);
            snapshot.loading = false;
            snapshot.error = None;
            snapshot.updated_at = Some(Utc::now());
        });

        if published {
            self.inner.tracker.lock().record_resolved_city(&resolved);
            tracing::info!(generation, "Dashboard updated for {}", resolved.city_name);
            RefreshOutcome::Applied
        } else {
            tracing::debug!(generation, "Discarding superseded refresh");
            RefreshOutcome::Superseded
        }
    }

    /// Manual selection: replace the location and refresh in the foreground.
    pub async fn set_location(&self, location: Location) -> RefreshOutcome {
        let (location, generation) = self.override_and_issue(location);
        tracing::info!("Location set to {}", location.city_name);
        self.run_refresh(location, generation).await
    }

    /// Select a search result.
    pub async fn select_place(&self, place: Place) -> RefreshOutcome {
        self.set_location(place.into_location()).await
    }

    /// Jump to the device's current position.
    ///
    /// Returns `None` and leaves state untouched when no fix is available.
    pub async fn use_current_location(&self) -> Option<RefreshOutcome> {
        let timeout = self.inner.settings.initial_fix_timeout;
        let position = match time::timeout(timeout, self.inner.location_source.current_position())
            .await
        {
            Ok(Ok(position)) => position,
            Ok(Err(e)) => {
                tracing::warn!("Current location unavailable: {}", e);
                return None;
            }
            Err(_) => {
                tracing::warn!("Current location request timed out after {:?}", timeout);
                return None;
            }
        };

        let (location, generation) =
            self.override_and_issue(Location::unresolved(position.latitude, position.longitude));
        Some(self.run_refresh(location, generation).await)
    }

    /// Free-text place search, best match first. Empty on failure.
    pub async fn search_city(&self, query: &str) -> Vec<Place> {
        self.inner
            .gateways
            .geocoder
            .search(query)
            .await
            .into_result()
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.inner.state.send_if_modified(|snapshot| {
            let changed = snapshot.preferences.theme != theme;
            snapshot.preferences.theme = theme;
            changed
        });
    }

    pub fn set_sensitivity_mode(&self, enabled: bool) {
        self.inner.state.send_if_modified(|snapshot| {
            let changed = snapshot.preferences.sensitivity_mode != enabled;
            snapshot.preferences.sensitivity_mode = enabled;
            changed
        });
    }

    /// Offline health advisory for the current snapshot.
    pub fn advisory(&self) -> Advisory {
        self.inner.state.borrow().advisory()
    }

    // Bumps the generation under the snapshot lock so a newer refresh can
    // never be ordered before the loading flag it raised. Callers that change
    // the tracker hold its lock across this call.
    fn begin_refresh(&self, background: bool) -> u64 {
        let mut generation = 0;
        self.inner.state.send_if_modified(|snapshot| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if background {
                return false;
            }
            snapshot.loading = true;
            snapshot.error = None;
            true
        });
        generation
    }

    /// Current tracker location and a fresh generation, taken as one step.
    fn issue_tracked_refresh(&self, background: bool) -> (Location, u64) {
        let tracker = self.inner.tracker.lock();
        let location = tracker.current().clone();
        (location, self.begin_refresh(background))
    }

    fn override_and_issue(&self, location: Location) -> (Location, u64) {
        let mut tracker = self.inner.tracker.lock();
        let location = tracker.override_location(location);
        (location, self.begin_refresh(false))
    }

    /// Offer a device fix; an accepted one gets its generation before the
    /// tracker lock is released.
    fn offer_and_issue(&self, position: Position) -> Option<(Location, u64)> {
        let mut tracker = self.inner.tracker.lock();
        let location = tracker.offer_position(position)?;
        Some((location, self.begin_refresh(false)))
    }

    fn publish_if_current(&self, generation: u64, apply: impl FnOnce(&mut Snapshot)) -> bool {
        self.inner.state.send_if_modified(|snapshot| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            apply(snapshot);
            true
        })
    }

    fn spawn_task<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.inner.shutdown.clone();
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => tracing::debug!("{} task cancelled", name),
                _ = task => tracing::debug!("{} task finished", name),
            }
        });
    }

    async fn acquire_initial_fix(&self) {
        let timeout = self.inner.settings.initial_fix_timeout;
        let position =
            match time::timeout(timeout, self.inner.location_source.current_position()).await {
                Ok(Ok(position)) => position,
                Ok(Err(e)) => {
                    tracing::info!("No initial location fix, keeping default: {}", e);
                    return;
                }
                Err(_) => {
                    tracing::info!("Initial location fix timed out after {:?}", timeout);
                    return;
                }
            };

        if let Some((location, generation)) = self.offer_and_issue(position) {
            tracing::info!(
                "Initial location fix: {:.4}, {:.4}",
                location.latitude,
                location.longitude
            );
            self.run_refresh(location, generation).await;
        }
    }

    async fn watch_location(&self) {
        let mut watch = match self.inner.location_source.watch().await {
            Ok(watch) => watch,
            Err(e) => {
                tracing::warn!("Location watch unavailable: {}", e);
                return;
            }
        };

        let timeout = self.inner.settings.watch_timeout;
        loop {
            let position = match time::timeout(timeout, watch.next()).await {
                Ok(Some(Ok(position))) => position,
                Ok(Some(Err(e))) => {
                    tracing::warn!("Location watch error: {}", e);
                    continue;
                }
                Ok(None) => {
                    tracing::debug!("Location watch ended");
                    return;
                }
                Err(_) => {
                    tracing::debug!("No location update within {:?}", timeout);
                    continue;
                }
            };

            if let Some((location, generation)) = self.offer_and_issue(position) {
                tracing::info!(
                    "Moved to {:.4}, {:.4}",
                    location.latitude,
                    location.longitude
                );
                let handle = self.clone();
                self.spawn_task("location refresh", async move {
                    handle.run_refresh(location, generation).await;
                });
            }
        }
    }

    async fn run_periodic_refresh(&self, period: std::time::Duration) {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::debug!("Periodic refresh");
            let (location, generation) = self.issue_tracked_refresh(true);
            self.run_refresh(location, generation).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ozone_env::{ProviderEndpoints, UnavailableLocationSource};

    fn idle_dashboard() -> Dashboard {
        // Nothing listens on port 9, so every refresh fails fast on weather.
        let gateways = Gateways::new(&ProviderEndpoints::with_base_url("http://127.0.0.1:9")).unwrap();
        Dashboard::new(
            DashboardSettings::default(),
            gateways,
            Arc::new(UnavailableLocationSource),
        )
    }

    #[tokio::test]
    async fn test_new_dashboard_shows_default_location() {
        let dashboard = idle_dashboard();
        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.location.city_name, "New York");
        assert!(snapshot.loading);
        assert_eq!(dashboard.location(), snapshot.location);
    }

    #[tokio::test]
    async fn test_preference_setters_notify_only_on_change() {
        let dashboard = idle_dashboard();
        let mut rx = dashboard.subscribe();
        rx.mark_unchanged();

        dashboard.set_theme(Theme::Light);
        assert!(!rx.has_changed().unwrap());

        dashboard.set_theme(Theme::Dark);
        dashboard.set_sensitivity_mode(true);
        assert!(rx.has_changed().unwrap());

        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.preferences.theme, Theme::Dark);
        assert!(snapshot.preferences.sensitivity_mode);
    }

    #[tokio::test]
    async fn test_begin_refresh_generations() {
        let dashboard = idle_dashboard();
        let first = dashboard.begin_refresh(true);
        let second = dashboard.begin_refresh(false);
        assert!(second > first);
        assert!(dashboard.snapshot().loading);

        assert!(!dashboard.publish_if_current(first, |s| s.loading = false));
        assert!(dashboard.publish_if_current(second, |s| s.loading = false));
        assert!(!dashboard.snapshot().loading);
    }

    #[tokio::test]
    async fn test_manual_selection_beats_earlier_accepted_fix() {
        let dashboard = idle_dashboard();

        // A watch update is accepted, but its refresh has not run yet.
        let (fix, fix_generation) = dashboard
            .offer_and_issue(Position::new(10.0, 10.0))
            .unwrap();

        let paris = Location::new(48.85, 2.35, "Paris");
        assert_eq!(dashboard.set_location(paris.clone()).await, RefreshOutcome::Failed);
        assert_eq!(
            dashboard.run_refresh(fix, fix_generation).await,
            RefreshOutcome::Superseded
        );

        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.location, paris);
        assert!(!snapshot.loading);
        assert_eq!(dashboard.location(), paris);
    }

    #[tokio::test]
    async fn test_tracked_refresh_issued_after_override_sees_it() {
        let dashboard = idle_dashboard();
        let (_, first) = dashboard.issue_tracked_refresh(true);
        let (location, second) = dashboard.override_and_issue(Location::new(1.0, 2.0, "Here"));

        assert!(second > first);
        let (current, third) = dashboard.issue_tracked_refresh(true);
        assert_eq!(current, location);
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_use_current_location_without_fix_leaves_state() {
        let dashboard = idle_dashboard();
        let before = dashboard.snapshot();

        assert_eq!(dashboard.use_current_location().await, None);
        assert_eq!(dashboard.snapshot(), before);
        assert_eq!(dashboard.location().city_name, "New York");
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let dashboard = idle_dashboard();
        dashboard.shutdown().await;
        dashboard.shutdown().await;
    }
}
