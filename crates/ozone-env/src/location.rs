//! Device location sources.
//!
//! A source answers one-shot requests and hands out standing subscriptions.
//! A subscription is released when its [`PositionWatch`] is dropped.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::types::{LocationError, Position};

const WATCH_BUFFER: usize = 16;

pub type PositionUpdate = Result<Position, LocationError>;

#[async_trait]
pub trait LocationSource: Send + Sync {
    /// A single best-effort fix.
    async fn current_position(&self) -> Result<Position, LocationError>;

    /// Subscribe to continuous updates.
    async fn watch(&self) -> Result<PositionWatch, LocationError>;
}

/// Handle to a standing location subscription.
#[derive(Debug)]
pub struct PositionWatch {
    updates: mpsc::Receiver<PositionUpdate>,
}

impl PositionWatch {
    pub fn new(updates: mpsc::Receiver<PositionUpdate>) -> Self {
        Self { updates }
    }

    /// Next update, or `None` once the source has stopped.
    pub async fn next(&mut self) -> Option<PositionUpdate> {
        self.updates.recv().await
    }
}

/// A device that never moves.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationSource {
    position: Position,
}

impl FixedLocationSource {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        Ok(self.position)
    }

    async fn watch(&self) -> Result<PositionWatch, LocationError> {
        // Nothing will ever be sent; the watch ends immediately.
        let (_tx, rx) = mpsc::channel(1);
        Ok(PositionWatch::new(rx))
    }
}

/// No location hardware or permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableLocationSource;

#[async_trait]
impl LocationSource for UnavailableLocationSource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }

    async fn watch(&self) -> Result<PositionWatch, LocationError> {
        Err(LocationError::ServiceUnavailable)
    }
}

struct ChannelShared {
    fix: Mutex<PositionUpdate>,
    watchers: Mutex<Vec<mpsc::Sender<PositionUpdate>>>,
}

/// A source fed by an external producer such as a platform bridge.
///
/// The producer sets the answer for one-shot requests with [`set_fix`] and
/// broadcasts continuous updates with [`push`].
///
/// [`set_fix`]: ChannelLocationSource::set_fix
/// [`push`]: ChannelLocationSource::push
#[derive(Clone)]
pub struct ChannelLocationSource {
    shared: Arc<ChannelShared>,
}

impl Default for ChannelLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLocationSource {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                fix: Mutex::new(Err(LocationError::ServiceUnavailable)),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Answer future one-shot requests with `fix`.
    pub fn set_fix(&self, fix: PositionUpdate) {
        *self.shared.fix.lock() = fix;
    }

    /// Deliver an update to every live subscription.
    ///
    /// Returns how many subscriptions received it. Closed subscriptions are
    /// forgotten; full ones skip this update.
    pub fn push(&self, update: PositionUpdate) -> usize {
        let mut watchers = self.shared.watchers.lock();
        watchers.retain(|tx| !tx.is_closed());

        watchers
            .iter()
            .filter(|tx| match tx.try_send(update.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("Dropping location update: {}", e);
                    false
                }
            })
            .count()
    }

    /// Number of subscriptions still held by a consumer.
    pub fn watcher_count(&self) -> usize {
        let mut watchers = self.shared.watchers.lock();
        watchers.retain(|tx| !tx.is_closed());
        watchers.len()
    }
}

#[async_trait]
impl LocationSource for ChannelLocationSource {
    async fn current_position(&self) -> Result<Position, LocationError> {
        self.shared.fix.lock().clone()
    }

    async fn watch(&self) -> Result<PositionWatch, LocationError> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        self.shared.watchers.lock().push(tx);
        Ok(PositionWatch::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_source_answers_fix_and_closes_watch() {
        let source = FixedLocationSource::new(Position::new(51.5, -0.12));
        assert_eq!(source.current_position().await, Ok(Position::new(51.5, -0.12)));

        let mut watch = source.watch().await.unwrap();
        assert!(watch.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let source = UnavailableLocationSource;
        assert_eq!(
            source.current_position().await,
            Err(LocationError::ServiceUnavailable)
        );
        assert!(source.watch().await.is_err());
    }

    #[tokio::test]
    async fn test_channel_source_broadcasts_to_watchers() {
        let source = ChannelLocationSource::new();
        let mut first = source.watch().await.unwrap();
        let mut second = source.watch().await.unwrap();

        assert_eq!(source.push(Ok(Position::new(1.0, 2.0))), 2);
        assert_eq!(first.next().await, Some(Ok(Position::new(1.0, 2.0))));
        assert_eq!(second.next().await, Some(Ok(Position::new(1.0, 2.0))));
    }

    #[tokio::test]
    async fn test_dropping_watch_releases_subscription() {
        let source = ChannelLocationSource::new();
        let watch = source.watch().await.unwrap();
        assert_eq!(source.watcher_count(), 1);

        drop(watch);
        assert_eq!(source.watcher_count(), 0);
        assert_eq!(source.push(Ok(Position::new(1.0, 2.0))), 0);
    }

    #[tokio::test]
    async fn test_channel_source_fix() {
        let source = ChannelLocationSource::new();
        assert!(source.current_position().await.is_err());

        source.set_fix(Ok(Position::new(48.85, 2.35)));
        assert_eq!(source.current_position().await, Ok(Position::new(48.85, 2.35)));

        source.set_fix(Err(LocationError::PermissionDenied));
        assert_eq!(
            source.current_position().await,
            Err(LocationError::PermissionDenied)
        );
    }
}
