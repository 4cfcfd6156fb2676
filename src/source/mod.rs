//! Position sources
//!
//! A position source delivers a stream of samples to subscribed callbacks. The
//! returned [`Subscription`] owns the registration: dropping it (or calling
//! [`Subscription::unsubscribe`]) detaches the callback, after which it is never
//! invoked again.

pub mod error;
pub mod mock;

pub use error::{RecoveryStrategy, SourceError, SourceResult};
pub use mock::MockPositionSource;

use crate::core::{Position, DEFAULT_DISTANCE_INTERVAL_M, DEFAULT_TIME_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single delivery from a position source
pub type PositionUpdate = Result<Position, SourceError>;

/// Callback invoked for every update while the subscription is alive
pub type PositionCallback = Arc<dyn Fn(PositionUpdate) + Send + Sync>;

/// Accuracy level requested from the platform location service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accuracy {
    Lowest,
    Low,
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Delivery cadence requested when subscribing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Minimum movement between updates (meters)
    pub distance_interval_m: f64,
    /// Minimum time between updates (milliseconds)
    pub time_interval_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::BestForNavigation,
            distance_interval_m: DEFAULT_DISTANCE_INTERVAL_M,
            time_interval_ms: DEFAULT_TIME_INTERVAL_MS,
        }
    }
}

/// Identifier of one registration on a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        SubscriptionId(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Live position stream, e.g. a platform location service
pub trait PositionSource {
    /// Register `callback` for updates at the requested cadence
    fn subscribe(
        &self,
        options: &WatchOptions,
        callback: PositionCallback,
    ) -> SourceResult<Subscription>;
}

/// Scoped registration on a position source
pub struct Subscription {
    id: SubscriptionId,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a registration; `release` detaches it and runs at most once
    pub fn new(id: SubscriptionId, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Detach the callback. Calling this more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
