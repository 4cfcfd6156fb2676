//! Common API types and data structures

use crate::core::Position;
use crate::reporting::ReportError;
use crate::session::{ArrivalRecord, Phase, ReportOutcome};
use crate::source::SourceError;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Tracker error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// Location permission missing; the user has to grant it and start over
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position source failed: {0}")]
    Source(SourceError),
    #[error("invalid destination ({latitude}, {longitude})")]
    InvalidDestination { latitude: f64, longitude: f64 },
    /// Sessions are single-use; a new one must be created to track again
    #[error("tracking session already started")]
    AlreadyStarted,
    #[error("invalid callback handle {0}")]
    InvalidCallback(u32),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl From<SourceError> for TrackerError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::PermissionDenied => TrackerError::PermissionDenied,
            other => TrackerError::Source(other),
        }
    }
}

/// Events delivered to session callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A sample was accepted
    DistanceUpdated { distance_m: f64, phase: Phase },
    /// The threshold was crossed; emitted once per session
    Arrived { distance_m: f64, position: Position },
    ProgressRecorded,
    ProgressFailed { error: ReportError },
    /// A sample was skipped; tracking continues
    LocationUnavailable { error: SourceError },
    /// Tracking ended for good
    SessionFailed { error: SourceError },
}

/// Callback function type for tracker events
pub type EventCallback = Arc<dyn Fn(TrackerEvent) + Send + Sync>;

/// Callback registration handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u32);

impl CallbackHandle {
    pub(crate) fn new(id: u32) -> Self {
        CallbackHandle(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Point-in-time view of a tracking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub challenge_id: String,
    pub destination: Position,
    pub threshold_m: f64,
    pub phase: Phase,
    /// Distance remaining, once a sample was accepted
    pub distance_m: Option<f64>,
    /// Heading from the latest sample to the destination (degrees)
    pub bearing_deg: Option<f64>,
    pub last_position: Option<Position>,
    pub samples_seen: u64,
    pub samples_skipped: u64,
    pub location_unavailable: bool,
    pub failure: Option<SourceError>,
    pub arrival: Option<ArrivalRecord>,
    pub report: ReportOutcome,
    /// Subscribed and not failed
    pub active: bool,
}
