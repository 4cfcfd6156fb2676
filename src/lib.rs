//! Proximity Tracker
//!
//! Geofenced arrival detection for location-based challenges: follow a live
//! position stream, measure the great-circle distance to the challenge destination,
//! and fire a one-time progress report the first time the user comes within the
//! arrival threshold.

pub mod core;
pub mod algorithms;
pub mod session;
pub mod source;
pub mod reporting;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use crate::core::{ChallengeContext, Position, ARRIVAL_THRESHOLD_METERS, EARTH_RADIUS_M};
pub use algorithms::{haversine_distance, initial_bearing, local_offset, CompassDirection};
pub use session::{ArrivalGate, Phase, ProximitySession, ReportDispatch, ReportOutcome, SampleOutcome};
pub use source::{
    MockPositionSource, PositionCallback, PositionSource, PositionUpdate, SourceError,
    Subscription, WatchOptions,
};
pub use reporting::{HttpProgressReporter, ProgressReport, ProgressReporter, RecordingReporter, ReportError};
pub use utils::{ConfigError, LogLevel, TrackerConfig};
pub use api::{
    CallbackHandle, EventCallback, LocationTracker, SessionSnapshot, TrackerError, TrackerEvent,
    TrackerResult, TrackingSession, TextFormatter, JsonFormatter, CsvFormatter,
};
