//! Tracking API
//!
//! [`LocationTracker`] creates [`TrackingSession`]s, which subscribe to a position
//! source, emit [`TrackerEvent`]s to registered callbacks, and record challenge
//! progress once on arrival.

pub mod formatting;
pub mod tracker;
pub mod types;

pub use formatting::{format_distance, CsvFormatter, JsonFormatter, TextFormatter};
pub use tracker::{LocationTracker, TrackingSession};
pub use types::{
    CallbackHandle, EventCallback, SessionSnapshot, TrackerError, TrackerEvent, TrackerResult,
};
