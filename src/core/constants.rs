//! Geodetic constants and system defaults

/// Mean Earth radius used by the haversine distance (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance below which a user counts as arrived at the destination (meters)
pub const ARRIVAL_THRESHOLD_METERS: f64 = 30.0;

/// Minimum movement between two position updates requested from the source (meters)
pub const DEFAULT_DISTANCE_INTERVAL_M: f64 = 5.0;

/// Minimum time between two position updates requested from the source (milliseconds)
pub const DEFAULT_TIME_INTERVAL_MS: u64 = 1000;
