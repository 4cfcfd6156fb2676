//! Core data types for proximity tracking

use serde::{Deserialize, Serialize};

/// Geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and inside the geodetic ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Challenge metadata a tracking session is started from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeContext {
    pub user_id: String,
    pub challenge_id: String,
    pub destination_id: String,
    /// Fixed for the lifetime of the session
    pub destination: Position,
}

impl ChallengeContext {
    pub fn new(
        user_id: impl Into<String>,
        challenge_id: impl Into<String>,
        destination_id: impl Into<String>,
        destination: Position,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            challenge_id: challenge_id.into(),
            destination_id: destination_id.into(),
            destination,
        }
    }
}
