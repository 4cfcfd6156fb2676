//! Position source error types and handling

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by a position source
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SourceError {
    /// The user denied or revoked location permission
    #[error("location permission denied")]
    PermissionDenied,
    /// No fix available right now
    #[error("position signal lost")]
    SignalLost,
    /// A single read failed
    #[error("position read failed: {details}")]
    ReadFailure { details: String },
    /// The source stopped delivering updates for good
    #[error("position stream closed")]
    StreamClosed,
    /// The sample is outside the geodetic ranges or not finite
    #[error("invalid position sample ({latitude}, {longitude})")]
    InvalidSample { latitude: f64, longitude: f64 },
}

/// Result type for position source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// What a consumer should do after a source error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Drop this sample and wait for the next one
    Skip,
    /// End the session; only re-entering restarts tracking
    Terminate,
}

impl SourceError {
    /// Get the recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            SourceError::PermissionDenied => RecoveryStrategy::Terminate,
            SourceError::StreamClosed => RecoveryStrategy::Terminate,
            SourceError::SignalLost => RecoveryStrategy::Skip,
            SourceError::ReadFailure { .. } => RecoveryStrategy::Skip,
            SourceError::InvalidSample { .. } => RecoveryStrategy::Skip,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.recovery_strategy(), RecoveryStrategy::Terminate)
    }
}
