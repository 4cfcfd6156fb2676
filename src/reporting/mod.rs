//! Progress reporting
//!
//! On arrival the tracker records the user's progress exactly once through a
//! [`ProgressReporter`]. The reporter's answer is only surfaced as feedback; it
//! never changes the session's arrival state.

pub mod http;
pub mod memory;

pub use http::HttpProgressReporter;
pub use memory::RecordingReporter;

use crate::core::ChallengeContext;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload of the one-time "register progress" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub user_id: String,
    pub challenge_id: String,
    pub destination_id: String,
}

impl From<&ChallengeContext> for ProgressReport {
    fn from(context: &ChallengeContext) -> Self {
        Self {
            user_id: context.user_id.clone(),
            challenge_id: context.challenge_id.clone(),
            destination_id: context.destination_id.clone(),
        }
    }
}

/// Progress recording failures
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ReportError {
    #[error("progress request failed: {0}")]
    Transport(String),
    #[error("progress endpoint rejected report with status {status}")]
    Rejected { status: u16 },
    #[error("invalid progress endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// External collaborator that records challenge progress
pub trait ProgressReporter: Send + Sync {
    fn record_progress(&self, report: &ProgressReport) -> Result<(), ReportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Position;

    #[test]
    fn test_report_from_context() {
        let context = ChallengeContext::new("u-1", "c-9", "d-3", Position::new(1.0, 2.0));
        let report = ProgressReport::from(&context);
        assert_eq!(report.user_id, "u-1");
        assert_eq!(report.challenge_id, "c-9");
        assert_eq!(report.destination_id, "d-3");
    }

    #[test]
    fn test_report_json_shape() {
        let report = ProgressReport {
            user_id: "42".to_string(),
            challenge_id: "7".to_string(),
            destination_id: "3".to_string(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["user_id"], "42");
        assert_eq!(value["challenge_id"], "7");
        assert_eq!(value["destination_id"], "3");
    }
}
