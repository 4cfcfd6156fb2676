//! In-memory progress reporter

use crate::reporting::{ProgressReport, ProgressReporter, ReportError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Default)]
struct Recorded {
    reports: Vec<ProgressReport>,
    failure: Option<ReportError>,
}

/// Records every report it receives; can be told to fail
///
/// Clones share the same record, so one handle can be given to a session while
/// another inspects what arrived.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A reporter whose every call fails with `error`
    pub fn failing(error: ReportError) -> Self {
        let reporter = Self::new();
        reporter.fail_with(Some(error));
        reporter
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_with(&self, error: Option<ReportError>) {
        self.lock().failure = error;
    }

    pub fn call_count(&self) -> usize {
        self.lock().reports.len()
    }

    pub fn reports(&self) -> Vec<ProgressReport> {
        self.lock().reports.clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn record_progress(&self, report: &ProgressReport) -> Result<(), ReportError> {
        let mut recorded = self.lock();
        recorded.reports.push(report.clone());
        info!(
            user = %report.user_id,
            challenge = %report.challenge_id,
            destination = %report.destination_id,
            "progress recorded"
        );
        match &recorded.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
