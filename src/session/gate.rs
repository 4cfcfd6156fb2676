//! One-shot arrival gate
//!
//! The gate owns the side effect of arriving: a single progress report. Its latch
//! is an atomic flag flipped with compare-and-set before the report is issued, so
//! concurrent or repeated arrival signals dispatch at most one report. A failed
//! report never re-arms the latch.

use crate::reporting::{ProgressReport, ProgressReporter, ReportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Where the progress report runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportDispatch {
    /// Worker thread, off the position-update path
    Background,
    /// On the caller's thread, after the latch flip
    Inline,
}

/// State of the one-time report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ReportOutcome {
    NotTriggered,
    Pending,
    Recorded,
    Failed(ReportError),
}

/// Called with the report result, from whichever thread ran it
pub type ReportNotifier = Arc<dyn Fn(&Result<(), ReportError>) + Send + Sync>;

pub struct ArrivalGate {
    opened: AtomicBool,
    reporter: Arc<dyn ProgressReporter>,
    dispatch: ReportDispatch,
    notifier: Option<ReportNotifier>,
    result: Arc<Mutex<Option<Result<(), ReportError>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ArrivalGate {
    pub fn new(reporter: Arc<dyn ProgressReporter>, dispatch: ReportDispatch) -> Self {
        Self {
            opened: AtomicBool::new(false),
            reporter,
            dispatch,
            notifier: None,
            result: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    pub fn with_notifier(mut self, notifier: ReportNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    pub fn dispatch(&self) -> ReportDispatch {
        self.dispatch
    }

    /// Flip the latch and issue `report`. Returns `false` if the gate was already open.
    pub fn open(&self, report: ProgressReport) -> bool {
        if self
            .opened
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(
            user = %report.user_id,
            challenge = %report.challenge_id,
            destination = %report.destination_id,
            "arrival gate opened"
        );

        let reporter = Arc::clone(&self.reporter);
        let result_slot = Arc::clone(&self.result);
        let notifier = self.notifier.clone();
        let task = move || {
            let result = reporter.record_progress(&report);
            complete(&result_slot, notifier.as_ref(), result);
        };

        match self.dispatch {
            ReportDispatch::Inline => task(),
            ReportDispatch::Background => {
                let spawned = thread::Builder::new()
                    .name("progress-report".to_string())
                    .spawn(task);
                match spawned {
                    Ok(handle) => *lock(&self.worker) = Some(handle),
                    Err(e) => complete(
                        &self.result,
                        self.notifier.as_ref(),
                        Err(ReportError::Transport(format!("failed to spawn report worker: {}", e))),
                    ),
                }
            }
        }

        true
    }

    pub fn outcome(&self) -> ReportOutcome {
        if !self.is_open() {
            return ReportOutcome::NotTriggered;
        }
        match &*lock(&self.result) {
            None => ReportOutcome::Pending,
            Some(Ok(())) => ReportOutcome::Recorded,
            Some(Err(e)) => ReportOutcome::Failed(e.clone()),
        }
    }

    /// Block until a background report, if any, has finished
    pub fn wait(&self) {
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("progress report worker panicked");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn complete(
    slot: &Mutex<Option<Result<(), ReportError>>>,
    notifier: Option<&ReportNotifier>,
    result: Result<(), ReportError>,
) {
    match &result {
        Ok(()) => info!("challenge progress recorded"),
        Err(e) => warn!("challenge progress not recorded: {}", e),
    }
    *lock(slot) = Some(result.clone());
    if let Some(notify) = notifier {
        notify(&result);
    }
}

impl fmt::Debug for ArrivalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrivalGate")
            .field("open", &self.is_open())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::RecordingReporter;
    use std::sync::atomic::AtomicUsize;

    fn report() -> ProgressReport {
        ProgressReport {
            user_id: "17".to_string(),
            challenge_id: "204".to_string(),
            destination_id: "9".to_string(),
        }
    }

    #[test]
    fn test_gate_opens_once() {
        let reporter = RecordingReporter::new();
        let gate = ArrivalGate::new(Arc::new(reporter.clone()), ReportDispatch::Inline);

        assert_eq!(gate.outcome(), ReportOutcome::NotTriggered);
        assert!(gate.open(report()));
        assert!(!gate.open(report()));
        assert!(!gate.open(report()));

        assert!(gate.is_open());
        assert_eq!(reporter.call_count(), 1);
        assert_eq!(gate.outcome(), ReportOutcome::Recorded);
    }

    #[test]
    fn test_failure_keeps_latch_set() {
        let reporter = RecordingReporter::failing(ReportError::Rejected { status: 503 });
        let gate = ArrivalGate::new(Arc::new(reporter.clone()), ReportDispatch::Inline);

        assert!(gate.open(report()));
        assert_eq!(
            gate.outcome(),
            ReportOutcome::Failed(ReportError::Rejected { status: 503 })
        );
        assert!(!gate.open(report()));
        assert_eq!(reporter.call_count(), 1);
    }

    #[test]
    fn test_background_dispatch() {
        let reporter = RecordingReporter::new();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let gate = ArrivalGate::new(Arc::new(reporter.clone()), ReportDispatch::Background)
            .with_notifier(Arc::new(move |result: &Result<(), ReportError>| {
                assert!(result.is_ok());
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        assert!(gate.open(report()));
        gate.wait();

        assert_eq!(reporter.call_count(), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(gate.outcome(), ReportOutcome::Recorded);
    }

    #[test]
    fn test_concurrent_open_dispatches_once() {
        let reporter = RecordingReporter::new();
        let gate = Arc::new(ArrivalGate::new(
            Arc::new(reporter.clone()),
            ReportDispatch::Inline,
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.open(report()))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(reporter.call_count(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ReportOutcome::Failed(ReportError::Rejected { status: 500 })).unwrap();
        assert_eq!(json["status"], "failed");
        let json = serde_json::to_value(ReportOutcome::Recorded).unwrap();
        assert_eq!(json["status"], "recorded");
    }
}
