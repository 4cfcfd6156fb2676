//! Distance tracking state machine
//!
//! A session starts in [`Phase::Tracking`] and moves to [`Phase::Arrived`] the
//! first time a sample lands strictly inside the arrival threshold. `Arrived` is
//! terminal: later samples keep the distance current but never produce another
//! [`SampleOutcome::Arrived`].

use crate::algorithms::haversine_distance;
use crate::core::Position;
use crate::source::SourceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Tracking,
    Arrived,
}

/// When and where the session crossed the threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    /// 1-based index among accepted samples
    pub sample_index: u64,
    pub distance_m: f64,
    pub position: Position,
}

/// Result of feeding one sample into the session
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Still outside the threshold
    Tracking { distance_m: f64 },
    /// This sample crossed the threshold; reported once per session
    Arrived { distance_m: f64 },
    /// Already arrived earlier; distance updated for display only
    AlreadyArrived { distance_m: f64 },
    /// Sample rejected, state untouched
    Skipped(SourceError),
}

impl SampleOutcome {
    pub fn distance_m(&self) -> Option<f64> {
        match self {
            SampleOutcome::Tracking { distance_m }
            | SampleOutcome::Arrived { distance_m }
            | SampleOutcome::AlreadyArrived { distance_m } => Some(*distance_m),
            SampleOutcome::Skipped(_) => None,
        }
    }

    pub fn is_arrival(&self) -> bool {
        matches!(self, SampleOutcome::Arrived { .. })
    }
}

/// Per-session proximity state against a fixed destination
#[derive(Debug, Clone)]
pub struct ProximitySession {
    destination: Position,
    threshold_m: f64,
    phase: Phase,
    distance_m: Option<f64>,
    last_position: Option<Position>,
    samples_seen: u64,
    samples_skipped: u64,
    arrival: Option<ArrivalRecord>,
}

impl ProximitySession {
    /// The caller is responsible for passing a valid destination and threshold
    pub fn new(destination: Position, threshold_m: f64) -> Self {
        Self {
            destination,
            threshold_m,
            phase: Phase::Tracking,
            distance_m: None,
            last_position: None,
            samples_seen: 0,
            samples_skipped: 0,
            arrival: None,
        }
    }

    /// Feed one position sample
    pub fn observe(&mut self, sample: &Position) -> SampleOutcome {
        if !sample.is_valid() {
            self.samples_skipped += 1;
            return SampleOutcome::Skipped(SourceError::InvalidSample {
                latitude: sample.latitude,
                longitude: sample.longitude,
            });
        }

        self.samples_seen += 1;
        let distance_m = haversine_distance(sample, &self.destination);
        self.distance_m = Some(distance_m);
        self.last_position = Some(*sample);

        match self.phase {
            Phase::Tracking if distance_m < self.threshold_m => {
                self.phase = Phase::Arrived;
                self.arrival = Some(ArrivalRecord {
                    sample_index: self.samples_seen,
                    distance_m,
                    position: *sample,
                });
                SampleOutcome::Arrived { distance_m }
            }
            Phase::Tracking => SampleOutcome::Tracking { distance_m },
            Phase::Arrived => SampleOutcome::AlreadyArrived { distance_m },
        }
    }

    /// Count a sample the source failed to deliver
    pub fn record_skipped(&mut self) {
        self.samples_skipped += 1;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_arrived(&self) -> bool {
        self.phase == Phase::Arrived
    }

    /// Latest distance to the destination, once a sample was accepted
    pub fn distance_m(&self) -> Option<f64> {
        self.distance_m
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    pub fn destination(&self) -> Position {
        self.destination
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn samples_skipped(&self) -> u64 {
        self.samples_skipped
    }

    pub fn arrival(&self) -> Option<&ArrivalRecord> {
        self.arrival.as_ref()
    }
}
