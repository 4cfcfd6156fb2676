//! Proximity session state and the arrival gate

pub mod gate;
pub mod state;

pub use gate::{ArrivalGate, ReportDispatch, ReportNotifier, ReportOutcome};
pub use state::{ArrivalRecord, Phase, ProximitySession, SampleOutcome};
