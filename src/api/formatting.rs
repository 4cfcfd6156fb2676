//! Session output formatting
//!
//! Turns a [`SessionSnapshot`] into the strings a client shows or logs: a short
//! "distance remaining" line, a multi-line status block, JSON, or CSV rows.

use crate::algorithms::CompassDirection;
use crate::api::types::SessionSnapshot;
use crate::session::{Phase, ReportOutcome};

/// Human-readable distance: meters below one kilometer, kilometers above
pub fn format_distance(distance_m: f64) -> String {
    // Switch on the rounded value so 999.6 reads "1.00 km", not "1000 m"
    if distance_m.round() < 1000.0 {
        format!("{:.0} m", distance_m)
    } else {
        format!("{:.2} km", distance_m / 1000.0)
    }
}

/// Human-readable text formatter
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    /// Single line instead of a status block
    pub compact: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Short progress line, e.g. "1.10 km to go, head NE"
    pub fn headline(&self, snapshot: &SessionSnapshot) -> String {
        if let Some(error) = &snapshot.failure {
            return format!("Tracking stopped: {}", error);
        }

        match (snapshot.phase, snapshot.distance_m) {
            (Phase::Arrived, _) => match &snapshot.report {
                ReportOutcome::Recorded => "Arrived, challenge started".to_string(),
                ReportOutcome::Failed(_) => "Arrived, progress not saved".to_string(),
                _ => "Arrived".to_string(),
            },
            (Phase::Tracking, _) if snapshot.location_unavailable => {
                "Location unavailable".to_string()
            }
            (Phase::Tracking, Some(distance_m)) => match snapshot.bearing_deg {
                Some(bearing) => format!(
                    "{} to go, head {}",
                    format_distance(distance_m),
                    CompassDirection::from_bearing(bearing).abbreviation()
                ),
                None => format!("{} to go", format_distance(distance_m)),
            },
            (Phase::Tracking, None) => "Waiting for location".to_string(),
        }
    }

    pub fn format_text(&self, snapshot: &SessionSnapshot) -> String {
        let headline = self.headline(snapshot);
        if self.compact {
            return headline;
        }

        let mut output = String::new();
        output.push_str(&format!("Challenge {}: {}\n", snapshot.challenge_id, headline));
        output.push_str(&format!(
            "  Destination: {:.6}°, {:.6}°\n",
            snapshot.destination.latitude, snapshot.destination.longitude
        ));
        if let Some(distance_m) = snapshot.distance_m {
            output.push_str(&format!("  Distance:    {:.1} m\n", distance_m));
        }
        output.push_str(&format!("  Threshold:   {:.1} m\n", snapshot.threshold_m));
        output.push_str(&format!(
            "  Samples:     {} seen, {} skipped\n",
            snapshot.samples_seen, snapshot.samples_skipped
        ));
        if let Some(arrival) = &snapshot.arrival {
            output.push_str(&format!(
                "  Arrived at:  sample #{} ({:.1} m)\n",
                arrival.sample_index, arrival.distance_m
            ));
        }
        let report = match &snapshot.report {
            ReportOutcome::NotTriggered => "not triggered".to_string(),
            ReportOutcome::Pending => "pending".to_string(),
            ReportOutcome::Recorded => "recorded".to_string(),
            ReportOutcome::Failed(e) => format!("failed ({})", e),
        };
        output.push_str(&format!("  Progress:    {}\n", report));

        output
    }
}

/// JSON formatter for structured output
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn format_json(&self, snapshot: &SessionSnapshot) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(snapshot)
        } else {
            serde_json::to_string(snapshot)
        }
    }
}

/// CSV formatter for track logging
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    pub include_header: bool,
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self { include_header: true }
    }
}

impl CsvFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> String {
        "sample,latitude,longitude,distance_m,bearing_deg,phase,location_unavailable".to_string()
    }

    pub fn format_csv(&self, snapshot: &SessionSnapshot) -> String {
        let (lat, lon) = snapshot
            .last_position
            .map(|p| (format!("{:.6}", p.latitude), format!("{:.6}", p.longitude)))
            .unwrap_or_default();
        let distance = snapshot
            .distance_m
            .map(|d| format!("{:.1}", d))
            .unwrap_or_default();
        let bearing = snapshot
            .bearing_deg
            .map(|b| format!("{:.1}", b))
            .unwrap_or_default();

        format!(
            "{},{},{},{},{},{:?},{}",
            snapshot.samples_seen,
            lat,
            lon,
            distance,
            bearing,
            snapshot.phase,
            snapshot.location_unavailable
        )
    }
}
