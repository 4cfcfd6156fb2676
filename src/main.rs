use clap::{Parser, Subcommand, ValueEnum};
use proximity_tracker::{
    haversine_distance, initial_bearing, ChallengeContext, ConfigError, CsvFormatter,
    JsonFormatter, LocationTracker, MockPositionSource, Position,
    ProgressReporter, RecordingReporter, SourceError, TextFormatter, TrackerConfig, TrackerError,
    TrackerEvent,
};
use proximity_tracker::api::format_distance;
use proximity_tracker::algorithms::CompassDirection;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Geofenced arrival detection for location challenges")]
struct Cli {
    /// JSON tracker configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Great-circle distance and heading between two points
    Distance {
        /// Start point as LAT,LON
        #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
        from: Position,
        /// End point as LAT,LON
        #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
        to: Position,
    },
    /// Feed a recorded track through a tracking session
    Replay {
        /// JSON array of samples: {"latitude":..,"longitude":..} or {"error":"signal_lost"}
        track: PathBuf,
        /// Challenge destination as LAT,LON
        #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
        destination: Position,
        /// Override the arrival threshold (meters)
        #[arg(long)]
        threshold: Option<f64>,
        /// Post progress to this endpoint instead of a dry run
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, default_value = "local-user")]
        user_id: String,
        #[arg(long, default_value = "replay")]
        challenge_id: String,
        #[arg(long, default_value = "destination")]
        destination_id: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackEntry {
    Sample(Position),
    Failure { error: TrackFailure },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TrackFailure {
    SignalLost,
    PermissionDenied,
    StreamClosed,
}

impl From<TrackFailure> for SourceError {
    fn from(failure: TrackFailure) -> Self {
        match failure {
            TrackFailure::SignalLost => SourceError::SignalLost,
            TrackFailure::PermissionDenied => SourceError::PermissionDenied,
            TrackFailure::StreamClosed => SourceError::StreamClosed,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read track '{path}': {source}")]
    Track {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse track: {0}")]
    TrackFormat(serde_json::Error),
    #[error("cannot render summary: {0}")]
    Output(serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

fn parse_position(raw: &str) -> Result<Position, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", raw))?;
    let latitude: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {}", e))?;
    let longitude: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {}", e))?;

    let position = Position::new(latitude, longitude);
    if !position.is_valid() {
        return Err(format!("'{}' is not a valid coordinate", raw));
    }
    Ok(position)
}

fn load_config(path: Option<&PathBuf>) -> Result<TrackerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => TrackerConfig::load_from_file(path)?,
        None => TrackerConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable. The filter starts at RUST_LOG or
    // `info` so configuration warnings are visible, then follows the configured
    // level unless RUST_LOG is set.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if !filter_from_env {
        if let Err(e) = filter_handle.reload(EnvFilter::new(config.log_level.as_filter())) {
            error!("cannot apply log level: {}", e);
        }
    }

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, mut config: TrackerConfig) -> Result<(), CliError> {
    match command {
        Command::Distance { from, to } => {
            let distance = haversine_distance(&from, &to);
            let bearing = initial_bearing(&from, &to);
            println!(
                "{} ({:.1} m), bearing {:.1}° {}",
                format_distance(distance),
                distance,
                bearing,
                CompassDirection::from_bearing(bearing).abbreviation()
            );
            Ok(())
        }
        Command::Replay {
            track,
            destination,
            threshold,
            endpoint,
            user_id,
            challenge_id,
            destination_id,
            format,
        } => {
            if let Some(threshold) = threshold {
                config.set_arrival_threshold(threshold)?;
            }
            if endpoint.is_some() {
                config.progress_endpoint = endpoint;
            }

            let content = fs::read_to_string(&track).map_err(|source| CliError::Track {
                path: track.display().to_string(),
                source,
            })?;
            let entries: Vec<TrackEntry> =
                serde_json::from_str(&content).map_err(CliError::TrackFormat)?;
            info!(samples = entries.len(), "replaying track");

            let context = ChallengeContext::new(user_id, challenge_id, destination_id, destination);
            replay(config, context, &entries, format)
        }
    }
}

fn replay(
    config: TrackerConfig,
    context: ChallengeContext,
    entries: &[TrackEntry],
    format: OutputFormat,
) -> Result<(), CliError> {
    let tracker = LocationTracker::new(config)?;
    let reporter: Arc<dyn ProgressReporter> = match tracker.http_reporter()? {
        Some(http) => {
            info!(endpoint = %http.endpoint(), "posting progress");
            Arc::new(http)
        }
        None => {
            info!("no progress endpoint configured, recording progress locally");
            Arc::new(RecordingReporter::new())
        }
    };

    let source = MockPositionSource::new();
    let mut session = tracker.session(context, reporter)?;
    session.register_event_callback(Arc::new(|event: TrackerEvent| match event {
        TrackerEvent::Arrived { distance_m, .. } => info!(distance_m, "arrived"),
        TrackerEvent::ProgressRecorded => info!("progress recorded"),
        TrackerEvent::ProgressFailed { error } => info!("progress failed: {}", error),
        other => debug!(?other, "tracker event"),
    }));
    session.start(&source)?;

    let text = TextFormatter::compact();
    let csv = CsvFormatter::new();
    if format == OutputFormat::Csv && csv.include_header {
        println!("{}", csv.header());
    }

    for entry in entries {
        match entry {
            TrackEntry::Sample(position) => source.emit_position(*position),
            TrackEntry::Failure { error } => source.emit_error((*error).into()),
        };

        let snapshot = session.snapshot();
        match format {
            OutputFormat::Text => println!("{}", text.headline(&snapshot)),
            OutputFormat::Csv => println!("{}", csv.format_csv(&snapshot)),
            OutputFormat::Json => {}
        }
    }

    let summary = session.stop();
    match format {
        OutputFormat::Json => {
            let json = JsonFormatter::pretty()
                .format_json(&summary)
                .map_err(CliError::Output)?;
            println!("{}", json);
        }
        _ => print!("{}", TextFormatter::new().format_text(&summary)),
    }

    Ok(())
}
