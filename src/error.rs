//! Error types shared across the crate.

use crate::shared_data::DirectionId;
use thiserror::Error;

/// Failures of a single camera feed. Recovered inside the worker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("feed '{video_id}' is unavailable: {reason}")]
    Unavailable { video_id: String, reason: String },

    #[error("feed '{video_id}' failed to decode frame {frame}: {reason}")]
    Decode {
        video_id: String,
        frame: u64,
        reason: String,
    },
}

/// Failures that abort a whole round.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundError {
    #[error("every feed failed to open ({})", format_directions(.0))]
    AllSourcesUnavailable(Vec<DirectionId>),

    #[error("no directions configured for the round")]
    NoDirections,

    #[error("direction {0} is assigned more than one feed")]
    DuplicateDirection(DirectionId),
}

/// Raised by the driver when it stops the simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("simulation halted at round {round}: {source}")]
    Halted {
        round: u32,
        #[source]
        source: RoundError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("environment variable {var} has invalid value '{value}'")]
    Env { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures of a presentation sink. Logged by the driver, never fatal.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("AMQP error: {0}")]
    Amqp(#[from] amiquip::Error),

    #[error("listener task failed: {0}")]
    Listener(String),
}

fn format_directions(directions: &[DirectionId]) -> String {
    directions
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
