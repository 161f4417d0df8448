use super::RoundReporter;
use crate::error::ReportError;
use crate::shared_data::{LightState, RoundResult};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// One row per direction per round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub timestamp: u64,
    pub window_offset_secs: f64,
    pub direction: String,
    pub vehicle_count: u32,
    pub emergency_present: bool,
    pub completed: bool,
    pub stop_reason: String,
    pub traffic_light: String,
    pub decision_reason: String,
}

impl RoundRecord {
    pub fn from_round(round: &RoundResult) -> Vec<Self> {
        let plan = round.signal_plan();
        round
            .results
            .iter()
            .map(|r| {
                let light = plan
                    .iter()
                    .find(|(d, _)| *d == r.direction)
                    .map(|(_, l)| *l)
                    .unwrap_or(LightState::Red);
                RoundRecord {
                    round: round.round_index + 1,
                    timestamp: round.timestamp,
                    window_offset_secs: round.window_offset_secs,
                    direction: r.direction.to_string(),
                    vehicle_count: r.vehicle_count,
                    emergency_present: r.emergency_present,
                    completed: r.completed,
                    stop_reason: format!("{:?}", r.stop_reason),
                    traffic_light: format!("{:?}", light),
                    decision_reason: round.decision.reason.to_string(),
                }
            })
            .collect()
    }
}

// Generic helper to append records to a CSV file, writing the header only once.
pub fn log_to_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ReportError> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_round_records(path: &Path) -> Result<Vec<RoundRecord>, ReportError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

pub struct CsvReporter {
    path: PathBuf,
}

impl CsvReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RoundReporter for CsvReporter {
    fn name(&self) -> &str {
        "csv"
    }

    fn report(&mut self, round: &RoundResult) -> Result<(), ReportError> {
        log_to_csv(&self.path, &RoundRecord::from_round(round))
    }
}
