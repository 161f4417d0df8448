// src/shared_data.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// One of the four approaches to the intersection, each watched by its own camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DirectionId {
    North,
    West,
    East,
    South,
}

impl DirectionId {
    /// Default canonical order used for tie-breaking and reporting.
    pub const ALL: [DirectionId; 4] = [
        DirectionId::North,
        DirectionId::West,
        DirectionId::East,
        DirectionId::South,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DirectionId::North => "North",
            DirectionId::West => "West",
            DirectionId::East => "East",
            DirectionId::South => "South",
        }
    }
}

impl fmt::Display for DirectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DirectionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(DirectionId::North),
            "west" | "w" => Ok(DirectionId::West),
            "east" | "e" => Ok(DirectionId::East),
            "south" | "s" => Ok(DirectionId::South),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Signal shown to an approach once a round has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightState {
    Green,
    Red,
}

/// Why a direction worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The vehicle count reached the configured cap.
    CountCap,
    /// The frame window ran out.
    Exhausted,
    /// The round deadline fired first.
    Cancelled,
    /// The feed could not be opened or decoded.
    SourceUnavailable,
}

impl StopReason {
    /// A worker is "completed" only when it stopped on its own.
    pub fn is_voluntary(&self) -> bool {
        matches!(self, StopReason::CountCap | StopReason::Exhausted)
    }
}

/// Outcome of one direction's analysis for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub direction: DirectionId,
    pub vehicle_count: u32,
    pub emergency_present: bool,
    /// True if the worker stopped voluntarily (cap reached or frames exhausted).
    pub completed: bool,
    pub stop_reason: StopReason,
    pub frames_read: u64,
    pub frames_analyzed: u64,
}

impl WorkerResult {
    /// Zero-valued result a worker starts from.
    pub fn new(direction: DirectionId) -> Self {
        Self {
            direction,
            vehicle_count: 0,
            emergency_present: false,
            completed: false,
            stop_reason: StopReason::Cancelled,
            frames_read: 0,
            frames_analyzed: 0,
        }
    }

    /// Result reported when the direction's feed failed.
    pub fn degraded(direction: DirectionId) -> Self {
        Self {
            stop_reason: StopReason::SourceUnavailable,
            ..Self::new(direction)
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.stop_reason == StopReason::SourceUnavailable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    EmergencyPreemption,
    MaxTraffic,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecisionReason::EmergencyPreemption => write!(f, "emergency-preemption"),
            DecisionReason::MaxTraffic => write!(f, "max-traffic"),
        }
    }
}

/// The direction that gets the green light and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub direction: DirectionId,
    pub reason: DecisionReason,
}

/// Everything a round produced, in canonical direction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_index: u32,
    pub window_offset_secs: f64,
    pub timestamp: u64,
    pub elapsed_ms: u64,
    pub results: Vec<WorkerResult>,
    pub decision: Decision,
    pub failed_directions: Vec<DirectionId>,
}

impl RoundResult {
    pub fn result_for(&self, direction: DirectionId) -> Option<&WorkerResult> {
        self.results.iter().find(|r| r.direction == direction)
    }

    // Green for the chosen direction, red everywhere else.
    pub fn signal_plan(&self) -> Vec<(DirectionId, LightState)> {
        self.results
            .iter()
            .map(|r| {
                let light = if r.direction == self.decision.direction {
                    LightState::Green
                } else {
                    LightState::Red
                };
                (r.direction, light)
            })
            .collect()
    }
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("north".parse::<DirectionId>(), Ok(DirectionId::North));
        assert_eq!(" EAST ".parse::<DirectionId>(), Ok(DirectionId::East));
        assert_eq!("s".parse::<DirectionId>(), Ok(DirectionId::South));
        assert!("up".parse::<DirectionId>().is_err());
    }

    #[test]
    fn degraded_result_is_zero_and_not_completed() {
        let r = WorkerResult::degraded(DirectionId::West);
        assert_eq!(r.vehicle_count, 0);
        assert!(!r.emergency_present);
        assert!(!r.completed);
        assert!(r.is_degraded());
    }

    #[test]
    fn signal_plan_has_exactly_one_green() {
        let round = RoundResult {
            round_index: 0,
            window_offset_secs: 0.0,
            timestamp: 0,
            elapsed_ms: 0,
            results: DirectionId::ALL.iter().map(|d| WorkerResult::new(*d)).collect(),
            decision: Decision {
                direction: DirectionId::East,
                reason: DecisionReason::MaxTraffic,
            },
            failed_directions: vec![],
        };
        let plan = round.signal_plan();
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan.iter().filter(|(_, l)| *l == LightState::Green).count(),
            1
        );
        assert!(plan.contains(&(DirectionId::East, LightState::Green)));
    }

    #[test]
    fn decision_reason_serializes_kebab_case() {
        let json = serde_json::to_string(&DecisionReason::EmergencyPreemption).unwrap();
        assert_eq!(json, "\"emergency-preemption\"");
    }
}
