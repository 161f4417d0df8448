use super::RoundReporter;
use crate::error::ReportError;
use crate::shared_data::{DecisionReason, LightState, RoundResult};
use std::io::{self, Write};

/// Prints the traffic analysis table and the signal decision for each round.
pub struct ConsoleReporter {
    out: Box<dyn Write + Send>,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }
}

pub fn render_round(round: &RoundResult) -> String {
    let mut text = String::new();
    text.push_str(&format!(
        "\n=== Round {} (feed window from {:.0}s, {} ms) ===\n",
        round.round_index + 1,
        round.window_offset_secs,
        round.elapsed_ms
    ));
    text.push_str(&format!(
        "{:<8} | {:>18} | {:<13} | {}\n",
        "Side", "Number of Vehicles", "Traffic Light", "Status"
    ));
    text.push_str(&format!("{}\n", "-".repeat(60)));

    for (result, (_, light)) in round.results.iter().zip(round.signal_plan()) {
        let light = match light {
            LightState::Green => "Green",
            LightState::Red => "Red",
        };
        let status = if result.is_degraded() {
            "feed unavailable"
        } else if result.completed {
            "completed"
        } else {
            "cut off at deadline"
        };
        let emergency = if result.emergency_present { " (emergency)" } else { "" };
        text.push_str(&format!(
            "{:<8} | {:>18} | {:<13} | {}{}\n",
            result.direction.as_str(),
            result.vehicle_count,
            light,
            status,
            emergency
        ));
    }

    if round.decision.reason == DecisionReason::EmergencyPreemption {
        text.push_str(&format!(
            "Emergency detected on {}! Giving priority.\n",
            round.decision.direction
        ));
    }
    text.push_str(&format!(
        "{} has the green light based on current traffic conditions.\n",
        round.decision.direction
    ));
    text
}

impl RoundReporter for ConsoleReporter {
    fn name(&self) -> &str {
        "console"
    }

    fn report(&mut self, round: &RoundResult) -> Result<(), ReportError> {
        self.out.write_all(render_round(round).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_data::{Decision, DirectionId, StopReason, WorkerResult};

    fn round(reason: DecisionReason) -> RoundResult {
        RoundResult {
            round_index: 2,
            window_offset_secs: 20.0,
            timestamp: 0,
            elapsed_ms: 15_002,
            results: vec![
                WorkerResult {
                    vehicle_count: 15,
                    completed: true,
                    stop_reason: StopReason::Exhausted,
                    ..WorkerResult::new(DirectionId::North)
                },
                WorkerResult::degraded(DirectionId::West),
                WorkerResult {
                    vehicle_count: 1,
                    emergency_present: true,
                    ..WorkerResult::new(DirectionId::East)
                },
                WorkerResult::new(DirectionId::South),
            ],
            decision: Decision {
                direction: DirectionId::East,
                reason,
            },
            failed_directions: vec![DirectionId::West],
        }
    }

    #[test]
    fn table_lists_every_direction() {
        let text = render_round(&round(DecisionReason::EmergencyPreemption));
        assert!(text.contains("Round 3"));
        assert!(text.contains("feed unavailable"));
        assert!(text.contains("cut off at deadline"));
        assert!(text.contains("Emergency detected on East"));
        assert!(text.contains("East has the green light"));
        let east_line = text.lines().find(|l| l.starts_with("East")).unwrap();
        assert!(east_line.contains("Green"));
        assert!(east_line.contains("(emergency)"));
    }

    #[test]
    fn no_banner_without_emergency() {
        let text = render_round(&round(DecisionReason::MaxTraffic));
        assert!(!text.contains("Emergency detected"));
    }
}
