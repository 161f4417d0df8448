// simulation.rs
use crate::config::{deadline_from_secs, SimulationConfig};
use crate::control_system::{FeedAssignment, RoundScheduler, TimeWindow};
use crate::detection::{AnnotationDetector, Detector};
use crate::error::SimulationError;
use crate::monitoring::{reporters_from_config, RoundReporter};
use crate::shared_data::{DirectionId, RoundResult};
use crate::video_feed::build_feed_library;
use std::collections::BTreeMap;

/// Where the driver is between rounds. Only the driver touches it, and only while
/// no round is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationState {
    pub round_index: u32,
    pub window_offset_secs: f64,
}

impl SimulationState {
    fn at_round(round_index: u32, window_length_secs: f64) -> Self {
        Self {
            round_index,
            window_offset_secs: round_index as f64 * window_length_secs,
        }
    }
}

/// Every round the simulation produced, plus how often each direction went green.
#[derive(Debug, Clone, Default)]
pub struct SimulationSummary {
    pub rounds: Vec<RoundResult>,
    pub green_counts: BTreeMap<DirectionId, u32>,
}

impl SimulationSummary {
    fn record(&mut self, round: RoundResult) {
        *self.green_counts.entry(round.decision.direction).or_insert(0) += 1;
        self.rounds.push(round);
    }
}

pub struct SimulationDriver<D> {
    scheduler: RoundScheduler<D>,
    assignments: Vec<FeedAssignment>,
    reporters: Vec<Box<dyn RoundReporter>>,
    state: SimulationState,
}

impl SimulationDriver<AnnotationDetector> {
    /// Wires feeds, detector and reporters from a validated configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let source = build_feed_library(&config.feed_backend, config.frames_per_second);
        let detector = match config.inference_latency() {
            Some(latency) => AnnotationDetector::with_latency(latency),
            None => AnnotationDetector::new(),
        };
        let scheduler = RoundScheduler::new(source, detector, config.worker_settings());

        let mut driver = SimulationDriver::new(scheduler, config.feed_assignments());
        for reporter in reporters_from_config(&config.reporting) {
            driver = driver.with_reporter(reporter);
        }
        driver
    }
}

impl<D> SimulationDriver<D>
where
    D: Detector + Clone + 'static,
{
    /// `assignments` fixes the canonical direction order for every round.
    pub fn new(scheduler: RoundScheduler<D>, assignments: Vec<FeedAssignment>) -> Self {
        Self {
            scheduler,
            assignments,
            reporters: Vec::new(),
            state: SimulationState::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn RoundReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Runs `rounds` rounds back to back. Round n analyses the feed window starting
    /// at n * `window_length_secs`, with `round_duration_secs` as its deadline.
    ///
    /// Stops at the first round that fails; rounds already reported stay reported.
    /// A deadline that cannot be represented fails before any round starts.
    pub async fn run(
        &mut self,
        rounds: u32,
        round_duration_secs: f64,
        window_length_secs: f64,
    ) -> Result<SimulationSummary, SimulationError> {
        let deadline = deadline_from_secs(round_duration_secs)?;
        let mut summary = SimulationSummary::default();

        for round_index in 0..rounds {
            self.state = SimulationState::at_round(round_index, window_length_secs);
            let window = TimeWindow {
                start_secs: self.state.window_offset_secs,
                duration_secs: window_length_secs,
            };

            let round = self
                .scheduler
                .run_round(round_index, &self.assignments, window, deadline)
                .await
                .map_err(|source| {
                    log::error!("Simulation halted at round {}: {}", round_index + 1, source);
                    SimulationError::Halted {
                        round: round_index,
                        source,
                    }
                })?;

            self.publish(&round).await;
            summary.record(round);
        }

        log::info!("Simulation finished after {} rounds", summary.rounds.len());
        Ok(summary)
    }

    // Reporters do blocking file and broker I/O, so they run on the blocking pool,
    // in order, one round at a time.
    async fn publish(&mut self, round: &RoundResult) {
        let mut reporters = std::mem::take(&mut self.reporters);
        let round = round.clone();
        let joined = tokio::task::spawn_blocking(move || {
            for reporter in reporters.iter_mut() {
                if let Err(e) = reporter.report(&round) {
                    log::warn!(
                        "Reporter '{}' failed on round {}: {}",
                        reporter.name(),
                        round.round_index + 1,
                        e
                    );
                }
            }
            reporters
        })
        .await;

        match joined {
            Ok(reporters) => self.reporters = reporters,
            Err(e) => log::error!("Reporter task failed, reporting disabled: {}", e),
        }
    }
}
