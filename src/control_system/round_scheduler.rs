use super::decision_policy::decide;
use super::direction_worker::{DirectionWorker, TimeWindow, WorkerReport, WorkerSettings};
use crate::detection::Detector;
use crate::error::RoundError;
use crate::shared_data::{current_timestamp, DirectionId, RoundResult, WorkerResult};
use crate::video_feed::FrameSource;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Which feed watches which approach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAssignment {
    pub direction: DirectionId,
    pub video_id: String,
}

impl FeedAssignment {
    pub fn new(direction: DirectionId, video_id: impl Into<String>) -> Self {
        Self {
            direction,
            video_id: video_id.into(),
        }
    }
}

/// Runs one round: a worker per direction on the blocking pool, a deadline after
/// which every worker is asked to stop, and a join on all of them.
pub struct RoundScheduler<D> {
    source: Arc<dyn FrameSource>,
    detector: D,
    settings: WorkerSettings,
}

impl<D> RoundScheduler<D>
where
    D: Detector + Clone + 'static,
{
    pub fn new(source: Arc<dyn FrameSource>, detector: D, settings: WorkerSettings) -> Self {
        Self {
            source,
            detector,
            settings,
        }
    }

    /// Runs every assignment concurrently over `window` and decides the round.
    ///
    /// `assignments` is the canonical direction order: results come back in that
    /// order and ties are broken by it. Never returns before every worker has
    /// returned, whatever the deadline. A worker blocked inside the detector
    /// holds the round until that call finishes. Dropping the returned future
    /// cancels every worker still running.
    pub async fn run_round(
        &self,
        round_index: u32,
        assignments: &[FeedAssignment],
        window: TimeWindow,
        deadline: Duration,
    ) -> Result<RoundResult, RoundError> {
        if assignments.is_empty() {
            return Err(RoundError::NoDirections);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = assignments.iter().find(|a| !seen.insert(a.direction)) {
            return Err(RoundError::DuplicateDirection(dup.direction));
        }

        let started = Instant::now();
        let round_token = CancellationToken::new();
        // Blocking workers outlive an aborted JoinSet; stop them if this future is dropped.
        let _cancel_on_drop = round_token.clone().drop_guard();
        let mut workers = JoinSet::new();

        for assignment in assignments {
            let worker = DirectionWorker::new(
                assignment.direction,
                assignment.video_id.clone(),
                window,
                self.settings.clone(),
                self.detector.clone(),
                round_token.child_token(),
            );
            let source = Arc::clone(&self.source);
            workers.spawn_blocking(move || worker.run(source.as_ref()));
        }
        log::info!(
            "Round {}: started {} workers on window {:.1}s..{:.1}s, deadline {:?}",
            round_index + 1,
            assignments.len(),
            window.start_secs,
            window.start_secs + window.duration_secs,
            deadline
        );

        let reports = collect_reports(&mut workers, &round_token, deadline).await;
        let round = assemble_round(round_index, assignments, window, reports)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Round {}: {} gets the green light ({}) after {} ms",
            round_index + 1,
            round.decision.direction,
            round.decision.reason,
            elapsed_ms
        );
        Ok(RoundResult { elapsed_ms, ..round })
    }
}

// Drains the join set. The deadline cancels the round token once; after that we
// keep waiting for every worker to acknowledge.
async fn collect_reports(
    workers: &mut JoinSet<WorkerReport>,
    round_token: &CancellationToken,
    deadline: Duration,
) -> HashMap<DirectionId, WorkerReport> {
    let mut reports = HashMap::new();
    let timer = sleep(deadline);
    tokio::pin!(timer);
    let mut deadline_passed = false;

    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(Ok(report)) => {
                    reports.insert(report.result.direction, report);
                }
                Some(Err(e)) => log::error!("Direction worker task failed: {}", e),
                None => break,
            },
            _ = &mut timer, if !deadline_passed => {
                deadline_passed = true;
                if !workers.is_empty() {
                    log::info!(
                        "Round deadline reached, cancelling {} running workers",
                        workers.len()
                    );
                }
                round_token.cancel();
            }
        }
    }
    reports
}

fn assemble_round(
    round_index: u32,
    assignments: &[FeedAssignment],
    window: TimeWindow,
    mut reports: HashMap<DirectionId, WorkerReport>,
) -> Result<RoundResult, RoundError> {
    let mut results = Vec::with_capacity(assignments.len());
    let mut failed_directions = Vec::new();

    for assignment in assignments {
        match reports.remove(&assignment.direction) {
            Some(report) => {
                if report.failure.is_some() {
                    failed_directions.push(assignment.direction);
                }
                results.push(report.result);
            }
            // the task panicked; treat like a feed that never opened
            None => {
                failed_directions.push(assignment.direction);
                results.push(WorkerResult::degraded(assignment.direction));
            }
        }
    }

    if failed_directions.len() == assignments.len() {
        log::error!(
            "Round {}: every feed failed, no decision possible",
            round_index + 1
        );
        return Err(RoundError::AllSourcesUnavailable(failed_directions));
    }
    if !failed_directions.is_empty() {
        log::warn!(
            "Round {}: deciding without {:?}",
            round_index + 1,
            failed_directions
        );
    }

    let decision = decide(results.iter().filter(|r| !r.is_degraded()))
        .ok_or(RoundError::NoDirections)?;

    Ok(RoundResult {
        round_index,
        window_offset_secs: window.start_secs,
        timestamp: current_timestamp(),
        elapsed_ms: 0,
        results,
        decision,
        failed_directions,
    })
}
