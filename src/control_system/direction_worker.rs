use crate::detection::{classify, Detector, ObjectClass};
use crate::error::SourceError;
use crate::global_variables::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_COUNT_CAP, DEFAULT_MODEL, DEFAULT_SAMPLE_INTERVAL,
};
use crate::shared_data::{DirectionId, StopReason, WorkerResult};
use crate::video_feed::{Frame, FrameSource};
use tokio_util::sync::CancellationToken;

/// Per-worker analysis settings, identical for every direction in a round.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub count_cap: u32,
    /// Run the detector on every n-th frame of the window.
    pub sample_interval: u64,
    pub confidence_threshold: f32,
    pub model: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count_cap: DEFAULT_COUNT_CAP,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// What a worker hands back to the scheduler. `failure` is set when the feed could
/// not be opened or decoded; the result is then the zero result.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub result: WorkerResult,
    pub failure: Option<SourceError>,
}

/// The time slice of a feed analysed in one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Analysis task for one approach of the intersection. Owns its detector and its
/// cancellation token for the lifetime of the task.
pub struct DirectionWorker<D> {
    pub direction: DirectionId,
    pub video_id: String,
    pub window: TimeWindow,
    pub settings: WorkerSettings,
    detector: D,
    cancel: CancellationToken,
}

impl<D: Detector> DirectionWorker<D> {
    pub fn new(
        direction: DirectionId,
        video_id: impl Into<String>,
        window: TimeWindow,
        settings: WorkerSettings,
        detector: D,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            direction,
            video_id: video_id.into(),
            window,
            settings,
            detector,
            cancel,
        }
    }

    /// Opens the feed window and analyses it. Blocks; meant to run on its own thread.
    pub fn run<S: FrameSource + ?Sized>(self, source: &S) -> WorkerReport {
        let frames = source.open(
            &self.video_id,
            self.window.start_secs,
            self.window.duration_secs,
        );
        let outcome = frames.and_then(|frames| {
            analyze_frames(
                self.direction,
                frames,
                &self.detector,
                &self.settings,
                &self.cancel,
            )
        });

        match outcome {
            Ok(result) => {
                log::info!(
                    "[{}] stopped ({:?}) with {} vehicles, emergency: {}, frames read: {}, analyzed: {}",
                    self.direction,
                    result.stop_reason,
                    result.vehicle_count,
                    result.emergency_present,
                    result.frames_read,
                    result.frames_analyzed
                );
                WorkerReport {
                    result,
                    failure: None,
                }
            }
            Err(e) => {
                log::warn!("[{}] feed failed: {}", self.direction, e);
                WorkerReport {
                    result: WorkerResult::degraded(self.direction),
                    failure: Some(e),
                }
            }
        }
    }
}

/// Counts vehicles and watches for emergency vehicles over an opened frame stream.
///
/// The detector runs on frames 0, n, 2n, ... of the window (n = `sample_interval`).
/// The loop stops when the count reaches `count_cap`, when frames run out, or at
/// the first iteration after `cancel` fires. A decode error aborts the analysis.
pub fn analyze_frames<D, I>(
    direction: DirectionId,
    frames: I,
    detector: &D,
    settings: &WorkerSettings,
    cancel: &CancellationToken,
) -> Result<WorkerResult, SourceError>
where
    D: Detector + ?Sized,
    I: IntoIterator<Item = Result<Frame, SourceError>>,
{
    let sample_interval = settings.sample_interval.max(1);
    let mut result = WorkerResult::new(direction);
    let mut frames = frames.into_iter();

    loop {
        if cancel.is_cancelled() {
            result.stop_reason = StopReason::Cancelled;
            break;
        }
        let frame = match frames.next() {
            Some(frame) => frame?,
            None => {
                result.stop_reason = StopReason::Exhausted;
                break;
            }
        };
        let position = result.frames_read;
        result.frames_read += 1;

        if position % sample_interval != 0 {
            continue;
        }
        let detections =
            detector.detect(&frame, settings.confidence_threshold, &settings.model);
        result.frames_analyzed += 1;
        for detection in &detections {
            match classify(&detection.label) {
                ObjectClass::Vehicle => result.vehicle_count += 1,
                ObjectClass::Emergency => result.emergency_present = true,
                ObjectClass::Other => {}
            }
        }
        log::debug!(
            "[{}] frame {}: {} detections, running count {}",
            direction,
            frame.index,
            detections.len(),
            result.vehicle_count
        );

        if result.vehicle_count >= settings.count_cap {
            result.stop_reason = StopReason::CountCap;
            break;
        }
    }

    result.completed = result.stop_reason.is_voluntary();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video_feed::{Detection, MemoryFeedLibrary};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn frame(index: u64, labels: &[&str]) -> Frame {
        Frame {
            index,
            timestamp_secs: index as f64 / 25.0,
            objects: labels.iter().map(|l| Detection::new(*l, 0.9)).collect(),
        }
    }

    fn stream(frames: Vec<Frame>) -> Vec<Result<Frame, SourceError>> {
        frames.into_iter().map(Ok).collect()
    }

    fn settings(count_cap: u32, sample_interval: u64) -> WorkerSettings {
        WorkerSettings {
            count_cap,
            sample_interval,
            ..WorkerSettings::default()
        }
    }

    // Counts calls; cancels a token after a given number of them.
    struct CountingDetector {
        calls: AtomicUsize,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl CountingDetector {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                cancel_after: None,
            }
        }
    }

    impl Detector for CountingDetector {
        fn detect(&self, frame: &Frame, threshold: f32, _model: &str) -> Vec<Detection> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.cancel_after {
                if calls >= *limit {
                    token.cancel();
                }
            }
            frame
                .objects
                .iter()
                .filter(|o| o.confidence >= threshold)
                .cloned()
                .collect()
        }
    }

    #[test]
    fn only_every_nth_frame_is_analyzed() {
        let frames = (0..100).map(|i| frame(i, &["car"])).collect();
        let detector = CountingDetector::new();
        let result = analyze_frames(
            DirectionId::North,
            stream(frames),
            &detector,
            &settings(1000, 25),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(detector.calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.frames_read, 100);
        assert_eq!(result.frames_analyzed, 4);
        assert_eq!(result.vehicle_count, 4);
        assert_eq!(result.stop_reason, StopReason::Exhausted);
        assert!(result.completed);
    }

    #[test]
    fn stops_once_cap_is_reached() {
        let frames = (0..100)
            .map(|i| frame(i, &["car", "bus", "truck", "person"]))
            .collect();
        let result = analyze_frames(
            DirectionId::West,
            stream(frames),
            &CountingDetector::new(),
            &settings(20, 1),
            &CancellationToken::new(),
        )
        .unwrap();

        // 3 vehicles per frame, 7 frames to pass 20
        assert_eq!(result.frames_analyzed, 7);
        assert_eq!(result.vehicle_count, 21);
        assert!(result.vehicle_count >= 20);
        assert_eq!(result.stop_reason, StopReason::CountCap);
        assert!(result.completed);
    }

    #[test]
    fn emergency_flag_sticks() {
        let frames = vec![
            frame(0, &["car"]),
            frame(1, &["fire truck"]),
            frame(2, &["car"]),
            frame(3, &[]),
        ];
        let result = analyze_frames(
            DirectionId::East,
            stream(frames),
            &CountingDetector::new(),
            &settings(20, 1),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(result.emergency_present);
        assert_eq!(result.vehicle_count, 2);
    }

    #[test]
    fn low_confidence_objects_are_ignored() {
        let frames = vec![Frame {
            index: 0,
            timestamp_secs: 0.0,
            objects: vec![Detection::new("car", 0.1), Detection::new("ambulance", 0.2)],
        }];
        let result = analyze_frames(
            DirectionId::South,
            stream(frames),
            &CountingDetector::new(),
            &WorkerSettings::default(),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(result.vehicle_count, 0);
        assert!(!result.emergency_present);
    }

    #[test]
    fn cancelled_before_start_reads_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let frames = (0..10).map(|i| frame(i, &["car"])).collect();
        let result = analyze_frames(
            DirectionId::North,
            stream(frames),
            &CountingDetector::new(),
            &settings(20, 1),
            &token,
        )
        .unwrap();
        assert_eq!(result.frames_read, 0);
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        assert!(!result.completed);
    }

    #[test]
    fn cancellation_keeps_partial_count() {
        let token = CancellationToken::new();
        let detector = CountingDetector {
            calls: AtomicUsize::new(0),
            cancel_after: Some((3, token.clone())),
        };
        let frames = (0..50).map(|i| frame(i, &["car", "ambulance"])).collect();
        let result = analyze_frames(
            DirectionId::West,
            stream(frames),
            &detector,
            &settings(20, 1),
            &token,
        )
        .unwrap();

        // the in-flight detector call finishes before the token is seen
        assert_eq!(result.frames_analyzed, 3);
        assert_eq!(result.vehicle_count, 3);
        assert!(result.emergency_present);
        assert!(!result.completed);
        assert_eq!(result.stop_reason, StopReason::Cancelled);
    }

    #[test]
    fn decode_error_aborts_analysis() {
        let frames = vec![
            Ok(frame(0, &["car"])),
            Err(SourceError::Decode {
                video_id: "x".to_string(),
                frame: 1,
                reason: "bad".to_string(),
            }),
        ];
        let outcome = analyze_frames(
            DirectionId::North,
            frames,
            &CountingDetector::new(),
            &settings(20, 1),
            &CancellationToken::new(),
        );
        assert!(matches!(outcome, Err(SourceError::Decode { frame: 1, .. })));
    }

    #[test]
    fn run_degrades_on_missing_feed() {
        let library = MemoryFeedLibrary::new(25.0);
        let worker = DirectionWorker::new(
            DirectionId::East,
            "missing",
            TimeWindow {
                start_secs: 0.0,
                duration_secs: 10.0,
            },
            WorkerSettings::default(),
            CountingDetector::new(),
            CancellationToken::new(),
        );
        let report = worker.run(&library);
        assert!(matches!(report.failure, Some(SourceError::Unavailable { .. })));
        assert_eq!(report.result, WorkerResult::degraded(DirectionId::East));
    }

    #[test]
    fn run_degrades_on_corrupt_feed_even_after_counting() {
        let mut library = MemoryFeedLibrary::new(25.0);
        library.insert_corrupt("rush", (0..20).map(|i| frame(i, &["car"])).collect(), 10);
        let worker = DirectionWorker::new(
            DirectionId::North,
            "rush",
            TimeWindow {
                start_secs: 0.0,
                duration_secs: 1.0,
            },
            settings(100, 1),
            CountingDetector::new(),
            CancellationToken::new(),
        );
        let report = worker.run(&library);
        assert!(report.failure.is_some());
        assert_eq!(report.result.vehicle_count, 0);
        assert!(!report.result.completed);
    }

    #[test]
    fn run_uses_the_time_window() {
        let frames = (0..500)
            .map(|i| if i < 250 { frame(i, &[]) } else { frame(i, &["car"]) })
            .collect();
        let library = Arc::new(MemoryFeedLibrary::new(25.0).with_feed("rush", frames));
        let worker = DirectionWorker::new(
            DirectionId::North,
            "rush",
            TimeWindow {
                start_secs: 10.0,
                duration_secs: 10.0,
            },
            WorkerSettings::default(),
            CountingDetector::new(),
            CancellationToken::new(),
        );
        let report = worker.run(library.as_ref());
        assert!(report.failure.is_none());
        assert_eq!(report.result.frames_read, 250);
        assert_eq!(report.result.vehicle_count, 10);
    }
}
