// control_system/mod.rs
pub mod decision_policy;
pub mod direction_worker;
pub mod round_scheduler;

pub use decision_policy::decide;
pub use direction_worker::{analyze_frames, DirectionWorker, TimeWindow, WorkerReport, WorkerSettings};
pub use round_scheduler::{FeedAssignment, RoundScheduler};
