// video_feed/mod.rs
//
// Frame production for the direction workers. Real video decoding is outside this
// crate; a feed here is any source of annotated frames that can be opened at a time
// offset.

pub mod csv_feed;
pub mod memory_feed;
pub mod synthetic_feed;

use crate::config::FeedBackend;
use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

pub use csv_feed::CsvFeedLibrary;
pub use memory_feed::MemoryFeedLibrary;
pub use synthetic_feed::{SyntheticFeedLibrary, SyntheticProfile};

/// One labelled object with the confidence the camera pipeline assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// A decoded frame. `objects` is everything visible in the frame; the detector
/// decides which of them it reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub timestamp_secs: f64,
    pub objects: Vec<Detection>,
}

/// Lazy, finite, non-restartable sequence of frames from one feed window.
pub type FrameStream = Box<dyn Iterator<Item = Result<Frame, SourceError>> + Send>;

/// Opens a feed at a time offset. Implementations are shared read-only between
/// workers; every worker gets its own stream.
pub trait FrameSource: Send + Sync {
    fn open(
        &self,
        video_id: &str,
        start_offset_secs: f64,
        duration_secs: f64,
    ) -> Result<FrameStream, SourceError>;
}

/// Frame indices covered by `[start, start + duration)` at the given frame rate.
pub fn window_frames(start_offset_secs: f64, duration_secs: f64, fps: f64) -> Range<u64> {
    let start = (start_offset_secs.max(0.0) * fps).floor() as u64;
    let end = ((start_offset_secs.max(0.0) + duration_secs.max(0.0)) * fps).floor() as u64;
    start..end.max(start)
}

/// Builds the feed library selected in the configuration.
pub fn build_feed_library(backend: &FeedBackend, fps: f64) -> Arc<dyn FrameSource> {
    match backend {
        FeedBackend::Csv { feed_dir } => Arc::new(CsvFeedLibrary::new(feed_dir.clone(), fps)),
        FeedBackend::Synthetic { profiles } => {
            let mut library = SyntheticFeedLibrary::new(fps);
            for (video_id, profile) in profiles {
                library.insert(video_id.clone(), profile.clone());
            }
            Arc::new(library)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_frames_covers_half_open_interval() {
        assert_eq!(window_frames(0.0, 10.0, 25.0), 0..250);
        assert_eq!(window_frames(10.0, 10.0, 25.0), 250..500);
        assert_eq!(window_frames(0.5, 0.2, 10.0), 5..7);
    }

    #[test]
    fn window_frames_never_inverts() {
        assert_eq!(window_frames(-3.0, 1.0, 25.0), 0..25);
        assert_eq!(window_frames(2.0, -1.0, 25.0), 50..50);
    }
}
