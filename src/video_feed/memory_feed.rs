use super::{window_frames, Frame, FrameSource, FrameStream};
use crate::error::SourceError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum StoredFeed {
    Frames(Vec<Frame>),
    // Decodes fine up to `fail_at`, then errors.
    Corrupt { frames: Vec<Frame>, fail_at: u64 },
}

/// Feeds held in memory, keyed by video id.
#[derive(Debug, Clone)]
pub struct MemoryFeedLibrary {
    fps: f64,
    feeds: HashMap<String, StoredFeed>,
}

impl MemoryFeedLibrary {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            feeds: HashMap::new(),
        }
    }

    /// Frames must be given in index order.
    pub fn insert(&mut self, video_id: impl Into<String>, frames: Vec<Frame>) {
        self.feeds.insert(video_id.into(), StoredFeed::Frames(frames));
    }

    pub fn insert_corrupt(&mut self, video_id: impl Into<String>, frames: Vec<Frame>, fail_at: u64) {
        self.feeds
            .insert(video_id.into(), StoredFeed::Corrupt { frames, fail_at });
    }

    pub fn with_feed(mut self, video_id: impl Into<String>, frames: Vec<Frame>) -> Self {
        self.insert(video_id, frames);
        self
    }
}

impl FrameSource for MemoryFeedLibrary {
    fn open(
        &self,
        video_id: &str,
        start_offset_secs: f64,
        duration_secs: f64,
    ) -> Result<FrameStream, SourceError> {
        let stored = self
            .feeds
            .get(video_id)
            .ok_or_else(|| SourceError::Unavailable {
                video_id: video_id.to_string(),
                reason: "no such feed".to_string(),
            })?;
        let range = window_frames(start_offset_secs, duration_secs, self.fps);

        let (frames, fail_at) = match stored {
            StoredFeed::Frames(frames) => (frames, None),
            StoredFeed::Corrupt { frames, fail_at } => (frames, Some(*fail_at)),
        };
        let window: Vec<Frame> = frames
            .iter()
            .filter(|f| range.contains(&f.index))
            .cloned()
            .collect();

        let id = video_id.to_string();
        let stream = window.into_iter().map(move |frame| match fail_at {
            Some(bad) if frame.index >= bad => Err(SourceError::Decode {
                video_id: id.clone(),
                frame: frame.index,
                reason: "corrupt frame".to_string(),
            }),
            _ => Ok(frame),
        });
        Ok(Box::new(stream))
    }
}
