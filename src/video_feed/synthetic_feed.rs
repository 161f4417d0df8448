// Deterministic pseudo-random traffic. Every frame is generated from its own seed,
// so any window can be opened without replaying the feed from the start.

use super::{window_frames, Detection, Frame, FrameSource, FrameStream};
use crate::error::SourceError;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const VEHICLE_MIX: [(&str, f64); 4] = [
    ("car", 0.6),
    ("truck", 0.2),
    ("bus", 0.1),
    ("motorcycle", 0.1),
];
const EMERGENCY_KINDS: [&str; 3] = ["ambulance", "fire truck", "police car"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticProfile {
    /// Expected number of vehicles visible per frame.
    pub vehicle_density: f64,
    /// Chance that a frame shows an emergency vehicle.
    pub emergency_probability: f64,
    /// Length of the recording.
    pub length_secs: f64,
    pub seed: u64,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            vehicle_density: 1.0,
            emergency_probability: 0.0,
            length_secs: 60.0,
            seed: 0,
        }
    }
}

impl SyntheticProfile {
    pub fn new(vehicle_density: f64, emergency_probability: f64) -> Self {
        Self {
            vehicle_density,
            emergency_probability,
            ..Self::default()
        }
    }

    fn frame(&self, video_seed: u64, index: u64, fps: f64) -> Frame {
        let mut rng = SmallRng::seed_from_u64(
            video_seed ^ self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let density = self.vehicle_density.max(0.0);
        let mut vehicles = density.floor() as usize;
        if rng.random_bool(density.fract()) {
            vehicles += 1;
        }

        let mut objects = Vec::with_capacity(vehicles + 1);
        for _ in 0..vehicles {
            objects.push(Detection::new(
                pick_vehicle(rng.random::<f64>()),
                rng.random_range(0.1..1.0),
            ));
        }
        if rng.random_bool(self.emergency_probability.clamp(0.0, 1.0)) {
            let kind = EMERGENCY_KINDS[rng.random_range(0..EMERGENCY_KINDS.len())];
            objects.push(Detection::new(kind, rng.random_range(0.3..1.0)));
        }
        if rng.random_bool(0.3) {
            objects.push(Detection::new("person", rng.random_range(0.1..1.0)));
        }

        Frame {
            index,
            timestamp_secs: index as f64 / fps,
            objects,
        }
    }
}

fn pick_vehicle(roll: f64) -> &'static str {
    let mut acc = 0.0;
    for (label, weight) in VEHICLE_MIX {
        acc += weight;
        if roll < acc {
            return label;
        }
    }
    VEHICLE_MIX[0].0
}

// FNV-1a, stable across runs and platforms.
fn seed_for(video_id: &str) -> u64 {
    video_id.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

#[derive(Debug, Clone)]
pub struct SyntheticFeedLibrary {
    fps: f64,
    profiles: HashMap<String, SyntheticProfile>,
}

impl SyntheticFeedLibrary {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            profiles: HashMap::new(),
        }
    }

    pub fn insert(&mut self, video_id: impl Into<String>, profile: SyntheticProfile) {
        self.profiles.insert(video_id.into(), profile);
    }
}

impl FrameSource for SyntheticFeedLibrary {
    fn open(
        &self,
        video_id: &str,
        start_offset_secs: f64,
        duration_secs: f64,
    ) -> Result<FrameStream, SourceError> {
        let profile = self
            .profiles
            .get(video_id)
            .cloned()
            .ok_or_else(|| SourceError::Unavailable {
                video_id: video_id.to_string(),
                reason: "no synthetic profile registered".to_string(),
            })?;
        let total_frames = (profile.length_secs.max(0.0) * self.fps).floor() as u64;
        let window = window_frames(start_offset_secs, duration_secs, self.fps);
        let range = window.start.min(total_frames)..window.end.min(total_frames);

        let fps = self.fps;
        let video_seed = seed_for(video_id);
        Ok(Box::new(
            range.map(move |index| Ok::<_, SourceError>(profile.frame(video_seed, index, fps))),
        ))
    }
}
