// detection.rs
//
// Detector boundary. The direction workers only need "which labels are in this
// frame"; how they are found is up to the implementation.

use crate::global_variables::{EMERGENCY_LABELS, VEHICLE_LABELS};
use crate::video_feed::{Detection, Frame};
use std::thread;
use std::time::Duration;

/// Object detector consumed by the direction workers. Calls may block for as long
/// as inference takes; no state is carried between calls.
pub trait Detector: Send {
    fn detect(&self, frame: &Frame, confidence_threshold: f32, model: &str) -> Vec<Detection>;
}

/// What a detected label means to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Vehicle,
    Emergency,
    Other,
}

/// Lowercases and joins words with hyphens, so "Fire Truck", "fire_truck" and
/// "fire-truck" compare equal.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn classify(label: &str) -> ObjectClass {
    let label = normalize_label(label);
    if VEHICLE_LABELS.contains(&label.as_str()) {
        ObjectClass::Vehicle
    } else if EMERGENCY_LABELS.contains(&label.as_str()) {
        ObjectClass::Emergency
    } else {
        ObjectClass::Other
    }
}

/// Simulated inference cost per model.
pub fn model_latency(model: &str) -> Duration {
    match model.to_lowercase().as_str() {
        "yolov3-tiny" | "yolov4-tiny" => Duration::from_millis(15),
        "yolov3" | "yolov4" => Duration::from_millis(60),
        _ => Duration::from_millis(30),
    }
}

/// Reports the objects annotated on a frame whose confidence meets the threshold,
/// blocking for the model's inference time.
#[derive(Debug, Clone, Default)]
pub struct AnnotationDetector {
    latency_override: Option<Duration>,
}

impl AnnotationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency_override: Some(latency),
        }
    }

    pub fn latency_for(&self, model: &str) -> Duration {
        self.latency_override
            .unwrap_or_else(|| model_latency(model))
    }
}

impl Detector for AnnotationDetector {
    fn detect(&self, frame: &Frame, confidence_threshold: f32, model: &str) -> Vec<Detection> {
        let latency = self.latency_for(model);
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        frame
            .objects
            .iter()
            .filter(|o| o.confidence >= confidence_threshold)
            .cloned()
            .collect()
    }
}
