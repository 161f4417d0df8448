//! Simulation configuration.
//!
//! Defaults reproduce the stock intersection setup. A JSON file can replace any
//! subset of fields, and `TRAFFIC_*` environment variables override both.

use crate::control_system::{FeedAssignment, WorkerSettings};
use crate::error::ConfigError;
use crate::global_variables::{
    AMQP_URL, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_COUNT_CAP, DEFAULT_FRAMES_PER_SECOND,
    DEFAULT_MODEL, DEFAULT_RESULTS_CSV, DEFAULT_ROUNDS, DEFAULT_ROUND_DEADLINE_SECS,
    DEFAULT_SAMPLE_INTERVAL, DEFAULT_WINDOW_LENGTH_SECS, MAX_ROUND_DEADLINE_SECS,
};
use crate::shared_data::DirectionId;
use crate::video_feed::SyntheticProfile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedBackend {
    /// Annotation files, `<feed_dir>/<video_id>.csv`.
    Csv { feed_dir: PathBuf },
    /// Generated traffic, one profile per video id.
    Synthetic {
        profiles: BTreeMap<String, SyntheticProfile>,
    },
}

impl Default for FeedBackend {
    fn default() -> Self {
        // Profiles loosely follow the stock camera clips.
        let profiles = [
            ("rushS", SyntheticProfile::new(1.2, 0.0)),
            ("vehicle", SyntheticProfile::new(0.6, 0.0)),
            ("rush", SyntheticProfile::new(1.0, 0.001)),
            ("surveillance", SyntheticProfile::new(0.3, 0.0)),
        ]
        .into_iter()
        .map(|(id, profile)| (id.to_string(), profile))
        .collect();
        FeedBackend::Synthetic { profiles }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub console: bool,
    pub csv_path: Option<PathBuf>,
    pub chart_dir: Option<PathBuf>,
    pub amqp: bool,
    pub amqp_url: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            console: true,
            csv_path: Some(PathBuf::from(DEFAULT_RESULTS_CSV)),
            chart_dir: None,
            amqp: false,
            amqp_url: AMQP_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub rounds: u32,
    pub round_deadline_secs: f64,
    /// Length of the feed window analysed per round; round n starts at n * this.
    pub window_length_secs: f64,
    pub sample_interval: u64,
    pub count_cap: u32,
    pub confidence_threshold: f32,
    pub model: String,
    /// Replaces the model's simulated inference time.
    pub inference_latency_ms: Option<u64>,
    pub frames_per_second: f64,
    /// Canonical order: reporting order and tie-break order.
    pub direction_order: Vec<DirectionId>,
    pub feeds: BTreeMap<DirectionId, String>,
    pub feed_backend: FeedBackend,
    pub reporting: ReportingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let feeds = [
            (DirectionId::North, "rushS"),
            (DirectionId::West, "vehicle"),
            (DirectionId::East, "rush"),
            (DirectionId::South, "surveillance"),
        ]
        .into_iter()
        .map(|(direction, id)| (direction, id.to_string()))
        .collect();

        Self {
            rounds: DEFAULT_ROUNDS,
            round_deadline_secs: DEFAULT_ROUND_DEADLINE_SECS,
            window_length_secs: DEFAULT_WINDOW_LENGTH_SECS,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            count_cap: DEFAULT_COUNT_CAP,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            model: DEFAULT_MODEL.to_string(),
            inference_latency_ms: None,
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            direction_order: DirectionId::ALL.to_vec(),
            feeds,
            feed_backend: FeedBackend::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Defaults, then the optional file, then the environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Applies overrides from any variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "TRAFFIC_ROUNDS")? {
            self.rounds = v;
        }
        if let Some(v) = parse_var(&lookup, "TRAFFIC_ROUND_DEADLINE_SECS")? {
            self.round_deadline_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TRAFFIC_WINDOW_LENGTH_SECS")? {
            self.window_length_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TRAFFIC_SAMPLE_INTERVAL")? {
            self.sample_interval = v;
        }
        if let Some(v) = parse_var(&lookup, "TRAFFIC_COUNT_CAP")? {
            self.count_cap = v;
        }
        if let Some(v) = parse_var(&lookup, "TRAFFIC_CONFIDENCE")? {
            self.confidence_threshold = v;
        }
        if let Some(model) = lookup("TRAFFIC_MODEL") {
            self.model = model;
        }
        if let Some(v) = parse_var(&lookup, "TRAFFIC_INFERENCE_LATENCY_MS")? {
            self.inference_latency_ms = Some(v);
        }
        if let Some(url) = lookup("TRAFFIC_AMQP_URL") {
            self.reporting.amqp_url = url;
        }
        if let Some(dir) = lookup("TRAFFIC_FEED_DIR") {
            self.feed_backend = FeedBackend::Csv {
                feed_dir: PathBuf::from(dir),
            };
        }
        if let Some(order) = lookup("TRAFFIC_DIRECTION_ORDER") {
            self.direction_order = order
                .split(',')
                .map(DirectionId::from_str)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ConfigError::Env {
                    var: "TRAFFIC_DIRECTION_ORDER".to_string(),
                    value: order.clone(),
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(invalid("rounds must be at least 1"));
        }
        self.round_deadline()?;
        if !(self.window_length_secs > 0.0 && self.window_length_secs.is_finite()) {
            return Err(invalid("window_length_secs must be positive"));
        }
        if self.sample_interval == 0 {
            return Err(invalid("sample_interval must be at least 1"));
        }
        if self.count_cap == 0 {
            return Err(invalid("count_cap must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid("confidence_threshold must be between 0 and 1"));
        }
        if !(self.frames_per_second > 0.0 && self.frames_per_second.is_finite()) {
            return Err(invalid("frames_per_second must be positive"));
        }

        let unique: HashSet<DirectionId> = self.direction_order.iter().copied().collect();
        if self.direction_order.len() != DirectionId::ALL.len()
            || unique.len() != DirectionId::ALL.len()
        {
            return Err(invalid(
                "direction_order must list North, West, East and South exactly once",
            ));
        }
        for direction in &self.direction_order {
            match self.feeds.get(direction) {
                Some(id) if !id.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "no feed configured for {}",
                        direction
                    )))
                }
            }
        }
        Ok(())
    }

    /// Feed per direction, in canonical order.
    pub fn feed_assignments(&self) -> Vec<FeedAssignment> {
        self.direction_order
            .iter()
            .filter_map(|d| self.feeds.get(d).map(|id| FeedAssignment::new(*d, id.clone())))
            .collect()
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            count_cap: self.count_cap,
            sample_interval: self.sample_interval,
            confidence_threshold: self.confidence_threshold,
            model: self.model.clone(),
        }
    }

    pub fn round_deadline(&self) -> Result<Duration, ConfigError> {
        deadline_from_secs(self.round_deadline_secs)
    }

    pub fn inference_latency(&self) -> Option<Duration> {
        self.inference_latency_ms.map(Duration::from_millis)
    }
}

/// Round deadline in seconds as a `Duration`. NaN, negative values and anything
/// above `MAX_ROUND_DEADLINE_SECS` are rejected.
pub fn deadline_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !(0.0..=MAX_ROUND_DEADLINE_SECS).contains(&secs) {
        return Err(ConfigError::Invalid(format!(
            "round deadline must be between 0 and {} seconds, got {}",
            MAX_ROUND_DEADLINE_SECS, secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Invalid(format!("round deadline {}: {}", secs, e)))
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(v) => Ok(Some(v)),
        Err(_) => Err(ConfigError::Env {
            var: var.to_string(),
            value,
        }),
    }
}
