//! Tunable options for the monitoring loop.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fatigue::NoFacePolicy;
use crate::signal::Emotion;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Where logs, markers, and snapshots live.
    pub data_dir: PathBuf,
    /// Milliseconds between loop ticks (one frame per tick).
    pub tick_interval_ms: u64,
    /// Run the emotion classifier every Nth frame; fatigue runs every frame.
    pub prediction_interval: u64,
    /// Consecutive matching sampled frames before a change is considered real.
    pub stability_threshold: u32,
    /// Minimum seconds between logged emotion events.
    pub log_cooldown_secs: u64,
    /// EAR below this counts as a closed-eye frame.
    pub ear_threshold: f32,
    /// Closed-eye frames before fatigue is considered full.
    pub fatigue_frame_threshold: u32,
    pub no_face_policy: NoFacePolicy,
    /// Emotion smoothing window size in sampled frames.
    pub smoothing_window: usize,
    /// Per-label acceptance thresholds (0..1). Labels with structurally high
    /// baseline confidence get stricter thresholds.
    pub emotion_thresholds: BTreeMap<Emotion, f32>,
    /// Per-label weights applied to window averages; unlisted labels are 1.0.
    pub emotion_weights: BTreeMap<Emotion, f32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("emotion_logs"),
            tick_interval_ms: 100,
            prediction_interval: 5,
            stability_threshold: 3,
            log_cooldown_secs: 10,
            ear_threshold: 0.25,
            fatigue_frame_threshold: 20,
            no_face_policy: NoFacePolicy::Freeze,
            smoothing_window: 5,
            emotion_thresholds: default_thresholds(),
            emotion_weights: BTreeMap::new(),
        }
    }
}

/// Tuned so that chronically-confident labels ("neutral", "happy") need much
/// stronger evidence than rare, diagnostic ones.
fn default_thresholds() -> BTreeMap<Emotion, f32> {
    [
        (Emotion::Neutral, 0.85),
        (Emotion::Happy, 0.80),
        (Emotion::Sad, 0.40),
        (Emotion::Angry, 0.45),
        (Emotion::Fear, 0.35),
        (Emotion::Surprise, 0.30),
        (Emotion::Disgust, 0.40),
    ]
    .into_iter()
    .collect()
}

impl MonitorConfig {
    /// Read from a JSON file if present, defaults otherwise. A malformed
    /// file falls back to defaults rather than refusing to start.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_default())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn log_cooldown(&self) -> Duration {
        Duration::from_secs(self.log_cooldown_secs)
    }
}
