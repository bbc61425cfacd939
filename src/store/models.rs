//! Persisted data models for the session store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fatigue::FatigueStatus;
use crate::signal::Emotion;

/// One debounced emotion change, as appended to the detailed log.
///
/// Immutable once persisted. `seq` is the log key (monotonic across process
/// restarts); `timestamp` is a display/query field only, so two events landing
/// within the same second cannot collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub emotion: Emotion,
    pub confidence: BTreeMap<Emotion, f32>,
    pub image_path: Option<String>,
    pub fatigue_status: FatigueStatus,
    pub fatigue_severity: f32,
}

impl EmotionEvent {
    /// Zero-padded log key, so JSON maps sort in event order.
    pub fn log_key(&self) -> String {
        format!("{:06}", self.seq)
    }
}

/// The current session and its first logged event. Exactly one exists per
/// running session; created on the first event, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub first_event: EmotionEvent,
    pub session_start: DateTime<Utc>,
}

/// Round a 0..100 confidence score to two decimals for the log.
pub fn round_confidence(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_key_is_zero_padded() {
        let event = EmotionEvent {
            seq: 42,
            timestamp: Utc::now(),
            emotion: Emotion::Sad,
            confidence: BTreeMap::new(),
            image_path: None,
            fatigue_status: FatigueStatus::NotFatigued,
            fatigue_severity: 0.0,
        };
        assert_eq!(event.log_key(), "000042");
    }

    #[test]
    fn confidence_rounds_to_two_decimals() {
        assert_eq!(round_confidence(33.333_333), 33.33);
        assert_eq!(round_confidence(66.666_666), 66.67);
    }
}
