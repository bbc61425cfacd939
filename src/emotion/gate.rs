//! Debounced event gating on top of the stabilizer.
//!
//! A stabilized emotion becomes a logged event only once it has held for
//! `stability_threshold` sampled frames, differs from the announced emotion,
//! and the cooldown since the last event has elapsed.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::fatigue::FatigueSnapshot;
use crate::signal::Emotion;
use crate::store::{round_confidence, EmotionEvent};

use super::StableObservation;

pub struct EventGate {
    stability_threshold: u32,
    cooldown: Duration,
    announced: Option<Emotion>,
    last_fired: Option<Instant>,
    next_seq: u64,
}

impl EventGate {
    /// `initial_seq` comes from the store so log keys stay monotonic across
    /// process restarts.
    pub fn new(stability_threshold: u32, cooldown: Duration, initial_seq: u64) -> Self {
        Self {
            stability_threshold: stability_threshold.max(1),
            cooldown,
            announced: None,
            last_fired: None,
            next_seq: initial_seq,
        }
    }

    /// Decide whether this observation is a real state change worth logging.
    ///
    /// On fire, the announced emotion, the cooldown anchor, and the sequence
    /// number advance together with event construction; there is no partial
    /// update a caller can observe.
    pub fn consider(
        &mut self,
        observation: &StableObservation,
        fatigue: FatigueSnapshot,
        now: Instant,
    ) -> Option<EmotionEvent> {
        if observation.stability < self.stability_threshold {
            return None;
        }
        if self.announced == Some(observation.stable) {
            return None;
        }
        if !self.cooldown_elapsed(now) {
            return None;
        }

        let confidence: BTreeMap<Emotion, f32> = observation
            .scores
            .iter()
            .map(|(label, score)| (*label, round_confidence(*score)))
            .collect();

        let event = EmotionEvent {
            seq: self.next_seq,
            timestamp: Utc::now(),
            emotion: observation.stable,
            confidence,
            image_path: None,
            fatigue_status: fatigue.status,
            fatigue_severity: fatigue.severity,
        };

        self.announced = Some(observation.stable);
        self.last_fired = Some(now);
        self.next_seq += 1;

        Some(event)
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.last_fired
            .map(|fired| now.duration_since(fired) >= self.cooldown)
            .unwrap_or(true)
    }
}
