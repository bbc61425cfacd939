//! Sliding-window emotion smoothing with per-label threshold gating.
//!
//! Baseline classifier confidence varies wildly per label ("neutral" and
//! "happy" dominate almost every frame), so each label carries its own
//! acceptance threshold and an optional weight that lets rare but diagnostic
//! labels win the window average.

use std::collections::{BTreeMap, VecDeque};

use crate::signal::Emotion;

/// Result of one sampled-frame observation.
#[derive(Debug, Clone)]
pub struct StableObservation {
    /// Window-smoothed current emotion.
    pub stable: Emotion,
    /// The label that passed gating this frame, if any.
    pub raw_dominant: Option<Emotion>,
    /// Raw classifier scores (0..100). Empty when the classifier failed.
    pub scores: BTreeMap<Emotion, f32>,
    /// Consecutive sampled frames with the same gated raw label.
    pub stability: u32,
}

pub struct EmotionStabilizer {
    thresholds: BTreeMap<Emotion, f32>,
    weights: BTreeMap<Emotion, f32>,
    window: VecDeque<BTreeMap<Emotion, f32>>,
    window_size: usize,
    current: Emotion,
    last_raw: Option<Emotion>,
    stability: u32,
}

impl EmotionStabilizer {
    pub fn new(
        thresholds: BTreeMap<Emotion, f32>,
        weights: BTreeMap<Emotion, f32>,
        window_size: usize,
    ) -> Self {
        Self {
            thresholds,
            weights,
            window: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
            current: Emotion::Neutral,
            last_raw: None,
            stability: 0,
        }
    }

    fn threshold(&self, emotion: Emotion) -> f32 {
        self.thresholds.get(&emotion).copied().unwrap_or(0.5)
    }

    fn weight(&self, emotion: Emotion) -> f32 {
        self.weights.get(&emotion).copied().unwrap_or(1.0)
    }

    /// Feed one sampled frame's raw scores (0..100 scale).
    ///
    /// Gating: accept the weighted-best label whose normalized confidence
    /// beats its own threshold; failing that, relax to 80% of each threshold;
    /// failing that, hold the previous stable emotion. Only accepted frames
    /// enter the smoothing window.
    pub fn observe(&mut self, scores: BTreeMap<Emotion, f32>) -> StableObservation {
        let candidate = self
            .gated_dominant(&scores, 1.0)
            .or_else(|| self.gated_dominant(&scores, 0.8));

        if let Some(label) = candidate {
            if self.window.len() == self.window_size {
                self.window.pop_front();
            }
            self.window.push_back(scores.clone());
            self.current = self.smoothed_emotion();

            if self.last_raw == Some(label) {
                self.stability += 1;
            } else {
                self.last_raw = Some(label);
                self.stability = 1;
            }
        }

        StableObservation {
            stable: self.current,
            raw_dominant: candidate,
            scores,
            stability: self.stability,
        }
    }

    /// Classifier failure: hold the previous stable emotion with an empty
    /// score map. A single bad frame never interrupts the loop.
    pub fn hold(&self) -> StableObservation {
        StableObservation {
            stable: self.current,
            raw_dominant: None,
            scores: BTreeMap::new(),
            stability: self.stability,
        }
    }

    /// Best weighted label whose raw confidence clears `relax * threshold`.
    fn gated_dominant(&self, scores: &BTreeMap<Emotion, f32>, relax: f32) -> Option<Emotion> {
        scores
            .iter()
            .filter(|(label, score)| **score / 100.0 > self.threshold(**label) * relax)
            .max_by(|(a, sa), (b, sb)| {
                let wa = **sa * self.weight(**a);
                let wb = **sb * self.weight(**b);
                wa.total_cmp(&wb)
            })
            .map(|(label, _)| *label)
    }

    /// Label with the highest weighted window-average confidence.
    fn smoothed_emotion(&self) -> Emotion {
        let mut best = self.current;
        let mut best_score = f32::MIN;

        for label in Emotion::ALL {
            let sum: f32 = self
                .window
                .iter()
                .map(|frame| frame.get(&label).copied().unwrap_or(0.0))
                .sum();
            let avg = sum / self.window.len().max(1) as f32;
            let weighted = avg * self.weight(label);
            if weighted > best_score {
                best_score = weighted;
                best = label;
            }
        }

        best
    }
}
