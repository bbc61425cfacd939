//! Eye-closure fatigue tracking.
//!
//! A counter accumulates over consecutive frames whose EAR sits below the
//! closed-eye threshold; one open-eye frame resets it. Frames with no face
//! are governed by [`NoFacePolicy`]: observed variants of this logic disagree
//! on whether a tracking dropout should erase accumulated drowsiness
//! evidence, so the behavior is configurable instead of hardcoded.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueStatus {
    NoFace,
    NotFatigued,
    NormalFatigue,
    FullyFatigued,
}

/// What a no-face frame does to the closed-eye counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFacePolicy {
    /// Keep the counter as-is: a tracking dropout neither erases nor adds
    /// drowsiness evidence. Default.
    Freeze,
    /// Treat a lost face like an open eye and reset the counter.
    Reset,
}

impl Default for NoFacePolicy {
    fn default() -> Self {
        NoFacePolicy::Freeze
    }
}

/// Joint fatigue state at one instant, carried on emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueSnapshot {
    pub status: FatigueStatus,
    pub severity: f32,
}

pub struct FatigueTracker {
    ear_threshold: f32,
    frame_threshold: u32,
    no_face_policy: NoFacePolicy,
    counter: u32,
    last_status: FatigueStatus,
}

impl FatigueTracker {
    pub fn new(ear_threshold: f32, frame_threshold: u32, no_face_policy: NoFacePolicy) -> Self {
        Self {
            ear_threshold,
            frame_threshold: frame_threshold.max(1),
            no_face_policy,
            counter: 0,
            last_status: FatigueStatus::NoFace,
        }
    }

    /// Feed one frame's EAR (`None` = no face). Pure state transition; an
    /// absent EAR is valid input, not an error.
    pub fn update(&mut self, ear: Option<f32>) -> FatigueStatus {
        let status = match ear {
            None => {
                if self.no_face_policy == NoFacePolicy::Reset {
                    self.counter = 0;
                }
                FatigueStatus::NoFace
            }
            Some(value) if value >= self.ear_threshold => {
                self.counter = 0;
                FatigueStatus::NotFatigued
            }
            Some(_) => {
                self.counter += 1;
                if self.counter >= self.frame_threshold {
                    FatigueStatus::FullyFatigued
                } else {
                    FatigueStatus::NormalFatigue
                }
            }
        };

        self.last_status = status;
        status
    }

    /// How far along the closed-eye run is, clamped to [0, 1].
    pub fn severity(&self) -> f32 {
        (self.counter as f32 / self.frame_threshold as f32).min(1.0)
    }

    /// Status and severity as of the most recent `update`.
    pub fn snapshot(&self) -> FatigueSnapshot {
        FatigueSnapshot {
            status: self.last_status,
            severity: self.severity(),
        }
    }

    #[cfg(test)]
    fn counter(&self) -> u32 {
        self.counter
    }
}
