//! Boundary traits for the external per-frame signal sources.
//!
//! The capture device, the emotion classifier, and the face-landmark model
//! are external collaborators. The monitoring loop only ever sees these
//! traits, so tests and the demo binary can script them.

mod ear;

pub use ear::{frame_ear, EyeGeometry, Point};

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label vocabulary of the emotion classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

/// One captured webcam frame. The capture device hands over already-encoded
/// image bytes; the loop persists them as-is and never decodes.
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: DateTime<Utc>,
    pub image: Vec<u8>,
}

/// Raw classifier output for one frame. Confidences are on the classifier's
/// native 0..100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionReading {
    pub dominant: Emotion,
    pub scores: BTreeMap<Emotion, f32>,
}

/// Frame acquisition. An `Err` here is a capture failure and is fatal to the
/// monitoring loop (unlike every other signal error, which is transient).
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame>;
}

/// Facial emotion classification. Any error means "no usable signal this
/// frame" and is absorbed by the stabilizer.
pub trait EmotionClassifier: Send {
    fn classify(&mut self, frame: &Frame) -> Result<EmotionReading>;
}

/// Eye landmark extraction. `None` means no face was detected this frame.
pub trait EyeTracker: Send {
    fn eye_landmarks(&mut self, frame: &Frame) -> Option<EyeGeometry>;
}
