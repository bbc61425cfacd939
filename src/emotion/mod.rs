//! Temporal stabilization of per-frame emotion signals: a sliding-window
//! smoother plus a debouncing event gate.

mod gate;
mod stabilizer;

pub use gate::EventGate;
pub use stabilizer::{EmotionStabilizer, StableObservation};
