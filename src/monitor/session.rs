use anyhow::Result;

use crate::config::MonitorConfig;
use crate::emotion::{EmotionStabilizer, EventGate};
use crate::fatigue::FatigueTracker;
use crate::store::SessionStore;
use crate::trigger::ConversationTrigger;

/// Per-session pipeline state, explicitly constructed at session start and
/// torn down at session end. Never a process-wide global.
pub struct SessionContext {
    pub session_id: String,
    pub fatigue: FatigueTracker,
    pub stabilizer: EmotionStabilizer,
    pub gate: EventGate,
    pub trigger: ConversationTrigger,
}

impl SessionContext {
    pub fn new(config: &MonitorConfig, store: &mut SessionStore) -> Result<Self> {
        let session_id = store.begin_session()?;

        Ok(Self {
            session_id,
            fatigue: FatigueTracker::new(
                config.ear_threshold,
                config.fatigue_frame_threshold,
                config.no_face_policy,
            ),
            stabilizer: EmotionStabilizer::new(
                config.emotion_thresholds.clone(),
                config.emotion_weights.clone(),
                config.smoothing_window,
            ),
            gate: EventGate::new(
                config.stability_threshold,
                config.log_cooldown(),
                store.next_event_seq()?,
            ),
            trigger: ConversationTrigger::new(store),
        })
    }
}
