//! Once-per-session conversation opening.
//!
//! The first gated event of a session is persisted as the current-session
//! record, then read back and matched against an ordered rule table to decide
//! whether to proactively open a conversation. Unlike the event gate, which
//! debounces repeatedly, this is a strict one-shot: whatever later events
//! arrive, a session produces at most one opener.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::fatigue::FatigueStatus;
use crate::signal::Emotion;
use crate::store::{EmotionEvent, SessionRecord, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerPhase {
    NotLogged,
    LoggedNoMessage,
    MessageShown,
}

pub struct ConversationTrigger {
    phase: TriggerPhase,
}

impl ConversationTrigger {
    /// The durable marker guards against a restart mid-session: if the first
    /// prediction was already logged by a previous process, the trigger
    /// starts past `NotLogged` and will never re-fire.
    pub fn new(store: &SessionStore) -> Self {
        let phase = if store.first_logged() {
            TriggerPhase::LoggedNoMessage
        } else {
            TriggerPhase::NotLogged
        };
        Self { phase }
    }

    /// Offer a just-logged event. Only the first offer of the session does
    /// anything: it persists the session record and marker, reads the record
    /// back, and consults the rule table. Every later offer returns `None`.
    pub fn maybe_open(
        &mut self,
        store: &SessionStore,
        event: &EmotionEvent,
    ) -> Result<Option<String>> {
        if self.phase != TriggerPhase::NotLogged {
            return Ok(None);
        }

        let session_id = store
            .session_id()
            .map(str::to_string)
            .unwrap_or_default();
        let record = SessionRecord {
            session_id,
            first_event: event.clone(),
            session_start: Utc::now(),
        };
        store.put_current_session(&record)?;
        store.mark_first_logged()?;
        self.phase = TriggerPhase::LoggedNoMessage;

        // Decide from what actually hit disk, not the in-memory event.
        let Some(record) = store.current_session()? else {
            return Ok(None);
        };

        let opener = opening_message(
            record.first_event.emotion,
            record.first_event.fatigue_status,
        );
        if let Some(message) = opener {
            info!(
                "opening conversation for session {} ({:?}/{:?})",
                record.session_id, record.first_event.emotion, record.first_event.fatigue_status
            );
            self.phase = TriggerPhase::MessageShown;
            return Ok(Some(message.to_string()));
        }

        Ok(None)
    }
}

/// Ordered rule table: fatigue pre-empts emotion, first match wins.
fn opening_message(emotion: Emotion, fatigue: FatigueStatus) -> Option<&'static str> {
    if fatigue == FatigueStatus::FullyFatigued {
        return Some("You seem very tired. Want to talk about what's draining your energy?");
    }

    match emotion {
        Emotion::Sad => {
            Some("It looks like you're feeling a bit down. I'm here for you. Want to share anything?")
        }
        Emotion::Angry => {
            Some("You seem frustrated. Do you want to talk about what's making you feel this way?")
        }
        Emotion::Fear => Some("You're showing signs of stress. Is something on your mind?"),
        Emotion::Disgust => Some("You look uncomfortable. Want to talk about it?"),
        Emotion::Happy => {
            Some("You seem happy! That's wonderful. Want to share what made you smile?")
        }
        Emotion::Surprise | Emotion::Neutral => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("reflectai-trigger-{}", Uuid::new_v4()))
    }

    fn event(emotion: Emotion, fatigue: FatigueStatus) -> EmotionEvent {
        EmotionEvent {
            seq: 0,
            timestamp: Utc::now(),
            emotion,
            confidence: BTreeMap::new(),
            image_path: None,
            fatigue_status: fatigue,
            fatigue_severity: 0.0,
        }
    }

    #[test]
    fn fires_at_most_once_per_session() {
        let dir = temp_dir();
        let mut store = SessionStore::open(&dir).unwrap();
        store.begin_session().unwrap();
        let mut trigger = ConversationTrigger::new(&store);

        let mut messages = 0;
        for _ in 0..10 {
            let sad = event(Emotion::Sad, FatigueStatus::NotFatigued);
            if trigger.maybe_open(&store, &sad).unwrap().is_some() {
                messages += 1;
            }
        }
        assert_eq!(messages, 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn fatigue_rule_pre_empts_happy() {
        let dir = temp_dir();
        let mut store = SessionStore::open(&dir).unwrap();
        store.begin_session().unwrap();
        let mut trigger = ConversationTrigger::new(&store);

        let tired_but_happy = event(Emotion::Happy, FatigueStatus::FullyFatigued);
        let message = trigger
            .maybe_open(&store, &tired_but_happy)
            .unwrap()
            .expect("rule table should fire");
        assert!(message.contains("tired"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unmatched_first_event_means_no_message_ever() {
        let dir = temp_dir();
        let mut store = SessionStore::open(&dir).unwrap();
        store.begin_session().unwrap();
        let mut trigger = ConversationTrigger::new(&store);

        let neutral = event(Emotion::Neutral, FatigueStatus::NotFatigued);
        assert!(trigger.maybe_open(&store, &neutral).unwrap().is_none());

        // the decision was made on the first event; a later sad event is late
        let sad = event(Emotion::Sad, FatigueStatus::NotFatigued);
        assert!(trigger.maybe_open(&store, &sad).unwrap().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn restart_with_marker_does_not_retrigger() {
        let dir = temp_dir();
        let mut store = SessionStore::open(&dir).unwrap();
        store.begin_session().unwrap();

        let mut trigger = ConversationTrigger::new(&store);
        let sad = event(Emotion::Sad, FatigueStatus::NotFatigued);
        assert!(trigger.maybe_open(&store, &sad).unwrap().is_some());

        // same session, new process
        let mut reopened = SessionStore::open(&dir).unwrap();
        reopened.begin_session().unwrap();
        let mut revived = ConversationTrigger::new(&reopened);
        assert!(revived.maybe_open(&reopened, &sad).unwrap().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn first_prediction_record_is_persisted() {
        let dir = temp_dir();
        let mut store = SessionStore::open(&dir).unwrap();
        let id = store.begin_session().unwrap();
        let mut trigger = ConversationTrigger::new(&store);

        trigger
            .maybe_open(&store, &event(Emotion::Angry, FatigueStatus::NotFatigued))
            .unwrap();

        let record = store.current_session().unwrap().unwrap();
        assert_eq!(record.session_id, id);
        assert_eq!(record.first_event.emotion, Emotion::Angry);

        let _ = fs::remove_dir_all(dir);
    }
}
