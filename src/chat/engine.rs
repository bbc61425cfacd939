//! Reply generation with a template fallback.
//!
//! The remote backend is optional and fallible; the engine always degrades to
//! canned psychology-informed templates rather than stalling the loop. Only
//! session summarization has no local fallback (its failure is handled by the
//! caller, which keeps the unsummarized history around).

use anyhow::{bail, Context, Result};
use log::warn;
use rand::seq::SliceRandom;

use crate::fatigue::FatigueStatus;
use crate::signal::Emotion;

use super::ChatMessage;

/// Remote text-generation backend. Both calls may fail; neither failure is
/// allowed to stall the monitoring loop.
pub trait ChatBackend: Send {
    fn generate(&self, prompt: &str, history: &[ChatMessage]) -> Result<String>;
    fn summarize(&self, messages: &[ChatMessage]) -> Result<String>;
}

const HAPPY_TEMPLATES: &[&str] = &[
    "Glad you're feeling happy! Try savoring this moment. What's making you smile today?",
    "Happiness looks good on you! Want to share what's brightening your day?",
];
const SAD_TEMPLATES: &[&str] = &[
    "This sadness is valid. Try the 5-4-3-2-1 grounding technique. What color do you see nearby?",
    "Hard days pass. Would a short walk outside help right now?",
];
const ANGRY_TEMPLATES: &[&str] = &[
    "Anger is energy. Try box breathing (4-4-4-4). What needs to change here?",
    "Let's cool this down. Splash cold water on your wrists. What triggered this?",
];
const TIRED_TEMPLATES: &[&str] = &[
    "Your body needs care. Try 20-20-20: 20s stretch every 20 mins. Hydrated enough?",
    "Fatigue whispers before it shouts. Close your eyes for 30s. What's draining you?",
];
const NEUTRAL_TEMPLATES: &[&str] = &[
    "Let's tune in. How does your body feel right now - any tension or ease?",
    "Neutral is a good starting point. Want to explore what you're needing?",
];

const FOLLOW_UP_QUESTIONS: &[&str] = &["How does that sound?", "Want to try that?"];

pub struct ChatEngine {
    backend: Option<Box<dyn ChatBackend>>,
}

impl ChatEngine {
    pub fn new(backend: Option<Box<dyn ChatBackend>>) -> Self {
        Self { backend }
    }

    /// Produce a short supportive reply to a user turn. This is the entry
    /// point for the embedding application's chat surface; the monitoring
    /// loop itself only ever emits the proactive opener and the closing
    /// summary. Template-first on a fresh conversation, backend when there
    /// is history, templates again when the backend errors.
    pub fn reply(
        &self,
        user_message: &str,
        emotion: Emotion,
        fatigue: FatigueStatus,
        history: &[ChatMessage],
    ) -> String {
        if history.is_empty() {
            if let Some(template) = pick(templates_for(emotion, fatigue)) {
                return template.to_string();
            }
        }

        if let Some(backend) = &self.backend {
            let prompt = build_reply_prompt(user_message, emotion, fatigue);
            match backend.generate(&prompt, history) {
                Ok(text) => return trim_reply(&text),
                Err(err) => warn!("chat backend failed, using fallback reply: {err:#}"),
            }
        }

        fallback_reply(emotion, fatigue)
    }

    /// Summarize a closed session. No local fallback: the caller treats a
    /// failure as non-fatal and keeps the raw history for a later retry.
    pub fn summarize(&self, messages: &[ChatMessage]) -> Result<String> {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => bail!("no chat backend configured for summarization"),
        };
        backend
            .summarize(messages)
            .context("session summarization failed")
    }
}

fn templates_for(emotion: Emotion, fatigue: FatigueStatus) -> &'static [&'static str] {
    if fatigue == FatigueStatus::FullyFatigued {
        return TIRED_TEMPLATES;
    }
    match emotion {
        Emotion::Happy => HAPPY_TEMPLATES,
        Emotion::Sad => SAD_TEMPLATES,
        Emotion::Angry => ANGRY_TEMPLATES,
        _ => NEUTRAL_TEMPLATES,
    }
}

fn pick(options: &'static [&'static str]) -> Option<&'static str> {
    options.choose(&mut rand::thread_rng()).copied()
}

/// Quick evidence-based action for the fill-in fallback.
fn quick_action(emotion: Emotion, fatigue: FatigueStatus) -> &'static str {
    if fatigue == FatigueStatus::FullyFatigued {
        return "drink some water and stretch up";
    }
    match emotion {
        Emotion::Happy => "share this feeling with someone",
        Emotion::Sad => "name 3 things you see around you",
        Emotion::Angry => "press palms together for 10 seconds",
        _ => "take 2 conscious breaths",
    }
}

fn fallback_reply(emotion: Emotion, fatigue: FatigueStatus) -> String {
    let question = pick(FOLLOW_UP_QUESTIONS).unwrap_or("Want to talk more?");
    format!(
        "Noticing {}. Try {}. {}",
        emotion.as_str(),
        quick_action(emotion, fatigue),
        question
    )
}

fn build_reply_prompt(user_message: &str, emotion: Emotion, fatigue: FatigueStatus) -> String {
    format!(
        "You are a supportive, psychologically-informed assistant.\n\
         Emotion: {}\nFatigue: {:?}\n\n\
         Respond to this message in 1-2 short lines, validate the emotion, \
         and offer an actionable tip or reflective question: \"{}\"",
        emotion.as_str(),
        fatigue,
        user_message
    )
}

/// Keep replies to two lines without cutting mid-sentence.
fn trim_reply(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}
