//! Durable conversation history.
//!
//! The current session's messages are overwritten to disk on every append;
//! closing a session summarizes them and appends the summary to a long-term
//! archive. A summarization failure leaves the current-session file intact
//! so a later run can retry.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::store::write_atomic;

use super::ChatEngine;

const CURRENT_SESSION_FILE: &str = "current_session_chat_history.json";
const ARCHIVE_FILE: &str = "chat_history.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One closed session, kept as a lightweight long-term memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummaryEntry {
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

pub struct ConversationLog {
    current_path: PathBuf,
    archive_path: PathBuf,
    messages: Vec<ChatMessage>,
}

impl ConversationLog {
    /// Open under the data directory, resuming any messages an interrupted
    /// session left behind.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let current_path = data_dir.join(CURRENT_SESSION_FILE);
        let messages = if current_path.exists() {
            let contents = fs::read_to_string(&current_path)
                .with_context(|| format!("failed to read {}", current_path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("current session history unparsable, starting fresh: {err}");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(Self {
            current_path,
            archive_path: data_dir.join(ARCHIVE_FILE),
            messages,
        })
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) -> Result<()> {
        self.push(Role::User, content.into())
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) -> Result<()> {
        self.push(Role::Assistant, content.into())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, role: Role, content: String) -> Result<()> {
        self.messages.push(ChatMessage {
            role,
            content,
            timestamp: Utc::now(),
        });
        self.persist_current()
    }

    /// Close the session: summarize, archive the summary, clear the current
    /// history. Propagates summarization failure without touching the
    /// current-session file, so nothing is lost.
    pub fn close(&mut self, engine: &ChatEngine) -> Result<Option<ChatSummaryEntry>> {
        if self.messages.is_empty() {
            debug!("no conversation this session, nothing to archive");
            return Ok(None);
        }

        let summary = engine.summarize(&self.messages)?;

        let entry = ChatSummaryEntry {
            timestamp: Utc::now(),
            summary,
        };

        let mut archive = self.load_archive();
        archive.push(entry.clone());
        let serialized = serde_json::to_string_pretty(&archive)?;
        write_atomic(&self.archive_path, serialized.as_bytes())?;

        self.messages.clear();
        self.persist_current()?;

        Ok(Some(entry))
    }

    pub fn load_archive(&self) -> Vec<ChatSummaryEntry> {
        if !self.archive_path.exists() {
            return Vec::new();
        }
        match fs::read_to_string(&self.archive_path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("chat archive unparsable, starting fresh: {err}");
                Vec::new()
            }),
            Err(err) => {
                warn!("failed to read chat archive: {err}");
                Vec::new()
            }
        }
    }

    fn persist_current(&self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.messages)?;
        write_atomic(&self.current_path, serialized.as_bytes())
    }
}
