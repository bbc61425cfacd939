//! Durable, file-backed session state.
//!
//! Everything lives under one data directory: the detailed event log, the
//! current-session record, an existence-typed per-session marker, the
//! session-identity file, and the snapshot images. The directory is shared
//! across process restarts, so every JSON mutation goes through
//! write-temp-then-rename; a concurrent reader sees the prior state, never a
//! torn file. Unparsable content is treated as empty and warned about, not
//! surfaced as an error.

mod models;

pub use models::{round_confidence, EmotionEvent, SessionRecord};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signal::{Emotion, Frame};

const EVENT_LOG_FILE: &str = "detailed_predictions.json";
const SESSION_RECORD_FILE: &str = "first_predictions.json";
const SESSION_ID_FILE: &str = "session_id";
const IMAGES_DIR: &str = "images";
const MARKERS_DIR: &str = "markers";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionRecordFile {
    current_session: Option<SessionRecord>,
}

pub struct SessionStore {
    data_dir: PathBuf,
    session_id: Option<String>,
}

impl SessionStore {
    /// Open (and create, if needed) the data directory. Picks up the
    /// session identity left behind by an interrupted previous run.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(data_dir.join(IMAGES_DIR))
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        fs::create_dir_all(data_dir.join(MARKERS_DIR))?;

        let id_path = data_dir.join(SESSION_ID_FILE);
        let session_id = if id_path.exists() {
            Some(
                fs::read_to_string(&id_path)
                    .with_context(|| format!("failed to read {}", id_path.display()))?
                    .trim()
                    .to_string(),
            )
        } else {
            None
        };

        Ok(Self {
            data_dir,
            session_id,
        })
    }

    /// Stable identifier for the current run. Reuses the persisted identity
    /// when the identity file survived a restart; otherwise mints a fresh
    /// UUID and persists it.
    pub fn begin_session(&mut self) -> Result<String> {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }

        let id = Uuid::new_v4().to_string();
        write_atomic(&self.data_dir.join(SESSION_ID_FILE), id.as_bytes())?;
        self.session_id = Some(id.clone());
        Ok(id)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Session boundary: forget the session identity and its marker so the
    /// next start is a new session. Historical logs stay on disk.
    pub fn end_session(&mut self) -> Result<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };

        remove_if_exists(&self.marker_path(&id))?;
        remove_if_exists(&self.data_dir.join(SESSION_ID_FILE))?;
        Ok(())
    }

    /// Merge one event into the detailed log, keyed by sequence number.
    /// Re-appending an existing key is last-write-wins, so retries are
    /// idempotent.
    pub fn append_event(&self, event: &EmotionEvent) -> Result<()> {
        let mut events = self.load_events()?;
        events.insert(event.log_key(), event.clone());

        let serialized = serde_json::to_string_pretty(&events)?;
        write_atomic(&self.data_dir.join(EVENT_LOG_FILE), serialized.as_bytes())
    }

    /// The detailed log, oldest first. Unparsable content is treated as an
    /// empty log rather than an error.
    pub fn load_events(&self) -> Result<BTreeMap<String, EmotionEvent>> {
        let path = self.data_dir.join(EVENT_LOG_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(events) => Ok(events),
            Err(err) => {
                warn!("event log unparsable, starting fresh: {err}");
                Ok(BTreeMap::new())
            }
        }
    }

    /// Next free log key: one past the highest persisted sequence number,
    /// so keys stay monotonic across restarts.
    pub fn next_event_seq(&self) -> Result<u64> {
        let events = self.load_events()?;
        Ok(events
            .keys()
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0))
    }

    /// Full-overwrite write of the current-session record.
    pub fn put_current_session(&self, record: &SessionRecord) -> Result<()> {
        let file = SessionRecordFile {
            current_session: Some(record.clone()),
        };
        let serialized = serde_json::to_string_pretty(&file)?;
        write_atomic(
            &self.data_dir.join(SESSION_RECORD_FILE),
            serialized.as_bytes(),
        )
    }

    /// Read back the persisted current-session record.
    pub fn current_session(&self) -> Result<Option<SessionRecord>> {
        let path = self.data_dir.join(SESSION_RECORD_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_str::<SessionRecordFile>(&contents) {
            Ok(file) => Ok(file.current_session),
            Err(err) => {
                warn!("session record unparsable, treating as absent: {err}");
                Ok(None)
            }
        }
    }

    /// Whether the first prediction of the current session is already on
    /// disk. Existence of the marker file is the truth value.
    pub fn first_logged(&self) -> bool {
        self.session_id
            .as_ref()
            .map(|id| self.marker_path(id).exists())
            .unwrap_or(false)
    }

    /// Create the durable first-prediction marker for the current session.
    /// Idempotent; never mutated afterwards.
    pub fn mark_first_logged(&self) -> Result<()> {
        let id = self
            .session_id
            .as_ref()
            .context("no active session to mark")?;
        write_atomic(
            &self.marker_path(id),
            chrono::Utc::now().to_rfc3339().as_bytes(),
        )
    }

    /// Persist one frame snapshot as `{compact-timestamp}_{emotion}.png` and
    /// return its path. Overwriting the same name is harmless.
    pub fn save_snapshot(&self, frame: &Frame, emotion: Emotion) -> Result<String> {
        let name = format!(
            "{}_{}.png",
            frame.timestamp.format("%Y%m%d_%H%M%S"),
            emotion.as_str()
        );
        let path = self.data_dir.join(IMAGES_DIR).join(name);
        fs::write(&path, &frame.image)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        Ok(path.display().to_string())
    }

    fn marker_path(&self, session_id: &str) -> PathBuf {
        self.data_dir
            .join(MARKERS_DIR)
            .join(format!("{session_id}.logged"))
    }
}

/// Write-temp-then-rename. In-place truncate+write would expose a torn file
/// to a concurrently starting process.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("atomic write target has no file name")?;
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}
