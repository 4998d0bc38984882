use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::now_utc_iso;

/// How the cursor got where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMove {
    Undo,
    Redo,
    Jump,
}

/// One state change of an editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted,
    VersionAppended {
        version_id: String,
        cursor: Option<usize>,
        versions: usize,
    },
    VersionReplaced {
        version_id: String,
        cursor: Option<usize>,
        versions: usize,
    },
    CursorMoved {
        via: CursorMove,
        cursor: Option<usize>,
        versions: usize,
    },
    EditStarted {
        request_id: String,
        prompt: String,
        source_version_id: Option<String>,
    },
    EditCompleted {
        request_id: String,
        version_id: String,
        source_version_id: Option<String>,
    },
    EditFailed {
        request_id: String,
        error: String,
    },
    ProjectSaved {
        project_id: String,
        name: String,
    },
    ProjectLoaded {
        project_id: String,
        cursor: Option<usize>,
    },
    SessionReset,
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::VersionAppended { .. } => "version_appended",
            Self::VersionReplaced { .. } => "version_replaced",
            Self::CursorMoved { .. } => "cursor_moved",
            Self::EditStarted { .. } => "edit_started",
            Self::EditCompleted { .. } => "edit_completed",
            Self::EditFailed { .. } => "edit_failed",
            Self::ProjectSaved { .. } => "project_saved",
            Self::ProjectLoaded { .. } => "project_loaded",
            Self::SessionReset => "session_reset",
        }
    }
}

/// A logged event with its envelope; one line of `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Append-only JSONL audit log for one session. Clones share the file lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, event: SessionEvent) -> anyhow::Result<EventRecord> {
        let record = EventRecord {
            session_id: self.inner.session_id.clone(),
            ts: now_utc_iso(),
            event,
        };
        let line = serde_json::to_string(&record)?;

        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .with_context(|| format!("failed to open {}", self.inner.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(record)
    }
}

/// Reads a session log back, failing on the first malformed line.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<EventRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| {
                format!("{} line {} is not a session event", path.display(), index + 1)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{read_events, CursorMove, EventWriter, SessionEvent};

    #[test]
    fn event_line_is_flat_and_tagged() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-123");

        writer.emit(SessionEvent::CursorMoved {
            via: CursorMove::Undo,
            cursor: None,
            versions: 0,
        })?;

        let content = fs::read_to_string(&path)?;
        let parsed: Value = serde_json::from_str(content.trim_end())?;
        assert_eq!(parsed["type"], json!("cursor_moved"));
        assert_eq!(parsed["via"], json!("undo"));
        assert_eq!(parsed["cursor"], Value::Null);
        assert_eq!(parsed["session_id"], json!("session-123"));
        DateTime::parse_from_rfc3339(parsed["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn logged_events_read_back_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-9");

        let appended = SessionEvent::VersionAppended {
            version_id: "v-1".to_string(),
            cursor: Some(0),
            versions: 1,
        };
        writer.emit(SessionEvent::SessionStarted)?;
        writer.clone().emit(appended.clone())?;

        let records = read_events(&path)?;
        let kinds: Vec<&str> = records.iter().map(|record| record.event.kind()).collect();
        assert_eq!(kinds, vec!["session_started", "version_appended"]);
        assert_eq!(records[1].event, appended);
        assert!(records.iter().all(|record| record.session_id == "session-9"));
        Ok(())
    }

    #[test]
    fn reading_a_foreign_line_fails() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "{\"type\":\"plan_preview\",\"session_id\":\"s\",\"ts\":\"t\"}\n")?;
        assert!(read_events(&path).is_err());
        Ok(())
    }
}
