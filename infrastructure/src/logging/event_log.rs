//! JSONL file writer for agent events.
//!
//! Each [`AgentEvent`] becomes one JSON object per line: the event's own
//! fields (tagged by `type`) plus a `timestamp`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use warden_application::AgentEventSink;
use warden_domain::AgentEvent;

/// Observer sink that appends every event to a JSONL file.
pub struct JsonlEventLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventLog {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(event: &AgentEvent) -> Option<String> {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut value = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                warn!(kind = event.kind(), error = %e, "Could not serialize event");
                return None;
            }
        };
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("timestamp".to_string(), serde_json::Value::String(timestamp));
        }
        serde_json::to_string(&value).ok()
    }
}

impl AgentEventSink for JsonlEventLog {
    fn emit(&self, event: &AgentEvent) {
        let Some(line) = Self::record(event) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            if let Err(e) = writeln!(writer, "{}", line) {
                warn!(path = %self.path.display(), error = %e, "Could not write event log");
                return;
            }
            // Append-only: flush each line so a crash loses nothing
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlEventLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
