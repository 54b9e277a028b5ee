use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::changed_fields;

/// How device data bodies are written to the message log.
pub enum MessageLogMode {
    /// Every data body in full.
    Full,
    /// First body in full, then only the changed fields.
    Diffed,
}

/// NDJSON record of portal traffic. Credentials never reach it.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_data: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_data: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, status: Option<u16>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "status": status,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, status: u16, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "status": status,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_data(&mut self, status: u16, body: &Value) {
        if status != 200 || !body.is_object() {
            let entry = json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "data",
                "status": status,
            });
            self.write_line(&entry);
            return;
        }

        let entry = match (&self.mode, &self.previous_data) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let change_entries: Vec<Value> = changed_fields(prev, body)
                    .into_iter()
                    .map(|(field, old, new)| json!({ "field": field, "old": old, "new": new }))
                    .collect();
                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "data",
                    "status": status,
                    "changes": change_entries,
                })
            }
            (MessageLogMode::Diffed, None) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "data",
                "status": status,
                "full": true,
                "body": body,
            }),
            (MessageLogMode::Full, _) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "data",
                "status": status,
                "body": body,
            }),
        };
        self.write_line(&entry);
        self.previous_data = Some(body.clone());
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
