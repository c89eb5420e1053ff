use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::diff::diff_json;
use crate::protocol::redact;

/// How device-detail responses are written to the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    Full,
    /// First poll in full, then only the JSON paths that changed.
    Diffed,
}

/// Append-only NDJSON record of the traffic exchanged with the cloud API.
/// Credentials and tokens never reach the file.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    sink: File,
    last_poll: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let sink = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            sink,
            last_poll: None,
        })
    }

    pub fn log_request(&mut self, path: &str, body: &Value) {
        let mut record = record("req");
        record.insert("method".into(), "POST".into());
        record.insert("path".into(), path.into());
        record.insert("body".into(), redact(body));
        self.append(record);
    }

    pub fn log_command(&mut self, action: &str, endpoint: &str, body: &Value) {
        let mut record = record("cmd");
        record.insert("action".into(), action.into());
        record.insert("endpoint".into(), endpoint.into());
        record.insert("body".into(), redact(body));
        self.append(record);
    }

    pub fn log_poll(&mut self, status: u16, body: &Value) {
        let body = redact(body);
        let mut record = record("poll");
        record.insert("status".into(), status.into());

        match (self.mode, self.last_poll.take()) {
            (MessageLogMode::Full, _) => {
                record.insert("body".into(), body);
            }
            (MessageLogMode::Diffed, None) => {
                record.insert("full".into(), true.into());
                record.insert("body".into(), body.clone());
                self.last_poll = Some(body);
            }
            (MessageLogMode::Diffed, Some(last)) => {
                let mut changes = Vec::new();
                diff_json(&last, &body, "", &mut changes);
                let changes: Vec<Value> = changes
                    .into_iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                record.insert("changes".into(), changes.into());
                self.last_poll = Some(body);
            }
        }
        self.append(record);
    }

    fn append(&mut self, record: Map<String, Value>) {
        let line = Value::Object(record).to_string();
        if let Err(e) = writeln!(self.sink, "{line}") {
            warn!(error = %e, "message log write failed");
        }
    }
}

fn record(dir: &str) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("ts".into(), Utc::now().to_rfc3339().into());
    record.insert("dir".into(), dir.into());
    record
}
