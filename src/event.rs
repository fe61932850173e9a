//! Line-oriented host event source: one JSON command per stdin line.

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::cache::{CacheSource, Served};
use crate::worker::{Command, FetchOutcome, Reply};

/// A command line as sent by the host, with an optional correlation id.
#[derive(Debug, Deserialize)]
struct Envelope {
  #[serde(default)]
  id: Option<Value>,
  #[serde(flatten)]
  command: Command,
}

/// Host events
#[derive(Debug)]
pub enum Event {
  Command { id: Option<Value>, command: Command },
  /// A line that did not parse as a command
  Invalid { line: String, error: String },
}

/// Event handler that produces events from a line reader
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Spawn a reader task over `input`. The channel closes at end of input.
  pub fn new<R>(input: R) -> Self
  where
    R: AsyncBufRead + Unpin + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
      let mut lines = input.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
          continue;
        }
        let event = match serde_json::from_str::<Envelope>(&line) {
          Ok(envelope) => Event::Command {
            id: envelope.id,
            command: envelope.command,
          },
          Err(e) => Event::Invalid {
            line,
            error: e.to_string(),
          },
        };
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

fn served_to_json(served: &Served) -> Value {
  let source = match &served.source {
    CacheSource::Network => json!({ "kind": "network" }),
    CacheSource::Cache {
      generation,
      cached_at,
    } => json!({ "kind": "cache", "generation": generation, "cached_at": cached_at }),
    CacheSource::Fallback => json!({ "kind": "fallback" }),
  };
  let response = &served.response;
  json!({
    "status": response.status,
    "status_text": response.status_text,
    "headers": response.headers,
    "body": response.text(),
    "body_len": response.body.len(),
    "source": source,
  })
}

/// JSON form of a reply, as written back to the host.
pub fn reply_to_json(id: Option<&Value>, reply: &Reply) -> Value {
  let body = match reply {
    Reply::Installed { cached } => json!({ "reply": "installed", "cached": cached }),
    Reply::InstallFailed { error } => json!({ "reply": "install_failed", "error": error }),
    Reply::Activated { deleted } => json!({ "reply": "activated", "deleted": deleted }),
    Reply::ActivateFailed { error } => json!({ "reply": "activate_failed", "error": error }),
    Reply::Fetch(FetchOutcome::Passthrough) => json!({ "reply": "passthrough" }),
    Reply::Fetch(FetchOutcome::Respond(served)) => {
      json!({ "reply": "response", "response": served_to_json(served) })
    }
    Reply::Fetch(FetchOutcome::Error(error)) => json!({ "reply": "network_error", "error": error }),
    Reply::Message(data) => json!({ "reply": "message", "data": data }),
    Reply::NotificationShown => json!({ "reply": "notification_shown" }),
    Reply::NotificationClosed { opened } => {
      json!({ "reply": "notification_closed", "opened": opened })
    }
    Reply::Synced => json!({ "reply": "synced" }),
    Reply::SyncSkipped { tag } => json!({ "reply": "sync_skipped", "tag": tag }),
    Reply::SyncFailed { error } => json!({ "reply": "sync_failed", "error": error }),
    Reply::HostFailed { error } => json!({ "reply": "host_failed", "error": error }),
  };

  match (id, body) {
    (Some(id), Value::Object(mut map)) => {
      map.insert("id".to_string(), id.clone());
      Value::Object(map)
    }
    (_, body) => body,
  }
}
