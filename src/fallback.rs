//! Canned responses for when neither the network nor the cache can answer.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::net::Response;

const OFFLINE_MESSAGE: &str =
  "You are offline. Your scan was not sent; it will be synced when the connection is back.";

/// Self-contained offline document. No external resources of any kind.
const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline - Scanner</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         background: #1e293b; color: #f8fafc; text-align: center; }
  main { padding: 2rem; max-width: 28rem; }
  .icon { font-size: 4rem; line-height: 1; margin-bottom: 1rem; }
  h1 { font-size: 1.5rem; margin: 0 0 .75rem; }
  p { color: #cbd5e1; margin: 0 0 1.5rem; line-height: 1.5; }
  button { background: #3b82f6; color: #fff; border: 0; border-radius: .5rem;
           padding: .75rem 1.5rem; font-size: 1rem; cursor: pointer; }
</style>
</head>
<body>
<main>
  <div class="icon">&#128225;</div>
  <h1>You are offline</h1>
  <p>The scanner cannot reach the network right now. Scans you take will be kept on this device and synced when the connection returns.</p>
  <button type="button" onclick="location.reload()">Try again</button>
</main>
</body>
</html>
"#;

/// Machine-readable body returned by the script endpoint while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineEnvelope {
  pub success: bool,
  pub message: String,
  pub offline: bool,
  /// ISO-8601, UTC
  pub timestamp: String,
}

impl OfflineEnvelope {
  pub fn at(now: DateTime<Utc>) -> Self {
    Self {
      success: false,
      message: OFFLINE_MESSAGE.to_string(),
      offline: true,
      timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
  }

  pub fn to_json(&self) -> serde_json::Value {
    serde_json::json!({
      "success": self.success,
      "message": self.message,
      "offline": self.offline,
      "timestamp": self.timestamp,
    })
  }
}

/// The offline HTML document, status 200.
pub fn offline_page() -> Response {
  Response::new(200, OFFLINE_PAGE).with_header("Content-Type", "text/html; charset=utf-8")
}

/// JSON offline envelope, status 503.
pub fn offline_envelope() -> Response {
  offline_envelope_at(Utc::now())
}

pub fn offline_envelope_at(now: DateTime<Utc>) -> Response {
  let body = OfflineEnvelope::at(now).to_json().to_string();
  Response::new(503, body).with_header("Content-Type", "application/json")
}
