//! Typed commands the host sends to the worker, and what the worker answers.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::Served;
use crate::net::Request;

/// Background sync tag that uploads scans queued while offline.
pub const OFFLINE_SCANS_SYNC_TAG: &str = "offline-scans-sync";

/// One host event, as a typed command.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Command {
  Install,
  Activate,
  Fetch {
    request: Request,
  },
  Message {
    data: ControlMessage,
  },
  /// Push payload as received; usually JSON `{title?, message?}`
  Push {
    #[serde(default)]
    data: Option<String>,
  },
  NotificationClick {
    #[serde(default)]
    action: Option<String>,
  },
  Sync {
    tag: String,
  },
}

/// Control messages posted by the hosting application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
  SkipWaiting,
  GetVersion,
  ClearCache,
  #[serde(other)]
  Unknown,
}

/// Reply to a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
  Version {
    version: String,
    /// [static, dynamic]
    caches: Vec<String>,
  },
  Cleared {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
  },
}

/// Optional fields of a push payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
  pub title: Option<String>,
  pub message: Option<String>,
}

/// What to do with an intercepted request.
#[derive(Debug)]
pub enum FetchOutcome {
  /// Not ours: let the platform handle it
  Passthrough,
  Respond(Served),
  /// Surface a failed load to the page
  Error(String),
}

impl FetchOutcome {
  pub fn served(&self) -> Option<&Served> {
    match self {
      FetchOutcome::Respond(served) => Some(served),
      _ => None,
    }
  }
}

#[derive(Debug)]
pub enum Reply {
  Installed { cached: usize },
  InstallFailed { error: String },
  Activated { deleted: Vec<String> },
  ActivateFailed { error: String },
  Fetch(FetchOutcome),
  /// `None` for messages that expect no answer
  Message(Option<ControlReply>),
  NotificationShown,
  NotificationClosed { opened: Option<Url> },
  Synced,
  SyncSkipped { tag: String },
  SyncFailed { error: String },
  HostFailed { error: String },
}
