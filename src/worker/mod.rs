//! The worker: one deployment version handling host commands.
//!
//! Every host event arrives as a `Command` and leaves as a `Reply`. The worker
//! moves through `Parsed → Installing → Installed → Activating → Activated`;
//! a failed install makes the version `Redundant` and it never activates.

mod commands;
mod host;
mod task;

pub use commands::{
  Command, ControlMessage, ControlReply, FetchOutcome, PushPayload, Reply, OFFLINE_SCANS_SYNC_TAG,
};
pub use host::{ConsoleHost, Host, Notification, NotificationAction};
pub use task::{Task, TaskState};

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{CacheLayer, CacheStorage, Served};
use crate::classify::should_intercept;
use crate::config::Config;
use crate::fallback;
use crate::net::{Fetcher, Request, RequestKey};

const DEFAULT_NOTIFICATION_TITLE: &str = "Scanner";
const DEFAULT_NOTIFICATION_MESSAGE: &str = "You have a new notification";
const NOTIFICATION_ICON: &str = "/icons/icon-192.png";
const NOTIFICATION_BADGE: &str = "/icons/icon-192.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  Redundant,
}

pub struct Worker<S: CacheStorage, F: Fetcher, H: Host> {
  layer: CacheLayer<S, F>,
  host: Arc<H>,
  origin: Url,
  static_assets: Vec<String>,
  state: Arc<Mutex<LifecycleState>>,
}

impl<S: CacheStorage, F: Fetcher, H: Host> Worker<S, F, H> {
  pub fn new(config: &Config, storage: Arc<S>, fetcher: Arc<F>, host: Arc<H>) -> Result<Self> {
    let layer = CacheLayer::new(storage, fetcher, config.generations(), config.manifest());
    Ok(Self {
      layer,
      host,
      origin: config.origin_url()?,
      static_assets: config.static_assets.clone(),
      state: Arc::new(Mutex::new(LifecycleState::Parsed)),
    })
  }

  pub fn layer(&self) -> &CacheLayer<S, F> {
    &self.layer
  }

  pub fn state(&self) -> Result<LifecycleState> {
    let state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(*state)
  }

  /// Move to `next` only while the state is one of `from`.
  ///
  /// Returns the state found under the lock, whether or not it changed.
  fn transition(&self, from: &[LifecycleState], next: LifecycleState) -> Result<LifecycleState> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let current = *state;
    if from.contains(&current) {
      *state = next;
      debug!(previous = ?current, ?next, "lifecycle transition");
    }
    Ok(current)
  }

  /// Finish a transition begun earlier; a no-op if another command moved on.
  fn settle(&self, from: LifecycleState, next: LifecycleState) {
    if let Err(e) = self.transition(&[from], next) {
      warn!(error = %e, ?next, "lifecycle transition failed");
    }
  }

  /// Handle one host command.
  pub async fn dispatch(&self, command: Command) -> Reply {
    match command {
      Command::Install => self.install().await,
      Command::Activate => self.activate().await,
      Command::Fetch { request } => Reply::Fetch(self.fetch(&request).await),
      Command::Message { data } => self.message(data).await,
      Command::Push { data } => self.push(data.as_deref()).await,
      Command::NotificationClick { action } => self.notification_click(action.as_deref()).await,
      Command::Sync { tag } => self.sync(&tag).await,
    }
  }

  /// Pre-populate the static generation with every listed asset.
  ///
  /// All assets are fetched first and must all be ok; only then is the batch
  /// written. Any failure writes nothing. An active version refreshes its
  /// assets and stays active whatever the outcome.
  pub async fn install(&self) -> Reply {
    use LifecycleState::*;

    let current = match self.transition(&[Parsed, Installed], Installing) {
      Ok(current) => current,
      Err(e) => return Reply::InstallFailed { error: e.to_string() },
    };
    let refusal = match current {
      Parsed | Installed | Activated => None,
      Installing => Some("an install is already in progress"),
      Activating => Some("this version is activating"),
      Redundant => Some("install failed; this version is redundant"),
    };
    if let Some(reason) = refusal {
      warn!(state = ?current, "refusing to install");
      return Reply::InstallFailed {
        error: reason.to_string(),
      };
    }

    match self.precache().await {
      Ok(cached) => {
        info!(cached, generation = %self.layer.generations().static_name(), "install complete");
        self.settle(Installing, Installed);
        if let Err(e) = self.host.skip_waiting().await {
          warn!(error = %e, "skip waiting failed");
        }
        Reply::Installed { cached }
      }
      Err(e) => {
        error!(error = %e, "install failed");
        self.settle(Installing, Redundant);
        Reply::InstallFailed { error: e.to_string() }
      }
    }
  }

  fn asset_requests(&self) -> Result<Vec<Request>> {
    self
      .static_assets
      .iter()
      .map(|asset| {
        self
          .origin
          .join(asset)
          .map(Request::get)
          .map_err(|e| eyre!("Invalid static asset {}: {}", asset, e))
      })
      .collect()
  }

  async fn precache(&self) -> Result<usize> {
    let requests = self.asset_requests()?;

    let fetcher = self.layer.fetcher();
    let responses = try_join_all(requests.iter().map(|request| async move {
      let response = fetcher
        .fetch(request)
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;
      if !response.ok() {
        return Err(eyre!(
          "Failed to fetch {}: status {}",
          request.url,
          response.status
        ));
      }
      Ok::<_, color_eyre::Report>(response)
    }))
    .await?;

    let entries: Vec<(RequestKey, _)> = requests
      .iter()
      .map(Request::key)
      .zip(responses)
      .collect();

    self
      .layer
      .storage()
      .put_all(&self.layer.generations().static_name(), &entries)?;

    Ok(entries.len())
  }

  /// Pick up a version installed by an earlier process.
  ///
  /// A `Parsed` worker becomes `Installed` when every static asset is already
  /// in its static generation. Returns the resulting state.
  pub fn resume(&self) -> Result<LifecycleState> {
    if self.state()? == LifecycleState::Parsed && self.is_precached()? {
      self.transition(&[LifecycleState::Parsed], LifecycleState::Installed)?;
      info!(version = %self.layer.generations().version(), "resumed installed version");
    }
    self.state()
  }

  fn is_precached(&self) -> Result<bool> {
    let generation = self.layer.generations().static_name();
    let storage = self.layer.storage();
    if !storage.generations()?.contains(&generation) {
      return Ok(false);
    }
    for request in self.asset_requests()? {
      if storage.get(&generation, &request.key())?.is_none() {
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Delete stale generations, then take control of open pages.
  ///
  /// Only an installed version activates. Activating an active version prunes
  /// again without leaving `Activated`.
  pub async fn activate(&self) -> Reply {
    use LifecycleState::*;

    let current = match self.transition(&[Installed], Activating) {
      Ok(current) => current,
      Err(e) => return Reply::ActivateFailed { error: e.to_string() },
    };
    let refusal = match current {
      Installed | Activated => None,
      Parsed => Some("this version is not installed"),
      Installing => Some("install has not finished"),
      Activating => Some("activation is already in progress"),
      Redundant => Some("install failed; this version cannot activate"),
    };
    if let Some(reason) = refusal {
      warn!(state = ?current, "refusing to activate");
      return Reply::ActivateFailed {
        error: reason.to_string(),
      };
    }

    let deleted = match self.layer.generations().prune_stale(self.layer.storage().as_ref()) {
      Ok(deleted) => deleted,
      Err(e) => {
        error!(error = %e, "activation failed while pruning");
        self.settle(Activating, Installed);
        return Reply::ActivateFailed { error: e.to_string() };
      }
    };

    if let Err(e) = self.host.claim_clients().await {
      warn!(error = %e, "claiming clients failed");
    }

    self.settle(Activating, Activated);
    info!(version = %self.layer.generations().version(), deleted = deleted.len(), "activated");
    Reply::Activated { deleted }
  }

  /// Decide how an intercepted request is answered.
  pub async fn fetch(&self, request: &Request) -> FetchOutcome {
    if !should_intercept(request) {
      return FetchOutcome::Passthrough;
    }

    match self.state() {
      Ok(LifecycleState::Activated) => {}
      Ok(_) => return FetchOutcome::Passthrough,
      Err(e) => return FetchOutcome::Error(e.to_string()),
    }

    match self.layer.serve(request).await {
      Ok(served) => FetchOutcome::Respond(served),
      Err(e) if e.is_network() && request.is_navigation() => {
        warn!(url = %request.url, error = %e, "navigation failed, serving offline page");
        FetchOutcome::Respond(Served::fallback(fallback::offline_page()))
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "request failed");
        FetchOutcome::Error(e.to_string())
      }
    }
  }

  async fn message(&self, message: ControlMessage) -> Reply {
    match message {
      ControlMessage::SkipWaiting => {
        if let Err(e) = self.host.skip_waiting().await {
          warn!(error = %e, "skip waiting failed");
        }
        Reply::Message(None)
      }
      ControlMessage::GetVersion => {
        let generations = self.layer.generations();
        Reply::Message(Some(ControlReply::Version {
          version: generations.version().to_string(),
          caches: vec![generations.static_name(), generations.dynamic_name()],
        }))
      }
      ControlMessage::ClearCache => {
        let result = self.layer.generations().clear_all(self.layer.storage().as_ref());
        Reply::Message(Some(match result {
          Ok(_) => ControlReply::Cleared {
            success: true,
            error: None,
          },
          Err(e) => {
            error!(error = %e, "clearing caches failed");
            ControlReply::Cleared {
              success: false,
              error: Some(e.to_string()),
            }
          }
        }))
      }
      ControlMessage::Unknown => {
        debug!("ignoring unknown control message");
        Reply::Message(None)
      }
    }
  }

  async fn push(&self, data: Option<&str>) -> Reply {
    let notification = notification_for(data);
    match self.host.show_notification(&notification).await {
      Ok(()) => Reply::NotificationShown,
      Err(e) => {
        error!(error = %e, "showing notification failed");
        Reply::HostFailed { error: e.to_string() }
      }
    }
  }

  async fn notification_click(&self, action: Option<&str>) -> Reply {
    if action != Some("view") {
      return Reply::NotificationClosed { opened: None };
    }

    match self.host.open_window(&self.origin).await {
      Ok(()) => Reply::NotificationClosed {
        opened: Some(self.origin.clone()),
      },
      Err(e) => {
        error!(error = %e, "opening window failed");
        Reply::HostFailed { error: e.to_string() }
      }
    }
  }

  async fn sync(&self, tag: &str) -> Reply {
    if tag != OFFLINE_SCANS_SYNC_TAG {
      debug!(tag, "ignoring unknown sync tag");
      return Reply::SyncSkipped {
        tag: tag.to_string(),
      };
    }

    match self.host.sync_offline_scans().await {
      Ok(()) => {
        info!("offline scans synced");
        Reply::Synced
      }
      Err(e) => {
        warn!(error = %e, "offline scan sync failed");
        Reply::SyncFailed { error: e.to_string() }
      }
    }
  }
}

/// Build the notification for a push payload.
pub fn notification_for(data: Option<&str>) -> Notification {
  let payload = match data {
    Some(text) => serde_json::from_str::<PushPayload>(text).unwrap_or_else(|_| PushPayload {
      title: None,
      message: Some(text.to_string()).filter(|t| !t.trim().is_empty()),
    }),
    None => PushPayload::default(),
  };

  Notification {
    title: payload
      .title
      .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
    body: payload
      .message
      .unwrap_or_else(|| DEFAULT_NOTIFICATION_MESSAGE.to_string()),
    icon: NOTIFICATION_ICON.to_string(),
    badge: NOTIFICATION_BADGE.to_string(),
    vibrate: vec![100, 50, 100],
    actions: vec![
      NotificationAction {
        action: "view".to_string(),
        title: "Open".to_string(),
      },
      NotificationAction {
        action: "dismiss".to_string(),
        title: "Close".to_string(),
      },
    ],
  }
}

impl<S, F, H> Worker<S, F, H>
where
  S: CacheStorage + 'static,
  F: Fetcher + 'static,
  H: Host + 'static,
{
  /// Run a command on the runtime and hand back a pending task.
  pub fn spawn(&self, command: Command) -> Task<Reply> {
    let worker = self.clone();
    Task::spawn(async move { worker.dispatch(command).await })
  }
}

impl<S: CacheStorage, F: Fetcher, H: Host> Clone for Worker<S, F, H> {
  fn clone(&self) -> Self {
    Self {
      layer: self.layer.clone(),
      host: Arc::clone(&self.host),
      origin: self.origin.clone(),
      static_assets: self.static_assets.clone(),
      state: Arc::clone(&self.state),
    }
  }
}
