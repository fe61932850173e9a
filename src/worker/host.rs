//! Host-side lifecycle operations, and the notifications the worker asks the host to show.

use async_trait::async_trait;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Lifecycle port: what the worker needs from the platform hosting it.
#[async_trait]
pub trait Host: Send + Sync {
  /// Let a freshly installed version activate without waiting for old pages to close.
  async fn skip_waiting(&self) -> Result<()>;

  /// Take control of every open page of the application.
  async fn claim_clients(&self) -> Result<()>;

  async fn show_notification(&self, notification: &Notification) -> Result<()>;

  /// Focus or open a page of the application.
  async fn open_window(&self, url: &Url) -> Result<()>;

  /// Upload scans queued while offline. Owned by the hosting application.
  async fn sync_offline_scans(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub actions: Vec<NotificationAction>,
}

/// Host for running outside a browser: every operation is logged.
pub struct ConsoleHost;

#[async_trait]
impl Host for ConsoleHost {
  async fn skip_waiting(&self) -> Result<()> {
    info!("host: skip waiting");
    Ok(())
  }

  async fn claim_clients(&self) -> Result<()> {
    info!("host: claimed clients");
    Ok(())
  }

  async fn show_notification(&self, notification: &Notification) -> Result<()> {
    info!(
      title = %notification.title,
      body = %notification.body,
      actions = notification.actions.len(),
      "host: notification"
    );
    Ok(())
  }

  async fn open_window(&self, url: &Url) -> Result<()> {
    info!(%url, "host: open window");
    Ok(())
  }

  async fn sync_offline_scans(&self) -> Result<()> {
    info!("host: offline scan sync delegated to the application");
    Ok(())
  }
}
