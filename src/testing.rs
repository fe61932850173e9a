//! Test doubles for the network and host ports.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::classify::Manifest;
use crate::error::NetworkError;
use crate::net::{Fetcher, Request, Response};
use crate::worker::{Host, Notification};

pub fn url(s: &str) -> Url {
  Url::parse(s).unwrap()
}

pub fn manifest() -> Manifest {
  Manifest {
    static_assets: vec!["/".into(), "/index.html".into()],
    api_prefixes: vec![
      "https://script.google.com/macros/s/".into(),
      "https://sheets.googleapis.com/".into(),
    ],
    script_prefix: "https://script.google.com/macros/s/".into(),
  }
}

/// Scripted fetcher: canned responses per URL, 404 for anything else.
#[derive(Default)]
pub struct MockFetcher {
  responses: Mutex<HashMap<String, Response>>,
  failing: Mutex<HashSet<String>>,
  offline: AtomicBool,
  count: AtomicUsize,
  delay_ms: AtomicU64,
}

impl MockFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  /// Make one URL fail with a network error.
  pub fn fail(&self, url: &str) {
    self.failing.lock().unwrap().insert(url.to_string());
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  /// Hold every fetch for `delay` before answering.
  pub fn set_delay(&self, delay: Duration) {
    self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
  }

  pub fn fetch_count(&self) -> usize {
    self.count.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Fetcher for MockFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
    self.count.fetch_add(1, Ordering::SeqCst);
    match self.delay_ms.load(Ordering::SeqCst) {
      0 => tokio::task::yield_now().await,
      ms => tokio::time::sleep(Duration::from_millis(ms)).await,
    }

    let url = request.url.as_str();
    if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(url) {
      return Err(NetworkError::Unreachable("offline".to_string()));
    }

    Ok(
      self
        .responses
        .lock()
        .unwrap()
        .get(url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, "not found")),
    )
  }
}

/// Host double that records every lifecycle call.
#[derive(Default)]
pub struct RecordingHost {
  pub calls: Mutex<Vec<String>>,
  pub notifications: Mutex<Vec<Notification>>,
  pub fail_sync: AtomicBool,
}

impl RecordingHost {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  fn record(&self, call: String) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl Host for RecordingHost {
  async fn skip_waiting(&self) -> Result<()> {
    self.record("skip_waiting".to_string());
    Ok(())
  }

  async fn claim_clients(&self) -> Result<()> {
    self.record("claim_clients".to_string());
    Ok(())
  }

  async fn show_notification(&self, notification: &Notification) -> Result<()> {
    self.record("show_notification".to_string());
    self.notifications.lock().unwrap().push(notification.clone());
    Ok(())
  }

  async fn open_window(&self, url: &Url) -> Result<()> {
    self.record(format!("open_window {}", url));
    Ok(())
  }

  async fn sync_offline_scans(&self) -> Result<()> {
    self.record("sync_offline_scans".to_string());
    if self.fail_sync.load(Ordering::SeqCst) {
      return Err(eyre!("upload rejected"));
    }
    Ok(())
  }
}
