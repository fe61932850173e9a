//! In-memory storage backend.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::net::{RequestKey, Response};

use super::storage::CacheStorage;
use super::traits::CachedResponse;

#[derive(Default)]
struct Inner {
  /// Creation order
  order: Vec<String>,
  generations: HashMap<String, HashMap<RequestKey, CachedResponse>>,
}

impl Inner {
  fn open(&mut self, generation: &str) -> &mut HashMap<RequestKey, CachedResponse> {
    if !self.generations.contains_key(generation) {
      self.order.push(generation.to_string());
    }
    self.generations.entry(generation.to_string()).or_default()
  }
}

/// Storage that keeps every generation in process memory.
#[derive(Default)]
pub struct MemoryStorage {
  inner: Mutex<Inner>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
    self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

fn snapshot(generation: &str, response: &Response) -> CachedResponse {
  CachedResponse {
    response: response.clone(),
    generation: generation.to_string(),
    cached_at: Utc::now(),
  }
}

impl CacheStorage for MemoryStorage {
  fn generations(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.order.clone())
  }

  fn open(&self, generation: &str) -> Result<()> {
    self.lock()?.open(generation);
    Ok(())
  }

  fn delete_generation(&self, generation: &str) -> Result<bool> {
    let mut inner = self.lock()?;
    inner.order.retain(|name| name != generation);
    Ok(inner.generations.remove(generation).is_some())
  }

  fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let inner = self.lock()?;
    Ok(
      inner
        .generations
        .get(generation)
        .and_then(|entries| entries.get(key))
        .cloned(),
    )
  }

  fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut inner = self.lock()?;
    inner
      .open(generation)
      .insert(key.clone(), snapshot(generation, response));
    Ok(())
  }

  fn put_all(&self, generation: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    // A single lock hold makes the batch atomic
    let mut inner = self.lock()?;
    let target = inner.open(generation);
    for (key, response) in entries {
      target.insert(key.clone(), snapshot(generation, response));
    }
    Ok(())
  }

  fn entry_count(&self, generation: &str) -> Result<usize> {
    let inner = self.lock()?;
    Ok(inner.generations.get(generation).map_or(0, HashMap::len))
  }
}
