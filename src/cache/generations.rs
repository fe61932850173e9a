//! Generation naming, pruning of stale generations and manual clearing.

use color_eyre::Result;
use serde::Serialize;
use tracing::{debug, info};

use super::storage::CacheStorage;

/// The two generations a deployment writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentGenerations {
  #[serde(rename = "static")]
  pub static_name: String,
  #[serde(rename = "dynamic")]
  pub dynamic_name: String,
}

/// Owns generation identity for one deployment version.
///
/// Names are `{prefix}-{version}-static` and `{prefix}-{version}-dynamic`.
/// Anything else starting with `{prefix}-` is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generations {
  prefix: String,
  version: String,
}

impl Generations {
  pub fn new(prefix: &str, version: &str) -> Self {
    Self {
      prefix: prefix.to_string(),
      version: version.to_string(),
    }
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn static_name(&self) -> String {
    format!("{}-{}-static", self.prefix, self.version)
  }

  pub fn dynamic_name(&self) -> String {
    format!("{}-{}-dynamic", self.prefix, self.version)
  }

  pub fn current(&self) -> CurrentGenerations {
    CurrentGenerations {
      static_name: self.static_name(),
      dynamic_name: self.dynamic_name(),
    }
  }

  /// Whether a generation name belongs to this system.
  pub fn owns(&self, name: &str) -> bool {
    name
      .strip_prefix(self.prefix.as_str())
      .is_some_and(|rest| rest.starts_with('-'))
  }

  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_name() || name == self.dynamic_name()
  }

  /// Delete every owned generation that is not current. Returns the deleted names.
  ///
  /// Idempotent. Current generations are never touched, so strategies may keep
  /// reading and writing them while this runs.
  pub fn prune_stale<S: CacheStorage + ?Sized>(&self, storage: &S) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for name in storage.generations()? {
      if !self.owns(&name) || self.is_current(&name) {
        continue;
      }
      if storage.delete_generation(&name)? {
        info!(generation = %name, "deleted stale generation");
        deleted.push(name);
      }
    }

    debug!(count = deleted.len(), "pruned stale generations");
    Ok(deleted)
  }

  /// Delete every owned generation, current ones included.
  pub fn clear_all<S: CacheStorage + ?Sized>(&self, storage: &S) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for name in storage.generations()? {
      if self.owns(&name) && storage.delete_generation(&name)? {
        deleted.push(name);
      }
    }

    info!(count = deleted.len(), "cleared all generations");
    Ok(deleted)
  }
}
