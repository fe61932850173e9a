//! Core types shared by the strategies and the storage backends.

use chrono::{DateTime, Utc};

use crate::net::Response;

/// A response snapshot read back from a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub response: Response,
  /// Generation the snapshot was found in
  pub generation: String,
  /// When the snapshot was written
  pub cached_at: DateTime<Utc>,
}

/// Result from a strategy, including the response and where it came from.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: CacheSource,
}

impl Served {
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: CacheSource::Cache {
        generation: cached.generation,
        cached_at: cached.cached_at,
      },
    }
  }

  /// A synthesized response.
  pub fn fallback(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Fallback,
    }
  }
}

/// Indicates where a served response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSource {
  /// Live network response
  Network,
  /// Stored snapshot
  Cache {
    generation: String,
    cached_at: DateTime<Utc>,
  },
  /// Offline page or offline envelope
  Fallback,
}

impl CacheSource {
  pub fn is_cache(&self) -> bool {
    matches!(self, CacheSource::Cache { .. })
  }
}
