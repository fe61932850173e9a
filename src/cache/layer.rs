//! Cache layer that orchestrates caching strategies with network fetching.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::classify::{classify, Manifest, RequestClass};
use crate::error::ServeError;
use crate::fallback;
use crate::net::{Fetcher, Method, Request, RequestKey};

use super::generations::Generations;
use super::storage::CacheStorage;
use super::traits::{CachedResponse, Served};

/// Cache layer that routes each request to a caching strategy.
///
/// Reads and writes only the current generations named by `Generations`;
/// it never creates or deletes generations on its own.
pub struct CacheLayer<S: CacheStorage, F: Fetcher> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  generations: Generations,
  manifest: Manifest,
}

impl<S: CacheStorage, F: Fetcher> CacheLayer<S, F> {
  pub fn new(
    storage: Arc<S>,
    fetcher: Arc<F>,
    generations: Generations,
    manifest: Manifest,
  ) -> Self {
    Self {
      storage,
      fetcher,
      generations,
      manifest,
    }
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  pub fn fetcher(&self) -> &Arc<F> {
    &self.fetcher
  }

  pub fn generations(&self) -> &Generations {
    &self.generations
  }

  pub fn manifest(&self) -> &Manifest {
    &self.manifest
  }

  /// Look up a request in the current generations, static first.
  pub fn lookup(&self, key: &RequestKey) -> color_eyre::Result<Option<CachedResponse>> {
    if let Some(hit) = self.storage.get(&self.generations.static_name(), key)? {
      return Ok(Some(hit));
    }
    self.storage.get(&self.generations.dynamic_name(), key)
  }

  /// Classify the request and run the matching strategy.
  pub async fn serve(&self, request: &Request) -> Result<Served, ServeError> {
    let class = classify(request, &self.manifest);
    debug!(url = %request.url, ?class, "classified request");
    self.handle(request, class).await
  }

  pub async fn handle(&self, request: &Request, class: RequestClass) -> Result<Served, ServeError> {
    match class {
      RequestClass::Static => self.cache_first(request).await,
      RequestClass::Api => self.network_first_with_fallback(request).await,
      RequestClass::Other => self.network_first(request).await,
    }
  }

  /// Cache-first strategy.
  ///
  /// 1. Check current generations - on hit, return without touching the network
  /// 2. On miss, fetch from network
  /// 3. Store ok responses into the static generation
  /// 4. Network failure propagates
  pub async fn cache_first(&self, request: &Request) -> Result<Served, ServeError> {
    let key = request.key();

    if let Some(cached) = self.lookup(&key)? {
      debug!(%key, generation = %cached.generation, "cache hit");
      return Ok(Served::from_cache(cached));
    }

    debug!(%key, "cache miss, fetching");
    let response = self.fetcher.fetch(request).await?;

    if response.ok() {
      self
        .storage
        .put(&self.generations.static_name(), &key, &response)?;
      debug!(%key, "stored in static generation");
    }

    Ok(Served::from_network(response))
  }

  /// Network-first strategy.
  ///
  /// 1. Fetch from network - ok GET responses are stored into the dynamic generation
  /// 2. On network failure, serve from cache
  /// 3. If the cache misses too, the failure propagates
  pub async fn network_first(&self, request: &Request) -> Result<Served, ServeError> {
    let key = request.key();

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.ok() && request.method == Method::Get {
          self
            .storage
            .put(&self.generations.dynamic_name(), &key, &response)?;
          debug!(%key, "stored in dynamic generation");
        }
        Ok(Served::from_network(response))
      }
      Err(e) => {
        debug!(%key, error = %e, "network failed, trying cache");
        match self.lookup(&key)? {
          Some(cached) => Ok(Served::from_cache(cached)),
          None => Err(e.into()),
        }
      }
    }
  }

  /// Network-only strategy for API calls, with an offline envelope for the
  /// script endpoint. API responses are never cached.
  pub async fn network_first_with_fallback(&self, request: &Request) -> Result<Served, ServeError> {
    match self.fetcher.fetch(request).await {
      Ok(response) => Ok(Served::from_network(response)),
      Err(e) if self.manifest.is_script_call(request) => {
        warn!(url = %request.url, error = %e, "script endpoint offline, returning envelope");
        Ok(Served::fallback(fallback::offline_envelope()))
      }
      Err(e) => Err(e.into()),
    }
  }
}

impl<S: CacheStorage, F: Fetcher> Clone for CacheLayer<S, F> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
      generations: self.generations.clone(),
      manifest: self.manifest.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use crate::error::NetworkError;
  use crate::net::Response;
  use crate::testing::{manifest, url, MockFetcher};

  fn layer() -> CacheLayer<MemoryStorage, MockFetcher> {
    CacheLayer::new(
      Arc::new(MemoryStorage::new()),
      Arc::new(MockFetcher::new()),
      Generations::new("scanner", "v2"),
      manifest(),
    )
  }

  #[tokio::test]
  async fn test_cache_first_fetches_once_then_hits() {
    let layer = layer();
    layer
      .fetcher()
      .respond("http://localhost/app.js", Response::new(200, "console.log(1)"));
    let request = Request::get(url("http://localhost/app.js"));

    let first = layer.serve(&request).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(layer.fetcher().fetch_count(), 1);
    assert_eq!(layer.storage().entry_count("scanner-v2-static").unwrap(), 1);

    let second = layer.serve(&request).await.unwrap();
    assert!(second.source.is_cache());
    assert_eq!(second.response.text(), "console.log(1)");
    assert_eq!(layer.fetcher().fetch_count(), 1);
  }

  #[tokio::test]
  async fn test_cache_first_does_not_store_failed_responses() {
    let layer = layer();
    layer
      .fetcher()
      .respond("http://localhost/missing.png", Response::new(404, "nope"));
    let request = Request::get(url("http://localhost/missing.png"));

    let served = layer.cache_first(&request).await.unwrap();
    assert_eq!(served.response.status, 404);
    assert_eq!(layer.storage().entry_count("scanner-v2-static").unwrap(), 0);

    layer.cache_first(&request).await.unwrap();
    assert_eq!(layer.fetcher().fetch_count(), 2);
  }

  #[tokio::test]
  async fn test_cache_first_propagates_network_failure() {
    let layer = layer();
    layer.fetcher().set_offline(true);

    let result = layer
      .cache_first(&Request::get(url("http://localhost/app.css")))
      .await;

    assert!(matches!(
      result,
      Err(ServeError::Network(NetworkError::Unreachable(_)))
    ));
    assert_eq!(layer.storage().entry_count("scanner-v2-static").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_network_first_stores_and_falls_back() {
    let layer = layer();
    layer
      .fetcher()
      .respond("http://localhost/history", Response::new(200, "fresh"));
    let request = Request::get(url("http://localhost/history"));

    let online = layer.serve(&request).await.unwrap();
    assert_eq!(online.source, CacheSource::Network);
    assert_eq!(layer.storage().entry_count("scanner-v2-dynamic").unwrap(), 1);

    layer.fetcher().set_offline(true);
    let offline = layer.serve(&request).await.unwrap();
    assert!(offline.source.is_cache());
    assert_eq!(offline.response.text(), "fresh");
  }

  #[tokio::test]
  async fn test_network_first_propagates_when_cache_misses() {
    let layer = layer();
    layer.fetcher().set_offline(true);

    let result = layer
      .network_first(&Request::get(url("http://localhost/history")))
      .await;

    assert!(result.is_err_and(|e| e.is_network()));
  }

  #[tokio::test]
  async fn test_network_first_prefers_network_over_cache() {
    let layer = layer();
    let request = Request::get(url("http://localhost/history"));
    layer
      .storage()
      .put("scanner-v2-dynamic", &request.key(), &Response::new(200, "old"))
      .unwrap();
    layer
      .fetcher()
      .respond("http://localhost/history", Response::new(200, "new"));

    let served = layer.network_first(&request).await.unwrap();
    assert_eq!(served.response.text(), "new");
    let cached = layer.lookup(&request.key()).unwrap().unwrap();
    assert_eq!(cached.response.text(), "new");
  }

  #[tokio::test]
  async fn test_api_responses_are_never_cached() {
    let layer = layer();
    let api = "https://script.google.com/macros/s/abc/exec?action=list";
    layer.fetcher().respond(api, Response::new(200, "[]"));

    let served = layer.serve(&Request::get(url(api))).await.unwrap();
    assert_eq!(served.source, CacheSource::Network);
    assert_eq!(layer.storage().entry_count("scanner-v2-static").unwrap(), 0);
    assert_eq!(layer.storage().entry_count("scanner-v2-dynamic").unwrap(), 0);
    assert!(layer.storage().generations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_script_endpoint_offline_envelope() {
    let layer = layer();
    layer.fetcher().set_offline(true);

    let served = layer
      .serve(&Request::get(url(
        "https://script.google.com/macros/s/abc/exec?action=scan",
      )))
      .await
      .unwrap();

    assert_eq!(served.source, CacheSource::Fallback);
    assert_eq!(served.response.status, 503);
    let body: serde_json::Value = serde_json::from_slice(&served.response.body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["offline"], true);
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
  }

  #[tokio::test]
  async fn test_other_api_prefix_failure_propagates() {
    let layer = layer();
    layer.fetcher().set_offline(true);

    let result = layer
      .serve(&Request::get(url("https://sheets.googleapis.com/v4/spreadsheets/1")))
      .await;

    assert!(result.is_err_and(|e| e.is_network()));
  }

  #[tokio::test]
  async fn test_lookup_prefers_static_generation() {
    let layer = layer();
    let request = Request::get(url("http://localhost/app.js"));
    layer
      .storage()
      .put("scanner-v2-dynamic", &request.key(), &Response::new(200, "dynamic"))
      .unwrap();
    layer
      .storage()
      .put("scanner-v2-static", &request.key(), &Response::new(200, "static"))
      .unwrap();

    let hit = layer.lookup(&request.key()).unwrap().unwrap();
    assert_eq!(hit.generation, "scanner-v2-static");
    assert_eq!(hit.response.text(), "static");
  }

  #[tokio::test]
  async fn test_stale_generations_are_not_consulted() {
    let layer = layer();
    let request = Request::get(url("http://localhost/app.js"));
    layer
      .storage()
      .put("scanner-v1-static", &request.key(), &Response::new(200, "old deploy"))
      .unwrap();
    layer.fetcher().set_offline(true);

    assert!(layer.cache_first(&request).await.is_err());
  }
}
