//! Request classification: which strategy handles a request, if any.

use crate::net::{Method, Request};

/// URL schemes that belong to browser extensions. Never intercepted.
const EXTENSION_SCHEMES: &[&str] = &[
  "chrome-extension",
  "moz-extension",
  "safari-extension",
  "safari-web-extension",
  "ms-browser-extension",
];

/// Style sheet, script and image extensions served cache-first.
const STATIC_EXTENSIONS: &[&str] = &[
  ".css", ".js", ".mjs", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp",
];

/// Request category; selects the caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Cache-first
  Static,
  /// Network-first, never cached, offline envelope for the script endpoint
  Api,
  /// Network-first with cache fallback
  Other,
}

/// Inputs that drive classification.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
  /// Paths (or path suffixes) of critical static assets
  pub static_assets: Vec<String>,
  pub api_prefixes: Vec<String>,
  /// API prefix of the remote script endpoint
  pub script_prefix: String,
}

impl Manifest {
  /// Whether the request URL falls under the remote script endpoint.
  pub fn is_script_call(&self, request: &Request) -> bool {
    !self.script_prefix.is_empty() && request.url.as_str().contains(&self.script_prefix)
  }
}

/// Whether the worker should take over this request at all.
///
/// Non-GET requests and extension URLs are left to the platform.
pub fn should_intercept(request: &Request) -> bool {
  request.method == Method::Get && !EXTENSION_SCHEMES.contains(&request.url.scheme())
}

/// Classify an intercepted GET request.
///
/// Static assets win over API prefixes, so a `.js` file served from an API
/// host is still treated as static.
pub fn classify(request: &Request, manifest: &Manifest) -> RequestClass {
  let path = request.url.path();

  let is_listed = manifest
    .static_assets
    .iter()
    .any(|asset| !asset.is_empty() && path.ends_with(asset.as_str()));

  let lower = path.to_ascii_lowercase();
  let has_static_extension = STATIC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext));

  if is_listed || has_static_extension {
    return RequestClass::Static;
  }

  let url = request.url.as_str();
  if manifest
    .api_prefixes
    .iter()
    .any(|prefix| !prefix.is_empty() && url.contains(prefix.as_str()))
  {
    return RequestClass::Api;
  }

  RequestClass::Other
}
