//! Failure taxonomy for request handling.
//!
//! A cache miss is not an error: storage lookups return `Ok(None)`.

use thiserror::Error;

/// The network could not produce a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
  #[error("network unreachable: {0}")]
  Unreachable(String),
  #[error("network request timed out")]
  Timeout,
  #[error("request could not be sent: {0}")]
  InvalidRequest(String),
}

/// Why a strategy could not produce a response.
#[derive(Debug, Error)]
pub enum ServeError {
  #[error(transparent)]
  Network(#[from] NetworkError),
  /// The cache store itself failed; fatal for the current request.
  #[error("cache store failure: {0}")]
  Store(color_eyre::Report),
}

impl ServeError {
  pub fn is_network(&self) -> bool {
    matches!(self, ServeError::Network(_))
  }
}

impl From<color_eyre::Report> for ServeError {
  fn from(report: color_eyre::Report) -> Self {
    ServeError::Store(report)
  }
}
