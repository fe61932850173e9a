//! Worker configuration: YAML file, search order and built-in defaults.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::Generations;
use crate::classify::Manifest;

pub const DEFAULT_VERSION: &str = "v1.0.0";
pub const DEFAULT_CACHE_PREFIX: &str = "scanner";
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080/";

/// Critical assets pre-populated into the static generation on install.
pub const DEFAULT_STATIC_ASSETS: &[&str] = &[
  "/",
  "/index.html",
  "/manifest.json",
  "/css/styles.css",
  "/js/app.js",
  "/icons/icon-192.png",
  "/icons/icon-512.png",
];

/// Remote script execution endpoint; the only API that gets an offline envelope.
pub const DEFAULT_SCRIPT_PREFIX: &str = "https://script.google.com/macros/s/";

/// URL prefixes of API calls. Never cached.
pub const DEFAULT_API_PREFIXES: &[&str] = &[
  DEFAULT_SCRIPT_PREFIX,
  "https://script.googleusercontent.com/",
  "https://sheets.googleapis.com/",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Deployment version; bumping it retires every generation of the previous one
  pub version: String,
  /// Naming prefix shared by every generation this worker owns
  pub cache_prefix: String,
  /// Application origin that relative static asset paths resolve against
  pub origin: String,
  pub static_assets: Vec<String>,
  pub api_prefixes: Vec<String>,
  pub script_prefix: String,
  pub network: NetworkConfig,
  pub storage: StorageConfig,
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  pub timeout_secs: u64,
  pub user_agent: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// SQLite database path (default: $XDG_DATA_HOME/scancache/cache.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Also write a daily-rolling log file
  pub file: bool,
  pub directory: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      version: DEFAULT_VERSION.to_string(),
      cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
      origin: DEFAULT_ORIGIN.to_string(),
      static_assets: DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
      api_prefixes: DEFAULT_API_PREFIXES.iter().map(|s| s.to_string()).collect(),
      script_prefix: DEFAULT_SCRIPT_PREFIX.to_string(),
      network: NetworkConfig::default(),
      storage: StorageConfig::default(),
      logging: LoggingConfig::default(),
    }
  }
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_secs: 30,
      user_agent: concat!("scancache/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file, falling back to built-in defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./scancache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/scancache/config.yaml
  ///
  /// `SCANCACHE_VERSION` overrides the configured version.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    if let Ok(version) = std::env::var("SCANCACHE_VERSION") {
      if !version.trim().is_empty() {
        config.version = version.trim().to_string();
      }
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("scancache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("scancache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.version.trim().is_empty() {
      return Err(eyre!("Config: version must not be empty"));
    }
    if self.cache_prefix.trim().is_empty() {
      return Err(eyre!("Config: cache_prefix must not be empty"));
    }
    self.origin_url()?;
    Ok(())
  }

  /// The parsed application origin.
  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Config: invalid origin {}: {}", self.origin, e))
  }

  /// Generation naming for this deployment.
  pub fn generations(&self) -> Generations {
    Generations::new(&self.cache_prefix, &self.version)
  }

  /// Classification inputs: static assets and API prefixes.
  pub fn manifest(&self) -> Manifest {
    Manifest {
      static_assets: self.static_assets.clone(),
      api_prefixes: self.api_prefixes.clone(),
      script_prefix: self.script_prefix.clone(),
    }
  }

  /// Default SQLite database location.
  pub fn storage_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.storage.path {
      return Ok(path.clone());
    }
    Ok(data_dir()?.join("cache.db"))
  }

  pub fn log_directory(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.logging.directory {
      return Ok(dir.clone());
    }
    Ok(data_dir()?.join("logs"))
  }
}

fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("scancache"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_defaults_apply_when_fields_missing() {
    let config = Config::from_yaml("version: v2\n").unwrap();
    assert_eq!(config.version, "v2");
    assert_eq!(config.cache_prefix, DEFAULT_CACHE_PREFIX);
    assert_eq!(config.static_assets.len(), DEFAULT_STATIC_ASSETS.len());
    assert_eq!(config.network.timeout_secs, 30);
  }

  #[test]
  fn test_generation_names_follow_version() {
    let config = Config::from_yaml("version: v2\ncache_prefix: app\n").unwrap();
    let generations = config.generations();
    assert_eq!(generations.static_name(), "app-v2-static");
    assert_eq!(generations.dynamic_name(), "app-v2-dynamic");
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scancache.yaml");
    std::fs::write(
      &path,
      "origin: https://scan.example.com/\nstatic_assets: ['/', '/index.html']\nnetwork:\n  timeout_secs: 5\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.origin_url().unwrap().as_str(), "https://scan.example.com/");
    assert_eq!(config.static_assets, vec!["/", "/index.html"]);
    assert_eq!(config.network.timeout_secs, 5);
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let dir = TempDir::new().unwrap();
    let result = Config::load(Some(&dir.path().join("nope.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_default_origin_parses() {
    let origin = Config::default().origin_url().unwrap();
    assert_eq!(origin.as_str(), DEFAULT_ORIGIN);
  }

  #[test]
  fn test_invalid_origin_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scancache.yaml");
    std::fs::write(&path, "origin: not a url\n").unwrap();

    assert!(Config::load(Some(&path)).is_err());
  }

  #[test]
  fn test_invalid_yaml_is_error() {
    assert!(Config::from_yaml("static_assets: 12: [").is_err());
  }

  #[test]
  fn test_manifest_carries_prefixes() {
    let manifest = Config::default().manifest();
    assert_eq!(manifest.script_prefix, DEFAULT_SCRIPT_PREFIX);
    assert!(manifest
      .api_prefixes
      .iter()
      .any(|p| p == DEFAULT_SCRIPT_PREFIX));
  }
}
