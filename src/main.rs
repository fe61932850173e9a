use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use scancache::cache::{CacheStorage, MemoryStorage, SqliteStorage};
use scancache::config::Config;
use scancache::event::{reply_to_json, Event, EventHandler};
use scancache::net::{Destination, HttpFetcher, Method, Request};
use scancache::worker::{
  Command, ConsoleHost, ControlMessage, LifecycleState, Worker, OFFLINE_SCANS_SYNC_TAG,
};

#[derive(Parser, Debug)]
#[command(name = "scancache")]
#[command(about = "Offline cache worker for the scanning app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/scancache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep the cache in memory instead of the SQLite database
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Pre-cache the static assets of this version
  Install,
  /// Delete generations of previous versions
  Activate,
  /// Route one request through the caching strategies
  Fetch {
    url: Url,
    #[arg(short, long, default_value = "GET", value_parser = parse_method)]
    method: Method,
    /// document, script, style, image, font, manifest or empty
    #[arg(short, long, default_value = "empty", value_parser = parse_destination)]
    destination: Destination,
  },
  /// Print the version and current generation names
  Version,
  /// Delete every generation, current ones included
  Clear,
  /// Show a push notification
  Push {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    message: Option<String>,
  },
  /// Simulate a notification click
  Click {
    #[arg(long, default_value = "view")]
    action: String,
  },
  /// Run a background sync
  Sync {
    #[arg(long, default_value = OFFLINE_SCANS_SYNC_TAG)]
    tag: String,
  },
  /// Read JSON commands from stdin, one per line, and answer on stdout
  Listen,
}

fn parse_method(s: &str) -> Result<Method, String> {
  Method::parse(s).ok_or_else(|| format!("unknown method: {}", s))
}

fn parse_destination(s: &str) -> Result<Destination, String> {
  serde_json::from_value(json!(s.to_lowercase())).map_err(|_| format!("unknown destination: {}", s))
}

/// Initialize the tracing subscriber for logging
fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>> {
  // Use RUST_LOG env var to control log level (e.g., RUST_LOG=scancache=debug)
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scancache=info,warn"));

  let (file_layer, guard) = if config.logging.file {
    let directory = config.log_directory()?;
    std::fs::create_dir_all(&directory)
      .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;
    let appender = tracing_appender::rolling::daily(directory, "scancache.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    (
      Some(fmt::layer().with_writer(writer).with_ansi(false)),
      Some(guard),
    )
  } else {
    (None, None)
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = init_tracing(&config)?;

  info!(version = %config.version, "scancache starting");

  if args.ephemeral {
    run(config, Arc::new(MemoryStorage::new()), args.command).await
  } else {
    let storage = SqliteStorage::open_at(&config.storage_path()?)?;
    run(config, Arc::new(storage), args.command).await
  }
}

async fn run<S: CacheStorage + 'static>(config: Config, storage: Arc<S>, command: Cmd) -> Result<()> {
  let fetcher = Arc::new(HttpFetcher::new(&config.network)?);
  let worker = Worker::new(&config, storage, fetcher, Arc::new(ConsoleHost))?;

  let command = match command {
    Cmd::Listen => return listen(worker).await,
    Cmd::Install => Command::Install,
    Cmd::Activate => Command::Activate,
    Cmd::Fetch {
      url,
      method,
      destination,
    } => {
      // A fresh process only takes control if this version's install already landed
      match worker.resume()? {
        LifecycleState::Installed => {
          worker.dispatch(Command::Activate).await;
        }
        state => warn!(?state, "version not installed; run `scancache install` first"),
      }
      Command::Fetch {
        request: Request::get(url)
          .with_method(method)
          .with_destination(destination),
      }
    }
    Cmd::Version => Command::Message {
      data: ControlMessage::GetVersion,
    },
    Cmd::Clear => Command::Message {
      data: ControlMessage::ClearCache,
    },
    Cmd::Push { title, message } => Command::Push {
      data: Some(json!({ "title": title, "message": message }).to_string()),
    },
    Cmd::Click { action } => Command::NotificationClick {
      action: Some(action),
    },
    Cmd::Sync { tag } => Command::Sync { tag },
  };

  let reply = worker.dispatch(command).await;
  println!("{}", serde_json::to_string_pretty(&reply_to_json(None, &reply))?);
  Ok(())
}

async fn listen<S, F, H>(worker: Worker<S, F, H>) -> Result<()>
where
  S: CacheStorage + 'static,
  F: scancache::net::Fetcher + 'static,
  H: scancache::worker::Host + 'static,
{
  let mut events = EventHandler::new(BufReader::new(tokio::io::stdin()));
  let mut tasks = JoinSet::new();

  while let Some(event) = events.next().await {
    match event {
      Event::Command { id, command } => {
        let worker = worker.clone();
        // Commands run concurrently; replies carry the id to correlate them
        tasks.spawn(async move {
          let reply = worker.dispatch(command).await;
          println!("{}", reply_to_json(id.as_ref(), &reply));
        });
      }
      Event::Invalid { line, error } => {
        warn!(%error, "invalid command line");
        println!("{}", json!({ "reply": "invalid", "line": line, "error": error }));
      }
    }
  }

  while tasks.join_next().await.is_some() {}
  Ok(())
}
