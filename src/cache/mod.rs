//! Cache generations and the caching strategies built on them.
//!
//! This module provides:
//! - A storage trait for generation-partitioned response snapshots (SQLite and in-memory backends)
//! - Generation naming per deployment version, stale pruning and manual clearing
//! - Cache-first, network-first and network-first-with-fallback strategies

mod generations;
mod layer;
mod memory;
mod storage;
mod traits;

pub use generations::{CurrentGenerations, Generations};
pub use layer::CacheLayer;
pub use memory::MemoryStorage;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheSource, CachedResponse, Served};
