//! Offline cache worker for the scanning app.
//!
//! Every request the page makes is classified, routed to a caching strategy
//! over two cache generations (static assets and dynamic responses), and
//! answered from the network, the cache, or a synthesized fallback.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod fallback;
pub mod net;
pub mod worker;

#[cfg(test)]
mod testing;
