//! Network side of the worker: request/response snapshots and the fetch port.

pub mod client;
pub mod types;

pub use client::{Fetcher, HttpFetcher};
pub use types::{Destination, Method, Request, RequestKey, Response};
