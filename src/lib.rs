//! `coalget` is an async HTTP GET client that transparently coalesces
//! duplicate requests and throttles concurrency per endpoint.
//!
//! Concurrent calls for the identical URL string share one network
//! call and one result, and at most a fixed number of requests (3 by
//! default) are in flight against any single `host:port` at a time.
//! Completed results are not cached: once a request finishes, the next
//! call for the same URL hits the network again.
//!
//! "Hello world" example:
//! ```no_run
//! use coalget::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let body = coalget::fetch("https://example.com").await?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```
//!
//! For issuing many requests, build a [`Client`] once and share it;
//! coalescing and admission control only apply within one client:
//!
//! ```no_run
//! use coalget::{ClientBuilder, Result};
//! use futures::future::join_all;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClientBuilder::builder()
//!         .max_per_endpoint(2usize)
//!         .build()
//!         .client()?;
//!
//!     // Ten calls, one network request: the other nine attach to the
//!     // first one's in-flight entry.
//!     let results = join_all((0..10).map(|_| client.fetch("https://example.com"))).await;
//!     assert!(results.iter().all(|body| body.is_ok()));
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

mod client;
mod coalesce;
mod endpoint;
mod limiter;
mod types;

#[cfg(test)]
#[macro_use]
pub mod test_utils;

pub use client::{
    fetch, Client, ClientBuilder, DEFAULT_MAX_PER_ENDPOINT, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
pub use endpoint::EndpointKey;
pub use types::{ErrorKind, Result};
