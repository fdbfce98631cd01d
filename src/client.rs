//! Handler of coalesced GET operations.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` owns the HTTP transport, the in-flight registry, and the
//! per-endpoint limiter table, and orchestrates them for each call.
//! `ClientBuilder` exposes a finer level of granularity for building
//! a `Client`.
//!
//! For convenience, a free function [`fetch`] is provided for ad-hoc
//! one-shot requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::coalesce::{self, InFlightRegistry, Join, OwnerSlot};
use crate::endpoint::{self, EndpointKey};
use crate::limiter::EndpointLimiters;
use crate::types::{ErrorKind, Result};

/// Default number of concurrent in-flight requests per endpoint, 3.
pub const DEFAULT_MAX_PER_ENDPOINT: usize = 3;
/// Default timeout in seconds before a request is deemed as failed, 20.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
/// Default user agent, `coalget-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("coalget/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct ClientBuilder {
    /// Maximum number of concurrent in-flight requests per endpoint.
    ///
    /// Must be at least 1; a capacity of zero would queue every caller
    /// forever.
    #[builder(default = DEFAULT_MAX_PER_ENDPOINT)]
    max_per_endpoint: usize,
    /// User agent sent with every request.
    #[builder(default = DEFAULT_USER_AGENT.to_owned())]
    user_agent: String,
    /// Overall per-request timeout, covering connect through body read.
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiate a [`Client`], opening the underlying transport.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::BuildTransport`] if the reqwest client
    /// cannot be constructed with the given settings.
    pub fn client(self) -> Result<Client> {
        let transport = reqwest::Client::builder()
            .gzip(true)
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| ErrorKind::BuildTransport(Arc::new(e)))?;

        Ok(Client {
            transport: Mutex::new(Some(transport)),
            in_flight: InFlightRegistry::default(),
            limiters: EndpointLimiters::new(self.max_per_endpoint),
        })
    }
}

/// A coalescing, endpoint-throttled HTTP GET client.
///
/// Concurrent [`fetch`](Client::fetch) calls for the identical URL
/// string share one network call and one result. Independent of that,
/// at most `max_per_endpoint` calls are in flight against any single
/// `host:port` at a time; excess callers queue until capacity frees.
///
/// The client owns a single connection pool for all requests. It is
/// released by [`close`](Client::close), after which further calls
/// fail with [`ErrorKind::Closed`].
#[derive(Debug)]
pub struct Client {
    /// Shared transport; `None` once the client has been closed.
    transport: Mutex<Option<reqwest::Client>>,
    /// In-flight requests, keyed by verbatim URL string.
    in_flight: InFlightRegistry,
    /// Per-endpoint admission semaphores.
    limiters: EndpointLimiters,
}

impl Client {
    /// Fetch `url` via GET and return the response body as text.
    ///
    /// If a request for the identical URL string is already in flight,
    /// this call attaches to it and returns that request's outcome —
    /// success or failure — without touching the network.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Closed`] if the client has been closed
    /// - [`ErrorKind::InvalidUrl`] if `url` is not an absolute
    ///   `http(s)` URL
    /// - [`ErrorKind::NetworkError`] on transport-level failure
    /// - [`ErrorKind::Canceled`] if the call owning this URL's
    ///   in-flight entry was canceled before completing
    ///
    /// # Panics
    ///
    /// Panics if the internal transport lock is poisoned.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let transport = self.transport()?;
        match self.in_flight.join_or_create(url) {
            Join::Waiter(rx) => {
                log::info!("request for {url} already in flight, awaiting shared result");
                coalesce::await_outcome(rx, url).await
            }
            Join::Owner(slot) => self.execute(&transport, url, slot).await,
        }
    }

    /// Close the client, releasing the underlying transport.
    ///
    /// Idempotent: closing an already closed client is a no-op. Calls
    /// already in flight complete normally; subsequent calls fail with
    /// [`ErrorKind::Closed`].
    ///
    /// # Panics
    ///
    /// Panics if the internal transport lock is poisoned.
    pub fn close(&self) {
        let transport = self.transport.lock().unwrap().take();
        if transport.is_some() {
            log::info!("client closed");
        }
    }

    fn transport(&self) -> Result<reqwest::Client> {
        self.transport
            .lock()
            .unwrap()
            .clone()
            .ok_or(ErrorKind::Closed)
    }

    /// Run the fetch as the owner of `url`'s registry entry and
    /// publish the outcome, so that every waiter observes it and the
    /// entry is evicted on all paths.
    async fn execute(
        &self,
        transport: &reqwest::Client,
        url: &str,
        slot: OwnerSlot,
    ) -> Result<String> {
        let outcome = self.admit_and_get(transport, url).await;
        slot.resolve(outcome.clone());
        outcome
    }

    async fn admit_and_get(&self, transport: &reqwest::Client, url: &str) -> Result<String> {
        let parsed = endpoint::parse_http_url(url)?;
        let key = EndpointKey::try_from(&parsed)?;
        let _permit = self.limiters.acquire(&key).await?;

        let response = transport
            .get(parsed)
            .send()
            .await
            .map_err(|e| ErrorKind::NetworkError(url.to_owned(), Arc::new(e)))?;
        // Non-success statuses still carry a body; only transport-level
        // failures are errors.
        response
            .text()
            .await
            .map_err(|e| ErrorKind::NetworkError(url.to_owned(), Arc::new(e)))
    }
}

/// A convenience function to fetch a single URL.
///
/// This builds a default [`Client`] for one request. When issuing many
/// requests, build one `Client` and share it, otherwise nothing gets
/// coalesced or throttled.
///
/// # Errors
///
/// Returns an `Err` if the client cannot be built or the request fails
/// (see [`Client::fetch`] for failure cases).
pub async fn fetch(url: &str) -> Result<String> {
    let client = ClientBuilder::builder().build().client()?;
    let body = client.fetch(url).await;
    client.close();
    body
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use http::StatusCode;

    use super::ClientBuilder;
    use crate::test_utils::mock_client;
    use crate::{mock_server, ErrorKind};

    #[tokio::test]
    async fn fetch_returns_response_body() {
        let server = mock_server!(StatusCode::OK, set_body_string("hello"));
        let client = mock_client();

        let body = client.fetch(&format!("{}/get", server.uri())).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn http_error_status_still_yields_body() {
        let server = mock_server!(StatusCode::NOT_FOUND, set_body_string("gone"));
        let client = mock_client();

        let body = client.fetch(&server.uri()).await.unwrap();
        assert_eq!(body, "gone");
    }

    #[tokio::test]
    async fn invalid_url_fails_without_network() {
        let client = mock_client();
        let result = client.fetch("not-a-url").await;
        assert!(matches!(result, Err(ErrorKind::InvalidUrl(..))));

        let result = client.fetch("ftp://example.com/file").await;
        assert!(matches!(result, Err(ErrorKind::InvalidUrl(..))));
    }

    #[tokio::test]
    async fn fetch_after_close_is_rejected() {
        let server = mock_server!(StatusCode::OK);
        let client = mock_client();

        client.close();
        let result = client.fetch(&server.uri()).await;
        assert!(matches!(result, Err(ErrorKind::Closed)));

        // Closing twice is a no-op.
        client.close();
        let result = client.fetch(&server.uri()).await;
        assert!(matches!(result, Err(ErrorKind::Closed)));
    }

    #[tokio::test]
    async fn connection_failure_surfaces_as_network_error() {
        let server = mock_server!(StatusCode::OK);
        let url = server.uri();
        drop(server);

        let client = mock_client();
        let result = client.fetch(&url).await;
        assert!(matches!(result, Err(ErrorKind::NetworkError(..))));
    }

    #[tokio::test]
    async fn canceled_owner_resolves_waiters() {
        let delay = Duration::from_millis(500);
        let server = mock_server!(StatusCode::OK, set_delay(delay));
        let url = server.uri();
        let client = Arc::new(mock_client());

        let owner = tokio::spawn({
            let client = Arc::clone(&client);
            let url = url.clone();
            async move { client.fetch(&url).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let waiter = tokio::spawn({
            let client = Arc::clone(&client);
            let url = url.clone();
            async move { client.fetch(&url).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        owner.abort();
        let outcome = waiter.await.unwrap();
        assert!(matches!(outcome, Err(ErrorKind::Canceled(_))));

        // The identity is free again; a fresh call succeeds.
        let body = client.fetch(&url).await;
        assert!(body.is_ok());
    }

    #[tokio::test]
    async fn builder_accepts_custom_settings() {
        let server = mock_server!(StatusCode::OK, set_body_string("ok"));
        let client = ClientBuilder::builder()
            .max_per_endpoint(1usize)
            .user_agent("coalget-test")
            .timeout(Duration::from_secs(5))
            .build()
            .client()
            .unwrap();

        let body = client.fetch(&server.uri()).await.unwrap();
        assert_eq!(body, "ok");
    }
}
