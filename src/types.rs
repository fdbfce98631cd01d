use std::sync::Arc;

use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Possible errors when fetching through a [`Client`](crate::Client).
///
/// Every variant is cheaply cloneable, because a single outcome may be
/// fanned out to many callers that coalesced onto the same in-flight
/// request. Transport errors are therefore kept behind an [`Arc`].
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The given string cannot be parsed into an absolute `http(s)` URL
    #[error("cannot parse `{0}` as an http(s) URL: {1}")]
    InvalidUrl(String, String),
    /// Transport-level failure while talking to the endpoint
    #[error("network error while fetching `{0}`: {1}")]
    NetworkError(String, Arc<reqwest::Error>),
    /// The underlying HTTP transport could not be constructed
    #[error("failed to build the HTTP transport: {0}")]
    BuildTransport(Arc<reqwest::Error>),
    /// The call owning an in-flight request was canceled before it
    /// could publish an outcome for its waiters
    #[error("in-flight request for `{0}` was canceled before completing")]
    Canceled(String),
    /// The client was closed; no further requests are accepted
    #[error("client is closed")]
    Closed,
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidUrl(u1, r1), Self::InvalidUrl(u2, r2)) => u1 == u2 && r1 == r2,
            (Self::NetworkError(u1, e1), Self::NetworkError(u2, e2)) => {
                u1 == u2 && e1.to_string() == e2.to_string()
            }
            (Self::BuildTransport(e1), Self::BuildTransport(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::Canceled(u1), Self::Canceled(u2)) => u1 == u2,
            (Self::Closed, Self::Closed) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}
