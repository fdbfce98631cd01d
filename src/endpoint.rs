//! Endpoint extraction from request URLs.
//!
//! Admission control operates per endpoint, i.e. per `host:port` pair,
//! independent of path, query, or fragment. [`EndpointKey`] derives that
//! pair from a URL, defaulting the port from the scheme when none is
//! given (443 for `https`, 80 for `http`).

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::types::{ErrorKind, Result};

/// A type-safe `host:port` identifier for the server a URL points at.
///
/// All valid URLs sharing host and effective port (explicit or
/// scheme-default) map to the same key.
///
/// # Examples
///
/// ```
/// use coalget::EndpointKey;
///
/// let key: EndpointKey = "https://api.github.com/repos/user/repo".parse().unwrap();
/// assert_eq!(key.as_str(), "api.github.com:443");
///
/// let key: EndpointKey = "http://localhost:8080/health".parse().unwrap();
/// assert_eq!(key.as_str(), "localhost:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey(String);

impl EndpointKey {
    /// Get the `host:port` pair as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parse `raw` as an absolute `http` or `https` URL.
///
/// Anything else (relative reference, unsupported scheme, missing host)
/// fails with [`ErrorKind::InvalidUrl`].
pub(crate) fn parse_http_url(raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|e| ErrorKind::InvalidUrl(raw.to_owned(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ErrorKind::InvalidUrl(
                raw.to_owned(),
                format!("unsupported scheme `{other}`"),
            ));
        }
    }
    if url.host_str().is_none() {
        return Err(ErrorKind::InvalidUrl(
            raw.to_owned(),
            "missing host".to_owned(),
        ));
    }
    Ok(url)
}

impl TryFrom<&Url> for EndpointKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| ErrorKind::InvalidUrl(url.to_string(), "missing host".to_owned()))?;
        // `http` and `https` both carry a known default, so this only
        // fails for exotic schemes.
        let port = url.port_or_known_default().ok_or_else(|| {
            ErrorKind::InvalidUrl(url.to_string(), "no port and no scheme default".to_owned())
        })?;
        Ok(Self(format!("{host}:{port}")))
    }
}

impl FromStr for EndpointKey {
    type Err = ErrorKind;

    fn from_str(raw: &str) -> Result<Self> {
        let url = parse_http_url(raw)?;
        Self::try_from(&url)
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
