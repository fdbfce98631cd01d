//! Per-endpoint admission control.
//!
//! Each endpoint gets its own counting semaphore, created lazily on
//! first use and retained for the lifetime of the owning
//! [`Client`](crate::Client). The semaphore bounds how many network
//! calls may be in flight against that endpoint at once; everyone else
//! suspends until a permit frees up.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::endpoint::EndpointKey;
use crate::types::{ErrorKind, Result};

/// Table of per-endpoint admission semaphores.
#[derive(Debug)]
pub(crate) struct EndpointLimiters {
    limiters: DashMap<EndpointKey, Arc<Semaphore>>,
    capacity: usize,
}

impl EndpointLimiters {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            limiters: DashMap::new(),
            capacity,
        }
    }

    /// Wait for an admission slot on `key`'s endpoint.
    ///
    /// Suspends the calling task until fewer than `capacity` permits
    /// are outstanding for this endpoint. The returned permit is
    /// released by dropping it, on every exit path.
    pub(crate) async fn acquire(&self, key: &EndpointKey) -> Result<OwnedSemaphorePermit> {
        let semaphore = match self.limiters.get(key) {
            Some(semaphore) => Arc::clone(&semaphore),
            None => self.create_limiter(key),
        };
        log::debug!("waiting for admission to endpoint {key}");
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| ErrorKind::Closed)?;
        log::debug!("admitted to endpoint {key}");
        Ok(permit)
    }

    /// Create the limiter for a previously unseen endpoint.
    ///
    /// Two tasks racing on the same new key both go through the entry
    /// API, so they end up sharing a single semaphore.
    fn create_limiter(&self, key: &EndpointKey) -> Arc<Semaphore> {
        match self.limiters.entry(key.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                log::debug!(
                    "creating limiter for endpoint {key} (capacity {})",
                    self.capacity
                );
                Arc::clone(&entry.insert(Arc::new(Semaphore::new(self.capacity))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn key(url: &str) -> EndpointKey {
        url.parse().unwrap()
    }

    #[tokio::test]
    async fn admissions_are_bounded_by_capacity() {
        let limiters = EndpointLimiters::new(2);
        let endpoint = key("https://example.com");

        let first = limiters.acquire(&endpoint).await.unwrap();
        let _second = limiters.acquire(&endpoint).await.unwrap();

        // Third caller must queue while both permits are held.
        let blocked = timeout(Duration::from_millis(50), limiters.acquire(&endpoint)).await;
        assert!(blocked.is_err());

        // Releasing one permit admits the next waiter.
        drop(first);
        let third = timeout(Duration::from_millis(50), limiters.acquire(&endpoint)).await;
        assert!(third.expect("permit freed").is_ok());
    }

    #[tokio::test]
    async fn endpoints_are_limited_independently() {
        let limiters = EndpointLimiters::new(1);
        let _held = limiters.acquire(&key("https://one.example.com")).await.unwrap();

        let other = timeout(
            Duration::from_millis(50),
            limiters.acquire(&key("https://two.example.com")),
        )
        .await;
        assert!(other.expect("different endpoint").is_ok());
    }

    #[tokio::test]
    async fn concurrent_first_use_creates_one_limiter() {
        let limiters = Arc::new(EndpointLimiters::new(3));
        let endpoint = key("https://example.com");

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let limiters = Arc::clone(&limiters);
                let endpoint = endpoint.clone();
                tokio::spawn(async move {
                    let _permit = limiters.acquire(&endpoint).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(limiters.limiters.len(), 1);
    }

    #[tokio::test]
    async fn same_key_from_different_urls_shares_a_limiter() {
        let limiters = EndpointLimiters::new(1);
        let _held = limiters.acquire(&key("https://example.com/a")).await.unwrap();

        let blocked = timeout(
            Duration::from_millis(50),
            limiters.acquire(&key("https://example.com/b?q=1")),
        )
        .await;
        assert!(blocked.is_err());
    }
}
