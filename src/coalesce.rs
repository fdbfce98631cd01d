//! In-flight request registry for coalescing duplicate GETs.
//!
//! Concurrent callers requesting the identical URL string share one
//! network call: the first caller becomes the *owner* and performs the
//! fetch, everyone else attaches as a *waiter* and receives the
//! owner's outcome. The URL string is used verbatim as the identity,
//! so `https://example.com/a` and `https://example.com/a/` are
//! distinct requests even though they may address the same resource.
//!
//! An entry lives exactly as long as its request is in flight. It is
//! evicted the moment the outcome is published, so a later call for
//! the same URL triggers a fresh network call instead of reusing a
//! stale result.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::types::{ErrorKind, Result};

/// Outcome shared between the owner of a fetch and its waiters.
pub(crate) type Outcome = Result<String>;

/// The single-assignment result slot of one in-flight request.
///
/// The sender side lives in the registry; each waiter holds a receiver.
#[derive(Debug)]
struct PendingRequest {
    slot: watch::Sender<Option<Outcome>>,
}

/// Registry of in-flight requests, keyed by the verbatim URL string.
#[derive(Debug, Default)]
pub(crate) struct InFlightRegistry {
    pending: Arc<DashMap<String, PendingRequest>>,
}

/// What a caller got back from [`InFlightRegistry::join_or_create`].
pub(crate) enum Join {
    /// No request for this URL was in flight. The caller must perform
    /// the fetch and publish the outcome through the slot.
    Owner(OwnerSlot),
    /// Another call already owns this URL. Await its outcome via
    /// [`await_outcome`]; do not perform a network call.
    Waiter(watch::Receiver<Option<Outcome>>),
}

impl InFlightRegistry {
    /// Atomically look up `url` and either attach to the existing
    /// in-flight request or register a new one.
    ///
    /// The check-and-create goes through the map's entry API, so under
    /// any interleaving exactly one caller becomes the owner for a
    /// given identity.
    pub(crate) fn join_or_create(&self, url: &str) -> Join {
        match self.pending.entry(url.to_owned()) {
            Entry::Occupied(entry) => Join::Waiter(entry.get().slot.subscribe()),
            Entry::Vacant(entry) => {
                let (slot, _) = watch::channel(None);
                entry.insert(PendingRequest { slot });
                Join::Owner(OwnerSlot {
                    pending: Arc::clone(&self.pending),
                    url: url.to_owned(),
                    resolved: false,
                })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// The owner's handle on its registry entry.
///
/// Publishing an outcome evicts the entry first and then resolves the
/// slot, so every waiter that managed to subscribe observes the
/// outcome, while later callers find no entry and start fresh.
///
/// If the owning task is canceled before resolving, `Drop` publishes a
/// [`ErrorKind::Canceled`] failure instead. Waiters never wait forever
/// and the identity is never left poisoned in the registry.
#[derive(Debug)]
pub(crate) struct OwnerSlot {
    pending: Arc<DashMap<String, PendingRequest>>,
    url: String,
    resolved: bool,
}

impl OwnerSlot {
    /// Publish the outcome to all waiters and evict the entry.
    pub(crate) fn resolve(mut self, outcome: Outcome) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Outcome) {
        self.resolved = true;
        if let Some((_, request)) = self.pending.remove(&self.url) {
            request.slot.send_replace(Some(outcome));
        }
    }
}

impl Drop for OwnerSlot {
    fn drop(&mut self) {
        if !self.resolved {
            self.publish(Err(ErrorKind::Canceled(self.url.clone())));
        }
    }
}

/// Await the outcome published by the owner of `url`'s entry.
pub(crate) async fn await_outcome(
    mut rx: watch::Receiver<Option<Outcome>>,
    url: &str,
) -> Outcome {
    loop {
        if let Some(outcome) = rx.borrow_and_update().as_ref() {
            return outcome.clone();
        }
        if rx.changed().await.is_err() {
            // Sender gone without a value. Cannot happen while the
            // owner publishes from `Drop`, but don't hang if it does.
            return Err(ErrorKind::Canceled(url.to_owned()));
        }
    }
}
