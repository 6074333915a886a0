//! Single-flight cache for the service description.
//!
//! The state cell moves between `Absent`, `Pending` and `Present`. While a
//! computation is pending every caller awaits the same shared future, so at
//! most one upstream request is in flight.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// A computation resolving to the description, or `None` on failure.
pub type DescriptionFuture = BoxFuture<'static, Option<String>>;

enum DescriptionState {
    Absent,
    Pending(Shared<DescriptionFuture>),
    Present(String),
}

struct CacheInner {
    state: DescriptionState,
    // Bumped on every reset so a computation started before a reload cannot
    // publish into the next load cycle.
    epoch: u64,
}

pub struct ServiceDescriptionCache {
    inner: Mutex<CacheInner>,
}

impl Default for ServiceDescriptionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceDescriptionCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                state: DescriptionState::Absent,
                epoch: 0,
            }),
        }
    }

    /// Creates a cache that already holds `description`.
    #[must_use]
    pub fn with_description(description: impl Into<String>) -> Self {
        let cache = Self::new();
        cache.reset(Some(description.into()));
        cache
    }

    /// Returns the description if it has been computed.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        match &self.lock().state {
            DescriptionState::Present(value) => Some(value.clone()),
            DescriptionState::Absent | DescriptionState::Pending(_) => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.lock().state, DescriptionState::Pending(_))
    }

    /// Returns the cached description, running `compute` if there is none.
    ///
    /// Concurrent callers share one pending computation. A failed computation
    /// leaves the cache absent and yields an empty string. `compute` is called
    /// with the cache locked, after the current cycle has been fixed, so any
    /// state it captures belongs to that cycle.
    pub async fn ensure<F>(&self, compute: F) -> String
    where
        F: FnOnce() -> DescriptionFuture,
    {
        let (pending, epoch) = {
            let mut inner = self.lock();
            let existing = match &inner.state {
                DescriptionState::Present(value) => return value.clone(),
                DescriptionState::Pending(shared) => Some(shared.clone()),
                DescriptionState::Absent => None,
            };
            let pending = existing.unwrap_or_else(|| {
                let shared = compute().shared();
                inner.state = DescriptionState::Pending(shared.clone());
                shared
            });
            (pending, inner.epoch)
        };

        let outcome = pending.await;

        let mut inner = self.lock();
        if inner.epoch == epoch && matches!(inner.state, DescriptionState::Pending(_)) {
            inner.state = outcome
                .clone()
                .map_or(DescriptionState::Absent, DescriptionState::Present);
        }
        drop(inner);
        outcome.unwrap_or_default()
    }

    /// Drops any cached or pending description.
    pub fn invalidate(&self) {
        self.reset(None);
    }

    /// Starts a new cycle, optionally seeded with a known description.
    pub fn reset(&self, seed: Option<String>) {
        let mut inner = self.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.state = seed
            .filter(|value| !value.trim().is_empty())
            .map_or(DescriptionState::Absent, DescriptionState::Present);
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
