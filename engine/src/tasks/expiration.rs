// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Cancellation / timeout tokens for aggregate awaiters.
//!
//! An [`Expiration`] is either eternal (never expires), timed (trips when
//! its deadline passes), or manually tripped through an
//! [`ExpirationSource`]. Subscribers are one-shot; subscribing to an
//! already-tripped expiration invokes the callback synchronously.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

type TripCallback = Box<dyn FnOnce() + Send>;

pub(crate) struct ExpirationState {
    tripped: AtomicBool,
    subscribers: Mutex<Vec<(u64, TripCallback)>>,
    next_id: AtomicU64,
}

impl ExpirationState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            tripped: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        })
    }

    pub(crate) fn trip(&self) {
        let callbacks = {
            let mut subscribers = lock(&self.subscribers);
            if self.tripped.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *subscribers)
        };

        // Invoked outside the lock: a callback may subscribe/unsubscribe.
        for (_, callback) in callbacks {
            callback();
        }
    }

    fn is_tripped(&self) -> bool { self.tripped.load(Ordering::Acquire) }
}

impl std::fmt::Debug for ExpirationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirationState")
            .field("tripped", &self.is_tripped())
            .finish()
    }
}

/// Cancellation/timeout token. Cloning shares the underlying state.
#[derive(Clone, Debug)]
pub struct Expiration {
    state: Option<Arc<ExpirationState>>,
}

impl Expiration {
    /// An expiration that never trips.
    #[must_use]
    pub fn eternal() -> Self { Self { state: None } }

    /// Trips once `timeout` elapses (requires an installed timer manager;
    /// without one a warning is logged and the token trips immediately,
    /// which is the conservative behavior for a timeout).
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        let state = ExpirationState::new();
        match crate::tasks::timer::timer_manager() {
            Some(manager) => {
                manager.register_trip(Instant::now() + timeout, &state);
            }
            None => {
                tracing::warn!(
                    target: "task",
                    "timed expiration requested without a timer manager"
                );
                state.trip();
            }
        }
        Self { state: Some(state) }
    }

    #[must_use]
    pub fn is_eternal(&self) -> bool { self.state.is_none() }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state.as_ref().is_some_and(|state| state.is_tripped())
    }

    /// Registers a one-shot callback; invoked synchronously when already
    /// tripped. The returned subscription unregisters on drop. Subscribing
    /// to an eternal expiration is a no-op.
    #[must_use]
    pub fn subscribe(
        &self,
        callback: impl FnOnce() + Send + 'static,
    ) -> ExpirationSubscription {
        let Some(state) = &self.state else {
            return ExpirationSubscription { entry: None };
        };

        let mut callback = Some(Box::new(callback) as TripCallback);
        let registered = {
            let mut subscribers = lock(&state.subscribers);
            if state.is_tripped() {
                None
            } else if let Some(callback) = callback.take() {
                let id = state.next_id.fetch_add(1, Ordering::Relaxed);
                subscribers.push((id, callback));
                Some(id)
            } else {
                None
            }
        };

        match registered {
            Some(id) => ExpirationSubscription {
                entry: Some((Arc::downgrade(state), id)),
            },
            None => {
                // Already tripped: fire synchronously, outside the lock.
                if let Some(callback) = callback {
                    callback();
                }
                ExpirationSubscription { entry: None }
            }
        }
    }
}

/// RAII handle that unregisters its callback on drop.
#[derive(Debug, Default)]
pub struct ExpirationSubscription {
    entry: Option<(Weak<ExpirationState>, u64)>,
}

impl Drop for ExpirationSubscription {
    fn drop(&mut self) {
        if let Some((state, id)) = self.entry.take()
            && let Some(state) = state.upgrade()
        {
            lock(&state.subscribers).retain(|(entry_id, _)| *entry_id != id);
        }
    }
}

/// Producer side for manual cancellation.
#[derive(Debug)]
pub struct ExpirationSource {
    state: Arc<ExpirationState>,
}

impl ExpirationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ExpirationState::new(),
        }
    }

    #[must_use]
    pub fn expiration(&self) -> Expiration {
        Expiration {
            state: Some(self.state.clone()),
        }
    }

    /// Trips the token; subscribers run synchronously on this thread.
    pub fn trip(&self) { self.state.trip(); }
}

impl Default for ExpirationSource {
    fn default() -> Self { Self::new() }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn eternal_never_expires() {
        let expiration = Expiration::eternal();
        assert!(expiration.is_eternal());
        assert!(!expiration.is_expired());
    }

    #[test]
    fn manual_trip_invokes_subscribers_synchronously() {
        let source = ExpirationSource::new();
        let expiration = source.expiration();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _subscription = expiration.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!expiration.is_expired());
        source.trip();
        assert!(expiration.is_expired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Trip is idempotent.
        source.trip();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscribing_after_trip_fires_synchronously() {
        let source = ExpirationSource::new();
        source.trip();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _subscription = source.expiration().subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_subscription_never_fires() {
        let source = ExpirationSource::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let subscription = source.expiration().subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(subscription);

        source.trip();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
