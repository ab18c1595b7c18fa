//! Debounce Gate Module
//!
//! Collapses bursts of calls sharing a key into a single delayed invocation.
//! The newest call for a key always wins; older ones are cancelled before
//! their action runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Pending Timer ==
/// A scheduled call that has not fired yet.
#[derive(Debug)]
struct PendingTimer {
    /// Identifies which `schedule` call owns the registration
    generation: u64,
    /// Wakes the owning call when a newer one replaces it
    cancel: oneshot::Sender<()>,
}

// == Debounce Gate ==
/// Per-key debouncer.
///
/// At most one timer is pending per key. The map lock is never held across an
/// await point.
#[derive(Debug, Default)]
pub struct DebounceGate {
    pending: Mutex<HashMap<String, PendingTimer>>,
    next_generation: AtomicU64,
}

impl DebounceGate {
    pub fn new() -> Self {
        Self::default()
    }

    // == Schedule ==
    /// Waits `delay`, then runs `action` unless a newer call for `key` arrived
    /// in the meantime.
    ///
    /// A superseded call resolves to [`CacheError::Superseded`] as soon as it is
    /// replaced, and its action is never invoked. Dropping the returned future
    /// withdraws the registration.
    pub async fn schedule<F, Fut, T>(&self, key: &str, delay: Duration, action: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let previous = self.lock().insert(
            key.to_string(),
            PendingTimer {
                generation,
                cancel: cancel_tx,
            },
        );
        if let Some(previous) = previous {
            debug!(key, generation = previous.generation, "Debounced call superseded");
            // The receiver may already be gone if that caller was dropped
            let _ = previous.cancel.send(());
        }

        let registration = Registration {
            gate: self,
            key,
            generation,
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_rx => return Err(CacheError::Superseded(key.to_string())),
        }

        // A newer call may have replaced us between the timer firing and here
        if !registration.release() {
            return Err(CacheError::Superseded(key.to_string()));
        }

        debug!(key, generation, "Debounce window elapsed, running action");
        Ok(action().await)
    }

    // == Pending Count ==
    /// Number of keys with a timer currently waiting.
    pub fn pending_len(&self) -> usize {
        self.lock().len()
    }

    /// Whether `key` has a timer currently waiting.
    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Removes the registration for `key` if `generation` still owns it.
    fn take_if_current(&self, key: &str, generation: u64) -> bool {
        let mut pending = self.lock();
        match pending.get(key) {
            Some(timer) if timer.generation == generation => {
                pending.remove(key);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingTimer>> {
        // Critical sections never panic midway, so a poisoned map is still consistent
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears a call's registration when it fires or is dropped mid-wait.
struct Registration<'a> {
    gate: &'a DebounceGate,
    key: &'a str,
    generation: u64,
}

impl Registration<'_> {
    fn release(self) -> bool {
        self.gate.take_if_current(self.key, self.generation)
        // Drop runs afterwards and finds nothing left to remove
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.gate.take_if_current(self.key, self.generation);
    }
}
