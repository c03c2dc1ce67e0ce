//! Entity expiry and periodic polling
//!
//! Soft state in the R-NIB (IDLE UEs, non-serving Links) is garbage
//! collected by keyed single-shot timers. Arming a key that already
//! has a live timer aborts and replaces it, so there is never more
//! than one live timer per key and a refresh pushes expiry out.
//!
//! Expiry actions re-check live state before removing anything; the
//! entity may have been refreshed between the timer firing and the
//! action running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use ranctl_common::{Imsi, LinkId};

/// Key identifying one expiry timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryKey {
    /// IDLE grace period for a UE
    UeIdle(Imsi),
    /// Refresh window for a non-serving Link
    Link(LinkId),
}

struct Slot {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Keyed single-shot timers with arm/rearm semantics.
#[derive(Default)]
pub struct ExpiryScheduler {
    timers: Mutex<HashMap<ExpiryKey, Slot>>,
    generation: AtomicU64,
}

impl ExpiryScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ExpiryKey, Slot>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms (or rearms) the timer for a key. Any previously armed
    /// timer for the same key is aborted first.
    pub fn arm<F>(self: &Arc<Self>, key: ExpiryKey, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
            // Self-removal, but only of this timer's own slot: the
            // key may have been rearmed while the action ran.
            let mut timers = scheduler.lock();
            if timers.get(&key).is_some_and(|s| s.generation == generation) {
                timers.remove(&key);
            }
        });
        let mut timers = self.lock();
        if let Some(old) = timers.insert(key, Slot { generation, handle }) {
            old.handle.abort();
        }
    }

    /// Cancels the timer for a key, if armed.
    pub fn cancel(&self, key: ExpiryKey) -> bool {
        match self.lock().remove(&key) {
            Some(slot) => {
                slot.handle.abort();
                true
            }
            None => false,
        }
    }

    /// True if a timer is currently armed for the key.
    pub fn is_armed(&self, key: ExpiryKey) -> bool {
        self.lock().contains_key(&key)
    }

    /// Aborts every armed timer. Called at teardown.
    pub fn shutdown(&self) {
        for (_, slot) in self.lock().drain() {
            slot.handle.abort();
        }
    }
}

/// Spawns a periodic bootstrap poller: runs `tick` every `interval`
/// until `done` observes the expected state, then self-cancels.
///
/// The predicate is checked before each tick, so a poller whose state
/// is already satisfied sends nothing.
pub fn spawn_poller<P, F, Fut>(interval: Duration, mut done: P, mut tick: F) -> JoinHandle<()>
where
    P: FnMut() -> bool + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            if done() {
                break;
            }
            tick().await;
            tokio::time::sleep(interval).await;
        }
    })
}
