//! Request correlation
//!
//! The wire protocol is fire-and-forget; operations that expect a
//! reply (handover, RRM reconfiguration, secondary-cell add) register
//! a single-slot wait handle under a key before sending. The dispatch
//! engine posts the outcome into that slot when the matching reply
//! arrives; the caller's wait is bounded by the configured timeout.
//!
//! At most one outstanding wait per key: registering a second wait
//! before the first resolves is a caller error, not an overwrite.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use ranctl_common::{Crnti, Ecgi};

/// Key a correlated wait is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// Keyed by the UE's radio identity at a cell (handover, scell
    /// add, capability enquiry)
    Ue(Ecgi, Crnti),
    /// Keyed by the cell itself (RRM reconfiguration)
    Cell(Ecgi),
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Ue(ecgi, crnti) => write!(f, "ue({ecgi},{crnti})"),
            CorrelationKey::Cell(ecgi) => write!(f, "cell({ecgi})"),
        }
    }
}

/// Errors from wait registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// A wait is already outstanding under this key
    #[error("a correlated wait is already pending for {0}")]
    AlreadyPending(CorrelationKey),
}

/// How a correlated wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The matching reply arrived; its outcome string
    Reply(String),
    /// No reply within the bound; the registration was removed
    NoResponse,
    /// The wait was cancelled (for example the cell was removed)
    Cancelled,
}

/// Registry of single-slot correlated waits.
pub struct Correlator {
    slots: Mutex<HashMap<CorrelationKey, oneshot::Sender<String>>>,
    timeout: Duration,
}

impl Correlator {
    /// Creates a correlator with the given reply-wait bound.
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CorrelationKey, oneshot::Sender<String>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a wait under a key. Must be called before the request
    /// is sent so the reply cannot race the registration.
    pub fn register(
        &self,
        key: CorrelationKey,
    ) -> Result<oneshot::Receiver<String>, CorrelationError> {
        let mut slots = self.lock();
        if slots.contains_key(&key) {
            return Err(CorrelationError::AlreadyPending(key));
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(key, tx);
        Ok(rx)
    }

    /// True if a wait is outstanding under the key.
    pub fn is_pending(&self, key: CorrelationKey) -> bool {
        self.lock().contains_key(&key)
    }

    /// Posts an outcome into the pending wait for a key, removing the
    /// registration. Non-blocking: with no pending wait the reply is
    /// logged and dropped (a late reply after a timeout lands here).
    pub fn complete(&self, key: CorrelationKey, outcome: impl Into<String>) -> bool {
        let Some(tx) = self.lock().remove(&key) else {
            debug!(%key, "reply with no pending wait, dropping");
            return false;
        };
        if tx.send(outcome.into()).is_err() {
            // Receiver gave up between timeout and deregistration.
            debug!(%key, "pending wait abandoned before completion");
            return false;
        }
        true
    }

    /// Drops the pending wait for a key, if any. The waiter observes
    /// [`WaitOutcome::Cancelled`].
    pub fn cancel(&self, key: CorrelationKey) -> bool {
        self.lock().remove(&key).is_some()
    }

    /// Drops every pending wait keyed to the given cell, including
    /// UE-keyed waits at that cell. Used on administrative cell
    /// removal.
    pub fn cancel_cell(&self, ecgi: Ecgi) {
        self.lock().retain(|key, _| match key {
            CorrelationKey::Ue(e, _) | CorrelationKey::Cell(e) => *e != ecgi,
        });
    }

    /// Waits for the outcome registered under `key`, bounded by the
    /// configured timeout. On timeout the registration is removed so a
    /// late reply is dropped instead of corrupting a future wait.
    pub async fn wait(&self, key: CorrelationKey, rx: oneshot::Receiver<String>) -> WaitOutcome {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(outcome)) => WaitOutcome::Reply(outcome),
            Ok(Err(_)) => WaitOutcome::Cancelled,
            Err(_) => {
                warn!(%key, "no reply within {:?}", self.timeout);
                self.lock().remove(&key);
                WaitOutcome::NoResponse
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranctl_common::Plmn;

    fn ecgi(eci: u32) -> Ecgi {
        Ecgi::new(Plmn::new(315, 10, false), eci)
    }

    #[tokio::test]
    async fn test_register_complete_wait() {
        let correlator = Correlator::new(Duration::from_secs(1));
        let key = CorrelationKey::Ue(ecgi(1), Crnti(7));
        let rx = correlator.register(key).unwrap();
        assert!(correlator.complete(key, "Hand Over Completed"));
        assert_eq!(
            correlator.wait(key, rx).await,
            WaitOutcome::Reply("Hand Over Completed".into())
        );
        assert!(!correlator.is_pending(key));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let correlator = Correlator::new(Duration::from_secs(1));
        let key = CorrelationKey::Cell(ecgi(1));
        let _rx = correlator.register(key).unwrap();
        assert_eq!(
            correlator.register(key).map(|_| ()),
            Err(CorrelationError::AlreadyPending(key))
        );
        // A different key is unaffected.
        assert!(correlator.register(CorrelationKey::Cell(ecgi(2))).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_deregisters_key() {
        let correlator = Correlator::new(Duration::from_millis(100));
        let key = CorrelationKey::Ue(ecgi(1), Crnti(7));
        let rx = correlator.register(key).unwrap();
        assert_eq!(correlator.wait(key, rx).await, WaitOutcome::NoResponse);
        assert!(!correlator.is_pending(key));
        // A late reply is dropped, and the key can be reused.
        assert!(!correlator.complete(key, "late"));
        assert!(correlator.register(key).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_cell_drops_ue_waits() {
        let correlator = Correlator::new(Duration::from_secs(1));
        let at_c1 = CorrelationKey::Ue(ecgi(1), Crnti(7));
        let at_c2 = CorrelationKey::Cell(ecgi(2));
        let rx = correlator.register(at_c1).unwrap();
        let _rx2 = correlator.register(at_c2).unwrap();

        correlator.cancel_cell(ecgi(1));
        assert!(!correlator.is_pending(at_c1));
        assert!(correlator.is_pending(at_c2));
        assert_eq!(correlator.wait(at_c1, rx).await, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_complete_without_wait_is_dropped() {
        let correlator = Correlator::new(Duration::from_secs(1));
        assert!(!correlator.complete(CorrelationKey::Cell(ecgi(1)), "reply"));
    }
}
