//! ranctl-ctrl - the controller process
//!
//! Ties the R-NIB and the southbound protocol together:
//!
//! - `policy`: pluggable admission policy (config flags by default)
//! - `correlation`: single-slot correlated waits with bounded timeout
//! - `timers`: keyed expiry timers and bootstrap pollers
//! - `controller`: shared state and operator-triggered operations
//! - `dispatch`: the inbound message transition table
//! - `session`: TCP listener, framing, per-session tasks
//! - `api`: the in-process operator control surface

pub mod api;
pub mod controller;
pub mod correlation;
pub mod dispatch;
pub mod policy;
pub mod session;
pub mod timers;

pub use api::{ApiError, ControlApi, Node, NodeKind};
pub use controller::{Controller, CtrlError};
pub use correlation::{CorrelationError, CorrelationKey, Correlator, WaitOutcome};
pub use policy::{AdmissionPolicy, FlagPolicy};
pub use session::SouthboundListener;
pub use timers::{spawn_poller, ExpiryKey, ExpiryScheduler};
