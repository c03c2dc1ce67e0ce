//! ranctl-common - shared types for the ranctl RAN controller
//!
//! This crate provides the pieces every other ranctl crate needs:
//!
//! - Radio network identifiers (PLMN, ECGI, PCI, CRNTI, IMSI)
//! - Controller configuration loading and validation
//! - Logging initialization and protocol message logging helpers
//! - The shared error type

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{AuthorizedCell, CtrlConfig, PolicyFlags, TimerConfig};
pub use error::Error;
pub use logging::{
    init_logging, init_logging_with_filter, log_xran_message, Direction, HexDump, LogLevel,
};
pub use types::{Crnti, Ecgi, Imsi, LinkId, Pci, Plmn};
