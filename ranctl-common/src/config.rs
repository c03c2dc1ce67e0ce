//! Controller configuration
//!
//! YAML-backed configuration for the ranctl controller: the listening
//! endpoint, the set of cells authorized to connect, polling/expiry
//! timer settings, and the static admission policy flags.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::Ecgi;

/// One cell pre-authorized to connect, keyed by its transport address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedCell {
    /// Transport address the cell will connect from
    pub address: IpAddr,
    /// The cell identity bound to that address
    pub ecgi: Ecgi,
}

/// Polling intervals and expiry grace periods, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Interval between cell-configuration-request retries until a
    /// configuration report is stored
    #[serde(default = "default_config_request_interval_ms")]
    pub config_request_interval_ms: u64,
    /// Interval between capability-enquiry retries per UE until its
    /// capability is known
    #[serde(default = "default_enquiry_interval_ms")]
    pub capability_enquiry_interval_ms: u64,
    /// Interval between L2 measurement config retries per cell
    #[serde(default = "default_meas_interval_ms")]
    pub l2_meas_interval_ms: u64,
    /// Grace period before an IDLE UE is removed
    #[serde(default = "default_grace_ms")]
    pub ue_idle_grace_ms: u64,
    /// Grace period before an unrefreshed non-serving link is removed
    #[serde(default = "default_grace_ms")]
    pub link_expiry_ms: u64,
    /// Bound on a correlated request's wait for its reply
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_config_request_interval_ms() -> u64 {
    5_000
}

fn default_enquiry_interval_ms() -> u64 {
    5_000
}

fn default_meas_interval_ms() -> u64 {
    10_000
}

fn default_grace_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            config_request_interval_ms: default_config_request_interval_ms(),
            capability_enquiry_interval_ms: default_enquiry_interval_ms(),
            l2_meas_interval_ms: default_meas_interval_ms(),
            ue_idle_grace_ms: default_grace_ms(),
            link_expiry_ms: default_grace_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Static accept/reject flags for admission-shaped requests.
///
/// These are a stand-in for real admission logic; the dispatch engine
/// consumes them through a policy trait so they can be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFlags {
    /// Whether UE admission requests are accepted
    #[serde(default = "default_true")]
    pub admit_ue: bool,
    /// Whether bearer admission requests are accepted
    #[serde(default = "default_true")]
    pub admit_bearer: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PolicyFlags {
    fn default() -> Self {
        Self {
            admit_ue: true,
            admit_bearer: true,
        }
    }
}

/// Top-level controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtrlConfig {
    /// Address the southbound listener binds to
    pub bind_address: IpAddr,
    /// Port the southbound listener binds to
    pub bind_port: u16,
    /// Cells authorized to connect
    #[serde(default)]
    pub cells: Vec<AuthorizedCell>,
    /// Timer settings
    #[serde(default)]
    pub timers: TimerConfig,
    /// Admission policy flags
    #[serde(default)]
    pub policy: PolicyFlags,
}

impl CtrlConfig {
    /// Loads a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str_yaml(&text)
    }

    /// Parses a configuration from a YAML string.
    pub fn from_str_yaml(text: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), Error> {
        if self.bind_port == 0 {
            return Err(Error::Config("bind_port must be non-zero".into()));
        }
        let mut seen_addr: HashMap<IpAddr, Ecgi> = HashMap::new();
        for cell in &self.cells {
            if let Some(prev) = seen_addr.insert(cell.address, cell.ecgi) {
                return Err(Error::Config(format!(
                    "address {} authorized for both {} and {}",
                    cell.address, prev, cell.ecgi
                )));
            }
        }
        if self.timers.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// Resolves the cell identity authorized for a transport address.
    pub fn cell_for_address(&self, address: IpAddr) -> Option<Ecgi> {
        self.cells
            .iter()
            .find(|c| c.address == address)
            .map(|c| c.ecgi)
    }
}
