//! Cell entity

use std::collections::HashMap;

use ranctl_common::Ecgi;
use ranctl_xran::{CellConfig, RrmConfig};

/// A base station under this controller's management.
///
/// The ECGI is immutable once the record exists; everything else is
/// updated in place as reports arrive. A Cell record is created when
/// an authorized session is accepted and removed when the session
/// drops or the operator removes it. The store does not cascade that
/// removal to Links; the controller removes them first.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Global cell identity (primary key)
    pub ecgi: Ecgi,
    /// Radio configuration from the most recent configuration report
    pub config: Option<CellConfig>,
    /// Desired radio-resource-management parameters
    pub rrm: RrmConfig,
    /// Protocol version from the most recent report's envelope
    pub version: Option<String>,
    /// Aggregate resource and QoS-class statistics
    pub stats: CellStats,
}

impl Cell {
    /// Creates an empty Cell record for a newly-accepted session.
    pub fn new(ecgi: Ecgi) -> Self {
        Self {
            ecgi,
            config: None,
            rrm: RrmConfig::default(),
            version: None,
            stats: CellStats::default(),
        }
    }

    /// True once a configuration report has been stored.
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }
}

/// Per-cell resource usage and per-QCI admission counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellStats {
    /// Latest downlink PRB usage percentage across the cell
    pub prb_usage_dl: u8,
    /// Latest uplink PRB usage percentage across the cell
    pub prb_usage_ul: u8,
    /// Bearers admitted per QoS class identifier
    pub qci_bearers: HashMap<u8, u64>,
}

impl CellStats {
    /// Records an admitted bearer against its QoS class.
    pub fn count_bearer(&mut self, qci: u8) {
        *self.qci_bearers.entry(qci).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ranctl_common::Plmn;

    #[test]
    fn test_new_cell_is_unconfigured() {
        let cell = Cell::new(Ecgi::new(Plmn::new(315, 10, false), 1));
        assert!(!cell.is_configured());
        assert!(cell.version.is_none());
    }

    #[test]
    fn test_qci_bearer_counting() {
        let mut stats = CellStats::default();
        stats.count_bearer(9);
        stats.count_bearer(9);
        stats.count_bearer(1);
        assert_eq!(stats.qci_bearers.get(&9), Some(&2));
        assert_eq!(stats.qci_bearers.get(&1), Some(&1));
    }
}
