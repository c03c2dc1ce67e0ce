//! Slice entity (stub)
//!
//! Slices are present in the model so the control surface can list
//! them, but slice mutation is not implemented: the store refuses
//! writes with a structured error rather than ignoring them.

use ranctl_common::LinkId;

/// Network slice identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SliceId(pub u32);

/// KPI targets attached to a slice, desired or delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KpiTargets {
    /// Aggregate downlink throughput (kbps)
    pub throughput_dl: u32,
    /// Aggregate uplink throughput (kbps)
    pub throughput_ul: u32,
    /// Packet delay bound (0.1 ms units)
    pub pkt_delay: u32,
}

/// A network slice: a set of Links with KPI targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Slice identifier (primary key)
    pub id: SliceId,
    /// Member links
    pub links: Vec<LinkId>,
    /// Operator-requested targets
    pub desired: KpiTargets,
    /// Currently delivered values
    pub delivered: KpiTargets,
}
