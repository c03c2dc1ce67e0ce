//! UE entity

use ranctl_common::{Crnti, Imsi};

/// Activity state of a UE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeState {
    /// Attached and reachable through its serving cell
    Active,
    /// Released by its cell; removed after the idle grace period
    Idle,
}

/// Display tag for a UE state.
pub fn ue_state_tag(state: UeState) -> &'static str {
    match state {
        UeState::Active => "ACTIVE",
        UeState::Idle => "IDLE",
    }
}

/// A mobile device known to the controller.
///
/// The IMSI is the primary key. The CRNTI is the radio identity at the
/// current serving cell and is volatile: it is rebound on handover and
/// on reconfiguration without creating a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ue {
    /// Stable identity (primary key)
    pub imsi: Imsi,
    /// Radio identity at the current serving cell
    pub crnti: Crnti,
    /// Activity state
    pub state: UeState,
    /// UE category from a capability report, once known
    pub ue_category: Option<u8>,
    /// L2 measurement reporting interval pushed to the serving cell,
    /// once configured
    pub meas_interval_ms: Option<u32>,
}

impl Ue {
    /// Creates an active UE record from its first context update.
    pub fn new(imsi: Imsi, crnti: Crnti) -> Self {
        Self {
            imsi,
            crnti,
            state: UeState::Active,
            ue_category: None,
            meas_interval_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ue_is_active() {
        let ue = Ue::new(Imsi(1001), Crnti(0x2a));
        assert_eq!(ue.state, UeState::Active);
        assert!(ue.ue_category.is_none());
    }

    #[test]
    fn test_state_tags() {
        assert_eq!(ue_state_tag(UeState::Active), "ACTIVE");
        assert_eq!(ue_state_tag(UeState::Idle), "IDLE");
    }
}
