//! Admission policy
//!
//! Admission-shaped requests (UE attach, bearer setup) are answered by
//! a policy. The default implementation answers from static config
//! flags; real admission logic can replace it behind the same trait.

use ranctl_common::{Crnti, Ecgi, PolicyFlags};
use ranctl_xran::{AdmissionStatus, Bearer};

/// Decides admission-shaped requests.
pub trait AdmissionPolicy: Send + Sync {
    /// Verdict for a UE admission request.
    fn admit_ue(&self, ecgi: Ecgi, crnti: Crnti) -> AdmissionStatus;

    /// Verdict for a bearer admission request.
    fn admit_bearers(&self, ecgi: Ecgi, crnti: Crnti, bearers: &[Bearer]) -> AdmissionStatus;
}

/// Policy driven by the static accept/reject configuration flags.
#[derive(Debug, Clone, Copy)]
pub struct FlagPolicy {
    flags: PolicyFlags,
}

impl FlagPolicy {
    /// Creates a policy from the configured flags.
    pub fn new(flags: PolicyFlags) -> Self {
        Self { flags }
    }
}

impl AdmissionPolicy for FlagPolicy {
    fn admit_ue(&self, _ecgi: Ecgi, _crnti: Crnti) -> AdmissionStatus {
        if self.flags.admit_ue {
            AdmissionStatus::Success
        } else {
            AdmissionStatus::Failure
        }
    }

    fn admit_bearers(&self, _ecgi: Ecgi, _crnti: Crnti, _bearers: &[Bearer]) -> AdmissionStatus {
        if self.flags.admit_bearer {
            AdmissionStatus::Success
        } else {
            AdmissionStatus::Failure
        }
    }
}
