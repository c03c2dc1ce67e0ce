//! Inbound message dispatch
//!
//! The transition table for messages received from cells. There is no
//! global connection state; state lives in the entities (UE activity,
//! Link type). Every handler follows the same edge-case policy: a
//! report referencing an unknown cell or an unresolvable link/UE is
//! dropped with a diagnostic, and the dispatch loop never fails.
//!
//! Messages are handled one at a time per session in arrival order;
//! nothing here blocks on a reply. Replies only complete wait slots
//! that callers registered before sending.

use tracing::{debug, info, warn};

use ranctl_common::{Crnti, Ecgi, Imsi, LinkId, Pci};
use ranctl_rnib::{Link, LinkType, Ue, UeState};
use ranctl_xran::{AdmissionStatus, Bearer, CellConfig, XranBody, XranPdu};

use crate::controller::Controller;
use crate::correlation::CorrelationKey;
use crate::timers::ExpiryKey;

/// Outcome strings posted into correlated waits.
pub const HO_COMPLETED: &str = "Hand Over Completed";
/// Posted when the source cell reports a failed handover.
pub const HO_FAILED: &str = "Hand Over Failed";
/// Posted on a successful secondary-carrier add.
pub const SCELL_ADD_SUCCESS: &str = "Scell Add Success";
/// Posted on a refused secondary-carrier add.
pub const SCELL_ADD_FAILURE: &str = "Scell Add Failure";
/// Posted on an accepted RRM reconfiguration.
pub const RRM_SUCCESS: &str = "RRM Config Success";
/// Posted on a refused RRM reconfiguration.
pub const RRM_FAILURE: &str = "RRM Config Failure";

impl Controller {
    /// Handles one decoded inbound message from the session bound to
    /// `session_ecgi`.
    pub async fn handle(&self, session_ecgi: Ecgi, pdu: XranPdu) {
        let version = pdu.version().to_owned();
        match pdu.into_body() {
            XranBody::CellConfigReport { ecgi, config } => {
                self.on_cell_config_report(ecgi, config, version);
            }
            XranBody::UeAdmissionRequest { ecgi, crnti } => {
                self.on_ue_admission_request(ecgi, crnti).await;
            }
            XranBody::UeContextUpdate { ecgi, crnti, imsi } => {
                self.on_ue_context_update(ecgi, crnti, Imsi(imsi));
            }
            XranBody::UeReconfigInd {
                ecgi,
                crnti_old,
                crnti_new,
            } => {
                self.on_ue_reconfig(ecgi, crnti_old, crnti_new);
            }
            XranBody::UeReleaseInd { ecgi, crnti, cause } => {
                self.on_ue_release(ecgi, crnti, cause);
            }
            XranBody::BearerAdmissionRequest {
                ecgi,
                crnti,
                bearers,
            } => {
                self.on_bearer_admission_request(ecgi, crnti, bearers).await;
            }
            XranBody::BearerReleaseInd {
                ecgi,
                crnti,
                erab_ids,
            } => {
                self.on_bearer_release(ecgi, crnti, &erab_ids);
            }
            XranBody::HoFailure {
                ecgi_source,
                crnti,
                cause,
            } => {
                debug!(%ecgi_source, %crnti, cause, "handover failed");
                self.correlator()
                    .complete(CorrelationKey::Ue(ecgi_source, crnti), HO_FAILED);
            }
            XranBody::HoComplete {
                ecgi_source,
                ecgi_target,
                crnti,
            } => {
                self.on_ho_complete(ecgi_source, ecgi_target, crnti);
            }
            XranBody::RxSigMeasReport {
                pci,
                crnti,
                reports,
            } => {
                self.with_report_ue(pci, crnti, |ctrl, _cell, imsi| {
                    for rep in &reports {
                        ctrl.on_measured_cell(rep.pci, imsi, |link| {
                            link.quality.rsrp = Some(rep.rsrp);
                            link.quality.rsrq = Some(rep.rsrq);
                        });
                    }
                });
            }
            XranBody::RadioMeasReportPerUe {
                pci,
                crnti,
                reports,
            } => {
                self.with_report_ue(pci, crnti, |ctrl, _cell, imsi| {
                    for rep in &reports {
                        ctrl.on_measured_cell(rep.pci, imsi, |link| {
                            link.quality.cqi_hist = rep.cqi_hist.clone();
                        });
                    }
                });
            }
            XranBody::SchedMeasReportPerUe {
                pci,
                crnti,
                reports,
            } => {
                self.with_report_ue(pci, crnti, |ctrl, _cell, imsi| {
                    for rep in &reports {
                        ctrl.on_measured_cell(rep.pci, imsi, |link| {
                            link.prb_usage.dl = rep.prb_usage_dl;
                            link.prb_usage.ul = rep.prb_usage_ul;
                            link.quality.mcs_dl = Some(rep.mcs_dl);
                            link.quality.mcs_ul = Some(rep.mcs_ul);
                        });
                    }
                });
            }
            XranBody::PdcpMeasReportPerUe {
                pci,
                crnti,
                throughput_dl,
                throughput_ul,
                pkt_delay_dl,
            } => {
                self.with_report_ue(pci, crnti, |ctrl, cell, imsi| {
                    ctrl.on_measured_link(LinkId::new(cell, imsi), |link| {
                        link.pdcp.throughput_dl = throughput_dl;
                        link.pdcp.throughput_ul = throughput_ul;
                        link.pdcp.pkt_delay_dl = pkt_delay_dl;
                    });
                });
            }
            XranBody::RrmConfigStatus { ecgi, status } => {
                let outcome = match status {
                    AdmissionStatus::Success => RRM_SUCCESS,
                    AdmissionStatus::Failure => RRM_FAILURE,
                };
                self.correlator()
                    .complete(CorrelationKey::Cell(ecgi), outcome);
            }
            XranBody::ScellAddStatus {
                ecgi,
                crnti,
                status,
            } => {
                self.on_scell_add_status(ecgi, crnti, status);
            }
            XranBody::UeCapabilityInfo {
                ecgi,
                crnti,
                ue_category,
            } => {
                self.on_ue_capability(ecgi, crnti, ue_category);
            }
            body => {
                // Controller-originated kinds have no business
                // arriving on an inbound session.
                warn!(
                    %session_ecgi,
                    msg_type = %body.message_type(),
                    "unexpected inbound message type, dropping"
                );
            }
        }
    }

    fn on_cell_config_report(&self, ecgi: Ecgi, config: CellConfig, version: String) {
        let pci = config.pci;
        let updated = self.rnib().store().update_cell(ecgi, |cell| {
            cell.config = Some(config);
            cell.version = Some(version);
        });
        if !updated {
            warn!(%ecgi, "configuration report for unknown cell, dropping");
            return;
        }
        self.rnib().cell_index().set_pci(ecgi, pci);
        info!(%ecgi, %pci, "cell configuration stored");
    }

    async fn on_ue_admission_request(&self, ecgi: Ecgi, crnti: Crnti) {
        if self.rnib().store().cell(ecgi).is_none() {
            warn!(%ecgi, %crnti, "admission request from unknown cell, dropping");
            return;
        }
        let status = self.policy().admit_ue(ecgi, crnti);
        debug!(%ecgi, %crnti, ?status, "ue admission verdict");
        if let Err(e) = self
            .send_to_cell(ecgi, XranBody::UeAdmissionResponse { ecgi, crnti, status })
            .await
        {
            warn!(%ecgi, error = %e, "could not send admission response");
        }
    }

    fn on_ue_context_update(&self, ecgi: Ecgi, crnti: Crnti, imsi: Imsi) {
        // A pending handover for this UE completes here when the
        // target's context update beats the explicit completion
        // message; without this check the attach path would treat the
        // handed-over UE as a fresh one.
        if let Some((old_ecgi, old_crnti)) = self.rnib().ue_index().radio_identity(imsi) {
            let key = CorrelationKey::Ue(old_ecgi, old_crnti);
            if old_ecgi != ecgi && self.correlator().is_pending(key) {
                info!(%imsi, source = %old_ecgi, target = %ecgi, "handover observed via context update");
                self.correlator().complete(key, HO_COMPLETED);
            }
        }

        let created = self.rnib().store().put_ue(Ue::new(imsi, crnti));
        if !created {
            self.rnib().store().update_ue(imsi, |ue| {
                ue.crnti = crnti;
                ue.state = UeState::Active;
            });
            // Re-activation cancels a pending idle removal.
            self.scheduler().cancel(ExpiryKey::UeIdle(imsi));
        }

        for demoted in self.rnib().put_primary_link(ecgi, imsi, crnti) {
            self.arm_link_expiry(demoted);
        }
        info!(%imsi, %ecgi, %crnti, created, "ue attached");

        self.start_ue_bootstrap(ecgi, crnti, imsi);
    }

    fn on_ue_reconfig(&self, ecgi: Ecgi, crnti_old: Crnti, crnti_new: Crnti) {
        match self.rnib().ue_index().rebind_crnti(ecgi, crnti_old, crnti_new) {
            Some(imsi) => {
                self.rnib().store().update_ue(imsi, |ue| ue.crnti = crnti_new);
                debug!(%imsi, %ecgi, old = %crnti_old, new = %crnti_new, "crnti rebound");
            }
            None => {
                warn!(%ecgi, %crnti_old, "reconfiguration for unknown radio identity, dropping");
            }
        }
    }

    fn on_ue_release(&self, ecgi: Ecgi, crnti: Crnti, cause: u8) {
        let Some(imsi) = self.rnib().ue_index().resolve(ecgi, crnti) else {
            warn!(%ecgi, %crnti, "release for unknown radio identity, dropping");
            return;
        };
        self.rnib()
            .store()
            .update_ue(imsi, |ue| ue.state = UeState::Idle);
        debug!(%imsi, cause, "ue idle, grace timer armed");
        self.arm_ue_idle_expiry(imsi);
    }

    async fn on_bearer_admission_request(&self, ecgi: Ecgi, crnti: Crnti, bearers: Vec<Bearer>) {
        if self.rnib().store().cell(ecgi).is_none() {
            warn!(%ecgi, %crnti, "bearer request from unknown cell, dropping");
            return;
        }
        let status = self.policy().admit_bearers(ecgi, crnti, &bearers);

        if status == AdmissionStatus::Success {
            if let Some(imsi) = self.rnib().ue_index().resolve(ecgi, crnti) {
                let id = LinkId::new(ecgi, imsi);
                self.rnib().store().update_link(id, |link| {
                    link.bearers.extend_from_slice(&bearers);
                });
                self.rnib().store().update_cell(ecgi, |cell| {
                    for b in &bearers {
                        cell.stats.count_bearer(b.qci);
                    }
                });
            } else {
                warn!(%ecgi, %crnti, "admitted bearers for unresolvable link");
            }
        }

        if let Err(e) = self
            .send_to_cell(
                ecgi,
                XranBody::BearerAdmissionResponse { ecgi, crnti, status },
            )
            .await
        {
            warn!(%ecgi, error = %e, "could not send bearer response");
        }
    }

    fn on_bearer_release(&self, ecgi: Ecgi, crnti: Crnti, erab_ids: &[u8]) {
        let Some(imsi) = self.rnib().ue_index().resolve(ecgi, crnti) else {
            warn!(%ecgi, %crnti, "bearer release for unknown radio identity, dropping");
            return;
        };
        let id = LinkId::new(ecgi, imsi);
        if !self
            .rnib()
            .store()
            .update_link(id, |link| link.release_bearers(erab_ids))
        {
            warn!(link = %id, "bearer release for missing link, dropping");
        }
    }

    fn on_ho_complete(&self, ecgi_source: Ecgi, ecgi_target: Ecgi, crnti: Crnti) {
        self.correlator()
            .complete(CorrelationKey::Ue(ecgi_source, crnti), HO_COMPLETED);

        let Some(imsi) = self.rnib().ue_index().resolve(ecgi_source, crnti) else {
            // Already moved by a context update from the target.
            debug!(%ecgi_source, %crnti, "handover completion for already-moved ue");
            return;
        };
        // Demotes the source link to non-serving and promotes the
        // target as the new serving-primary.
        for demoted in self.rnib().put_primary_link(ecgi_target, imsi, crnti) {
            self.arm_link_expiry(demoted);
        }
        info!(%imsi, source = %ecgi_source, target = %ecgi_target, "handover completed");
    }

    fn on_scell_add_status(&self, ecgi: Ecgi, crnti: Crnti, status: AdmissionStatus) {
        let target = self.take_pending_scell(ecgi, crnti);
        let outcome = match status {
            AdmissionStatus::Success => SCELL_ADD_SUCCESS,
            AdmissionStatus::Failure => SCELL_ADD_FAILURE,
        };
        self.correlator()
            .complete(CorrelationKey::Ue(ecgi, crnti), outcome);

        if status != AdmissionStatus::Success {
            return;
        }
        let Some(scell) = target else {
            warn!(%ecgi, %crnti, "scell status with no pending add, dropping");
            return;
        };
        let Some(imsi) = self.rnib().ue_index().resolve(ecgi, crnti) else {
            warn!(%ecgi, %crnti, "scell status for unknown radio identity, dropping");
            return;
        };
        let id = LinkId::new(scell, imsi);
        // Promote the secondary carrier; an expiry armed while it was
        // non-serving no longer removes it (the action re-checks).
        if !self
            .rnib()
            .store()
            .update_link(id, |l| l.link_type = LinkType::ServingSecondary)
        {
            self.rnib()
                .store()
                .put_link(Link::new(id, LinkType::ServingSecondary));
        }
        self.scheduler().cancel(ExpiryKey::Link(id));
        info!(%imsi, %scell, "secondary carrier added");
    }

    fn on_ue_capability(&self, ecgi: Ecgi, crnti: Crnti, ue_category: u8) {
        let Some(imsi) = self.rnib().ue_index().resolve(ecgi, crnti) else {
            warn!(%ecgi, %crnti, "capability info for unknown radio identity, dropping");
            return;
        };
        self.rnib()
            .store()
            .update_ue(imsi, |ue| ue.ue_category = Some(ue_category));
        debug!(%imsi, ue_category, "ue capability stored");
    }

    /// Resolves a report's (PCI, CRNTI) pair to the reporting cell
    /// and UE, then runs `f`. Unresolvable reports are dropped with a
    /// diagnostic.
    fn with_report_ue(&self, pci: Pci, crnti: Crnti, f: impl FnOnce(&Self, Ecgi, Imsi)) {
        let Some(cell) = self.rnib().cell_index().ecgi_for_pci(pci) else {
            warn!(%pci, "report from unknown cell, dropping");
            return;
        };
        let Some(imsi) = self.rnib().ue_index().resolve(cell, crnti) else {
            warn!(%cell, %crnti, "report for unknown radio identity, dropping");
            return;
        };
        f(self, cell, imsi);
    }

    /// Applies a measurement to the link toward the measured cell,
    /// creating a non-serving link if the pair has none. A
    /// non-serving link's refresh window restarts on every report.
    fn on_measured_cell(&self, measured_pci: Pci, imsi: Imsi, f: impl FnOnce(&mut Link)) {
        let Some(measured) = self.rnib().cell_index().ecgi_for_pci(measured_pci) else {
            debug!(%measured_pci, "measurement of unmanaged cell, skipping");
            return;
        };
        self.on_measured_link(LinkId::new(measured, imsi), f);
    }

    fn on_measured_link(&self, id: LinkId, f: impl FnOnce(&mut Link)) {
        if self.rnib().put_non_serving_link(id) {
            debug!(link = %id, "non-serving link created from report");
        }
        let store = self.rnib().store();
        store.update_link(id, f);
        if store
            .link(id)
            .is_some_and(|l| l.link_type == LinkType::NonServing)
        {
            self.arm_link_expiry(id);
        }
    }
}
