//! The controller: shared state and operator-triggered operations
//!
//! One `Controller` is built at startup and shared (via `Arc`) by the
//! transport sessions, the control surface, and the timer callbacks.
//! Inbound message handling lives in `dispatch`; this module holds the
//! state, the outbound send path, and the correlated operations
//! (handover, RRM patch, secondary-cell add/delete) that block their
//! caller until a reply arrives or the bounded wait elapses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ranctl_common::{Crnti, Ecgi, Imsi, TimerConfig};
use ranctl_rnib::{Cell, Rnib};
use ranctl_xran::{RrmConfig, XranBody, XranPdu};

use crate::correlation::{CorrelationError, CorrelationKey, Correlator, WaitOutcome};
use crate::policy::AdmissionPolicy;
use crate::timers::{spawn_poller, ExpiryKey, ExpiryScheduler};

/// Errors surfaced by controller operations.
#[derive(Debug, Error)]
pub enum CtrlError {
    /// The cell exists but has no live session
    #[error("cell {0} is not connected")]
    CellNotConnected(Ecgi),

    /// No such cell in the R-NIB
    #[error("unknown cell {0}")]
    UnknownCell(Ecgi),

    /// No such UE in the R-NIB
    #[error("unknown ue {0}")]
    UnknownUe(Imsi),

    /// The UE has no serving-primary link to operate through
    #[error("{0} has no serving-primary link")]
    NoPrimaryLink(Imsi),

    /// A correlated wait is already outstanding for the key
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// The session channel rejected the message
    #[error("send to cell {0} failed, session closing")]
    SendFailed(Ecgi),
}

/// Shared controller state.
pub struct Controller {
    rnib: Rnib,
    correlator: Arc<Correlator>,
    scheduler: Arc<ExpiryScheduler>,
    policy: Arc<dyn AdmissionPolicy>,
    timers: TimerConfig,
    /// Scell target recorded per (anchor, crnti) while an add is in
    /// flight, so the status reply can retype the right link.
    pending_scells: Mutex<HashMap<(Ecgi, Crnti), Ecgi>>,
}

impl Controller {
    /// Builds the controller over already-constructed collaborators.
    pub fn new(
        rnib: Rnib,
        correlator: Arc<Correlator>,
        scheduler: Arc<ExpiryScheduler>,
        policy: Arc<dyn AdmissionPolicy>,
        timers: TimerConfig,
    ) -> Self {
        Self {
            rnib,
            correlator,
            scheduler,
            policy,
            timers,
            pending_scells: Mutex::new(HashMap::new()),
        }
    }

    /// The R-NIB view.
    pub fn rnib(&self) -> &Rnib {
        &self.rnib
    }

    /// The correlator.
    pub(crate) fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// The expiry scheduler.
    pub(crate) fn scheduler(&self) -> &Arc<ExpiryScheduler> {
        &self.scheduler
    }

    /// The admission policy.
    pub(crate) fn policy(&self) -> &dyn AdmissionPolicy {
        self.policy.as_ref()
    }

    /// The timer settings.
    pub(crate) fn timers(&self) -> &TimerConfig {
        &self.timers
    }

    pub(crate) fn take_pending_scell(&self, ecgi: Ecgi, crnti: Crnti) -> Option<Ecgi> {
        self.pending_scells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(ecgi, crnti))
    }

    /// Sends a message to a connected cell.
    pub async fn send_to_cell(&self, ecgi: Ecgi, body: XranBody) -> Result<(), CtrlError> {
        let sender = self
            .rnib
            .cell_index()
            .sender_for(ecgi)
            .ok_or(CtrlError::CellNotConnected(ecgi))?;
        sender
            .send(XranPdu::new(body))
            .await
            .map_err(|_| CtrlError::SendFailed(ecgi))
    }

    /// Registers a newly-accepted session: creates the Cell record,
    /// stores the outbound handle, and starts the configuration
    /// poller that runs until a configuration report is stored.
    pub fn cell_connected(&self, ecgi: Ecgi, sender: mpsc::Sender<XranPdu>) {
        if self.rnib.store().put_cell(Cell::new(ecgi)) {
            info!(%ecgi, "cell record created");
        } else {
            debug!(%ecgi, "cell reconnected, record kept");
        }
        self.rnib.cell_index().register_session(ecgi, sender.clone());

        let rnib = self.rnib.clone();
        let interval = Duration::from_millis(self.timers.config_request_interval_ms);
        spawn_poller(
            interval,
            move || rnib.store().cell(ecgi).map_or(true, |c| c.is_configured()),
            move || {
                let sender = sender.clone();
                async move {
                    debug!(%ecgi, "requesting cell configuration");
                    if sender
                        .send(XranPdu::new(XranBody::CellConfigRequest { ecgi }))
                        .await
                        .is_err()
                    {
                        debug!(%ecgi, "session gone, config poller exits on next check");
                    }
                }
            },
        );
    }

    /// Removes a cell and everything that references it, in an order
    /// that keeps the R-NIB resolvable for concurrent readers:
    /// pending waits first, then links and timers, then indexes, then
    /// the cell record itself.
    pub fn remove_cell(&self, ecgi: Ecgi) -> bool {
        self.correlator.cancel_cell(ecgi);

        for link in self.rnib.store().links_for_cell(ecgi) {
            self.scheduler.cancel(ExpiryKey::Link(link.id));
            self.rnib.store().remove_link(link.id);
        }
        self.rnib.ue_index().unbind_cell(ecgi);
        self.rnib.cell_index().unregister(ecgi);

        let removed = self.rnib.store().remove_cell(ecgi);
        if removed {
            info!(%ecgi, "cell removed");
        }
        removed
    }

    /// Orders a handover of a UE from its serving-primary cell to
    /// `target`, then waits (bounded) for the outcome.
    pub async fn handover(&self, imsi: Imsi, target: Ecgi) -> Result<WaitOutcome, CtrlError> {
        let source = self
            .rnib
            .primary_cell_for(imsi)
            .ok_or(CtrlError::NoPrimaryLink(imsi))?;
        let (_, crnti) = self
            .rnib
            .ue_index()
            .radio_identity(imsi)
            .ok_or(CtrlError::UnknownUe(imsi))?;
        if self.rnib.store().cell(target).is_none() {
            return Err(CtrlError::UnknownCell(target));
        }

        let key = CorrelationKey::Ue(source, crnti);
        let rx = self.correlator.register(key)?;
        info!(%imsi, %source, %target, "handover requested");
        if let Err(e) = self
            .send_to_cell(
                source,
                XranBody::HoRequest {
                    ecgi_source: source,
                    ecgi_target: target,
                    crnti,
                },
            )
            .await
        {
            self.correlator.cancel(key);
            return Err(e);
        }
        Ok(self.correlator.wait(key, rx).await)
    }

    /// Orders a secondary-carrier add for a UE, then waits (bounded)
    /// for the status.
    pub async fn scell_add(&self, imsi: Imsi, scell: Ecgi) -> Result<WaitOutcome, CtrlError> {
        let anchor = self
            .rnib
            .primary_cell_for(imsi)
            .ok_or(CtrlError::NoPrimaryLink(imsi))?;
        let (_, crnti) = self
            .rnib
            .ue_index()
            .radio_identity(imsi)
            .ok_or(CtrlError::UnknownUe(imsi))?;
        let scell_pci = self
            .rnib
            .cell_index()
            .pci_for(scell)
            .ok_or(CtrlError::UnknownCell(scell))?;

        let key = CorrelationKey::Ue(anchor, crnti);
        let rx = self.correlator.register(key)?;
        self.pending_scells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((anchor, crnti), scell);

        if let Err(e) = self
            .send_to_cell(
                anchor,
                XranBody::ScellAdd {
                    ecgi: anchor,
                    crnti,
                    scell_pci,
                },
            )
            .await
        {
            self.correlator.cancel(key);
            self.take_pending_scell(anchor, crnti);
            return Err(e);
        }
        let outcome = self.correlator.wait(key, rx).await;
        if outcome != WaitOutcome::Reply(crate::dispatch::SCELL_ADD_SUCCESS.into()) {
            // No retype happened; drop the recorded target.
            self.take_pending_scell(anchor, crnti);
        }
        Ok(outcome)
    }

    /// Orders a secondary-carrier delete. Fire-and-forget on the
    /// wire; the link is retyped locally.
    pub async fn scell_delete(&self, imsi: Imsi, scell: Ecgi) -> Result<(), CtrlError> {
        let anchor = self
            .rnib
            .primary_cell_for(imsi)
            .ok_or(CtrlError::NoPrimaryLink(imsi))?;
        let (_, crnti) = self
            .rnib
            .ue_index()
            .radio_identity(imsi)
            .ok_or(CtrlError::UnknownUe(imsi))?;
        let scell_pci = self
            .rnib
            .cell_index()
            .pci_for(scell)
            .ok_or(CtrlError::UnknownCell(scell))?;

        self.send_to_cell(
            anchor,
            XranBody::ScellDelete {
                ecgi: anchor,
                crnti,
                scell_pci,
            },
        )
        .await?;

        let id = ranctl_common::LinkId::new(scell, imsi);
        if self
            .rnib
            .store()
            .update_link(id, |l| l.link_type = ranctl_rnib::LinkType::NonServing)
        {
            self.arm_link_expiry(id);
        }
        Ok(())
    }

    /// Pushes RRM parameters to a cell and waits (bounded) for its
    /// acknowledgment. `crnti` scopes the change to one UE's link.
    pub async fn patch_rrm(
        &self,
        ecgi: Ecgi,
        crnti: Option<Crnti>,
        params: RrmConfig,
    ) -> Result<WaitOutcome, CtrlError> {
        if self.rnib.store().cell(ecgi).is_none() {
            return Err(CtrlError::UnknownCell(ecgi));
        }
        // Record the desired parameters before asking the cell to
        // apply them.
        match crnti.and_then(|c| self.rnib.ue_index().resolve(ecgi, c)) {
            Some(imsi) => {
                let id = ranctl_common::LinkId::new(ecgi, imsi);
                self.rnib.store().update_link(id, |l| l.rrm = params);
            }
            None => {
                self.rnib.store().update_cell(ecgi, |c| c.rrm = params);
            }
        }

        let key = CorrelationKey::Cell(ecgi);
        let rx = self.correlator.register(key)?;
        if let Err(e) = self
            .send_to_cell(ecgi, XranBody::RrmConfig { ecgi, crnti, params })
            .await
        {
            self.correlator.cancel(key);
            return Err(e);
        }
        Ok(self.correlator.wait(key, rx).await)
    }

    /// Starts the per-UE bootstrap: a capability-enquiry poller that
    /// runs until the UE's category is known, and the measurement
    /// configuration push recorded as the UE's meas-config handle.
    pub(crate) fn start_ue_bootstrap(&self, ecgi: Ecgi, crnti: Crnti, imsi: Imsi) {
        let rnib = self.rnib.clone();
        let interval = Duration::from_millis(self.timers.capability_enquiry_interval_ms);
        let Some(sender) = self.rnib.cell_index().sender_for(ecgi) else {
            warn!(%ecgi, "no session for ue bootstrap");
            return;
        };

        let enquiry_sender = sender.clone();
        spawn_poller(
            interval,
            move || rnib.store().ue(imsi).map_or(true, |u| u.ue_category.is_some()),
            move || {
                let sender = enquiry_sender.clone();
                async move {
                    let _ = sender
                        .send(XranPdu::new(XranBody::UeCapabilityEnquiry { ecgi, crnti }))
                        .await;
                }
            },
        );

        let report_interval_ms = u32::try_from(self.timers.l2_meas_interval_ms).unwrap_or(u32::MAX);
        if self
            .rnib
            .store()
            .ue(imsi)
            .is_some_and(|u| u.meas_interval_ms.is_none())
        {
            self.rnib
                .store()
                .update_ue(imsi, |u| u.meas_interval_ms = Some(report_interval_ms));
            tokio::spawn(async move {
                let _ = sender
                    .send(XranPdu::new(XranBody::L2MeasConfig {
                        ecgi,
                        report_interval_ms,
                    }))
                    .await;
            });
        }
    }

    /// Arms (or rearms) the refresh-window timer on a non-serving
    /// link. The expiry action re-checks the link's current type so a
    /// link promoted to serving in the meantime survives.
    pub(crate) fn arm_link_expiry(&self, id: ranctl_common::LinkId) {
        let rnib = self.rnib.clone();
        let delay = Duration::from_millis(self.timers.link_expiry_ms);
        self.scheduler.arm(ExpiryKey::Link(id), delay, async move {
            let still_non_serving = rnib
                .store()
                .link(id)
                .is_some_and(|l| l.link_type == ranctl_rnib::LinkType::NonServing);
            if still_non_serving {
                debug!(link = %id, "non-serving link expired");
                rnib.store().remove_link(id);
            }
        });
    }

    /// Arms (or rearms) the idle grace timer on a UE. The expiry
    /// action re-checks the state so a UE that went ACTIVE again
    /// survives.
    pub(crate) fn arm_ue_idle_expiry(&self, imsi: Imsi) {
        let rnib = self.rnib.clone();
        let scheduler = Arc::clone(&self.scheduler);
        let delay = Duration::from_millis(self.timers.ue_idle_grace_ms);
        self.scheduler.arm(ExpiryKey::UeIdle(imsi), delay, async move {
            let still_idle = rnib
                .store()
                .ue(imsi)
                .is_some_and(|u| u.state == ranctl_rnib::UeState::Idle);
            if !still_idle {
                return;
            }
            debug!(%imsi, "idle grace period elapsed, removing ue");
            for link in rnib.store().links_for_ue(imsi) {
                scheduler.cancel(ExpiryKey::Link(link.id));
                rnib.store().remove_link(link.id);
            }
            rnib.ue_index().unbind(imsi);
            rnib.store().remove_ue(imsi);
        });
    }
}
