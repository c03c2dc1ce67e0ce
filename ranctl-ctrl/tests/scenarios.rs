//! Controller scenario tests
//!
//! Drives the controller the way live sessions would: each test
//! builds a controller, registers fake cell sessions backed by plain
//! channels, and feeds decoded messages through the dispatch entry
//! point. Time-dependent behavior runs under tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use ranctl_common::{Crnti, Ecgi, Imsi, LinkId, Pci, Plmn, PolicyFlags, TimerConfig};
use ranctl_ctrl::{
    ApiError, ControlApi, Controller, Correlator, CtrlError, ExpiryScheduler, FlagPolicy,
    WaitOutcome,
};
use ranctl_rnib::{CellIndex, LinkType, Rnib, RnibStore, UeIndex, UeState};
use ranctl_xran::{
    AdmissionStatus, CellConfig, MessageType, RrmConfig, RxSigReport, XranBody, XranPdu,
};

fn ecgi(eci: u32) -> Ecgi {
    Ecgi::new(Plmn::new(315, 10, false), eci)
}

fn timers() -> TimerConfig {
    TimerConfig {
        config_request_interval_ms: 50,
        capability_enquiry_interval_ms: 50,
        l2_meas_interval_ms: 1_000,
        ue_idle_grace_ms: 100,
        link_expiry_ms: 100,
        request_timeout_ms: 100,
    }
}

fn controller() -> Arc<Controller> {
    let rnib = Rnib::new(
        Arc::new(RnibStore::new()),
        Arc::new(CellIndex::new()),
        Arc::new(UeIndex::new()),
    );
    let config = timers();
    Arc::new(Controller::new(
        rnib,
        Arc::new(Correlator::new(Duration::from_millis(config.request_timeout_ms))),
        Arc::new(ExpiryScheduler::new()),
        Arc::new(FlagPolicy::new(PolicyFlags::default())),
        config,
    ))
}

/// Registers a fake session for a cell and reports its configuration.
async fn connect_cell(ctrl: &Arc<Controller>, cell: Ecgi, pci: u16) -> mpsc::Receiver<XranPdu> {
    let (tx, rx) = mpsc::channel(64);
    ctrl.cell_connected(cell, tx);
    ctrl.handle(
        cell,
        XranPdu::new(XranBody::CellConfigReport {
            ecgi: cell,
            config: CellConfig {
                pci: Pci(pci),
                earfcn_dl: 2100,
                earfcn_ul: 19900,
                num_prbs_dl: 100,
                num_prbs_ul: 100,
                max_ues: 64,
            },
        }),
    )
    .await;
    rx
}

/// Attaches a UE at a cell via a context update.
async fn attach_ue(ctrl: &Arc<Controller>, cell: Ecgi, crnti: u16, imsi: u64) {
    ctrl.handle(
        cell,
        XranPdu::new(XranBody::UeContextUpdate {
            ecgi: cell,
            crnti: Crnti(crnti),
            imsi,
        }),
    )
    .await;
}

/// Receives from a session channel until a message of the wanted type
/// shows up (bootstrap pollers interleave their own traffic).
async fn expect_sent(rx: &mut mpsc::Receiver<XranPdu>, wanted: MessageType) -> XranBody {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let pdu = rx.recv().await.expect("session channel closed");
            if pdu.message_type() == wanted {
                return pdu.into_body();
            }
        }
    })
    .await
    .expect("expected message never sent")
}

#[tokio::test(start_paused = true)]
async fn test_scenario_cell_configuration() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;

    let cell = ctrl.rnib().store().cell(ecgi(1)).expect("cell exists");
    let config = cell.config.expect("configuration populated");
    assert_eq!(config.pci, Pci(101));
    assert_eq!(cell.version.as_deref(), Some("3"));
    assert_eq!(ctrl.rnib().cell_index().ecgi_for_pci(Pci(101)), Some(ecgi(1)));
}

#[tokio::test(start_paused = true)]
async fn test_config_poller_until_report() {
    let ctrl = controller();
    let (tx, mut rx) = mpsc::channel(64);
    ctrl.cell_connected(ecgi(1), tx);

    // The poller keeps requesting configuration while none is stored.
    expect_sent(&mut rx, MessageType::CellConfigRequest).await;
    expect_sent(&mut rx, MessageType::CellConfigRequest).await;
}

#[tokio::test(start_paused = true)]
async fn test_scenario_ue_attach_creates_primary_link() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let ue = ctrl.rnib().store().ue(Imsi(1001)).expect("ue exists");
    assert_eq!(ue.crnti, Crnti(7));
    assert_eq!(ue.state, UeState::Active);

    let link = ctrl
        .rnib()
        .store()
        .link(LinkId::new(ecgi(1), Imsi(1001)))
        .expect("link exists");
    assert_eq!(link.link_type, LinkType::ServingPrimary);
    assert_eq!(ctrl.rnib().primary_cell_for(Imsi(1001)), Some(ecgi(1)));
}

#[tokio::test(start_paused = true)]
async fn test_reattach_demotes_old_link_with_expiry() {
    let ctrl = controller();
    let _c1 = connect_cell(&ctrl, ecgi(1), 101).await;
    let _c2 = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    // The UE shows up at a second cell: the old primary is demoted to
    // non-serving and gets an expiry window like any other.
    attach_ue(&ctrl, ecgi(2), 9, 1001).await;
    let old = LinkId::new(ecgi(1), Imsi(1001));
    assert_eq!(
        ctrl.rnib().store().link(old).expect("demoted link").link_type,
        LinkType::NonServing
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ctrl.rnib().store().link(old).is_none());
    assert_eq!(ctrl.rnib().primary_cell_for(Imsi(1001)), Some(ecgi(2)));
}

#[tokio::test(start_paused = true)]
async fn test_admission_request_gets_policy_reply() {
    let ctrl = controller();
    let mut rx = connect_cell(&ctrl, ecgi(1), 101).await;

    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::UeAdmissionRequest {
            ecgi: ecgi(1),
            crnti: Crnti(7),
        }),
    )
    .await;

    let body = expect_sent(&mut rx, MessageType::UeAdmissionResponse).await;
    match body {
        XranBody::UeAdmissionResponse { crnti, status, .. } => {
            assert_eq!(crnti, Crnti(7));
            assert_eq!(status, AdmissionStatus::Success);
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_scenario_handover_complete() {
    let ctrl = controller();
    let mut source_rx = connect_cell(&ctrl, ecgi(1), 101).await;
    let _target_rx = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let mover = Arc::clone(&ctrl);
    let call = tokio::spawn(async move { mover.handover(Imsi(1001), ecgi(2)).await });
    // Let the call register its wait and send before replying.
    tokio::time::sleep(Duration::from_millis(1)).await;
    expect_sent(&mut source_rx, MessageType::HoRequest).await;

    ctrl.handle(
        ecgi(2),
        XranPdu::new(XranBody::HoComplete {
            ecgi_source: ecgi(1),
            ecgi_target: ecgi(2),
            crnti: Crnti(7),
        }),
    )
    .await;

    let outcome = call.await.expect("task").expect("handover call");
    assert_eq!(outcome, WaitOutcome::Reply("Hand Over Completed".into()));

    assert_eq!(ctrl.rnib().primary_cell_for(Imsi(1001)), Some(ecgi(2)));
    assert_eq!(
        ctrl.rnib()
            .store()
            .link(LinkId::new(ecgi(1), Imsi(1001)))
            .expect("old link kept")
            .link_type,
        LinkType::NonServing
    );
}

#[tokio::test(start_paused = true)]
async fn test_scenario_handover_timeout_frees_key() {
    let ctrl = controller();
    let _source_rx = connect_cell(&ctrl, ecgi(1), 101).await;
    let _target_rx = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    // No reply ever arrives.
    let outcome = ctrl.handover(Imsi(1001), ecgi(2)).await.expect("call");
    assert_eq!(outcome, WaitOutcome::NoResponse);

    // The key was deregistered: a second attempt registers cleanly
    // instead of failing with an already-pending error.
    let outcome = ctrl.handover(Imsi(1001), ecgi(2)).await.expect("call");
    assert_eq!(outcome, WaitOutcome::NoResponse);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_correlated_wait_rejected() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let first = Arc::clone(&ctrl);
    let call = tokio::spawn(async move { first.handover(Imsi(1001), ecgi(1)).await });
    tokio::time::sleep(Duration::from_millis(1)).await;

    // Second wait on the same key while the first is outstanding.
    let second = ctrl.handover(Imsi(1001), ecgi(1)).await;
    assert!(matches!(second, Err(CtrlError::Correlation(_))));

    let _ = call.await.expect("task");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_report_creates_expiring_link() {
    let ctrl = controller();
    let _c1 = connect_cell(&ctrl, ecgi(1), 101).await;
    let _c2 = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let report = |rsrp: i16| {
        XranPdu::new(XranBody::RxSigMeasReport {
            pci: Pci(101),
            crnti: Crnti(7),
            reports: vec![RxSigReport {
                pci: Pci(102),
                rsrp,
                rsrq: -10,
            }],
        })
    };

    ctrl.handle(ecgi(1), report(-90)).await;
    let neighbor = LinkId::new(ecgi(2), Imsi(1001));
    let link = ctrl.rnib().store().link(neighbor).expect("link created");
    assert_eq!(link.link_type, LinkType::NonServing);
    assert_eq!(link.quality.rsrp, Some(-90));

    // Refreshed just before expiry: survives the first window.
    tokio::time::sleep(Duration::from_millis(80)).await;
    ctrl.handle(ecgi(1), report(-85)).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(ctrl.rnib().store().link(neighbor).is_some());

    // No further refresh: gone after the grace period.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ctrl.rnib().store().link(neighbor).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_idle_ue_expires_unless_reactivated() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let release = || {
        XranPdu::new(XranBody::UeReleaseInd {
            ecgi: ecgi(1),
            crnti: Crnti(7),
            cause: 0,
        })
    };

    ctrl.handle(ecgi(1), release()).await;
    assert_eq!(
        ctrl.rnib().store().ue(Imsi(1001)).expect("ue").state,
        UeState::Idle
    );

    // Re-activation before the grace period keeps the UE.
    tokio::time::sleep(Duration::from_millis(50)).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ctrl.rnib().store().ue(Imsi(1001)).is_some());

    // Idle with no re-activation: removed with its links and index
    // entries.
    ctrl.handle(ecgi(1), release()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ctrl.rnib().store().ue(Imsi(1001)).is_none());
    assert!(ctrl.rnib().store().links_for_ue(Imsi(1001)).is_empty());
    assert!(ctrl.rnib().ue_index().resolve(ecgi(1), Crnti(7)).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cell_removal_cascades_links() {
    let ctrl = controller();
    let _c1 = connect_cell(&ctrl, ecgi(1), 101).await;
    let _c2 = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;
    attach_ue(&ctrl, ecgi(2), 9, 1002).await;

    assert!(ctrl.remove_cell(ecgi(1)));

    assert!(ctrl.rnib().store().cell(ecgi(1)).is_none());
    assert!(ctrl.rnib().store().links_for_cell(ecgi(1)).is_empty());
    // The other cell is untouched.
    assert_eq!(ctrl.rnib().store().links_for_cell(ecgi(2)).len(), 1);
    assert!(ctrl.rnib().ue_index().resolve(ecgi(1), Crnti(7)).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_scell_add_promotes_link() {
    let ctrl = controller();
    let mut anchor_rx = connect_cell(&ctrl, ecgi(1), 101).await;
    let _scell_rx = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let adder = Arc::clone(&ctrl);
    let call = tokio::spawn(async move { adder.scell_add(Imsi(1001), ecgi(2)).await });
    tokio::time::sleep(Duration::from_millis(1)).await;

    match expect_sent(&mut anchor_rx, MessageType::ScellAdd).await {
        XranBody::ScellAdd { scell_pci, .. } => assert_eq!(scell_pci, Pci(102)),
        other => panic!("unexpected body: {other:?}"),
    }

    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::ScellAddStatus {
            ecgi: ecgi(1),
            crnti: Crnti(7),
            status: AdmissionStatus::Success,
        }),
    )
    .await;

    let outcome = call.await.expect("task").expect("call");
    assert_eq!(outcome, WaitOutcome::Reply("Scell Add Success".into()));
    assert_eq!(
        ctrl.rnib()
            .store()
            .link(LinkId::new(ecgi(2), Imsi(1001)))
            .expect("secondary link")
            .link_type,
        LinkType::ServingSecondary
    );
}

#[tokio::test(start_paused = true)]
async fn test_scell_delete_demotes_and_expires_link() {
    let ctrl = controller();
    let mut anchor_rx = connect_cell(&ctrl, ecgi(1), 101).await;
    let _scell_rx = connect_cell(&ctrl, ecgi(2), 102).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    let adder = Arc::clone(&ctrl);
    let call = tokio::spawn(async move { adder.scell_add(Imsi(1001), ecgi(2)).await });
    tokio::time::sleep(Duration::from_millis(1)).await;
    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::ScellAddStatus {
            ecgi: ecgi(1),
            crnti: Crnti(7),
            status: AdmissionStatus::Success,
        }),
    )
    .await;
    call.await.expect("task").expect("call");

    // Delete is fire-and-forget: the order goes out and the link is
    // demoted locally to non-serving with a fresh expiry window.
    ctrl.scell_delete(Imsi(1001), ecgi(2)).await.expect("call");
    expect_sent(&mut anchor_rx, MessageType::ScellDelete).await;
    let id = LinkId::new(ecgi(2), Imsi(1001));
    assert_eq!(
        ctrl.rnib().store().link(id).expect("link kept").link_type,
        LinkType::NonServing
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ctrl.rnib().store().link(id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_crnti_rebind_and_release_by_new_identity() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;

    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::UeReconfigInd {
            ecgi: ecgi(1),
            crnti_old: Crnti(7),
            crnti_new: Crnti(8),
        }),
    )
    .await;

    assert_eq!(ctrl.rnib().store().ue(Imsi(1001)).expect("ue").crnti, Crnti(8));
    assert_eq!(ctrl.rnib().ue_index().resolve(ecgi(1), Crnti(7)), None);
    assert_eq!(
        ctrl.rnib().ue_index().resolve(ecgi(1), Crnti(8)),
        Some(Imsi(1001))
    );
}

#[tokio::test(start_paused = true)]
async fn test_api_rrm_patch_roundtrip_and_timeout() {
    let ctrl = controller();
    let mut rx = connect_cell(&ctrl, ecgi(1), 101).await;
    let api = ControlApi::new(Arc::clone(&ctrl));
    let hex = ecgi(1).to_hex();

    let params = RrmConfig {
        p_a: Some(-3),
        traffic_split_pct: None,
    };

    let patcher = Arc::clone(&ctrl);
    let call = {
        let hex = hex.clone();
        tokio::spawn(async move {
            ControlApi::new(patcher).patch_cell_rrm(&hex, params).await
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    expect_sent(&mut rx, MessageType::RrmConfig).await;

    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::RrmConfigStatus {
            ecgi: ecgi(1),
            status: AdmissionStatus::Success,
        }),
    )
    .await;
    assert_eq!(call.await.expect("task").expect("call"), "RRM Config Success");
    assert_eq!(
        ctrl.rnib().store().cell(ecgi(1)).expect("cell").rrm,
        params
    );

    // No reply this time: surfaces as a timeout error, not a reply.
    let err = api.patch_cell_rrm(&hex, params).await.expect_err("timeout");
    assert_eq!(err.code, 504);

    // Malformed key is a 400, unknown cell a 404.
    assert_eq!(
        api.patch_cell_rrm("zz", params).await.expect_err("bad key").code,
        400
    );
    assert_eq!(api.cell("zz").expect_err("bad key").code, 400);
    assert_eq!(
        api.cell(&ecgi(9).to_hex()).expect_err("missing").code,
        404
    );
}

#[tokio::test(start_paused = true)]
async fn test_api_nodes_union() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;
    attach_ue(&ctrl, ecgi(1), 7, 1001).await;
    let api = ControlApi::new(Arc::clone(&ctrl));

    let nodes = api.nodes();
    assert_eq!(nodes.len(), 2);
    assert!(api.node(&format!("cell:{}", ecgi(1).to_hex())).is_ok());
    assert!(api.node("ue:1001").is_ok());
    assert!(matches!(
        api.node("bogus"),
        Err(ApiError { code: 400, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_references_are_dropped() {
    let ctrl = controller();
    let _rx = connect_cell(&ctrl, ecgi(1), 101).await;

    // Release for a UE nobody attached: dropped, nothing panics, and
    // the store is untouched.
    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::UeReleaseInd {
            ecgi: ecgi(1),
            crnti: Crnti(42),
            cause: 1,
        }),
    )
    .await;
    // Report keyed by a PCI no cell reported.
    ctrl.handle(
        ecgi(1),
        XranPdu::new(XranBody::RxSigMeasReport {
            pci: Pci(200),
            crnti: Crnti(42),
            reports: vec![],
        }),
    )
    .await;

    assert!(ctrl.rnib().store().ues().is_empty());
    assert!(ctrl.rnib().store().links().is_empty());
}
