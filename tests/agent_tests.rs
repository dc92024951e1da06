// Agent behavior driven through a mock controller link: report emission,
// measurement plumbing, PRB accounting, dispatch replies and the disconnect
// reset.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use ran_slicer::agent::{
    AgentDispatch, ControlAgent, RrcCellMeasure, RrcInterface, RrcMeasConfig, RrcMeasReport,
};
use ran_slicer::config::AgentConfig;
use ran_slicer::error::SliceResult;
use ran_slicer::mac::{DlAlloc, DlDci, DlSchedResult, UlDci, UlSchedResult};
use ran_slicer::proto::{Frame, Message, UeState};
use ran_slicer::ran::RanManager;
use ran_slicer::sched::{DlRanScheduler, SCHED_MULTI, SCHED_RR_USER};
use ran_slicer::transport::{ControllerTransport, InboundHandler};

/// In-memory controller link: frames pile up, triggers are toggled by hand.
#[derive(Default)]
struct MockLink {
    triggers: Mutex<HashSet<u32>>,
    sent: Mutex<Vec<Frame>>,
}

impl MockLink {
    fn add_trigger(&self, id: u32) {
        self.triggers.lock().insert(id);
    }

    fn revoke_trigger(&self, id: u32) {
        self.triggers.lock().remove(&id);
    }

    fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl ControllerTransport for MockLink {
    fn has_trigger(&self, _enb_id: u32, trigger_id: u32) -> bool {
        self.triggers.lock().contains(&trigger_id)
    }

    fn send(&self, frame: Frame) -> SliceResult<()> {
        self.sent.lock().push(frame);
        Ok(())
    }
}

/// RRC stub recording every measurement reconfiguration.
#[derive(Default)]
struct MockRrc {
    configs: Mutex<Vec<(u16, RrcMeasConfig)>>,
}

impl RrcInterface for MockRrc {
    fn setup_ue_measurement(&self, rnti: u16, cfg: &RrcMeasConfig) -> SliceResult<()> {
        self.configs.lock().push((rnti, cfg.clone()));
        Ok(())
    }
}

struct Harness {
    agent: Arc<ControlAgent>,
    ran: Arc<RanManager>,
    link: Arc<MockLink>,
    rrc: Arc<MockRrc>,
}

fn harness() -> Harness {
    let mac = Arc::new(DlRanScheduler::new());
    let ran = Arc::new(RanManager::new(mac));
    let rrc = Arc::new(MockRrc::default());
    let agent = Arc::new(ControlAgent::new(AgentConfig::default(), ran.clone(), rrc.clone()));
    let link = Arc::new(MockLink::default());
    agent.set_transport(link.clone());
    Harness { agent, ran, link, rrc }
}

#[test]
fn dirty_ues_are_reported_then_clean() {
    let h = harness();
    h.link.add_trigger(1);
    h.agent.setup_ue_report(4, 1);

    h.agent.add_user(0x46);
    h.agent.update_user_id(0x46, 0, 222_930_000_000_001, 0xc0ffee);
    h.agent.tick();

    let frames = h.link.take_sent();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].module_id, 4);
    match &frames[0].msg {
        Message::UeReport { ues } => {
            assert_eq!(ues.len(), 1);
            assert_eq!(ues[0].rnti, 0x46);
            assert_eq!(ues[0].imsi, 222_930_000_000_001);
            assert_eq!(ues[0].tmsi, 0xc0ffee);
            assert_eq!(ues[0].state, UeState::Connected);
        }
        other => panic!("expected UE report, got {other:?}"),
    }

    // Nothing left to say on the next pass.
    h.agent.tick();
    assert!(h.link.take_sent().is_empty());
}

#[test]
fn disconnected_ues_are_dropped_after_reporting() {
    let h = harness();
    h.link.add_trigger(1);
    h.agent.setup_ue_report(4, 1);

    h.agent.add_user(0x46);
    h.agent.tick();
    h.link.take_sent();

    h.agent.rem_user(0x46);
    h.agent.tick();
    let frames = h.link.take_sent();
    match &frames[0].msg {
        Message::UeReport { ues } => assert_eq!(ues[0].state, UeState::Disconnected),
        other => panic!("expected UE report, got {other:?}"),
    }
    assert_eq!(h.agent.nof_users(), 0);
}

#[test]
fn revoked_ue_report_trigger_silences_the_subscription() {
    let h = harness();
    h.link.add_trigger(1);
    h.agent.setup_ue_report(4, 1);
    h.agent.add_user(0x46);

    h.link.revoke_trigger(1);
    h.agent.tick();
    assert!(h.link.take_sent().is_empty());
    assert!(!h.agent.ue_report_enabled());
}

#[test]
fn measurement_report_flows_to_the_controller() {
    let h = harness();
    h.link.add_trigger(7);
    h.agent.add_user(0x46);

    h.agent.setup_ue_period_meas(0x46, 100, 2, 7, 3400, 500, 8, 8).unwrap();
    assert_eq!(h.agent.active_meas_slots(0x46), 1);

    // RRC got the full configuration with the quantized interval.
    let configs = h.rrc.configs.lock();
    assert_eq!(configs.len(), 1);
    let (rnti, cfg) = &configs[0];
    assert_eq!(*rnti, 0x46);
    assert_eq!(cfg.entries.len(), 1);
    assert_eq!(cfg.entries[0].interval_ms, 640);
    let rrc_meas_id = cfg.entries[0].meas_id;
    drop(configs);

    h.agent.report_rrc_measure(
        0x46,
        &RrcMeasReport {
            meas_id: rrc_meas_id,
            serving_rsrp: -90,
            serving_rsrq: -10,
            neighbors: vec![RrcCellMeasure { pci: 9, rsrp: -100, rsrq: -12 }],
        },
    );
    h.agent.tick();

    let frames = h.link.take_sent();
    assert_eq!(frames.len(), 1);
    match &frames[0].msg {
        Message::UeMeasReport { rnti, meas_id, serving, neighbors } => {
            assert_eq!(*rnti, 0x46);
            assert_eq!(*meas_id, 100);
            assert_eq!(serving.rsrp, -90);
            assert_eq!(neighbors.len(), 1);
            assert_eq!(neighbors[0].pci, 9);
        }
        other => panic!("expected measurement report, got {other:?}"),
    }

    // Clean after emission; no repeat without a fresh report.
    h.agent.tick();
    assert!(h.link.take_sent().is_empty());
}

#[test]
fn revoked_measurement_trigger_clears_the_slot() {
    let h = harness();
    h.link.add_trigger(7);
    h.agent.add_user(0x46);
    h.agent.setup_ue_period_meas(0x46, 100, 2, 7, 3400, 240, 4, 4).unwrap();

    h.link.revoke_trigger(7);
    h.agent.tick();
    assert_eq!(h.agent.active_meas_slots(0x46), 0);
    assert!(h.link.take_sent().is_empty());
}

#[test]
fn prb_accounting_follows_the_allocation_types() {
    let h = harness();
    // 25 PRB cell: RBG size 2.
    let dl = DlSchedResult {
        dcis: vec![
            DlDci { rnti: 1, alloc: DlAlloc::Type0 { rbg_mask: 0b1011 } },
            DlDci { rnti: 2, alloc: DlAlloc::Type1 { vrb_mask: 0b11111 } },
            DlDci { rnti: 3, alloc: DlAlloc::Type2 { riv: 77 } },
        ],
    };
    h.agent.process_dl_results(0, &dl);
    // 3 groups * 2 PRBs + 5 VRBs + (77/25 + 1) PRBs.
    let (dl_prbs, ul_prbs) = h.agent.prb_counters();
    assert_eq!(dl_prbs, 6 + 5 + 4);
    assert_eq!(ul_prbs, 0);

    let ul = UlSchedResult { dcis: vec![UlDci { rnti: 1, riv: 30 }] };
    h.agent.process_ul_results(0, &ul);
    // The whole subframe belongs to one UE: (30/25 + 1) * 25.
    assert_eq!(h.agent.prb_counters().1, 50);
}

#[test]
fn reset_returns_the_agent_to_a_clean_baseline() {
    let h = harness();
    h.link.add_trigger(1);
    h.link.add_trigger(7);
    h.link.add_trigger(8);
    h.link.add_trigger(9);

    h.agent.setup_ue_report(4, 1);
    h.agent.add_user(0x46);
    h.agent.add_user(0x47);
    h.agent.setup_ue_period_meas(0x46, 100, 2, 7, 3400, 240, 4, 4).unwrap();
    h.agent.setup_ue_period_meas(0x46, 101, 2, 8, 3400, 480, 4, 4).unwrap();
    let _ = h.agent.setup_cell_measurement(1, 3, 1000, 9);
    h.agent.process_dl_results(0, &DlSchedResult {
        dcis: vec![DlDci { rnti: 1, alloc: DlAlloc::Type1 { vrb_mask: 0xff } }],
    });
    h.agent.tick();
    h.link.take_sent();

    h.agent.reset();

    // Everything subscription-like is gone, accumulators are zero, and the
    // UE map survives fully dirty.
    assert!(!h.agent.ue_report_enabled());
    assert_eq!(h.agent.prb_counters(), (0, 0));
    assert_eq!(h.agent.active_meas_slots(0x46), 0);
    assert_eq!(h.agent.nof_users(), 2);
    assert_eq!(h.agent.ue_dirty_flags(0x46), Some((true, true)));
    assert_eq!(h.agent.ue_dirty_flags(0x47), Some((true, true)));

    // No frames go out until the controller subscribes again.
    h.agent.tick();
    assert!(h.link.take_sent().is_empty());

    h.agent.setup_ue_report(4, 1);
    h.agent.tick();
    let frames = h.link.take_sent();
    match &frames[0].msg {
        Message::UeReport { ues } => assert_eq!(ues.len(), 2),
        other => panic!("expected UE report, got {other:?}"),
    }
}

#[test]
fn identity_renewal_clears_the_older_entry() {
    let h = harness();
    h.agent.add_user(0x46);
    h.agent.update_user_id(0x46, 0, 42, 777);

    // Same subscriber shows up under a fresh RNTI.
    h.agent.add_user(0x50);
    h.agent.update_user_id(0x50, 0, 42, 777);

    h.link.add_trigger(1);
    h.agent.setup_ue_report(4, 1);
    h.agent.tick();
    let frames = h.link.take_sent();
    match &frames[0].msg {
        Message::UeReport { ues } => {
            let old = ues.iter().find(|u| u.rnti == 0x46).unwrap();
            let new = ues.iter().find(|u| u.rnti == 0x50).unwrap();
            assert_eq!(old.imsi, 0);
            assert_eq!(old.tmsi, 0);
            assert_eq!(new.imsi, 42);
            assert_eq!(new.tmsi, 777);
        }
        other => panic!("expected UE report, got {other:?}"),
    }
}

#[test]
fn dispatch_answers_setup_and_slice_commands() {
    let h = harness();
    let dispatch = AgentDispatch::new(h.agent.clone(), h.ran.clone());
    let cfg = AgentConfig::default();

    let request =
        |msg| Frame { enb_id: cfg.enb_id, cell_pci: cfg.pci, module_id: 9, msg };

    // Capability reply.
    let replies = dispatch.handle(request(Message::EnbSetupRequest));
    assert_eq!(replies.len(), 1);
    match &replies[0].msg {
        Message::EnbCapReport { n_prb, slice_sched, l2_caps, .. } => {
            assert_eq!(*n_prb, cfg.n_prb);
            assert_eq!(*slice_sched, SCHED_MULTI);
            assert_ne!(*l2_caps, 0);
        }
        other => panic!("expected capability report, got {other:?}"),
    }

    // Slice addition then a full dump.
    let conf = ran_slicer::proto::SliceConfPayload {
        user_sched: SCHED_RR_USER,
        rbg: 30,
        time: 10,
        users: vec![0x46],
    };
    assert!(dispatch
        .handle(request(Message::SliceAdd { slice_id: 0x99, conf: conf.clone() }))
        .is_empty());
    let replies = dispatch.handle(request(Message::SliceRequest { slice_id: 0 }));
    assert_eq!(replies.len(), 1);
    match &replies[0].msg {
        Message::SliceReport { slice } => {
            assert_eq!(slice.slice_id, 0x99);
            assert_eq!(slice.users, vec![0x46]);
            assert_eq!(slice.rbg, 30);
        }
        other => panic!("expected slice report, got {other:?}"),
    }

    // Removal leaves nothing to dump.
    dispatch.handle(request(Message::SliceRem { slice_id: 0x99 }));
    assert!(dispatch.handle(request(Message::SliceRequest { slice_id: 0x99 })).is_empty());

    // Measurement setup for an unknown UE fails over the wire.
    let replies = dispatch.handle(request(Message::UeMeasureSetup {
        trigger_id: 5,
        meas_id: 1,
        rnti: 0xbad,
        earfcn: 3400,
        interval_ms: 240,
        max_cells: 4,
        max_meas: 4,
    }));
    assert!(matches!(replies[0].msg, Message::UeMeasFail { rnti: 0xbad, meas_id: 1 }));
}

#[test]
fn disconnect_resets_through_the_dispatcher() {
    let h = harness();
    let dispatch = AgentDispatch::new(h.agent.clone(), h.ran.clone());
    h.link.add_trigger(1);
    h.agent.setup_ue_report(4, 1);
    h.agent.add_user(0x46);

    dispatch.disconnected();
    assert!(!h.agent.ue_report_enabled());
    assert_eq!(h.agent.nof_users(), 1);
}

#[test]
fn cell_measurement_subscription_reports_immediately() {
    let h = harness();
    h.agent.process_dl_results(0, &DlSchedResult {
        dcis: vec![DlDci { rnti: 1, alloc: DlAlloc::Type1 { vrb_mask: 0b111 } }],
    });

    let frame = h.agent.setup_cell_measurement(1, 3, 1000, 9);
    match frame.msg {
        Message::CellMeasReport { dl_prbs, ul_prbs, .. } => {
            assert_eq!(dl_prbs, 3);
            assert_eq!(ul_prbs, 0);
        }
        other => panic!("expected cell measurement report, got {other:?}"),
    }
    // Counters restart after the report.
    assert_eq!(h.agent.prb_counters(), (0, 0));
}
