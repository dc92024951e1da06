//! Event-driven control agent.
//!
//! Upper-layer calls (RRC edges, MAC scheduling results) only mark dirty
//! state under the agent lock. A dedicated low-priority thread wakes every
//! ~100 ms, turns dirty state into frames, and hands them to the controller
//! link after the lock is dropped; no I/O ever happens under a lock.
//!
//! Lock order, where both are needed: agent lock first, then the scheduler
//! lock (the RAN manager's queries take the latter).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::agent::{
    quantize_report_interval, Agent, AgentState, RrcInterface, RrcMeasConfig, RrcMeasEntry,
    RrcMeasReport, MAX_CELL_MEAS, MAX_MEAS, REPORT_MAX_UES,
};
use crate::config::AgentConfig;
use crate::error::{SliceError, SliceResult};
use crate::mac::{DlAlloc, DlSchedResult, UlSchedResult};
use crate::proto::{CellReading, Frame, Message, UeDetails, UeState};
use crate::ran::RanManager;
use crate::sched::DEFAULT_SLICE;
use crate::threading::set_thread_priority;
use crate::transport::ControllerTransport;

/// Agent loop cadence.
const LOOP_PERIOD: Duration = Duration::from_millis(100);
/// Slices listed in one pass of the slice-state reporting.
const SLICE_DUMP_CAP: usize = 32;

const STATE_STOPPED: u32 = 0;
const STATE_PAUSED: u32 = 1;
const STATE_STARTED: u32 = 2;

/// RBG size for a cell width, in PRBs.
fn rbg_size_for_prbs(n_prb: u32) -> u64 {
    if n_prb <= 10 {
        1
    } else if n_prb <= 26 {
        2
    } else if n_prb <= 63 {
        3
    } else {
        4
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CellMeasState {
    pci: u16,
    rsrp: i16,
    rsrq: i16,
    dirty: bool,
}

/// One per-UE measurement subscription.
#[derive(Debug, Clone, Copy)]
struct MeasSlot {
    /// Controller-assigned opaque measurement id.
    ctrl_id: u32,
    module_id: u32,
    trigger_id: u32,
    /// RRC-level identities assigned from the UE's monotone counters.
    meas_id: u8,
    obj_id: u8,
    rep_id: u8,
    earfcn: u16,
    interval_ms: u32,
    max_cells: u8,
    max_meas: u8,
    carrier: CellMeasState,
    neighbors: [CellMeasState; MAX_CELL_MEAS],
    c_dirty: bool,
}

#[derive(Debug, Clone)]
struct AgentUe {
    imsi: u64,
    tmsi: u32,
    plmn: u32,
    state: UeState,
    id_dirty: bool,
    state_dirty: bool,
    next_meas_id: u8,
    next_obj_id: u8,
    next_rep_id: u8,
    meas: [Option<MeasSlot>; MAX_MEAS],
}

impl AgentUe {
    fn new(plmn: u32) -> AgentUe {
        AgentUe {
            imsi: 0,
            tmsi: 0,
            plmn,
            state: UeState::Connected,
            id_dirty: false,
            state_dirty: true,
            next_meas_id: 1,
            next_obj_id: 1,
            next_rep_id: 1,
            meas: [None; MAX_MEAS],
        }
    }
}

/// Cell PRB report subscription; the counters themselves live next to it in
/// [`AgentInner`] so MAC accounting runs with or without a subscriber.
#[derive(Debug, Clone, Copy)]
struct PrbContext {
    module_id: u32,
    trigger_id: u32,
    interval_ms: u32,
    last_ts: Instant,
}

struct AgentInner {
    ues: BTreeMap<u16, AgentUe>,
    ues_dirty: bool,

    uer_enabled: bool,
    uer_module: u32,
    uer_trigger: u32,

    ran_enabled: bool,
    ran_module: u32,
    ran_def_dirty: bool,

    /// Cumulative used-PRB counters since the last emitted report.
    prb_dl: u64,
    prb_ul: u64,
    prb_ctx: Option<PrbContext>,
}

/// The real agent. Holds the RAN manager for slice state, the RRC seam for
/// measurement reconfiguration, and the controller link for reports.
pub struct ControlAgent {
    cfg: AgentConfig,
    ran: Arc<RanManager>,
    rrc: Arc<dyn RrcInterface>,
    transport: Mutex<Option<Arc<dyn ControllerTransport>>>,
    inner: Mutex<AgentInner>,
    state: AtomicU32,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ControlAgent {
    pub fn new(cfg: AgentConfig, ran: Arc<RanManager>, rrc: Arc<dyn RrcInterface>) -> ControlAgent {
        ControlAgent {
            cfg,
            ran,
            rrc,
            transport: Mutex::new(None),
            inner: Mutex::new(AgentInner {
                ues: BTreeMap::new(),
                ues_dirty: false,
                uer_enabled: false,
                uer_module: 0,
                uer_trigger: 0,
                ran_enabled: false,
                ran_module: 0,
                ran_def_dirty: false,
                prb_dl: 0,
                prb_ul: 0,
                prb_ctx: None,
            }),
            state: AtomicU32::new(STATE_STOPPED),
            thread: Mutex::new(None),
        }
    }

    /// Install the controller link once it exists; reports are dropped until
    /// then.
    pub fn set_transport(&self, transport: Arc<dyn ControllerTransport>) {
        *self.transport.lock() = Some(transport);
    }

    pub fn state(&self) -> AgentState {
        match self.state.load(Ordering::Relaxed) {
            STATE_STARTED => AgentState::Started,
            STATE_PAUSED => AgentState::Paused,
            _ => AgentState::Stopped,
        }
    }

    pub fn pause(&self) {
        self.state.store(STATE_PAUSED, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.state.store(STATE_STARTED, Ordering::Relaxed);
    }

    /// Launch the loop thread. No-op when already running.
    pub fn start(self: Arc<Self>) -> SliceResult<()> {
        let mut slot = self.thread.lock();
        if slot.is_some() {
            return Ok(());
        }
        self.state.store(STATE_STARTED, Ordering::Relaxed);

        let agent = self.clone();
        let handle = std::thread::Builder::new()
            .name("agent-loop".to_string())
            .spawn(move || {
                // Telemetry must never compete with the MAC worker.
                set_thread_priority(0);
                info!("agent loop started");
                while agent.state.load(Ordering::Relaxed) != STATE_STOPPED {
                    if agent.state.load(Ordering::Relaxed) == STATE_STARTED {
                        agent.tick();
                    }
                    std::thread::sleep(LOOP_PERIOD);
                }
                info!("agent loop stopped");
            })?;
        *slot = Some(handle);
        Ok(())
    }

    /// One pass of the reporting loop; public so tests can drive it without
    /// the thread.
    pub fn tick(&self) {
        let Some(transport) = self.transport.lock().clone() else {
            return;
        };

        let mut out = Vec::new();
        {
            let mut inner = self.inner.lock();
            self.dirty_ue_check(&mut inner, transport.as_ref(), &mut out);
            self.ran_check(&mut inner, &mut out);
            self.measure_check(&mut inner, transport.as_ref(), &mut out);
        }

        for frame in out {
            if let Err(e) = transport.send(frame) {
                warn!(error = %e, "report dropped, retrying next cycle");
                break;
            }
        }
    }

    fn frame(&self, module_id: u32, msg: Message) -> Frame {
        Frame { enb_id: self.cfg.enb_id, cell_pci: self.cfg.pci, module_id, msg }
    }

    fn dirty_ue_check(
        &self,
        inner: &mut AgentInner,
        transport: &dyn ControllerTransport,
        out: &mut Vec<Frame>,
    ) {
        if !inner.uer_enabled {
            return;
        }
        if !transport.has_trigger(self.cfg.enb_id, inner.uer_trigger) {
            debug!("ue-report trigger revoked, dropping subscription");
            inner.uer_enabled = false;
            return;
        }
        if !inner.ues_dirty {
            return;
        }

        let mut ues = Vec::new();
        let mut reported = Vec::new();
        let mut truncated = false;
        for (rnti, ue) in inner.ues.iter() {
            if !ue.id_dirty && !ue.state_dirty {
                continue;
            }
            if ues.len() == REPORT_MAX_UES {
                truncated = true;
                break;
            }
            ues.push(UeDetails {
                pci: self.cfg.pci,
                rnti: *rnti,
                plmn: ue.plmn,
                imsi: ue.imsi,
                tmsi: ue.tmsi,
                state: ue.state,
            });
            reported.push(*rnti);
        }
        if truncated {
            warn!(cap = REPORT_MAX_UES, "UE report truncated to capacity");
        }
        if ues.is_empty() {
            inner.ues_dirty = false;
            return;
        }

        out.push(self.frame(inner.uer_module, Message::UeReport { ues }));

        for rnti in &reported {
            if let Some(ue) = inner.ues.get_mut(rnti) {
                ue.id_dirty = false;
                ue.state_dirty = false;
            }
        }
        // Disconnected entries leave the map once their state went out.
        inner.ues.retain(|rnti, ue| {
            ue.state != UeState::Disconnected || !reported.contains(rnti)
        });
        inner.ues_dirty = truncated;
    }

    fn ran_check(&self, inner: &mut AgentInner, out: &mut Vec<Frame>) {
        if !inner.ran_enabled || !inner.ran_def_dirty {
            return;
        }

        for slice_id in self.ran.get_slices(SLICE_DUMP_CAP) {
            if slice_id == DEFAULT_SLICE {
                continue;
            }
            if let Some(frame) = self.slice_report(inner.ran_module, slice_id) {
                out.push(frame);
            }
        }
        inner.ran_def_dirty = false;
    }

    /// Build a slice-state frame, or nothing when the slice vanished.
    pub(crate) fn slice_report(&self, module_id: u32, slice_id: u64) -> Option<Frame> {
        let info = self.ran.get_slice_info(slice_id, REPORT_MAX_UES).ok()?;
        Some(self.frame(
            module_id,
            Message::SliceReport {
                slice: crate::proto::SliceState {
                    slice_id,
                    plmn: self.ran.slice_plmn(slice_id).unwrap_or(0),
                    user_sched: info.user_sched,
                    rbg: info.rbg,
                    users: info.users,
                },
            },
        ))
    }

    fn measure_check(
        &self,
        inner: &mut AgentInner,
        transport: &dyn ControllerTransport,
        out: &mut Vec<Frame>,
    ) {
        let enb_id = self.cfg.enb_id;
        let pci = self.cfg.pci;
        for (rnti, ue) in inner.ues.iter_mut() {
            for slot in ue.meas.iter_mut() {
                let alive = match slot {
                    Some(m) => transport.has_trigger(enb_id, m.trigger_id),
                    None => continue,
                };
                if !alive {
                    debug!(rnti = *rnti, "measurement trigger revoked, slot cleared");
                    *slot = None;
                    continue;
                }
                let Some(m) = slot else { continue };
                if !m.c_dirty {
                    continue;
                }

                let serving = CellReading { pci, rsrp: m.carrier.rsrp, rsrq: m.carrier.rsrq };
                let neighbors: Vec<CellReading> = m
                    .neighbors
                    .iter()
                    .filter(|n| n.dirty)
                    .take(m.max_meas as usize)
                    .map(|n| CellReading { pci: n.pci, rsrp: n.rsrp, rsrq: n.rsrq })
                    .collect();

                out.push(Frame {
                    enb_id,
                    cell_pci: pci,
                    module_id: m.module_id,
                    msg: Message::UeMeasReport {
                        rnti: *rnti,
                        meas_id: m.ctrl_id,
                        serving,
                        neighbors,
                    },
                });

                m.c_dirty = false;
                m.carrier.dirty = false;
                for n in m.neighbors.iter_mut() {
                    n.dirty = false;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Controller-facing inputs (via the callback dispatcher).
    // ------------------------------------------------------------------

    /// Drop every subscription and measurement, zero the PRB accounting, and
    /// mark all UEs for re-report once the controller comes back.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.uer_enabled = false;
        inner.uer_module = 0;
        inner.uer_trigger = 0;
        inner.ran_enabled = false;
        inner.ran_module = 0;
        inner.ran_def_dirty = false;
        inner.prb_dl = 0;
        inner.prb_ul = 0;
        inner.prb_ctx = None;
        for ue in inner.ues.values_mut() {
            ue.id_dirty = true;
            ue.state_dirty = true;
            ue.meas = [None; MAX_MEAS];
        }
        inner.ues_dirty = true;
        info!("agent state reset");
    }

    pub fn setup_ue_report(&self, module_id: u32, trigger_id: u32) {
        let mut inner = self.inner.lock();
        inner.uer_enabled = true;
        inner.uer_module = module_id;
        inner.uer_trigger = trigger_id;
        debug!(module_id, trigger_id, "UE reporting enabled");
    }

    pub fn setup_ran_report(&self, module_id: u32) {
        let mut inner = self.inner.lock();
        inner.ran_enabled = true;
        inner.ran_module = module_id;
        debug!(module_id, "RAN reporting enabled");
    }

    /// Note that slice state changed; the next loop pass re-reports it.
    pub fn mark_ran_dirty(&self) {
        self.inner.lock().ran_def_dirty = true;
    }

    /// Install the cell PRB subscription and emit one immediate report.
    /// Periodic emission is not wired into the loop; reports go out when the
    /// subscription is (re)installed, or when [`Self::cell_report_due`] is
    /// driven explicitly.
    pub fn setup_cell_measurement(
        &self,
        _cell_pci: u16,
        module_id: u32,
        interval_ms: u32,
        trigger_id: u32,
    ) -> Frame {
        let mut inner = self.inner.lock();
        inner.prb_ctx =
            Some(PrbContext { module_id, trigger_id, interval_ms, last_ts: Instant::now() });
        let report = self.frame(
            module_id,
            Message::CellMeasReport {
                cell_pci: self.cfg.pci,
                dl_prbs: inner.prb_dl,
                ul_prbs: inner.prb_ul,
            },
        );
        inner.prb_dl = 0;
        inner.prb_ul = 0;
        report
    }

    /// Cell PRB report on the subscription's own cadence. Returns a frame
    /// once the interval elapsed and the trigger is still alive, resetting
    /// the counters; drops the subscription silently on a revoked trigger.
    pub fn cell_report_due(&self) -> Option<Frame> {
        let transport = self.transport.lock().clone()?;
        let mut inner = self.inner.lock();
        let ctx = inner.prb_ctx?;
        if !transport.has_trigger(self.cfg.enb_id, ctx.trigger_id) {
            inner.prb_ctx = None;
            return None;
        }
        if ctx.last_ts.elapsed() < Duration::from_millis(u64::from(ctx.interval_ms)) {
            return None;
        }
        let report = self.frame(
            ctx.module_id,
            Message::CellMeasReport {
                cell_pci: self.cfg.pci,
                dl_prbs: inner.prb_dl,
                ul_prbs: inner.prb_ul,
            },
        );
        inner.prb_dl = 0;
        inner.prb_ul = 0;
        if let Some(ctx) = inner.prb_ctx.as_mut() {
            ctx.last_ts = Instant::now();
        }
        Some(report)
    }

    /// Install or refresh one per-UE measurement subscription, then push the
    /// UE's complete measurement configuration to RRC.
    #[allow(clippy::too_many_arguments)]
    pub fn setup_ue_period_meas(
        &self,
        rnti: u16,
        ctrl_id: u32,
        module_id: u32,
        trigger_id: u32,
        earfcn: u16,
        interval_ms: u32,
        max_cells: u8,
        max_meas: u8,
    ) -> SliceResult<()> {
        let rrc_cfg = {
            let mut inner = self.inner.lock();
            let Some(ue) = inner.ues.get_mut(&rnti) else {
                error!(rnti, "measurement setup for unknown RNTI");
                return Err(SliceError::UnknownUser(rnti));
            };

            let pos = match ue
                .meas
                .iter()
                .position(|s| s.as_ref().map(|m| m.ctrl_id) == Some(ctrl_id))
                .or_else(|| ue.meas.iter().position(|s| s.is_none()))
            {
                Some(pos) => pos,
                None => {
                    warn!(rnti, ctrl_id, "measurement slot table full, request dropped");
                    return Err(SliceError::Exhausted("measurement slots"));
                }
            };

            match &mut ue.meas[pos] {
                Some(m) => {
                    m.module_id = module_id;
                    m.trigger_id = trigger_id;
                    m.earfcn = earfcn;
                    m.interval_ms = interval_ms;
                    m.max_cells = max_cells;
                    m.max_meas = max_meas;
                }
                empty @ None => {
                    let meas_id = ue.next_meas_id;
                    let obj_id = ue.next_obj_id;
                    let rep_id = ue.next_rep_id;
                    ue.next_meas_id = ue.next_meas_id.wrapping_add(1);
                    ue.next_obj_id = ue.next_obj_id.wrapping_add(1);
                    ue.next_rep_id = ue.next_rep_id.wrapping_add(1);
                    *empty = Some(MeasSlot {
                        ctrl_id,
                        module_id,
                        trigger_id,
                        meas_id,
                        obj_id,
                        rep_id,
                        earfcn,
                        interval_ms,
                        max_cells,
                        max_meas,
                        carrier: CellMeasState::default(),
                        neighbors: [CellMeasState::default(); MAX_CELL_MEAS],
                        c_dirty: false,
                    });
                }
            }

            // RRC learns about every active slot, not only the new one.
            RrcMeasConfig {
                entries: ue
                    .meas
                    .iter()
                    .flatten()
                    .map(|m| RrcMeasEntry {
                        meas_id: m.meas_id,
                        obj_id: m.obj_id,
                        rep_id: m.rep_id,
                        earfcn: m.earfcn,
                        interval_ms: quantize_report_interval(m.interval_ms),
                        max_cells: m.max_cells,
                        bandwidth_prbs: self.cfg.meas_bandwidth_prbs,
                    })
                    .collect(),
            }
        };

        self.rrc.setup_ue_measurement(rnti, &rrc_cfg)
    }

    // ------------------------------------------------------------------
    // RRC-facing inputs.
    // ------------------------------------------------------------------

    pub fn add_user(&self, rnti: u16) {
        let mut inner = self.inner.lock();
        match inner.ues.get_mut(&rnti) {
            Some(ue) => {
                ue.state = UeState::Connected;
                ue.state_dirty = true;
            }
            None => {
                inner.ues.insert(rnti, AgentUe::new(self.cfg.plmn()));
            }
        }
        inner.ues_dirty = true;
        debug!(rnti, "user connected");
    }

    pub fn rem_user(&self, rnti: u16) {
        let mut inner = self.inner.lock();
        if let Some(ue) = inner.ues.get_mut(&rnti) {
            ue.state = UeState::Disconnected;
            ue.state_dirty = true;
            inner.ues_dirty = true;
            debug!(rnti, "user disconnected");
        }
    }

    pub fn update_user_id(&self, rnti: u16, plmn: u32, imsi: u64, tmsi: u32) {
        let mut inner = self.inner.lock();

        // An older entry with the same identity under another RNTI is a
        // renewed connection; its identity fields move on.
        for (other, ue) in inner.ues.iter_mut() {
            if *other == rnti {
                continue;
            }
            if (imsi != 0 && ue.imsi == imsi) || (tmsi != 0 && ue.tmsi == tmsi) {
                ue.imsi = 0;
                ue.tmsi = 0;
                ue.id_dirty = true;
            }
        }

        let Some(ue) = inner.ues.get_mut(&rnti) else {
            warn!(rnti, "identity update for unknown RNTI");
            return;
        };
        if plmn != 0 {
            ue.plmn = plmn;
        }
        ue.imsi = imsi;
        ue.tmsi = tmsi;
        ue.id_dirty = true;
        inner.ues_dirty = true;
        debug!(rnti, "user identity updated");
    }

    pub fn report_user(&self, rnti: u16) {
        let mut inner = self.inner.lock();
        if let Some(ue) = inner.ues.get_mut(&rnti) {
            ue.id_dirty = true;
            ue.state_dirty = true;
            inner.ues_dirty = true;
        }
    }

    pub fn report_rrc_measure(&self, rnti: u16, report: &RrcMeasReport) {
        let mut inner = self.inner.lock();
        let pci = self.cfg.pci;
        let Some(ue) = inner.ues.get_mut(&rnti) else {
            warn!(rnti, "measurement report for unknown RNTI");
            return;
        };
        let Some(m) = ue
            .meas
            .iter_mut()
            .flatten()
            .find(|m| m.meas_id == report.meas_id)
        else {
            warn!(rnti, meas_id = report.meas_id, "report for unknown measurement id");
            return;
        };

        m.carrier = CellMeasState { pci, rsrp: report.serving_rsrp, rsrq: report.serving_rsrq, dirty: true };
        for (i, cell) in report.neighbors.iter().take(MAX_CELL_MEAS).enumerate() {
            m.neighbors[i] =
                CellMeasState { pci: cell.pci, rsrp: cell.rsrp, rsrq: cell.rsrq, dirty: true };
        }
        m.c_dirty = true;
    }

    // ------------------------------------------------------------------
    // MAC-facing inputs. Wait-free: a contested lock drops the sample.
    // ------------------------------------------------------------------

    pub fn process_dl_results(&self, _tti: u32, result: &DlSchedResult) {
        let Some(mut inner) = self.inner.try_lock() else {
            return;
        };
        let prbs = u64::from(self.cfg.n_prb);
        for dci in &result.dcis {
            inner.prb_dl += match dci.alloc {
                DlAlloc::Type0 { rbg_mask } => {
                    u64::from(rbg_mask.count_ones()) * rbg_size_for_prbs(prbs as u32)
                }
                DlAlloc::Type1 { vrb_mask } => u64::from(vrb_mask.count_ones()),
                DlAlloc::Type2 { riv } => u64::from(riv) / prbs + 1,
            };
        }
    }

    pub fn process_ul_results(&self, _tti: u32, result: &UlSchedResult) {
        let Some(mut inner) = self.inner.try_lock() else {
            return;
        };
        let prbs = u64::from(self.cfg.n_prb);
        for dci in &result.dcis {
            // A UL subframe goes to a single UE, so the grant is accounted
            // at cell width.
            inner.prb_ul += (u64::from(dci.riv) / prbs + 1) * prbs;
        }
    }

    // ------------------------------------------------------------------
    // Thread control.
    // ------------------------------------------------------------------

    pub fn stop(&self) {
        if self.state.swap(STATE_STOPPED, Ordering::Relaxed) != STATE_STOPPED {
            if let Some(handle) = self.thread.lock().take() {
                let _ = handle.join();
            }
            debug!("agent stopped");
        }
    }

    // ------------------------------------------------------------------
    // Introspection for tests and the binary.
    // ------------------------------------------------------------------

    pub fn config(&self) -> &AgentConfig {
        &self.cfg
    }

    pub fn ran(&self) -> &Arc<RanManager> {
        &self.ran
    }

    pub fn nof_users(&self) -> usize {
        self.inner.lock().ues.len()
    }

    pub fn ue_report_enabled(&self) -> bool {
        self.inner.lock().uer_enabled
    }

    /// Cumulative (DL, UL) PRB counters since the last emitted report.
    pub fn prb_counters(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.prb_dl, inner.prb_ul)
    }

    pub fn active_meas_slots(&self, rnti: u16) -> usize {
        self.inner
            .lock()
            .ues
            .get(&rnti)
            .map(|ue| ue.meas.iter().flatten().count())
            .unwrap_or(0)
    }

    /// Dirty flags of a UE, as `(id_dirty, state_dirty)`.
    pub fn ue_dirty_flags(&self, rnti: u16) -> Option<(bool, bool)> {
        self.inner.lock().ues.get(&rnti).map(|ue| (ue.id_dirty, ue.state_dirty))
    }
}

impl Agent for ControlAgent {
    fn add_user(&self, rnti: u16) {
        ControlAgent::add_user(self, rnti)
    }

    fn rem_user(&self, rnti: u16) {
        ControlAgent::rem_user(self, rnti)
    }

    fn update_user_id(&self, rnti: u16, plmn: u32, imsi: u64, tmsi: u32) {
        ControlAgent::update_user_id(self, rnti, plmn, imsi, tmsi)
    }

    fn report_user(&self, rnti: u16) {
        ControlAgent::report_user(self, rnti)
    }

    fn report_rrc_measure(&self, rnti: u16, report: &RrcMeasReport) {
        ControlAgent::report_rrc_measure(self, rnti, report)
    }

    fn process_dl_results(&self, tti: u32, result: &DlSchedResult) {
        ControlAgent::process_dl_results(self, tti, result)
    }

    fn process_ul_results(&self, tti: u32, result: &UlSchedResult) {
        ControlAgent::process_ul_results(self, tti, result)
    }

    fn reset(&self) {
        ControlAgent::reset(self)
    }

    fn stop(&self) {
        ControlAgent::stop(self)
    }
}
