//! Controller-request dispatch.
//!
//! Stateless adapter between the controller link and the agent/RAN pair: one
//! inbound frame in, zero or more reply frames out. The link hands every
//! decoded frame here with the dispatcher as its context handle, so no
//! process-wide agent pointer exists anywhere.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::agent::ControlAgent;
use crate::proto::{
    Frame, Message, CELL_CAP_CELL_MEASURE, CELL_CAP_UE_MEASURE, CELL_CAP_UE_REPORT,
};
use crate::ran::{RanManager, SliceConfig};

pub struct AgentDispatch {
    agent: Arc<ControlAgent>,
    ran: Arc<RanManager>,
}

impl AgentDispatch {
    pub fn new(agent: Arc<ControlAgent>, ran: Arc<RanManager>) -> AgentDispatch {
        AgentDispatch { agent, ran }
    }

    fn reply(&self, module_id: u32, msg: Message) -> Frame {
        let cfg = self.agent.config();
        Frame { enb_id: cfg.enb_id, cell_pci: cfg.pci, module_id, msg }
    }

    fn enb_setup(&self, module_id: u32) -> Frame {
        let cfg = self.agent.config();
        self.reply(
            module_id,
            Message::EnbCapReport {
                cell_caps: CELL_CAP_UE_REPORT | CELL_CAP_UE_MEASURE | CELL_CAP_CELL_MEASURE,
                n_prb: cfg.n_prb,
                dl_earfcn: cfg.dl_earfcn,
                ul_earfcn: cfg.ul_earfcn,
                l2_caps: self.ran.l2_caps(),
                slice_sched: self.ran.get_slice_sched(),
            },
        )
    }

    fn slicing_enabled(&self) -> bool {
        cfg!(feature = "ran-slicing")
    }

    fn slice_conf(conf: &crate::proto::SliceConfPayload) -> SliceConfig {
        SliceConfig {
            user_sched: conf.user_sched,
            rbg: conf.rbg,
            time: conf.time,
            users: conf.users.clone(),
        }
    }

    /// Process one controller request.
    pub fn dispatch(&self, frame: Frame) -> Vec<Frame> {
        let module_id = frame.module_id;
        match frame.msg {
            Message::EnbSetupRequest => vec![self.enb_setup(module_id)],

            Message::UeReportSetup { trigger_id } => {
                self.agent.setup_ue_report(module_id, trigger_id);
                Vec::new()
            }

            Message::UeMeasureSetup {
                trigger_id,
                meas_id,
                rnti,
                earfcn,
                interval_ms,
                max_cells,
                max_meas,
            } => match self.agent.setup_ue_period_meas(
                rnti, meas_id, module_id, trigger_id, earfcn, interval_ms, max_cells, max_meas,
            ) {
                Ok(()) => Vec::new(),
                Err(e) => {
                    warn!(rnti, meas_id, error = %e, "UE measurement setup failed");
                    vec![self.reply(module_id, Message::UeMeasFail { rnti, meas_id })]
                }
            },

            Message::CellMeasureSetup { cell_pci, interval_ms, trigger_id } => {
                vec![self.agent.setup_cell_measurement(cell_pci, module_id, interval_ms, trigger_id)]
            }

            Message::MacReportSetup { interval_ms, trigger_id } => {
                // MAC-level PRB reporting rides the same per-cell context.
                let pci = self.agent.config().pci;
                vec![self.agent.setup_cell_measurement(pci, module_id, interval_ms, trigger_id)]
            }

            Message::SliceRequest { slice_id } => {
                if !self.slicing_enabled() {
                    return vec![self.reply(module_id, Message::SliceNotSupported)];
                }
                if slice_id == 0 {
                    self.ran
                        .get_slices(usize::MAX)
                        .into_iter()
                        .filter_map(|id| self.agent.slice_report(module_id, id))
                        .collect()
                } else {
                    match self.agent.slice_report(module_id, slice_id) {
                        Some(frame) => vec![frame],
                        None => {
                            warn!(slice_id, "slice report requested for unknown slice");
                            Vec::new()
                        }
                    }
                }
            }

            Message::SliceAdd { slice_id, conf } => {
                if !self.slicing_enabled() {
                    return vec![self.reply(module_id, Message::SliceNotSupported)];
                }
                let plmn = ((slice_id >> 32) & 0xff_ffff) as u32;
                if let Err(e) = self.ran.add_slice(slice_id, plmn) {
                    warn!(slice_id, error = %e, "slice addition refused");
                } else if let Err(e) = self.ran.set_slice(slice_id, &Self::slice_conf(&conf)) {
                    warn!(slice_id, error = %e, "slice configuration refused");
                }
                self.agent.mark_ran_dirty();
                Vec::new()
            }

            Message::SliceRem { slice_id } => {
                if !self.slicing_enabled() {
                    return vec![self.reply(module_id, Message::SliceNotSupported)];
                }
                if let Err(e) = self.ran.rem_slice(slice_id) {
                    warn!(slice_id, error = %e, "slice removal refused");
                }
                self.agent.mark_ran_dirty();
                Vec::new()
            }

            Message::SliceConf { slice_id, conf } => {
                if !self.slicing_enabled() {
                    return vec![self.reply(module_id, Message::SliceNotSupported)];
                }
                // Idempotent add-then-set: a duplicate add is fine.
                let plmn = ((slice_id >> 32) & 0xff_ffff) as u32;
                let _ = self.ran.add_slice(slice_id, plmn);
                if let Err(e) = self.ran.set_slice(slice_id, &Self::slice_conf(&conf)) {
                    warn!(slice_id, error = %e, "slice configuration refused");
                }
                self.agent.mark_ran_dirty();
                Vec::new()
            }

            Message::TriggerRevoke { .. } => Vec::new(),

            // Reports never travel toward the eNB.
            other => {
                debug!(?other, "ignoring unexpected inbound message");
                Vec::new()
            }
        }
    }
}

impl crate::transport::InboundHandler for AgentDispatch {
    fn handle(&self, frame: Frame) -> Vec<Frame> {
        self.dispatch(frame)
    }

    fn disconnected(&self) {
        self.agent.reset();
    }
}
