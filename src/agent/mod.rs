//! Telemetry/control agent.
//!
//! The agent sits between three worlds: RRC hands it user lifecycle edges and
//! measurement reports, the MAC hands it per-TTI scheduling results, and the
//! controller subscribes to reports and pushes slice commands. Everything
//! RRC- and MAC-facing only marks dirty state; a background loop turns dirty
//! state into framed reports on a coarse cadence.

pub mod control;
pub mod dispatch;
pub mod noop;

pub use control::ControlAgent;
pub use dispatch::AgentDispatch;
pub use noop::NoopAgent;

use crate::error::SliceResult;
use crate::mac::{DlSchedResult, UlSchedResult};

/// Life of the agent loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Stopped,
    Paused,
    Started,
}

/// Active measurement slots per UE.
pub const MAX_MEAS: usize = 32;
/// Neighbor-cell readings per measurement slot.
pub const MAX_CELL_MEAS: usize = 8;
/// UEs carried by a single UE report frame.
pub const REPORT_MAX_UES: usize = 32;

/// One cell reading inside an RRC measurement report.
#[derive(Debug, Clone, Copy, Default)]
pub struct RrcCellMeasure {
    pub pci: u16,
    pub rsrp: i16,
    pub rsrq: i16,
}

/// RRC measurement report as delivered by the RRC layer.
#[derive(Debug, Clone, Default)]
pub struct RrcMeasReport {
    /// RRC-level measurement identity the report answers.
    pub meas_id: u8,
    pub serving_rsrp: i16,
    pub serving_rsrq: i16,
    pub neighbors: Vec<RrcCellMeasure>,
}

/// One entry of an RRC measurement configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RrcMeasEntry {
    pub meas_id: u8,
    pub obj_id: u8,
    pub rep_id: u8,
    pub earfcn: u16,
    /// Quantized reporting interval in milliseconds.
    pub interval_ms: u32,
    pub max_cells: u8,
    /// Measurement bandwidth in PRBs; configured, not hard-coded.
    pub bandwidth_prbs: u8,
}

/// RRC measurement configuration covering every active slot of a UE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RrcMeasConfig {
    pub entries: Vec<RrcMeasEntry>,
}

/// Outbound seam toward the RRC layer.
pub trait RrcInterface: Send + Sync {
    fn setup_ue_measurement(&self, rnti: u16, cfg: &RrcMeasConfig) -> SliceResult<()>;
}

/// Surface common to the real agent and the no-op variant: upper-layer edges
/// in, nothing owed back.
pub trait Agent: Send + Sync {
    // RRC-facing.
    fn add_user(&self, rnti: u16);
    fn rem_user(&self, rnti: u16);
    fn update_user_id(&self, rnti: u16, plmn: u32, imsi: u64, tmsi: u32);
    fn report_user(&self, rnti: u16);
    fn report_rrc_measure(&self, rnti: u16, report: &RrcMeasReport);

    // MAC-facing, once per TTI, never blocking.
    fn process_dl_results(&self, tti: u32, result: &DlSchedResult);
    fn process_ul_results(&self, tti: u32, result: &UlSchedResult);

    // Control.
    fn reset(&self);
    fn stop(&self);
}

/// Reporting intervals the RRC measurement configuration can express, in ms.
const RRC_REPORT_INTERVALS: [u32; 8] = [120, 240, 480, 640, 1024, 2048, 5120, 10240];

/// Smallest expressible reporting interval not below the requested one;
/// requests beyond the table saturate at its top.
pub fn quantize_report_interval(interval_ms: u32) -> u32 {
    for step in RRC_REPORT_INTERVALS {
        if interval_ms <= step {
            return step;
        }
    }
    RRC_REPORT_INTERVALS[RRC_REPORT_INTERVALS.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_quantization_picks_least_upper_step() {
        assert_eq!(quantize_report_interval(0), 120);
        assert_eq!(quantize_report_interval(120), 120);
        assert_eq!(quantize_report_interval(121), 240);
        assert_eq!(quantize_report_interval(500), 640);
        assert_eq!(quantize_report_interval(641), 1024);
        assert_eq!(quantize_report_interval(2048), 2048);
        assert_eq!(quantize_report_interval(9000), 10240);
        assert_eq!(quantize_report_interval(50_000), 10240);
    }
}
