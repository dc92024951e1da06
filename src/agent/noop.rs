//! No-op agent.
//!
//! Satisfies the full agent surface while doing nothing, so an eNB can run
//! without a controller: every upper-layer edge is swallowed and no thread is
//! spawned. Selected by the binary when no controller address is configured.

use crate::agent::{Agent, RrcMeasReport};
use crate::mac::{DlSchedResult, UlSchedResult};

#[derive(Debug, Default)]
pub struct NoopAgent;

impl NoopAgent {
    pub fn new() -> NoopAgent {
        NoopAgent
    }
}

impl Agent for NoopAgent {
    fn add_user(&self, _rnti: u16) {}

    fn rem_user(&self, _rnti: u16) {}

    fn update_user_id(&self, _rnti: u16, _plmn: u32, _imsi: u64, _tmsi: u32) {}

    fn report_user(&self, _rnti: u16) {}

    fn report_rrc_measure(&self, _rnti: u16, _report: &RrcMeasReport) {}

    fn process_dl_results(&self, _tti: u32, _result: &DlSchedResult) {}

    fn process_ul_results(&self, _tti: u32, _result: &UlSchedResult) {}

    fn reset(&self) {}

    fn stop(&self) {}
}
