//! MAC-side view of the scheduled users.
//!
//! The slicing scheduler does not own the MAC; it consumes a per-TTI snapshot
//! of the UE database and hands back HARQ processes carrying RBG masks. The
//! types here model exactly that seam: a [`SchedUe`] with its DL/UL HARQ
//! processes and pending-data counters, plus the DCI shapes the telemetry
//! agent needs to account used PRBs per subframe.

use std::collections::BTreeMap;

/// Number of DL HARQ processes per UE (FDD).
pub const NOF_DL_HARQ: usize = 8;
/// Number of UL HARQ processes per UE.
pub const NOF_UL_HARQ: usize = 8;

/// The UE database handed to `new_tti`, keyed and iterated by RNTI.
pub type UeDb = BTreeMap<u16, SchedUe>;

/// Downlink HARQ process. Carries the RBG mask of its transport block until
/// the block is acknowledged; a retransmission must reuse the mask bit for
/// bit unless the scheduler installs a same-cardinality replacement.
#[derive(Debug, Clone)]
pub struct DlHarqProc {
    id: usize,
    rbg_mask: u32,
    tbs: u32,
    active: bool,
    retx: bool,
}

impl DlHarqProc {
    fn new(id: usize) -> DlHarqProc {
        DlHarqProc { id, rbg_mask: 0, tbs: 0, active: false, retx: false }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn rbg_mask(&self) -> u32 {
        self.rbg_mask
    }

    /// Install or replace the RBG mask for this process.
    pub fn set_rbg_mask(&mut self, mask: u32) {
        self.rbg_mask = mask;
    }

    pub fn tbs(&self) -> u32 {
        self.tbs
    }

    pub fn is_empty(&self) -> bool {
        !self.active
    }

    pub fn has_pending_retx(&self) -> bool {
        self.active && self.retx
    }
}

/// Contiguous uplink allocation in PRBs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UlAlloc {
    pub start: u32,
    pub len: u32,
}

/// Uplink HARQ process; keeps its contiguous PRB span until acknowledged.
#[derive(Debug, Clone)]
pub struct UlHarqProc {
    id: usize,
    alloc: UlAlloc,
    active: bool,
    retx: bool,
}

impl UlHarqProc {
    fn new(id: usize) -> UlHarqProc {
        UlHarqProc { id, alloc: UlAlloc::default(), active: false, retx: false }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn alloc(&self) -> UlAlloc {
        self.alloc
    }

    pub fn set_alloc(&mut self, alloc: UlAlloc) {
        self.alloc = alloc;
    }

    pub fn is_empty(&self) -> bool {
        !self.active
    }

    pub fn has_pending_retx(&self) -> bool {
        self.active && self.retx
    }
}

/// Per-UE scheduling state as seen by the MAC worker.
#[derive(Debug, Clone)]
pub struct SchedUe {
    rnti: u16,
    dl_pending_bytes: u32,
    ul_pending_bytes: u32,
    dl_harqs: Vec<DlHarqProc>,
    ul_harqs: Vec<UlHarqProc>,
}

impl SchedUe {
    pub fn new(rnti: u16) -> SchedUe {
        SchedUe {
            rnti,
            dl_pending_bytes: 0,
            ul_pending_bytes: 0,
            dl_harqs: (0..NOF_DL_HARQ).map(DlHarqProc::new).collect(),
            ul_harqs: (0..NOF_UL_HARQ).map(UlHarqProc::new).collect(),
        }
    }

    pub fn rnti(&self) -> u16 {
        self.rnti
    }

    /// Queue new downlink bytes arriving from the upper layers.
    pub fn push_dl_data(&mut self, bytes: u32) {
        self.dl_pending_bytes = self.dl_pending_bytes.saturating_add(bytes);
    }

    /// Queue a buffer-status report worth of uplink bytes.
    pub fn push_ul_data(&mut self, bytes: u32) {
        self.ul_pending_bytes = self.ul_pending_bytes.saturating_add(bytes);
    }

    /// Bytes of new DL data waiting to be scheduled.
    pub fn pending_dl_new_data(&self, _tti: u32) -> u32 {
        self.dl_pending_bytes
    }

    /// Bytes of UL data the UE reported as buffered.
    pub fn pending_ul_data(&self, _tti: u32) -> u32 {
        self.ul_pending_bytes
    }

    /// Index of the oldest DL HARQ process awaiting retransmission.
    pub fn pending_dl_harq(&self, _tti: u32) -> Option<usize> {
        self.dl_harqs.iter().position(|h| h.has_pending_retx())
    }

    /// Index of a free DL HARQ process, if any.
    pub fn empty_dl_harq(&self) -> Option<usize> {
        self.dl_harqs.iter().position(|h| h.is_empty())
    }

    pub fn dl_harq(&self, pid: usize) -> &DlHarqProc {
        &self.dl_harqs[pid]
    }

    pub fn dl_harq_mut(&mut self, pid: usize) -> &mut DlHarqProc {
        &mut self.dl_harqs[pid]
    }

    /// Index of the oldest UL HARQ process awaiting retransmission.
    pub fn pending_ul_harq(&self, _tti: u32) -> Option<usize> {
        self.ul_harqs.iter().position(|h| h.has_pending_retx())
    }

    pub fn empty_ul_harq(&self) -> Option<usize> {
        self.ul_harqs.iter().position(|h| h.is_empty())
    }

    pub fn ul_harq(&self, pid: usize) -> &UlHarqProc {
        &self.ul_harqs[pid]
    }

    pub fn ul_harq_mut(&mut self, pid: usize) -> &mut UlHarqProc {
        &mut self.ul_harqs[pid]
    }

    /// Mark a DL transport block as sent: the process goes active and the
    /// pending-data counter drops by the block size.
    pub fn commit_dl_tx(&mut self, pid: usize, tbs: u32) {
        let h = &mut self.dl_harqs[pid];
        h.active = true;
        h.retx = false;
        h.tbs = tbs;
        self.dl_pending_bytes = self.dl_pending_bytes.saturating_sub(tbs);
    }

    /// Acknowledge a DL process, freeing it for new data.
    pub fn ack_dl(&mut self, pid: usize) {
        let h = &mut self.dl_harqs[pid];
        h.active = false;
        h.retx = false;
        h.rbg_mask = 0;
        h.tbs = 0;
    }

    /// Negative acknowledgement: the process must be retransmitted.
    pub fn nack_dl(&mut self, pid: usize) {
        let h = &mut self.dl_harqs[pid];
        if h.active {
            h.retx = true;
        }
    }

    /// Mark a UL grant as issued.
    pub fn commit_ul_tx(&mut self, pid: usize, granted: u32) {
        let h = &mut self.ul_harqs[pid];
        h.active = true;
        h.retx = false;
        self.ul_pending_bytes = self.ul_pending_bytes.saturating_sub(granted);
    }

    pub fn ack_ul(&mut self, pid: usize) {
        let h = &mut self.ul_harqs[pid];
        h.active = false;
        h.retx = false;
        h.alloc = UlAlloc::default();
    }

    pub fn nack_ul(&mut self, pid: usize) {
        let h = &mut self.ul_harqs[pid];
        if h.active {
            h.retx = true;
        }
    }

    /// PRBs needed to carry `dsize` bytes given the control region width.
    ///
    /// Linear capacity model: 12 subcarriers by the data symbols of the
    /// subframe at QPSK. The slicing logic only needs a monotone estimate.
    pub fn required_prb_dl(&self, dsize: u32, nof_ctrl_sym: u32) -> u32 {
        let bpp = bytes_per_prb(nof_ctrl_sym);
        dsize.div_ceil(bpp)
    }
}

/// Payload bytes one PRB carries for a given control region width.
pub fn bytes_per_prb(nof_ctrl_sym: u32) -> u32 {
    let data_sym = 14u32.saturating_sub(nof_ctrl_sym).max(1);
    // 12 subcarriers, 2 bits per RE, 8 bits per byte.
    (12 * data_sym * 2) / 8
}

/// Downlink allocation shapes carried by a DCI.
#[derive(Debug, Clone, Copy)]
pub enum DlAlloc {
    /// Bitmap of RBGs.
    Type0 { rbg_mask: u32 },
    /// Bitmap of VRBs.
    Type1 { vrb_mask: u32 },
    /// Resource indication value encoding a contiguous span.
    Type2 { riv: u32 },
}

/// One downlink grant of a subframe's scheduling result.
#[derive(Debug, Clone, Copy)]
pub struct DlDci {
    pub rnti: u16,
    pub alloc: DlAlloc,
}

/// Downlink scheduling outcome for one subframe, as passed to the agent.
#[derive(Debug, Clone, Default)]
pub struct DlSchedResult {
    pub dcis: Vec<DlDci>,
}

/// One uplink grant; UL grants are always contiguous (RIV-coded).
#[derive(Debug, Clone, Copy)]
pub struct UlDci {
    pub rnti: u16,
    pub riv: u32,
}

/// Uplink scheduling outcome for one subframe.
#[derive(Debug, Clone, Default)]
pub struct UlSchedResult {
    pub dcis: Vec<UlDci>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harq_lifecycle() {
        let mut ue = SchedUe::new(0x46);
        assert_eq!(ue.pending_dl_harq(0), None);
        let pid = ue.empty_dl_harq().unwrap();
        ue.dl_harq_mut(pid).set_rbg_mask(0b111);
        ue.commit_dl_tx(pid, 100);
        assert!(ue.dl_harq(pid).has_pending_retx() == false);
        ue.nack_dl(pid);
        assert_eq!(ue.pending_dl_harq(0), Some(pid));
        ue.ack_dl(pid);
        assert_eq!(ue.pending_dl_harq(0), None);
        assert_eq!(ue.dl_harq(pid).rbg_mask(), 0);
    }

    #[test]
    fn pending_data_drains_on_commit() {
        let mut ue = SchedUe::new(0x47);
        ue.push_dl_data(300);
        assert_eq!(ue.pending_dl_new_data(0), 300);
        let pid = ue.empty_dl_harq().unwrap();
        ue.commit_dl_tx(pid, 200);
        assert_eq!(ue.pending_dl_new_data(0), 100);
        ue.commit_dl_tx(pid, 200);
        assert_eq!(ue.pending_dl_new_data(0), 0);
    }

    #[test]
    fn required_prb_is_monotone_in_ctrl_region() {
        let ue = SchedUe::new(1);
        // A wider control region leaves fewer data symbols per PRB.
        assert!(ue.required_prb_dl(1000, 3) >= ue.required_prb_dl(1000, 1));
        assert_eq!(ue.required_prb_dl(0, 2), 0);
    }
}
