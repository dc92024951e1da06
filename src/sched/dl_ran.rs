//! Per-subframe downlink RAN scheduler.
//!
//! Every TTI the MAC worker calls [`DlRanScheduler::new_tti`], which
//! snapshots UE state, lets the active slice scheduler carve the subframe's
//! RBGs into per-slice shares, and records the resulting owner RNTI for each
//! group. The worker then asks [`DlRanScheduler::get_user_allocation`] once
//! per UE; the answer reconciles the owner map with any outstanding HARQ
//! retransmission, whose mask must survive bit for bit unless a
//! same-cardinality replacement can be drawn from the groups the UE owns.
//!
//! Spectrum exclusivity is upheld here: a group carries at most one owner per
//! TTI, and a slice only ever receives groups nobody else claimed.

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{SliceError, SliceResult};
use crate::mac::{bytes_per_prb, DlHarqProc, SchedUe, UeDb};
use crate::mask::{calc_rbg_mask, count_rbg, new_allocation, CellGeometry, MAX_RBG};
use crate::sched::stats::AllocStats;
use crate::sched::{
    MacSliceConfig, MacSliceInfo, MultiSliceSched, Slice, SliceId, SliceMap, SliceScheduler,
    SliceStrategy, UserMap, UserScheduler, DEFAULT_SLICE,
};

/// A user entry unseen for this many absolute TTIs is re-initialized on next
/// sight.
const USER_STALE_TTIS: u64 = 5000;

struct DlRanState {
    tti: u32,
    abs_tti: u64,
    ctrl_sym: u32,
    start_rbg: u32,
    nof_rbg: u32,
    max_rbg: u32,
    rbg_size: u32,
    /// Per-TTI scratch: groups unavailable to the slicing logic.
    in_use: [bool; MAX_RBG],
    /// Per-TTI outcome: owner RNTI per group, 0 when unassigned.
    owner: [u16; MAX_RBG],
    slice_sched: SliceStrategy,
    slices: SliceMap,
    users: UserMap,
    stats: AllocStats,
}

impl DlRanState {
    fn set_rbg_delta(&mut self, rnti: u16, delta: u32) {
        if let Some(user) = self.users.get_mut(&rnti) {
            user.dl_rbg_delta = delta;
        }
    }
}

/// Downlink slicing scheduler. All state sits behind one short-held lock
/// shared between the MAC worker and the agent.
pub struct DlRanScheduler {
    inner: Mutex<DlRanState>,
}

impl DlRanScheduler {
    /// Build a scheduler with the default multi-slice strategy and empty
    /// slice/user maps.
    pub fn new() -> DlRanScheduler {
        DlRanScheduler::with_slice_strategy(SliceStrategy::Multi(MultiSliceSched::new()))
    }

    /// Build a scheduler around an explicit slice strategy.
    pub fn with_slice_strategy(strategy: SliceStrategy) -> DlRanScheduler {
        DlRanScheduler {
            inner: Mutex::new(DlRanState {
                tti: 0,
                abs_tti: 0,
                ctrl_sym: 0,
                start_rbg: 0,
                nof_rbg: 0,
                max_rbg: 0,
                rbg_size: 1,
                in_use: [false; MAX_RBG],
                owner: [0; MAX_RBG],
                slice_sched: strategy,
                slices: SliceMap::new(),
                users: UserMap::new(),
                stats: AllocStats::new(),
            }),
        }
    }

    /// Register a new slice with a default round-robin user scheduler.
    pub fn add_slice(&self, id: SliceId) -> SliceResult<()> {
        let mut st = self.inner.lock();
        if st.slices.contains_key(&id) {
            error!(slice = id, "slice already exists in the MAC scheduler");
            return Err(SliceError::DuplicateSlice(id));
        }
        st.slices.insert(id, Slice::new(0));
        info!(slice = id, "slice added to the MAC scheduler");
        Ok(())
    }

    /// Drop a slice and its user scheduler. The default slice stays.
    pub fn rem_slice(&self, id: SliceId) -> SliceResult<()> {
        if id == DEFAULT_SLICE {
            error!("cannot remove the default slice");
            return Err(SliceError::InvalidArgument("default slice is not removable"));
        }
        let mut st = self.inner.lock();
        if st.slices.remove(&id).is_none() {
            error!(slice = id, "slice not found in the MAC scheduler");
            return Err(SliceError::UnknownSlice(id));
        }
        info!(slice = id, "slice removed from the MAC scheduler");
        Ok(())
    }

    /// Push a slice's time/space budget down to the slice scheduler.
    /// Overcommitment is not enforced here.
    pub fn set_slice(&self, id: SliceId, cfg: &MacSliceConfig) -> SliceResult<()> {
        let mut st = self.inner.lock();
        st.slice_sched.set_resources(id, cfg.time, cfg.rbg)
    }

    /// Attach a user to a slice. An unlocked user may be re-assigned by the
    /// scheduler on its own.
    pub fn add_slice_user(&self, rnti: u16, slice: SliceId, lock: bool) -> SliceResult<()> {
        let mut st = self.inner.lock();
        let Some(s) = st.slices.get_mut(&slice) else {
            error!(slice, "slice does not exist in the MAC scheduler");
            return Err(SliceError::UnknownSlice(slice));
        };
        if s.users.contains_key(&rnti) {
            error!(rnti, slice, "user already associated to slice");
            return Err(SliceError::DuplicateUser(rnti));
        }
        s.users.insert(rnti, 1);
        st.users.entry(rnti).or_default().self_managed = !lock;
        info!(rnti, slice, "user associated to slice");
        Ok(())
    }

    /// Detach a user. `slice == 0` removes the user from every slice; the
    /// user entry itself is dropped either way.
    pub fn rem_slice_user(&self, rnti: u16, slice: SliceId) {
        let mut st = self.inner.lock();
        if slice == 0 {
            for s in st.slices.values_mut() {
                s.users.remove(&rnti);
            }
        } else if let Some(s) = st.slices.get_mut(&slice) {
            s.users.remove(&rnti);
        }
        if st.users.remove(&rnti).is_some() {
            info!(rnti, slice, "user removed from slice");
        }
    }

    /// Id of the active slice scheduler.
    pub fn get_slice_sched_id(&self) -> u32 {
        self.inner.lock().slice_sched.id()
    }

    /// Current configuration of a slice, with at most `max_users` members.
    pub fn get_slice_info(&self, id: SliceId, max_users: usize) -> SliceResult<MacSliceInfo> {
        let st = self.inner.lock();
        let Some(slice) = st.slices.get(&id) else {
            error!(slice = id, "slice not found in the MAC scheduler");
            return Err(SliceError::UnknownSlice(id));
        };
        let rbg = st.slice_sched.get_resources(id).map(|(_, res)| res).unwrap_or(0);
        Ok(MacSliceInfo {
            user_sched: slice.user_sched.id(),
            rbg,
            users: slice.users.keys().take(max_users).copied().collect(),
        })
    }

    /// Organize a new downlink subframe: refresh the user map from the MAC
    /// database, then let the slice scheduler fill the owner array.
    pub fn new_tti(
        &self,
        ue_db: &UeDb,
        start_rbg: u32,
        nof_rbg: u32,
        nof_ctrl_sym: u32,
        tti: u32,
    ) {
        let mut st = self.inner.lock();
        let st = &mut *st;

        st.abs_tti += 1;
        st.tti = tti;
        st.ctrl_sym = nof_ctrl_sym;
        st.start_rbg = start_rbg;
        st.nof_rbg = nof_rbg;

        // Guess the cell width the first time a wider subframe shows up.
        if nof_rbg > st.max_rbg {
            let geom = CellGeometry::from_nof_rbg(nof_rbg);
            st.max_rbg = geom.max_rbg;
            st.rbg_size = geom.rbg_size;
            debug!(max_rbg = st.max_rbg, rbg_size = st.rbg_size, "cell geometry derived");
        }

        // Groups reserved by the system (outside the allocatable span) are
        // closed to the slicing logic; the rest opens up.
        for i in 0..MAX_RBG {
            let i = i as u32;
            st.in_use[i as usize] = i < start_rbg || i >= start_rbg + nof_rbg;
        }
        st.owner = [0; MAX_RBG];

        for (rnti, ue) in ue_db.iter() {
            let abs = st.abs_tti;
            let is_new = !st.users.contains_key(rnti);
            let user = st.users.entry(*rnti).or_default();
            if is_new || abs - user.last_seen > USER_STALE_TTIS {
                user.self_managed = true;
                user.dl_data = 0;
                user.dl_data_delta = 0;
            }
            user.last_seen = abs;
            user.has_data =
                ue.pending_dl_new_data(tti) > 0 || ue.pending_dl_harq(tti).is_some();
        }

        st.slice_sched.schedule(tti, &mut st.slices, &mut st.users, &mut st.in_use, &mut st.owner);

        st.stats.new_tti();
    }

    /// Answer the MAC's per-UE allocation query for the organized subframe.
    ///
    /// Returns the HARQ process to transmit, or `None` when the UE owns no
    /// groups, the pending retransmission cannot fit, or there is no data.
    pub fn get_user_allocation<'a>(&self, ue: &'a mut SchedUe) -> Option<&'a mut DlHarqProc> {
        let mut st = self.inner.lock();
        let st = &mut *st;
        let rnti = ue.rnti();

        let mut owned = [false; MAX_RBG];
        let mut nof_owned = 0u32;
        for (i, slot) in owned.iter_mut().enumerate() {
            if rnti != 0 && st.owner[i] == rnti {
                *slot = true;
                nof_owned += 1;
            }
        }

        if nof_owned == 0 {
            st.set_rbg_delta(rnti, 0);
            return None;
        }

        let owned_mask = calc_rbg_mask(&owned, MAX_RBG as u32);

        // Pending retransmission first: its mask is preserved when it still
        // fits, replaced by a same-cardinality mask when it does not.
        if let Some(pid) = ue.pending_dl_harq(st.tti) {
            let h_mask = ue.dl_harq(pid).rbg_mask();

            if h_mask == owned_mask {
                st.set_rbg_delta(rnti, nof_owned);
                st.stats.record_dl_mask(rnti, h_mask);
                return Some(ue.dl_harq_mut(pid));
            }

            let nof_h_rbg = count_rbg(h_mask);
            if nof_h_rbg <= nof_owned {
                let (new_mask, taken) = new_allocation(nof_h_rbg, &owned);
                ue.dl_harq_mut(pid).set_rbg_mask(new_mask);
                st.set_rbg_delta(rnti, taken);
                st.stats.record_dl_mask(rnti, new_mask);
                return Some(ue.dl_harq_mut(pid));
            }

            error!(
                rnti,
                harq = %format_args!("{h_mask:#x}"),
                avail = %format_args!("{owned_mask:#x}"),
                "pending HARQ does not fit in the owned groups"
            );
            st.set_rbg_delta(rnti, 0);
            st.stats.record_dl_mask(rnti, 0);
            return None;
        }

        // New data on a free process.
        if let Some(pid) = ue.empty_dl_harq() {
            let dsize = ue.pending_dl_new_data(st.tti);
            if dsize > 0 {
                let nof_prb = ue.required_prb_dl(dsize, st.ctrl_sym);
                // Over-provisions by one group on purpose; the rounding is
                // part of the external contract.
                let nof_req = nof_prb.div_ceil(st.rbg_size) + 1;
                let (mask, taken) = new_allocation(nof_req, &owned);
                if mask != 0 {
                    let tbs = taken * st.rbg_size * bytes_per_prb(st.ctrl_sym);
                    ue.dl_harq_mut(pid).set_rbg_mask(mask);
                    ue.commit_dl_tx(pid, tbs);
                    st.set_rbg_delta(rnti, taken);
                    if let Some(user) = st.users.get_mut(&rnti) {
                        user.dl_data_delta = tbs.min(dsize);
                        user.dl_data += u64::from(user.dl_data_delta);
                    }
                    st.stats.record_dl_mask(rnti, mask);
                    return Some(ue.dl_harq_mut(pid));
                }
            }
        }

        st.set_rbg_delta(rnti, 0);
        None
    }

    /// RBGs granted to a user during the last organized subframe.
    pub fn user_rbg_delta(&self, rnti: u16) -> u32 {
        self.inner.lock().users.get(&rnti).map(|u| u.dl_rbg_delta).unwrap_or(0)
    }

    /// Owner RNTI of each group in the last organized subframe.
    pub fn owner_snapshot(&self) -> [u16; MAX_RBG] {
        self.inner.lock().owner
    }

    /// Whether a slice is currently registered.
    pub fn has_slice(&self, id: SliceId) -> bool {
        self.inner.lock().slices.contains_key(&id)
    }
}

impl Default for DlRanScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::SchedUe;
    use crate::sched::SCHED_RR_USER;

    fn db_with(rntis: &[u16]) -> UeDb {
        rntis.iter().map(|&r| (r, SchedUe::new(r))).collect()
    }

    fn setup_one_slice(sched: &DlRanScheduler, slice: SliceId, rntis: &[u16]) {
        sched.add_slice(slice).unwrap();
        sched
            .set_slice(slice, &MacSliceConfig { user_sched: 0, rbg: 130, time: 10, users: vec![] })
            .unwrap();
        for &r in rntis {
            sched.add_slice_user(r, slice, true).unwrap();
        }
    }

    #[test]
    fn duplicate_slice_is_rejected_without_side_effects() {
        let sched = DlRanScheduler::new();
        sched.add_slice(5).unwrap();
        sched.add_slice_user(0x46, 5, true).unwrap();
        assert!(matches!(sched.add_slice(5), Err(SliceError::DuplicateSlice(5))));
        let info = sched.get_slice_info(5, 8).unwrap();
        assert_eq!(info.users, vec![0x46]);
        assert_eq!(info.user_sched, SCHED_RR_USER);
    }

    #[test]
    fn default_slice_cannot_be_removed() {
        let sched = DlRanScheduler::new();
        sched.add_slice(DEFAULT_SLICE).unwrap();
        assert!(sched.rem_slice(DEFAULT_SLICE).is_err());
        assert!(sched.has_slice(DEFAULT_SLICE));
    }

    #[test]
    fn allocation_lands_inside_the_subframe_span() {
        let sched = DlRanScheduler::new();
        setup_one_slice(&sched, 5, &[0x46]);
        let mut db = db_with(&[0x46]);
        db.get_mut(&0x46).unwrap().push_dl_data(50);

        sched.new_tti(&db, 0, 13, 3, 0);
        let ue = db.get_mut(&0x46).unwrap();
        let harq = sched.get_user_allocation(ue).expect("allocation expected");
        let mask = harq.rbg_mask();
        assert_ne!(mask, 0);
        assert_eq!(mask & !((1 << 13) - 1), 0, "bits beyond the 13-RBG cell");
    }

    #[test]
    fn retransmission_mask_is_preserved_bit_for_bit() {
        let sched = DlRanScheduler::new();
        setup_one_slice(&sched, 5, &[0x46]);
        let mut db = db_with(&[0x46]);
        db.get_mut(&0x46).unwrap().push_dl_data(40);

        sched.new_tti(&db, 0, 13, 3, 0);
        let pid;
        let mask;
        {
            let ue = db.get_mut(&0x46).unwrap();
            let harq = sched.get_user_allocation(ue).unwrap();
            pid = harq.id();
            mask = harq.rbg_mask();
        }
        db.get_mut(&0x46).unwrap().nack_dl(pid);

        sched.new_tti(&db, 0, 13, 3, 1);
        let ue = db.get_mut(&0x46).unwrap();
        let harq = sched.get_user_allocation(ue).unwrap();
        assert_eq!(harq.id(), pid);
        assert_eq!(harq.rbg_mask(), mask);
    }

    #[test]
    fn user_without_groups_gets_no_allocation() {
        let sched = DlRanScheduler::new();
        setup_one_slice(&sched, 5, &[0x46]);
        let mut db = db_with(&[0x46, 0x99]);
        db.get_mut(&0x99).unwrap().push_dl_data(100);

        sched.new_tti(&db, 0, 13, 3, 0);
        // 0x99 belongs to no slice, so it owns nothing.
        let ue = db.get_mut(&0x99).unwrap();
        assert!(sched.get_user_allocation(ue).is_none());
        assert_eq!(sched.user_rbg_delta(0x99), 0);
    }

    #[test]
    fn add_then_remove_restores_membership() {
        let sched = DlRanScheduler::new();
        setup_one_slice(&sched, 5, &[0x46]);
        let before = sched.get_slice_info(5, 16).unwrap().users;
        sched.add_slice_user(0x47, 5, false).unwrap();
        sched.rem_slice_user(0x47, 5);
        assert_eq!(sched.get_slice_info(5, 16).unwrap().users, before);
    }

    #[test]
    fn rem_slice_user_zero_purges_every_slice() {
        let sched = DlRanScheduler::new();
        setup_one_slice(&sched, 5, &[0x46]);
        sched.add_slice(6).unwrap();
        sched.add_slice_user(0x46, 6, true).unwrap();
        sched.rem_slice_user(0x46, 0);
        assert!(sched.get_slice_info(5, 16).unwrap().users.is_empty());
        assert!(sched.get_slice_info(6, 16).unwrap().users.is_empty());
    }
}
