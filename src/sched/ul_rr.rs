//! Uplink round-robin reference scheduler.
//!
//! Deliberately plain: the subframe's PRBs are split evenly across users with
//! buffered uplink data, each receiving one contiguous span. A pending UL
//! retransmission keeps its original span when it is still free and inside
//! the subframe, and is skipped otherwise. No slicing applies on the uplink.

use parking_lot::Mutex;
use tracing::debug;

use crate::mac::{bytes_per_prb, SchedUe, UeDb, UlAlloc, UlHarqProc};

/// Widest uplink the reference scheduler addresses, in PRBs.
pub const MAX_UL_PRB: usize = 100;

struct UlRrState {
    tti: u32,
    nof_rb: u32,
    used: [bool; MAX_UL_PRB],
    nof_users_with_data: u32,
}

impl UlRrState {
    fn span_is_free(&self, alloc: UlAlloc) -> bool {
        let end = alloc.start + alloc.len;
        if alloc.len == 0 || end > self.nof_rb {
            return false;
        }
        (alloc.start..end).all(|i| !self.used[i as usize])
    }

    fn claim(&mut self, alloc: UlAlloc) {
        for i in alloc.start..alloc.start + alloc.len {
            self.used[i as usize] = true;
        }
    }

    /// First contiguous free span of `len` PRBs, scanning from PRB 0.
    fn find_free_span(&self, len: u32) -> Option<UlAlloc> {
        if len == 0 {
            return None;
        }
        let mut run = 0u32;
        for i in 0..self.nof_rb.min(MAX_UL_PRB as u32) {
            if self.used[i as usize] {
                run = 0;
            } else {
                run += 1;
                if run == len {
                    return Some(UlAlloc { start: i + 1 - len, len });
                }
            }
        }
        None
    }
}

pub struct UlRrScheduler {
    inner: Mutex<UlRrState>,
}

impl UlRrScheduler {
    pub fn new() -> UlRrScheduler {
        UlRrScheduler {
            inner: Mutex::new(UlRrState {
                tti: 0,
                nof_rb: 0,
                used: [false; MAX_UL_PRB],
                nof_users_with_data: 0,
            }),
        }
    }

    /// Open a new uplink subframe of `nof_rb` PRBs.
    pub fn new_tti(&self, ue_db: &UeDb, nof_rb: u32, tti: u32) {
        let mut st = self.inner.lock();
        st.tti = tti;
        st.nof_rb = nof_rb.min(MAX_UL_PRB as u32);
        st.used = [false; MAX_UL_PRB];
        st.nof_users_with_data = ue_db
            .values()
            .filter(|ue| ue.pending_ul_data(tti) > 0 || ue.pending_ul_harq(tti).is_some())
            .count() as u32;
    }

    /// Grant a UL span to one user, honoring a pending retransmission first.
    pub fn get_user_allocation<'a>(&self, ue: &'a mut SchedUe) -> Option<&'a mut UlHarqProc> {
        let mut st = self.inner.lock();
        let tti = st.tti;

        if let Some(pid) = ue.pending_ul_harq(tti) {
            let alloc = ue.ul_harq(pid).alloc();
            if st.span_is_free(alloc) {
                st.claim(alloc);
                return Some(ue.ul_harq_mut(pid));
            }
            debug!(rnti = ue.rnti(), start = alloc.start, len = alloc.len, "ul retx span unavailable");
            return None;
        }

        let pending = ue.pending_ul_data(tti);
        if pending == 0 {
            return None;
        }
        let pid = ue.empty_ul_harq()?;

        // Even split among backlogged users, capped by what the data needs.
        let share = (st.nof_rb / st.nof_users_with_data.max(1)).max(1);
        let needed = pending.div_ceil(bytes_per_prb(0)).max(1);
        let len = share.min(needed);
        let alloc = st.find_free_span(len).or_else(|| st.find_free_span(1))?;

        st.claim(alloc);
        ue.ul_harq_mut(pid).set_alloc(alloc);
        ue.commit_ul_tx(pid, alloc.len * bytes_per_prb(0));
        Some(ue.ul_harq_mut(pid))
    }
}

impl Default for UlRrScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_data(rntis: &[u16], bytes: u32) -> UeDb {
        rntis
            .iter()
            .map(|&r| {
                let mut ue = SchedUe::new(r);
                ue.push_ul_data(bytes);
                (r, ue)
            })
            .collect()
    }

    #[test]
    fn spans_are_disjoint_across_users() {
        let sched = UlRrScheduler::new();
        let mut db = db_with_data(&[1, 2, 3], 10_000);
        sched.new_tti(&db, 25, 0);

        let mut spans = Vec::new();
        for rnti in [1u16, 2, 3] {
            let ue = db.get_mut(&rnti).unwrap();
            let h = sched.get_user_allocation(ue).expect("grant expected");
            spans.push(h.alloc());
        }
        for (i, a) in spans.iter().enumerate() {
            for b in spans.iter().skip(i + 1) {
                let a_end = a.start + a.len;
                let b_end = b.start + b.len;
                assert!(a_end <= b.start || b_end <= a.start, "overlap: {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn retransmission_keeps_its_span() {
        let sched = UlRrScheduler::new();
        let mut db = db_with_data(&[1], 500);
        sched.new_tti(&db, 25, 0);
        let alloc;
        let pid;
        {
            let ue = db.get_mut(&1).unwrap();
            let h = sched.get_user_allocation(ue).unwrap();
            alloc = h.alloc();
            pid = h.id();
        }
        db.get_mut(&1).unwrap().nack_ul(pid);

        sched.new_tti(&db, 25, 1);
        let ue = db.get_mut(&1).unwrap();
        let h = sched.get_user_allocation(ue).unwrap();
        assert_eq!(h.alloc(), alloc);
    }

    #[test]
    fn idle_user_gets_nothing() {
        let sched = UlRrScheduler::new();
        let mut db = db_with_data(&[1], 0);
        sched.new_tti(&db, 25, 0);
        let ue = db.get_mut(&1).unwrap();
        assert!(sched.get_user_allocation(ue).is_none());
    }
}
