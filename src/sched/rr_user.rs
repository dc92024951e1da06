//! Round-robin user scheduler.
//!
//! Each time a slice receives spectrum, the whole share goes to a single UE:
//! the next one after the last served RNTI in the slice's iteration order,
//! wrapping at the end. A slice with one user therefore keeps serving it, and
//! a vanished last-served RNTI falls back to the first member.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::mask::MAX_RBG;
use crate::sched::{UserMap, UserScheduler, SCHED_RR_USER};

pub struct RrUserSched {
    /// RNTI served on the previous invocation; 0 before the first pick.
    last: u16,
}

impl RrUserSched {
    pub fn new() -> RrUserSched {
        RrUserSched { last: 0 }
    }

    pub fn last_served(&self) -> u16 {
        self.last
    }
}

impl Default for RrUserSched {
    fn default() -> Self {
        Self::new()
    }
}

impl UserScheduler for RrUserSched {
    fn id(&self) -> u32 {
        SCHED_RR_USER
    }

    fn schedule(
        &mut self,
        _tti: u32,
        users: &BTreeMap<u16, u8>,
        _user_map: &UserMap,
        avail: &[bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    ) {
        let Some((&first, _)) = users.iter().next() else {
            return;
        };

        let picked = if self.last == 0 || !users.contains_key(&self.last) {
            first
        } else {
            users
                .range((Bound::Excluded(self.last), Bound::Unbounded))
                .next()
                .map(|(&rnti, _)| rnti)
                .unwrap_or(first)
        };

        self.last = picked;

        for (i, used) in avail.iter().enumerate() {
            if !used {
                owner[i] = picked;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(rntis: &[u16]) -> BTreeMap<u16, u8> {
        rntis.iter().map(|&r| (r, 1)).collect()
    }

    fn run(sched: &mut RrUserSched, users: &BTreeMap<u16, u8>) -> u16 {
        let umap = UserMap::new();
        let mut avail = [true; MAX_RBG];
        avail[0] = false;
        let mut owner = [0u16; MAX_RBG];
        sched.schedule(0, users, &umap, &avail, &mut owner);
        owner[0]
    }

    #[test]
    fn alternates_between_two_users() {
        let users = members(&[0x46, 0x47]);
        let mut sched = RrUserSched::new();
        assert_eq!(run(&mut sched, &users), 0x46);
        assert_eq!(run(&mut sched, &users), 0x47);
        assert_eq!(run(&mut sched, &users), 0x46);
    }

    #[test]
    fn single_user_keeps_winning() {
        let users = members(&[0x50]);
        let mut sched = RrUserSched::new();
        assert_eq!(run(&mut sched, &users), 0x50);
        assert_eq!(run(&mut sched, &users), 0x50);
    }

    #[test]
    fn vanished_last_falls_back_to_first() {
        let mut sched = RrUserSched::new();
        assert_eq!(run(&mut sched, &members(&[0x10, 0x20])), 0x10);
        // 0x10 disappears; the pick restarts from the head of the set.
        assert_eq!(run(&mut sched, &members(&[0x20, 0x30])), 0x20);
    }

    #[test]
    fn empty_slice_changes_nothing() {
        let users = BTreeMap::new();
        let umap = UserMap::new();
        let avail = [false; MAX_RBG];
        let mut owner = [0u16; MAX_RBG];
        let mut sched = RrUserSched::new();
        sched.schedule(0, &users, &umap, &avail, &mut owner);
        assert!(owner.iter().all(|&o| o == 0));
        assert_eq!(sched.last_served(), 0);
    }

    #[test]
    fn only_claims_groups_left_available() {
        let users = members(&[0x46]);
        let umap = UserMap::new();
        let mut avail = [true; MAX_RBG];
        avail[3] = false;
        avail[4] = false;
        let mut owner = [0u16; MAX_RBG];
        let mut sched = RrUserSched::new();
        sched.schedule(0, &users, &umap, &avail, &mut owner);
        assert_eq!(owner[3], 0x46);
        assert_eq!(owner[4], 0x46);
        assert_eq!(owner[0], 0);
    }
}
