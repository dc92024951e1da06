//! Duo-dynamic switch scheduler for exactly two slices.
//!
//! A single `switch` position splits the RBG axis: groups `[0, switch)`
//! belong to slice A, `[switch, rbg_max)` to slice B. Unless locked, the
//! switch drifts once per evaluation window (1000 subframes) by one group
//! toward whichever side ran loaded, where "loaded" means the side consumed
//! at least 80% of its theoretical capacity over the window. Both or neither
//! side loaded resets the switch to its neutral position.
//!
//! ```text
//!          RBG   0   1   2   3   4   5   6   7   8   9
//!              +---+---+---+---+---+---+---+---+---+---+
//!              | A | A | A | A | A | A | A | B | B | B |
//!              +---+---+---+---+---+---+---+---+---+---+
//!                                          ^ switch
//! ```

use tracing::debug;

use crate::error::{SliceError, SliceResult};
use crate::mask::MAX_RBG;
use crate::sched::{SliceId, SliceMap, SliceScheduler, UserMap, UserScheduler, SCHED_DUO};

pub struct DuoDynamicSched {
    slice_a: SliceId,
    slice_b: SliceId,
    /// First group owned by slice B; A owns everything below it.
    switch: u32,
    /// Minimum contiguous groups guaranteed to each side.
    limit: u32,
    /// Number of RBGs on the axis.
    rbg_max: u32,
    /// When locked the switch never drifts.
    lock: bool,
    /// Evaluation window in subframes.
    win: u32,
    /// Switch position restored when neither or both sides are loaded.
    neutral: u32,
    win_slot: u32,
    a_rbg: u32,
    b_rbg: u32,
}

impl DuoDynamicSched {
    pub fn new(slice_a: SliceId, slice_b: SliceId, rbg_max: u32) -> DuoDynamicSched {
        DuoDynamicSched {
            slice_a,
            slice_b,
            switch: 7,
            limit: 3,
            rbg_max,
            lock: true,
            win: 1000,
            neutral: 7,
            win_slot: 0,
            a_rbg: 0,
            b_rbg: 0,
        }
    }

    /// Allow or forbid the switch to drift with load.
    pub fn set_lock(&mut self, lock: bool) {
        self.lock = lock;
    }

    /// Override the evaluation window length in subframes.
    pub fn set_window(&mut self, win: u32) {
        self.win = win.max(1);
    }

    /// Override the neutral switch position.
    pub fn set_neutral(&mut self, neutral: u32) {
        self.neutral = neutral.clamp(self.limit, self.rbg_max - self.limit);
    }

    pub fn switch_pos(&self) -> u32 {
        self.switch
    }

    fn clamp_switch(&self, target: u32) -> u32 {
        target.clamp(self.limit, self.rbg_max - self.limit)
    }
}

impl SliceScheduler for DuoDynamicSched {
    fn id(&self) -> u32 {
        SCHED_DUO
    }

    fn schedule(
        &mut self,
        tti: u32,
        slices: &mut SliceMap,
        user_map: &mut UserMap,
        in_use: &mut [bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    ) {
        // Split the free groups into the two halves of the axis.
        let mut avail_a = [true; MAX_RBG];
        let mut avail_b = [true; MAX_RBG];
        for i in 0..MAX_RBG {
            if !in_use[i] {
                if (i as u32) < self.switch {
                    avail_a[i] = false;
                } else {
                    avail_b[i] = false;
                }
            }
        }

        for (sid, slice) in slices.iter_mut() {
            // Track each side's consumption; the deltas carry the previous
            // TTI's grants, which is what the drift decision runs on.
            if *sid == self.slice_a {
                for rnti in slice.users.keys() {
                    if let Some(u) = user_map.get(rnti) {
                        self.a_rbg += u.dl_rbg_delta;
                    }
                }
            } else if *sid == self.slice_b {
                for rnti in slice.users.keys() {
                    if let Some(u) = user_map.get(rnti) {
                        self.b_rbg += u.dl_rbg_delta;
                    }
                }
            }

            let avail = if *sid == self.slice_a { &avail_a } else { &avail_b };
            let users = &slice.users;
            slice.user_sched.schedule(tti, users, user_map, avail, owner);
        }

        if self.lock {
            return;
        }

        self.win_slot += 1;
        if self.win_slot < self.win {
            return;
        }

        let tot_a = self.switch * self.win;
        let tot_b = (self.rbg_max - self.switch) * self.win;
        let load_a = self.a_rbg >= (tot_a / 10) * 8;
        let load_b = self.b_rbg >= (tot_b / 10) * 8;

        match (load_a, load_b) {
            (true, false) => {
                if self.switch < self.rbg_max - self.limit {
                    self.switch += 1;
                }
            }
            (false, true) => {
                if self.switch > self.limit {
                    self.switch -= 1;
                }
            }
            // Balanced either way: fall back to the neutral split.
            _ => self.switch = self.neutral,
        }

        debug!(
            switch = self.switch,
            a_rbg = self.a_rbg,
            b_rbg = self.b_rbg,
            "duo window evaluated"
        );

        self.win_slot = 0;
        self.a_rbg = 0;
        self.b_rbg = 0;
    }

    fn set_resources(&mut self, id: SliceId, tti: i32, res: i32) -> SliceResult<()> {
        if res < 0 || tti < 0 {
            return Err(SliceError::InvalidArgument("negative duo resources"));
        }

        if id == self.slice_a {
            // A's share is the switch itself.
            self.switch = self.clamp_switch(res as u32);
        } else if id == self.slice_b {
            // B grows downward from the top of the axis.
            self.switch = self.clamp_switch(self.rbg_max.saturating_sub(res as u32));
        }

        Ok(())
    }

    fn get_resources(&self, id: SliceId) -> Option<(i32, i32)> {
        if id == self.slice_a {
            Some((0, self.switch as i32))
        } else if id == self.slice_b {
            Some((0, (self.rbg_max - self.switch) as i32))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::Slice;

    const A: SliceId = 0x10;
    const B: SliceId = 0x20;

    fn duo_slices() -> SliceMap {
        let mut map = SliceMap::new();
        let mut a = Slice::new(0);
        a.users.insert(0x46, 1);
        let mut b = Slice::new(0);
        b.users.insert(0x47, 1);
        map.insert(A, a);
        map.insert(B, b);
        map
    }

    #[test]
    fn partitions_the_axis_at_the_switch() {
        let mut sched = DuoDynamicSched::new(A, B, 13);
        let mut slices = duo_slices();
        let mut users = UserMap::new();
        let mut in_use = [false; MAX_RBG];
        let mut owner = [0u16; MAX_RBG];
        sched.schedule(0, &mut slices, &mut users, &mut in_use, &mut owner);

        for i in 0..7 {
            assert_eq!(owner[i], 0x46, "group {i} belongs to A");
        }
        for i in 7..MAX_RBG {
            assert_eq!(owner[i], 0x47, "group {i} belongs to B");
        }
    }

    #[test]
    fn set_resources_moves_and_clamps_the_switch() {
        let mut sched = DuoDynamicSched::new(A, B, 13);
        sched.set_resources(A, 0, 9).unwrap();
        assert_eq!(sched.switch_pos(), 9);
        sched.set_resources(A, 0, 12).unwrap();
        assert_eq!(sched.switch_pos(), 10); // rbg_max - limit
        sched.set_resources(B, 0, 9).unwrap();
        assert_eq!(sched.switch_pos(), 4); // 13 - 9
        sched.set_resources(B, 0, 12).unwrap();
        assert_eq!(sched.switch_pos(), 3); // limit
        assert!(sched.set_resources(A, 0, -2).is_err());
    }

    #[test]
    fn reports_each_sides_share() {
        let sched = DuoDynamicSched::new(A, B, 13);
        assert_eq!(sched.get_resources(A), Some((0, 7)));
        assert_eq!(sched.get_resources(B), Some((0, 6)));
        assert_eq!(sched.get_resources(99), None);
    }

    #[test]
    fn drift_waits_for_a_full_window() {
        let mut sched = DuoDynamicSched::new(A, B, 13);
        sched.set_lock(false);
        sched.set_window(10);
        let mut slices = duo_slices();
        let mut users = UserMap::new();
        // A consumes its full half every TTI.
        users.entry(0x46).or_default().dl_rbg_delta = 7;

        for tti in 0..9 {
            let mut in_use = [false; MAX_RBG];
            let mut owner = [0u16; MAX_RBG];
            sched.schedule(tti, &mut slices, &mut users, &mut in_use, &mut owner);
            assert_eq!(sched.switch_pos(), 7);
        }
        let mut in_use = [false; MAX_RBG];
        let mut owner = [0u16; MAX_RBG];
        sched.schedule(9, &mut slices, &mut users, &mut in_use, &mut owner);
        assert_eq!(sched.switch_pos(), 8);
    }

    #[test]
    fn idle_windows_reset_to_neutral() {
        let mut sched = DuoDynamicSched::new(A, B, 13);
        sched.set_lock(false);
        sched.set_window(5);
        sched.set_resources(A, 0, 9).unwrap();
        let mut slices = duo_slices();
        let mut users = UserMap::new();
        for tti in 0..5 {
            let mut in_use = [false; MAX_RBG];
            let mut owner = [0u16; MAX_RBG];
            sched.schedule(tti, &mut slices, &mut users, &mut in_use, &mut owner);
        }
        assert_eq!(sched.switch_pos(), 7);
    }
}
