//! Multi-slice credit scheduler.
//!
//! Every configured slice carries a space budget (`res`, in RBGs) to be spent
//! over a time budget (`tti`, in subframes). Each subframe a slice receives
//! `res_credit / |tti_credit|` groups; when both credits hit zero the budget
//! renews. A negative time budget is one-shot: it is consumed and never
//! renewed, which is how the admission slice gets its initial-access burst.
//!
//! Renewal quirk kept on purpose: when the time credit expires while space
//! credit remains, only the time credit is re-armed. Integer division also
//! lets groups pile up toward the end of a period.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{SliceError, SliceResult};
use crate::mask::MAX_RBG;
use crate::sched::{SliceId, SliceMap, SliceScheduler, UserMap, UserScheduler, SCHED_MULTI};

/// Time/space credit state of one slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceCredit {
    /// Granted time budget in subframes; negative marks a one-shot budget.
    pub tti_org: i32,
    /// Remaining time credit.
    pub tti_credit: i32,
    /// Last TTI on which the slice was granted groups.
    pub tti_last: i32,
    /// Granted space budget in RBGs over `tti_org` subframes.
    pub res_org: i32,
    /// Remaining space credit.
    pub res_credit: i32,
}

pub struct MultiSliceSched {
    credits: BTreeMap<SliceId, SliceCredit>,
}

impl MultiSliceSched {
    pub fn new() -> MultiSliceSched {
        MultiSliceSched { credits: BTreeMap::new() }
    }

    /// Remaining credit of a slice, mainly for inspection in tests.
    pub fn credit(&self, id: SliceId) -> Option<SliceCredit> {
        self.credits.get(&id).copied()
    }
}

impl Default for MultiSliceSched {
    fn default() -> Self {
        Self::new()
    }
}

impl SliceScheduler for MultiSliceSched {
    fn id(&self) -> u32 {
        SCHED_MULTI
    }

    fn schedule(
        &mut self,
        tti: u32,
        slices: &mut SliceMap,
        user_map: &mut UserMap,
        in_use: &mut [bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    ) {
        for (sid, slice) in slices.iter_mut() {
            // A slice with no recorded budget gets nothing.
            let Some(credit) = self.credits.get_mut(sid) else {
                continue;
            };

            if credit.tti_credit == 0 {
                if credit.res_credit > 0 {
                    // Time expired with space left: re-arm time only.
                    credit.tti_credit = credit.tti_org;
                    continue;
                }
                if credit.tti_org < 0 {
                    // One-shot budget fully consumed.
                    continue;
                }
                credit.tti_credit = credit.tti_org;
                credit.res_credit = credit.res_org;
            }

            if credit.res_credit <= 0 {
                continue;
            }

            // Quota for this subframe; a negative time credit spreads the
            // remaining one-shot budget over the subframes left.
            let mut res = if credit.tti_credit > 0 {
                credit.res_credit / credit.tti_credit
            } else {
                credit.res_credit / -credit.tti_credit
            };

            // Expose up to `res` free groups to the slice's user scheduler
            // and claim them in the shared map.
            let mut avail = [true; MAX_RBG];
            let mut tot = 0i32;
            for i in 0..MAX_RBG {
                if !in_use[i] && res > 0 {
                    avail[i] = false;
                    in_use[i] = true;
                    res -= 1;
                    tot += 1;
                }
            }

            let users = &slice.users;
            slice.user_sched.schedule(tti, users, user_map, &avail, owner);

            credit.res_credit -= tot;
            if tot > 0 {
                credit.tti_last = tti as i32;
            }
            if credit.tti_credit > 0 {
                credit.tti_credit -= 1;
            } else {
                credit.tti_credit += 1;
            }
        }
    }

    fn set_resources(&mut self, id: SliceId, tti: i32, res: i32) -> SliceResult<()> {
        if id == 0 {
            return Err(SliceError::InvalidArgument("slice id 0"));
        }

        if tti == -1 && res == -1 {
            self.credits.remove(&id);
            return Ok(());
        }

        // Re-arms the credits: quotas are computed from updated values.
        self.credits.insert(
            id,
            SliceCredit { tti_org: tti, tti_credit: tti, tti_last: 0, res_org: res, res_credit: res },
        );

        debug!(slice = id, time = tti, space = res, "slice budget set");
        Ok(())
    }

    fn get_resources(&self, id: SliceId) -> Option<(i32, i32)> {
        self.credits.get(&id).map(|c| (c.tti_org, c.res_org))
    }
}
