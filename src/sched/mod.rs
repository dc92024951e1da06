//! Two-level slicing scheduler: a slice scheduler partitions the cell's RBGs
//! across tenants every subframe, then each slice's user scheduler spreads
//! that share over the slice's attached UEs.
//!
//! Strategies form a closed set of tagged variants. Slice-scheduler ids keep
//! the high bit clear, user-scheduler ids keep it set; controllers select
//! strategies by these ids, so they are part of the external contract.

pub mod dl_ran;
pub mod duo;
pub mod multi;
pub mod rr_user;
pub mod stats;
pub mod ul_rr;

use std::collections::BTreeMap;

use crate::error::SliceResult;
use crate::mask::MAX_RBG;

pub use dl_ran::DlRanScheduler;
pub use duo::DuoDynamicSched;
pub use multi::MultiSliceSched;
pub use rr_user::RrUserSched;
pub use ul_rr::UlRrScheduler;

/// Opaque 64-bit slice identifier. Bits 32..56 embed the owning PLMN.
pub type SliceId = u64;

/// The admission slice every new UE joins; never removable.
pub const DEFAULT_SLICE: SliceId = 1;

/// Id of the multi-slice credit scheduler.
pub const SCHED_MULTI: u32 = 0x0000_0001;
/// Id of the duo-dynamic switch scheduler.
pub const SCHED_DUO: u32 = 0x0000_0002;
/// Id of the round-robin user scheduler.
pub const SCHED_RR_USER: u32 = 0x8000_0001;

/// True for ids naming a user scheduler (high bit set).
pub const fn is_user_sched_id(id: u32) -> bool {
    id & 0x8000_0000 != 0
}

/// Per-user state tracked by the slicing scheduler across TTIs.
#[derive(Debug, Clone, Default)]
pub struct RanUser {
    /// The scheduler may re-assign this user's slice on its own.
    pub self_managed: bool,
    /// Absolute TTI at which the user was last seen in the MAC database.
    pub last_seen: u64,
    /// The user had new data or a pending DL HARQ at the last TTI snapshot.
    pub has_data: bool,
    /// Cumulative DL bytes committed at MAC level.
    pub dl_data: u64,
    /// DL bytes committed during the last TTI.
    pub dl_data_delta: u32,
    /// RBGs granted during the last TTI.
    pub dl_rbg_delta: u32,
}

/// Ordered user map; round-robin selection depends on iteration order.
pub type UserMap = BTreeMap<u16, RanUser>;

/// One tenant of the cell: its PLMN, its member RNTIs and the user scheduler
/// that arbitrates among them. The per-user byte is a reserved flag.
pub struct Slice {
    pub plmn: u32,
    pub users: BTreeMap<u16, u8>,
    pub user_sched: UserStrategy,
}

impl Slice {
    pub fn new(plmn: u32) -> Slice {
        Slice {
            plmn,
            users: BTreeMap::new(),
            user_sched: UserStrategy::RoundRobin(RrUserSched::new()),
        }
    }
}

pub type SliceMap = BTreeMap<SliceId, Slice>;

/// Resource configuration pushed down from the RAN manager.
#[derive(Debug, Clone, Default)]
pub struct MacSliceConfig {
    /// Requested user-scheduler id; 0 leaves the current one in place.
    pub user_sched: u32,
    /// Space budget in RBGs; -1 together with `time == -1` drops the slice
    /// from the resource table.
    pub rbg: i32,
    /// Time budget in subframes; negative marks a one-shot budget.
    pub time: i32,
    /// Desired slice membership (RNTIs).
    pub users: Vec<u16>,
}

/// Read-back of a slice's MAC-level state.
#[derive(Debug, Clone, Default)]
pub struct MacSliceInfo {
    pub user_sched: u32,
    pub rbg: i32,
    pub users: Vec<u16>,
}

/// Arbitrates the RBGs of one slice among its users.
pub trait UserScheduler {
    fn id(&self) -> u32;

    /// Assign every group left available in `avail` (entries set `false`) to
    /// users of the slice by writing their RNTI into `owner`.
    fn schedule(
        &mut self,
        tti: u32,
        users: &BTreeMap<u16, u8>,
        user_map: &UserMap,
        avail: &[bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    );
}

/// Closed set of user-scheduler strategies.
pub enum UserStrategy {
    RoundRobin(RrUserSched),
}

impl UserStrategy {
    /// Build a strategy from its wire id, if known.
    pub fn from_id(id: u32) -> Option<UserStrategy> {
        match id {
            SCHED_RR_USER => Some(UserStrategy::RoundRobin(RrUserSched::new())),
            _ => None,
        }
    }
}

impl UserScheduler for UserStrategy {
    fn id(&self) -> u32 {
        match self {
            UserStrategy::RoundRobin(s) => s.id(),
        }
    }

    fn schedule(
        &mut self,
        tti: u32,
        users: &BTreeMap<u16, u8>,
        user_map: &UserMap,
        avail: &[bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    ) {
        match self {
            UserStrategy::RoundRobin(s) => s.schedule(tti, users, user_map, avail, owner),
        }
    }
}

/// Partitions the subframe's RBGs across slices and delegates each share to
/// the slice's user scheduler.
pub trait SliceScheduler {
    fn id(&self) -> u32;

    /// Fill `owner` with the RNTI entitled to each group this TTI. Groups
    /// marked used in `in_use` are never handed to a slice.
    fn schedule(
        &mut self,
        tti: u32,
        slices: &mut SliceMap,
        user_map: &mut UserMap,
        in_use: &mut [bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    );

    /// Record a slice's time/space budget. `(-1, -1)` drops the entry.
    fn set_resources(&mut self, id: SliceId, tti: i32, res: i32) -> SliceResult<()>;

    /// Original (not remaining) budget of a slice, as `(time, space)`.
    fn get_resources(&self, id: SliceId) -> Option<(i32, i32)>;
}

/// Closed set of slice-scheduler strategies.
pub enum SliceStrategy {
    Multi(MultiSliceSched),
    Duo(DuoDynamicSched),
}

impl SliceScheduler for SliceStrategy {
    fn id(&self) -> u32 {
        match self {
            SliceStrategy::Multi(s) => s.id(),
            SliceStrategy::Duo(s) => s.id(),
        }
    }

    fn schedule(
        &mut self,
        tti: u32,
        slices: &mut SliceMap,
        user_map: &mut UserMap,
        in_use: &mut [bool; MAX_RBG],
        owner: &mut [u16; MAX_RBG],
    ) {
        match self {
            SliceStrategy::Multi(s) => s.schedule(tti, slices, user_map, in_use, owner),
            SliceStrategy::Duo(s) => s.schedule(tti, slices, user_map, in_use, owner),
        }
    }

    fn set_resources(&mut self, id: SliceId, tti: i32, res: i32) -> SliceResult<()> {
        match self {
            SliceStrategy::Multi(s) => s.set_resources(id, tti, res),
            SliceStrategy::Duo(s) => s.set_resources(id, tti, res),
        }
    }

    fn get_resources(&self, id: SliceId) -> Option<(i32, i32)> {
        match self {
            SliceStrategy::Multi(s) => s.get_resources(id),
            SliceStrategy::Duo(s) => s.get_resources(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_bit_convention() {
        assert!(!is_user_sched_id(SCHED_MULTI));
        assert!(!is_user_sched_id(SCHED_DUO));
        assert!(is_user_sched_id(SCHED_RR_USER));
    }

    #[test]
    fn user_strategy_from_wire_id() {
        assert!(UserStrategy::from_id(SCHED_RR_USER).is_some());
        assert!(UserStrategy::from_id(SCHED_MULTI).is_none());
        assert!(UserStrategy::from_id(0).is_none());
    }
}
