//! RAN slicing manager.
//!
//! Authoritative registry of slices and slice-user membership. Every
//! lifecycle change flows through here so the MAC scheduler and the RAN view
//! stay consistent: the MAC side is mutated first on additions and last on
//! removals, and a partial change is unwound when the other half fails.
//!
//! The default slice is not created at init; it appears lazily the first time
//! a user joins it, configured so RRC setup traffic can flow.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{SliceError, SliceResult};
use crate::sched::{MacSliceConfig, MacSliceInfo, SliceId, DEFAULT_SLICE, SCHED_RR_USER};

/// Layer-2 capability bit: the MAC supports PRB slicing.
pub const L2_CAP_PRB_SLICING: u32 = 1 << 0;

/// Default MAC budget for a slice created implicitly on first user addition.
/// Sized so a fresh UE can complete its attach on a 1.4 MHz cell.
const IMPLICIT_SLICE_RBG: i32 = 60;
const IMPLICIT_SLICE_TIME: i32 = 10;

/// The MAC-side surface the manager drives. The DL scheduler implements it;
/// tests substitute their own.
pub trait MacSliceControl: Send + Sync {
    fn add_slice(&self, id: SliceId) -> SliceResult<()>;
    fn rem_slice(&self, id: SliceId) -> SliceResult<()>;
    fn set_slice(&self, id: SliceId, cfg: &MacSliceConfig) -> SliceResult<()>;
    fn add_slice_user(&self, rnti: u16, slice: SliceId, lock: bool) -> SliceResult<()>;
    fn rem_slice_user(&self, rnti: u16, slice: SliceId);
    fn get_slice(&self, id: SliceId, max_users: usize) -> SliceResult<MacSliceInfo>;
    fn get_slice_sched(&self) -> u32;
}

// Inherent methods take precedence inside the impl, so these forwardings do
// not recurse.
impl MacSliceControl for crate::sched::DlRanScheduler {
    fn add_slice(&self, id: SliceId) -> SliceResult<()> {
        self.add_slice(id)
    }

    fn rem_slice(&self, id: SliceId) -> SliceResult<()> {
        self.rem_slice(id)
    }

    fn set_slice(&self, id: SliceId, cfg: &MacSliceConfig) -> SliceResult<()> {
        self.set_slice(id, cfg)
    }

    fn add_slice_user(&self, rnti: u16, slice: SliceId, lock: bool) -> SliceResult<()> {
        self.add_slice_user(rnti, slice, lock)
    }

    fn rem_slice_user(&self, rnti: u16, slice: SliceId) {
        self.rem_slice_user(rnti, slice)
    }

    fn get_slice(&self, id: SliceId, max_users: usize) -> SliceResult<MacSliceInfo> {
        self.get_slice_info(id, max_users)
    }

    fn get_slice_sched(&self) -> u32 {
        self.get_slice_sched_id()
    }
}

/// Controller-facing slice configuration, as carried by slice commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceConfig {
    pub user_sched: u32,
    pub rbg: i32,
    pub time: i32,
    pub users: Vec<u16>,
}

#[derive(Debug, Clone)]
struct RanSlice {
    plmn: u32,
    users: BTreeMap<u16, u8>,
}

/// Registry of slices plus the bridge from agent commands to MAC mutations.
pub struct RanManager {
    mac: Arc<dyn MacSliceControl>,
    l2_caps: u32,
    slices: Mutex<BTreeMap<SliceId, RanSlice>>,
}

impl RanManager {
    pub fn new(mac: Arc<dyn MacSliceControl>) -> RanManager {
        RanManager { mac, l2_caps: L2_CAP_PRB_SLICING, slices: Mutex::new(BTreeMap::new()) }
    }

    /// Layer-2 capability mask advertised to the controller.
    pub fn l2_caps(&self) -> u32 {
        self.l2_caps
    }

    /// Register a slice, MAC first.
    pub fn add_slice(&self, id: SliceId, plmn: u32) -> SliceResult<()> {
        if id == 0 {
            error!(plmn, "invalid slice id on addition");
            return Err(SliceError::InvalidArgument("slice id 0"));
        }
        {
            let slices = self.slices.lock();
            if slices.contains_key(&id) {
                error!(slice = id, "slice already exists");
                return Err(SliceError::DuplicateSlice(id));
            }
        }

        self.mac.add_slice(id)?;
        self.slices.lock().insert(id, RanSlice { plmn, users: BTreeMap::new() });
        debug!(slice = id, plmn = %format_args!("{plmn:#x}"), "slice created");
        Ok(())
    }

    /// Remove a slice, local registry first; the MAC entry is restored
    /// locally if the MAC-side removal fails.
    pub fn rem_slice(&self, id: SliceId) -> SliceResult<()> {
        if id == 0 {
            return Err(SliceError::InvalidArgument("slice id 0"));
        }
        let removed = self.slices.lock().remove(&id);
        let Some(record) = removed else {
            error!(slice = id, "slice not found during removal");
            return Err(SliceError::UnknownSlice(id));
        };

        if let Err(e) = self.mac.rem_slice(id) {
            self.slices.lock().insert(id, record);
            return Err(e);
        }
        debug!(slice = id, "slice removed");
        Ok(())
    }

    /// Apply a controller-provided configuration, then reconcile the slice's
    /// membership against the provided user list.
    pub fn set_slice(&self, id: SliceId, info: &SliceConfig) -> SliceResult<()> {
        if id == 0 {
            return Err(SliceError::InvalidArgument("slice id 0"));
        }
        if !self.slices.lock().contains_key(&id) {
            error!(slice = id, "slice not found");
            return Err(SliceError::UnknownSlice(id));
        }

        let mut mac_args = MacSliceConfig::default();
        if info.user_sched > 0 {
            mac_args.user_sched = info.user_sched;
        }
        if info.rbg > 0 {
            mac_args.rbg = info.rbg;
        }
        if info.time > 0 {
            mac_args.time = info.time;
        }
        self.mac.set_slice(id, &mac_args)?;

        // Members the controller no longer lists leave the slice.
        let stale: Vec<u16> = {
            let slices = self.slices.lock();
            match slices.get(&id) {
                Some(s) => s
                    .users
                    .keys()
                    .filter(|rnti| !info.users.contains(rnti))
                    .copied()
                    .collect(),
                None => Vec::new(),
            }
        };
        for rnti in stale {
            self.rem_slice_user(rnti, id);
        }

        // Newly listed members join locked: the controller asked for them.
        let fresh: Vec<u16> = {
            let slices = self.slices.lock();
            match slices.get(&id) {
                Some(s) => info
                    .users
                    .iter()
                    .filter(|rnti| !s.users.contains_key(rnti))
                    .copied()
                    .collect(),
                None => Vec::new(),
            }
        };
        for rnti in fresh {
            self.add_slice_user(rnti, id, true)?;
        }

        Ok(())
    }

    /// Attach a user to a slice, creating the slice with a default
    /// configuration when it does not exist yet. `slice == 0` targets the
    /// default admission slice.
    pub fn add_slice_user(&self, rnti: u16, slice: SliceId, lock: bool) -> SliceResult<()> {
        if rnti == 0 {
            error!(slice, "invalid RNTI on user addition");
            return Err(SliceError::InvalidArgument("rnti 0"));
        }
        let slice = if slice == 0 { DEFAULT_SLICE } else { slice };

        if !self.slices.lock().contains_key(&slice) {
            let plmn = ((slice >> 32) & 0xff_ffff) as u32;
            self.add_slice(slice, plmn)?;
            self.set_slice(
                slice,
                &SliceConfig {
                    user_sched: SCHED_RR_USER,
                    rbg: IMPLICIT_SLICE_RBG,
                    time: IMPLICIT_SLICE_TIME,
                    users: Vec::new(),
                },
            )?;
        }

        if let Err(e) = self.mac.add_slice_user(rnti, slice, lock) {
            error!(rnti, slice, "MAC refused the user association");
            return Err(e);
        }
        if let Some(s) = self.slices.lock().get_mut(&slice) {
            s.users.insert(rnti, 1);
        }
        debug!(rnti, slice, "user added to slice");
        Ok(())
    }

    /// Detach a user; `slice == 0` purges every association.
    pub fn rem_slice_user(&self, rnti: u16, slice: SliceId) {
        if rnti == 0 {
            error!(slice, "invalid RNTI on user removal");
            return;
        }

        self.mac.rem_slice_user(rnti, slice);

        let mut slices = self.slices.lock();
        if slice == 0 {
            for (id, s) in slices.iter_mut() {
                if s.users.remove(&rnti).is_some() {
                    debug!(rnti, slice = *id, "user removed from slice");
                }
            }
        } else if let Some(s) = slices.get_mut(&slice) {
            if s.users.remove(&rnti).is_some() {
                debug!(rnti, slice, "user removed from slice");
            }
        } else {
            error!(slice, "slice not found on user removal");
        }
    }

    /// Id of the slice scheduler the MAC currently runs.
    pub fn get_slice_sched(&self) -> u32 {
        self.mac.get_slice_sched()
    }

    /// Ids of the registered slices, at most `cap` of them.
    pub fn get_slices(&self, cap: usize) -> Vec<SliceId> {
        self.slices.lock().keys().take(cap).copied().collect()
    }

    /// Current state of one slice; scheduler and budget are read through
    /// from the MAC, membership from the local registry.
    pub fn get_slice_info(&self, id: SliceId, max_users: usize) -> SliceResult<SliceConfig> {
        if !self.slices.lock().contains_key(&id) {
            error!(slice = id, "cannot get info, slice not found");
            return Err(SliceError::UnknownSlice(id));
        }

        let mac_info = self.mac.get_slice(id, max_users)?;
        let users = {
            let slices = self.slices.lock();
            slices
                .get(&id)
                .map(|s| s.users.keys().take(max_users).copied().collect())
                .unwrap_or_default()
        };

        Ok(SliceConfig { user_sched: mac_info.user_sched, rbg: mac_info.rbg, time: 0, users })
    }

    /// PLMN of a registered slice.
    pub fn slice_plmn(&self, id: SliceId) -> Option<u32> {
        self.slices.lock().get(&id).map(|s| s.plmn)
    }
}

/// Split a slice id into its PLMN components.
pub fn id_to_plmn(id: SliceId) -> (u16, u16) {
    let mnc = ((id >> 32) & 0xfff) as u16;
    let mcc = ((id >> 44) & 0xfff) as u16;
    (mcc, mnc)
}

/// Pack a PLMN into the 24 id bits at offset 32.
pub fn plmn_to_id(mcc: u16, mnc: u16) -> SliceId {
    ((((mcc as u64) & 0xfff) << 12) | ((mnc as u64) & 0xfff)) << 32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::DlRanScheduler;

    fn manager() -> (Arc<DlRanScheduler>, RanManager) {
        let mac = Arc::new(DlRanScheduler::new());
        let ran = RanManager::new(mac.clone());
        (mac, ran)
    }

    #[test]
    fn plmn_packing_roundtrips() {
        let id = plmn_to_id(222, 93);
        assert_eq!(id_to_plmn(id), (222, 93));
        assert_eq!(id & 0xffff_ffff, 0);
        // Default slice id carries no PLMN bits.
        assert_eq!(id_to_plmn(DEFAULT_SLICE), (0, 0));
    }

    #[test]
    fn add_slice_rejects_zero_and_duplicates() {
        let (_, ran) = manager();
        assert!(ran.add_slice(0, 0).is_err());
        ran.add_slice(5, 0x123).unwrap();
        assert!(matches!(ran.add_slice(5, 0x123), Err(SliceError::DuplicateSlice(5))));
    }

    #[test]
    fn user_addition_creates_the_missing_slice() {
        let (mac, ran) = manager();
        ran.add_slice_user(0x46, 0, true).unwrap();
        assert!(mac.has_slice(DEFAULT_SLICE));
        let info = ran.get_slice_info(DEFAULT_SLICE, 8).unwrap();
        assert_eq!(info.users, vec![0x46]);
        assert_eq!(info.user_sched, SCHED_RR_USER);
        assert_eq!(info.rbg, IMPLICIT_SLICE_RBG);
    }

    #[test]
    fn set_slice_reconciles_membership() {
        let (_, ran) = manager();
        ran.add_slice(5, 0).unwrap();
        ran.set_slice(5, &SliceConfig { rbg: 30, time: 10, users: vec![0x46, 0x47], ..Default::default() })
            .unwrap();
        assert_eq!(ran.get_slice_info(5, 8).unwrap().users, vec![0x46, 0x47]);

        // 0x46 drops out, 0x48 joins.
        ran.set_slice(5, &SliceConfig { users: vec![0x47, 0x48], ..Default::default() }).unwrap();
        assert_eq!(ran.get_slice_info(5, 8).unwrap().users, vec![0x47, 0x48]);
    }

    #[test]
    fn removal_of_unknown_slice_fails_cleanly() {
        let (_, ran) = manager();
        assert!(ran.rem_slice(9).is_err());
        assert!(ran.rem_slice(0).is_err());
    }

    #[test]
    fn purge_removes_user_from_every_slice() {
        let (_, ran) = manager();
        ran.add_slice_user(0x46, 5, true).unwrap();
        ran.add_slice_user(0x46, 6, true).unwrap();
        ran.rem_slice_user(0x46, 0);
        assert!(ran.get_slice_info(5, 8).unwrap().users.is_empty());
        assert!(ran.get_slice_info(6, 8).unwrap().users.is_empty());
    }
}
