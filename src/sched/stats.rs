//! Non-invasive allocation statistics.
//!
//! Tracks, per user, how often each DL RBG mask was handed out, and dumps the
//! histogram through `tracing` once per interval. Recording is a couple of
//! array walks on data already in cache, so the MAC hot path is unaffected.

use std::collections::BTreeMap;

use tracing::debug;

/// Distinct masks remembered per user before new ones are ignored.
const NOF_MASK_SLOTS: usize = 32;
/// Number of TTIs between two histogram dumps.
const DUMP_INTERVAL: u32 = 1000;

#[derive(Debug, Default, Clone)]
struct UserStats {
    active: bool,
    masks: Vec<(u32, u32)>,
}

/// Per-scheduler mask histogram with a fixed dump cadence.
#[derive(Debug, Default)]
pub struct AllocStats {
    users: BTreeMap<u16, UserStats>,
    nof_tti: u32,
}

impl AllocStats {
    pub fn new() -> AllocStats {
        AllocStats::default()
    }

    /// Record one DL allocation outcome for a user.
    pub fn record_dl_mask(&mut self, rnti: u16, mask: u32) {
        let user = self.users.entry(rnti).or_default();
        user.active = true;
        if let Some(slot) = user.masks.iter_mut().find(|(m, _)| *m == mask) {
            slot.1 += 1;
        } else if user.masks.len() < NOF_MASK_SLOTS {
            user.masks.push((mask, 1));
        }
    }

    /// Advance the TTI counter; dumps and resets on the interval boundary.
    pub fn new_tti(&mut self) {
        self.nof_tti += 1;
        if self.nof_tti < DUMP_INTERVAL {
            return;
        }

        for (rnti, user) in self.users.iter_mut() {
            if !user.active {
                continue;
            }
            for (mask, count) in user.masks.iter() {
                debug!(rnti = *rnti, mask = %format_args!("{mask:#010x}"), count = *count, "dl mask histogram");
            }
            user.masks.clear();
            user.active = false;
        }
        self.nof_tti = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_masks_accumulate() {
        let mut stats = AllocStats::new();
        stats.record_dl_mask(0x46, 0b111);
        stats.record_dl_mask(0x46, 0b111);
        stats.record_dl_mask(0x46, 0b1000);
        let user = stats.users.get(&0x46).unwrap();
        assert_eq!(user.masks, vec![(0b111, 2), (0b1000, 1)]);
    }

    #[test]
    fn dump_interval_resets_histograms() {
        let mut stats = AllocStats::new();
        stats.record_dl_mask(0x46, 0b1);
        for _ in 0..DUMP_INTERVAL {
            stats.new_tti();
        }
        let user = stats.users.get(&0x46).unwrap();
        assert!(user.masks.is_empty());
        assert!(!user.active);
    }
}
