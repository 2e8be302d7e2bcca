//! Fixed-capacity entity tables with slot allocation, eviction, and expiry.
//!
//! Both tables are preallocated at construction and never grow. A slot with
//! `in_use = false` is free. Lookup is a linear scan; at these capacities
//! (256 + 128) that beats any index structure and keeps memory use exact.
//!
//! Watched slots are privileged: they are never chosen for eviction and
//! never cleared by idle expiry. When every slot of a table is watched,
//! allocation fails and the caller drops the observation for that entity.

use crate::config::defaults::{
    ANCHOR_IDLE_SEC, CROWD_EMA_ALPHA, EMA_DEV_BETA, EMA_RSSI_ALPHA, MAX_ANCHORS, MAX_TRACKS,
    RSSI_NEAR_DBM, TRACK_IDLE_SEC_BLE, TRACK_IDLE_SEC_WIFI, WINDOW_SEC,
};
use crate::types::{Anchor, MacAddr, Track, TrackKind};
use crate::vendor;

/// Track and anchor storage plus the shared index counter.
#[derive(Debug)]
pub struct EntityTables {
    pub tracks: Box<[Track]>,
    pub anchors: Box<[Anchor]>,
    next_index: u16,
}

impl Default for EntityTables {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTables {
    pub fn new() -> Self {
        Self {
            tracks: vec![Track::default(); MAX_TRACKS].into_boxed_slice(),
            anchors: vec![Anchor::default(); MAX_ANCHORS].into_boxed_slice(),
            next_index: 1,
        }
    }

    /// Take the next entity index. Indices are never 0; the counter wraps
    /// around 0 after 65535 (a device would need weeks of dense traffic to
    /// get there).
    fn take_index(&mut self) -> u16 {
        let idx = self.next_index;
        self.next_index = match self.next_index.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        idx
    }

    /// Find the in-use track matching `(kind, addr)` or allocate a slot:
    /// first free, else evict the non-watched slot with the oldest
    /// `last_seen_s`. Returns `None` only when every slot is watched.
    pub fn find_or_alloc_track(
        &mut self,
        kind: TrackKind,
        addr: MacAddr,
        ts_s: u32,
        segment_id: u32,
    ) -> Option<&mut Track> {
        let mut slot: Option<usize> = None;
        let mut free: Option<usize> = None;
        let mut evict: Option<(usize, u32)> = None;

        for (i, t) in self.tracks.iter().enumerate() {
            if t.in_use {
                if t.kind == kind && t.addr == addr {
                    slot = Some(i);
                    break;
                }
                if !t.is_watching() && evict.map_or(true, |(_, oldest)| t.last_seen_s < oldest) {
                    evict = Some((i, t.last_seen_s));
                }
            } else if free.is_none() {
                free = Some(i);
            }
        }

        if let Some(i) = slot {
            return Some(&mut self.tracks[i]);
        }

        let i = free.or(evict.map(|(i, _)| i))?;
        let index = self.take_index();
        let t = &mut self.tracks[i];
        *t = Track {
            in_use: true,
            kind,
            addr,
            vendor: vendor::lookup(&addr),
            index,
            first_seen_s: ts_s,
            last_seen_s: ts_s,
            last_segment_id: segment_id,
            env_hits: 1,
            ..Track::default()
        };
        Some(t)
    }

    /// Anchor counterpart of [`find_or_alloc_track`](Self::find_or_alloc_track).
    pub fn find_or_alloc_anchor(&mut self, bssid: MacAddr, ts_s: u32) -> Option<&mut Anchor> {
        let mut slot: Option<usize> = None;
        let mut free: Option<usize> = None;
        let mut evict: Option<(usize, u32)> = None;

        for (i, a) in self.anchors.iter().enumerate() {
            if a.in_use {
                if a.addr == bssid {
                    slot = Some(i);
                    break;
                }
                if !a.is_watching() && evict.map_or(true, |(_, oldest)| a.last_seen_s < oldest) {
                    evict = Some((i, a.last_seen_s));
                }
            } else if free.is_none() {
                free = Some(i);
            }
        }

        if let Some(i) = slot {
            return Some(&mut self.anchors[i]);
        }

        let i = free.or(evict.map(|(i, _)| i))?;
        let index = self.take_index();
        let a = &mut self.anchors[i];
        *a = Anchor {
            in_use: true,
            addr: bssid,
            vendor: vendor::lookup(&bssid),
            index,
            last_seen_s: ts_s,
            ..Anchor::default()
        };
        Some(a)
    }

    /// Free every idle, non-watched slot. Idle thresholds are per kind: BLE
    /// trackers advertise sparsely and get a longer leash than Wi-Fi clients.
    pub fn expire(&mut self, ts_s: u32) -> usize {
        let mut freed = 0;

        for t in self.tracks.iter_mut() {
            if !t.in_use || t.is_watching() {
                continue;
            }
            let limit = match t.kind {
                TrackKind::WifiClient => TRACK_IDLE_SEC_WIFI,
                TrackKind::BleAdv => TRACK_IDLE_SEC_BLE,
            };
            if ts_s.saturating_sub(t.last_seen_s) > limit {
                *t = Track::default();
                freed += 1;
            }
        }

        for a in self.anchors.iter_mut() {
            if !a.in_use || a.is_watching() {
                continue;
            }
            if ts_s.saturating_sub(a.last_seen_s) > ANCHOR_IDLE_SEC {
                *a = Anchor::default();
                freed += 1;
            }
        }

        freed
    }

    /// Clear all non-watched slots and rebase the index counter above every
    /// surviving index.
    pub fn reset_keep_watched(&mut self) {
        for t in self.tracks.iter_mut() {
            if t.in_use && !t.is_watching() {
                *t = Track::default();
            }
        }
        for a in self.anchors.iter_mut() {
            if a.in_use && !a.is_watching() {
                *a = Anchor::default();
            }
        }

        let max_in_use = self
            .tracks
            .iter()
            .filter(|t| t.in_use)
            .map(|t| t.index)
            .chain(self.anchors.iter().filter(|a| a.in_use).map(|a| a.index))
            .max()
            .unwrap_or(0);
        self.next_index = match max_in_use.wrapping_add(1) {
            0 => 1,
            n => n,
        };
    }

    pub fn in_use_counts(&self) -> (usize, usize) {
        (
            self.tracks.iter().filter(|t| t.in_use).count(),
            self.anchors.iter().filter(|a| a.in_use).count(),
        )
    }
}

/// Apply one observation's worth of statistics to a track.
///
/// Window-level counters (seen/near/crowd) move only when the observation
/// crosses into a new window; the RSSI EMAs move every observation. The
/// near/seen decision uses the observation that triggered the transition —
/// an asymmetry kept deliberately, because changing it would shift every
/// historical score.
pub fn update_track_stats(
    t: &mut Track,
    rssi_dbm: i32,
    ts_s: u32,
    window_unique_hits: u32,
    segment_id: u32,
) {
    t.last_seen_s = ts_s;

    let window = ts_s / WINDOW_SEC;
    if t.last_window != window {
        t.last_window = window;
        t.seen_windows += 1;
        if rssi_dbm >= RSSI_NEAR_DBM {
            t.near_windows += 1;
        }
        t.crowd_ema =
            (1.0 - CROWD_EMA_ALPHA) * t.crowd_ema + CROWD_EMA_ALPHA * window_unique_hits as f32;
    }

    let prev = t.ema_rssi;
    t.ema_rssi = (1.0 - EMA_RSSI_ALPHA) * t.ema_rssi + EMA_RSSI_ALPHA * rssi_dbm as f32;
    t.ema_abs_dev =
        (1.0 - EMA_DEV_BETA) * t.ema_abs_dev + EMA_DEV_BETA * (rssi_dbm as f32 - prev).abs();

    if t.last_segment_id != segment_id {
        t.last_segment_id = segment_id;
        t.env_hits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityFlags;

    fn mac(n: u16) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, (n >> 8) as u8, n as u8])
    }

    #[test]
    fn test_alloc_assigns_unique_nonzero_indices() {
        let mut tables = EntityTables::new();
        let a = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(1), 10, 1)
            .unwrap()
            .index;
        let b = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(2), 10, 1)
            .unwrap()
            .index;
        let c = tables.find_or_alloc_anchor(mac(3), 10).unwrap().index;
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn test_find_returns_existing_slot() {
        let mut tables = EntityTables::new();
        let first = tables
            .find_or_alloc_track(TrackKind::WifiClient, mac(7), 10, 1)
            .unwrap()
            .index;
        let again = tables
            .find_or_alloc_track(TrackKind::WifiClient, mac(7), 50, 1)
            .unwrap();
        assert_eq!(again.index, first);
        // first_seen untouched by a lookup
        assert_eq!(again.first_seen_s, 10);
    }

    #[test]
    fn test_same_addr_different_kind_is_distinct() {
        let mut tables = EntityTables::new();
        let wifi = tables
            .find_or_alloc_track(TrackKind::WifiClient, mac(9), 10, 1)
            .unwrap()
            .index;
        let ble = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(9), 10, 1)
            .unwrap()
            .index;
        assert_ne!(wifi, ble);
    }

    #[test]
    fn test_fresh_track_initial_state() {
        let mut tables = EntityTables::new();
        let t = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(1), 100, 4)
            .unwrap();
        assert_eq!(t.first_seen_s, 100);
        assert_eq!(t.last_seen_s, 100);
        assert_eq!(t.last_segment_id, 4);
        assert_eq!(t.env_hits, 1);
        assert_eq!(t.ema_rssi, -100.0);
        assert_eq!(t.seen_windows, 0);
    }

    #[test]
    fn test_eviction_picks_oldest_non_watched() {
        let mut tables = EntityTables::new();
        for i in 0..MAX_TRACKS as u16 {
            let t = tables
                .find_or_alloc_track(TrackKind::BleAdv, mac(i), 100 + i as u32, 1)
                .unwrap();
            if i == 0 {
                // The oldest slot is watched: it must survive.
                t.flags.insert(EntityFlags::WATCHING);
            }
        }

        let newcomer = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(9999), 5000, 1)
            .unwrap();
        assert_eq!(newcomer.addr, mac(9999));

        // mac(0) (watched, oldest) still present; mac(1) (oldest evictable) gone.
        assert!(tables
            .tracks
            .iter()
            .any(|t| t.in_use && t.addr == mac(0)));
        assert!(!tables
            .tracks
            .iter()
            .any(|t| t.in_use && t.addr == mac(1)));
    }

    #[test]
    fn test_alloc_fails_when_all_watched() {
        let mut tables = EntityTables::new();
        for i in 0..MAX_ANCHORS as u16 {
            let a = tables.find_or_alloc_anchor(mac(i), 10).unwrap();
            a.flags.insert(EntityFlags::WATCHING);
        }
        assert!(tables.find_or_alloc_anchor(mac(9999), 20).is_none());
    }

    #[test]
    fn test_expire_honours_kind_thresholds_and_watching() {
        let mut tables = EntityTables::new();
        tables
            .find_or_alloc_track(TrackKind::WifiClient, mac(1), 0, 1)
            .unwrap();
        tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(2), 0, 1)
            .unwrap();
        let watched = tables
            .find_or_alloc_track(TrackKind::WifiClient, mac(3), 0, 1)
            .unwrap();
        watched.flags.insert(EntityFlags::WATCHING);
        tables.find_or_alloc_anchor(mac(4), 0).unwrap();

        // 16 min: Wi-Fi track and anchor expire, BLE (20 min leash) survives.
        let freed = tables.expire(16 * 60);
        assert_eq!(freed, 2);
        assert!(!tables.tracks.iter().any(|t| t.in_use && t.addr == mac(1)));
        assert!(tables.tracks.iter().any(|t| t.in_use && t.addr == mac(2)));
        assert!(tables.tracks.iter().any(|t| t.in_use && t.addr == mac(3)));

        // 21 min: BLE expires too; the watched track never does.
        tables.expire(21 * 60);
        assert!(!tables.tracks.iter().any(|t| t.in_use && t.addr == mac(2)));
        assert!(tables.tracks.iter().any(|t| t.in_use && t.addr == mac(3)));
    }

    #[test]
    fn test_reset_keeps_watched_and_rebases_index() {
        let mut tables = EntityTables::new();
        tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(1), 0, 1)
            .unwrap();
        let watched = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(2), 0, 1)
            .unwrap();
        watched.flags.insert(EntityFlags::WATCHING);
        let watched_index = watched.index;
        tables.find_or_alloc_anchor(mac(3), 0).unwrap();

        tables.reset_keep_watched();
        let (tracks, anchors) = tables.in_use_counts();
        assert_eq!((tracks, anchors), (1, 0));

        let fresh = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(5), 10, 1)
            .unwrap();
        assert_eq!(fresh.index, watched_index + 1);
    }

    #[test]
    fn test_update_track_stats_ema_and_windows() {
        let mut tables = EntityTables::new();
        let t = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(1), 100, 1)
            .unwrap();

        update_track_stats(t, -60, 100, 1, 1);
        assert_eq!(t.seen_windows, 1);
        assert_eq!(t.near_windows, 1);
        assert!((t.ema_rssi - -92.0).abs() < 1e-4);
        assert!((t.ema_abs_dev - 8.0).abs() < 1e-4); // 0.2 * |−60 − (−100)|

        // Same window: only EMAs move.
        update_track_stats(t, -60, 105, 2, 1);
        assert_eq!(t.seen_windows, 1);

        // Next window, weak signal: seen but not near.
        update_track_stats(t, -80, 110, 3, 1);
        assert_eq!(t.seen_windows, 2);
        assert_eq!(t.near_windows, 1);
        assert!((t.crowd_ema - (0.9 * 0.1 + 0.1 * 3.0)).abs() < 1e-4);
    }

    #[test]
    fn test_update_track_stats_counts_segment_transitions_once() {
        let mut tables = EntityTables::new();
        let t = tables
            .find_or_alloc_track(TrackKind::BleAdv, mac(1), 100, 1)
            .unwrap();
        assert_eq!(t.env_hits, 1);

        update_track_stats(t, -60, 101, 1, 1);
        assert_eq!(t.env_hits, 1);

        // Segment advanced: one hit, repeated observations in the same
        // segment add nothing.
        update_track_stats(t, -60, 130, 1, 2);
        update_track_stats(t, -60, 131, 1, 2);
        assert_eq!(t.env_hits, 2);
    }
}
