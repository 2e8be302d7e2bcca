//! The tracker's single-threaded engine.
//!
//! [`TrackerCore`] owns the entity tables, the segmentation engine, the
//! crowd-window counter, and the GNSS fix snapshot — everything the original
//! design guards with one critical section. The facade wraps it in a mutex;
//! the core itself is deterministic and takes explicit timestamps, which is
//! what makes the pipeline testable without a clock.

use std::sync::Arc;

use super::scoring::{clamp01, score_track};
use super::segmentation::Segmentation;
use super::tables::{update_track_stats, EntityTables};
use super::TrackerStats;
use crate::config::defaults::WINDOW_SEC;
use crate::types::{
    EntityFlags, EntityKind, EntityView, ObsKind, Observation, Track, TrackKind, TrackerType,
};
use crate::vendor::Vendor;
use crate::{classify, watchlist};

/// Tables + segmentation + crowd counter + GNSS snapshot behind one lock.
#[derive(Debug)]
pub struct TrackerCore {
    tables: EntityTables,
    seg: Segmentation,

    current_window: u32,
    window_unique_hits: u32,

    gps_valid: bool,
    gps_lat: f64,
    gps_lon: f64,

    stats: Arc<TrackerStats>,
}

impl Default for TrackerCore {
    fn default() -> Self {
        Self::new(Arc::new(TrackerStats::default()))
    }
}

impl TrackerCore {
    pub fn new(stats: Arc<TrackerStats>) -> Self {
        Self {
            tables: EntityTables::new(),
            seg: Segmentation::new(),
            current_window: 0,
            window_unique_hits: 0,
            gps_valid: false,
            gps_lat: 0.0,
            gps_lon: 0.0,
            stats,
        }
    }

    // ------------------------------------------------------------------
    // GNSS
    // ------------------------------------------------------------------

    /// Update the fix snapshot. Losing the fix drops the GNSS segmentation
    /// anchor so a reacquired fix re-anchors instead of measuring against
    /// stale coordinates.
    pub fn set_gps_fix(&mut self, valid: bool, lat: f64, lon: f64) {
        self.gps_valid = valid;
        if valid {
            self.gps_lat = lat;
            self.gps_lon = lon;
        } else {
            self.seg.clear_gps_anchor();
        }
    }

    fn gps_fix(&self) -> Option<(f64, f64)> {
        self.gps_valid.then_some((self.gps_lat, self.gps_lon))
    }

    // ------------------------------------------------------------------
    // Observation processing
    // ------------------------------------------------------------------

    /// Apply one observation: crowd-window accounting, then the per-kind
    /// table mutation. Allocation failure (every slot watched) drops the
    /// observation for that entity but the crowd counter has already moved.
    pub fn process_observation(&mut self, obs: &Observation) {
        let window = obs.ts_s / WINDOW_SEC;
        if self.current_window != window {
            self.current_window = window;
            self.window_unique_hits = 0;
        }
        self.window_unique_hits += 1;

        match obs.kind {
            ObsKind::WifiProbeReq => self.observe_track(TrackKind::WifiClient, obs),
            ObsKind::BleAdv => self.observe_track(TrackKind::BleAdv, obs),
            ObsKind::WifiApBeacon | ObsKind::WifiApProbeResp => self.observe_anchor(obs),
        }
    }

    fn observe_track(&mut self, kind: TrackKind, obs: &Observation) {
        let segment_id = self.seg.segment_id();
        let window_hits = self.window_unique_hits;
        let gps = self.gps_fix();

        let Some(t) = self
            .tables
            .find_or_alloc_track(kind, obs.addr, obs.ts_s, segment_id)
        else {
            self.stats.note_alloc_failure();
            return;
        };

        update_track_stats(t, obs.rssi_dbm as i32, obs.ts_s, window_hits, segment_id);

        if let Some((lat, lon)) = gps {
            t.flags.insert(EntityFlags::HAS_GEO);
            t.last_geo_s = obs.ts_s;
            t.last_lat = lat;
            t.last_lon = lon;
        }

        if kind == TrackKind::BleAdv {
            merge_tracker_info(t, obs);
        }
    }

    fn observe_anchor(&mut self, obs: &Observation) {
        let gps = self.gps_fix();

        let Some(a) = self.tables.find_or_alloc_anchor(obs.addr, obs.ts_s) else {
            self.stats.note_alloc_failure();
            return;
        };

        a.last_seen_s = obs.ts_s;
        a.last_rssi = obs.rssi_dbm as i32;
        if !obs.ssid.is_empty() {
            a.ssid = obs.ssid;
        }

        if let Some((lat, lon)) = gps {
            let had_geo = a.has_geo();
            a.flags.insert(EntityFlags::HAS_GEO);
            a.last_geo_s = obs.ts_s;
            a.last_lat = lat;
            a.last_lon = lon;

            // Best pass: where the strongest signal was heard.
            if !had_geo || (obs.rssi_dbm as i32) > a.best_rssi {
                a.best_rssi = obs.rssi_dbm as i32;
                a.best_lat = lat;
                a.best_lon = lon;
            }

            // Weighted centroid: RSSI −95..−35 dBm maps to weight 1..10, so
            // close passes dominate the average.
            let w = (1.0 + 9.0 * clamp01((obs.rssi_dbm as f32 + 95.0) / 60.0)) as f64;
            a.w_sum += w;
            a.w_lat += w * lat;
            a.w_lon += w * lon;
        }
    }

    // ------------------------------------------------------------------
    // Periodic work
    // ------------------------------------------------------------------

    /// Advance segmentation at `ts_s` using GNSS when a fix is held, the AP
    /// fingerprint otherwise.
    pub fn advance_segmentation(&mut self, ts_s: u32) {
        let gps = self.gps_fix();
        self.seg.advance(ts_s, gps, &self.tables.anchors);
    }

    /// Free idle non-watched slots.
    pub fn expire_tables(&mut self, ts_s: u32) {
        let freed = self.tables.expire(ts_s);
        if freed > 0 {
            tracing::debug!(freed, "expired idle entities");
        }
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Assemble up to `max_out` rows, tracks first, unsorted. Callers sort
    /// with [`sort_views`] after releasing the lock.
    pub fn collect_snapshot(
        &self,
        ts_s: u32,
        max_out: usize,
        stationary_ratio: f32,
    ) -> Vec<EntityView> {
        let move_segments = self.seg.move_segments();
        let mut out = Vec::with_capacity(max_out.min(64));

        for t in self.tables.tracks.iter().filter(|t| t.in_use) {
            if out.len() >= max_out {
                return out;
            }
            out.push(track_view(t, move_segments, stationary_ratio));
        }

        for a in self.tables.anchors.iter().filter(|a| a.in_use) {
            if out.len() >= max_out {
                return out;
            }
            let (lat, lon) = a.display_geo().unwrap_or((0.0, 0.0));
            out.push(EntityView {
                kind: EntityKind::WifiAp,
                index: a.index,
                addr: a.addr,
                vendor: a.vendor,
                ssid: a.ssid,
                score: 0.0,
                rssi: a.last_rssi,
                age_s: ts_s.saturating_sub(a.last_seen_s),
                last_seen_s: a.last_seen_s,
                env_hits: 0,
                seen_windows: 0,
                near_windows: 0,
                crowd: 0.0,
                tracker_type: TrackerType::Unknown,
                tracker_google_mfr: Default::default(),
                tracker_samsung_subtype: Default::default(),
                tracker_confidence: 0,
                flags: a.flags,
                lat,
                lon,
            });
        }

        out
    }

    /// Convenience for deterministic tests: collect and sort in one step.
    pub fn build_snapshot(
        &self,
        ts_s: u32,
        max_out: usize,
        stationary_ratio: f32,
    ) -> Vec<EntityView> {
        let mut rows = self.collect_snapshot(ts_s, max_out, stationary_ratio);
        sort_views(&mut rows);
        rows
    }

    /// All watched entities, anchors first — the watchlist export set.
    pub fn collect_watching(&self, ts_s: u32) -> Vec<EntityView> {
        let move_segments = self.seg.move_segments();
        let mut out = Vec::new();

        for a in self.tables.anchors.iter().filter(|a| a.in_use && a.is_watching()) {
            let (lat, lon) = a.display_geo().unwrap_or((0.0, 0.0));
            out.push(EntityView {
                kind: EntityKind::WifiAp,
                index: a.index,
                addr: a.addr,
                vendor: a.vendor,
                ssid: a.ssid,
                score: 0.0,
                rssi: a.last_rssi,
                age_s: ts_s.saturating_sub(a.last_seen_s),
                last_seen_s: a.last_seen_s,
                env_hits: 0,
                seen_windows: 0,
                near_windows: 0,
                crowd: 0.0,
                tracker_type: TrackerType::Unknown,
                tracker_google_mfr: Default::default(),
                tracker_samsung_subtype: Default::default(),
                tracker_confidence: 0,
                flags: a.flags,
                lat,
                lon,
            });
        }

        for t in self.tables.tracks.iter().filter(|t| t.in_use && t.is_watching()) {
            out.push(track_view(t, move_segments, 0.0));
        }

        out
    }

    // ------------------------------------------------------------------
    // Entity control
    // ------------------------------------------------------------------

    /// Toggle the Watching flag on the slot identified by `(kind, index)`.
    /// The identity is a selector — nothing else about the slot changes.
    /// Returns false when no such slot is in use.
    pub fn update_entity(&mut self, kind: EntityKind, index: u16, watching: bool) -> bool {
        match kind {
            EntityKind::WifiAp => {
                for a in self.tables.anchors.iter_mut() {
                    if a.in_use && a.index == index {
                        a.flags.set(EntityFlags::WATCHING, watching);
                        return true;
                    }
                }
                false
            }
            EntityKind::WifiClient | EntityKind::BleAdv => {
                let want = match kind {
                    EntityKind::WifiClient => TrackKind::WifiClient,
                    _ => TrackKind::BleAdv,
                };
                for t in self.tables.tracks.iter_mut() {
                    if t.in_use && t.kind == want && t.index == index {
                        t.flags.set(EntityFlags::WATCHING, watching);
                        return true;
                    }
                }
                false
            }
        }
    }

    /// Clear all transient state. Watched entities survive; the index
    /// counter is rebased above every surviving index; segmentation, crowd
    /// window, and the GNSS anchor restart. The current fix validity is
    /// owned by the GNSS task and is deliberately left alone.
    pub fn reset(&mut self) {
        self.tables.reset_keep_watched();
        self.seg.reset();
        self.current_window = 0;
        self.window_unique_hits = 0;
        tracing::info!("tracker state reset (watched entities kept)");
    }

    // ------------------------------------------------------------------
    // Watchlist restore
    // ------------------------------------------------------------------

    /// Restore one watchlist item: find or allocate the entity, mark it
    /// Watching, and rehydrate geo/SSID/tracker fields. Fails only on table
    /// saturation.
    pub fn restore_watch_item(&mut self, item: &watchlist::WatchlistItem, ts_s: u32) -> bool {
        match item.kind {
            EntityKind::WifiAp => {
                let Some(a) = self.tables.find_or_alloc_anchor(item.mac, ts_s) else {
                    self.stats.note_alloc_failure();
                    return false;
                };
                a.flags.insert(EntityFlags::WATCHING);
                if let Some(ssid) = &item.ssid {
                    a.ssid.assign(ssid.as_bytes());
                }
                if let (Some(lat), Some(lon)) = (item.lat, item.lon) {
                    a.flags.insert(EntityFlags::HAS_GEO);
                    a.best_lat = lat;
                    a.best_lon = lon;
                    a.last_lat = lat;
                    a.last_lon = lon;
                }
                true
            }
            EntityKind::WifiClient | EntityKind::BleAdv => {
                let kind = match item.kind {
                    EntityKind::WifiClient => TrackKind::WifiClient,
                    _ => TrackKind::BleAdv,
                };
                let segment_id = self.seg.segment_id();
                let Some(t) = self
                    .tables
                    .find_or_alloc_track(kind, item.mac, ts_s, segment_id)
                else {
                    self.stats.note_alloc_failure();
                    return false;
                };
                t.flags.insert(EntityFlags::WATCHING);
                if let (Some(lat), Some(lon)) = (item.lat, item.lon) {
                    t.flags.insert(EntityFlags::HAS_GEO);
                    t.last_lat = lat;
                    t.last_lon = lon;
                }
                if let Some(tracker_type) = item.parsed_tracker_type() {
                    t.tracker_type = tracker_type;
                    if t.vendor == Vendor::Unknown {
                        t.vendor = classify::vendor_from_tracker_type(tracker_type);
                    }
                }
                if let Some(mfr) = item.parsed_google_mfr() {
                    t.tracker_google_mfr = mfr;
                }
                if let Some(subtype) = item.parsed_samsung_subtype() {
                    t.tracker_samsung_subtype = subtype;
                }
                if let Some(conf) = item.tracker_confidence {
                    t.tracker_confidence = conf;
                }
                true
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn segment_id(&self) -> u32 {
        self.seg.segment_id()
    }

    pub fn move_segments(&self) -> u32 {
        self.seg.move_segments()
    }

    pub fn last_env_tick_s(&self) -> u32 {
        self.seg.last_env_tick_s()
    }

    pub fn in_use_counts(&self) -> (usize, usize) {
        self.tables.in_use_counts()
    }
}

/// Fold a BLE observation's classifier verdict into a track. Unknown never
/// overwrites known; confidence only ratchets up.
fn merge_tracker_info(t: &mut Track, obs: &Observation) {
    let info = &obs.tracker;
    if info.tracker_type != TrackerType::Unknown {
        t.tracker_type = info.tracker_type;
        if t.vendor == Vendor::Unknown {
            t.vendor = classify::vendor_from_tracker_type(info.tracker_type);
        }
    }
    if info.google_mfr != crate::types::GoogleFmnManufacturer::Unknown {
        t.tracker_google_mfr = info.google_mfr;
    }
    if info.samsung_subtype != crate::types::SamsungTrackerSubtype::Unknown {
        t.tracker_samsung_subtype = info.samsung_subtype;
    }
    t.tracker_confidence = t.tracker_confidence.max(info.confidence);
}

fn track_view(t: &Track, move_segments: u32, stationary_ratio: f32) -> EntityView {
    EntityView {
        kind: t.kind.into(),
        index: t.index,
        addr: t.addr,
        vendor: t.vendor,
        ssid: Default::default(),
        score: score_track(t, move_segments, stationary_ratio),
        rssi: t.ema_rssi.round() as i32,
        age_s: t.last_seen_s.saturating_sub(t.first_seen_s),
        last_seen_s: t.last_seen_s,
        env_hits: t.env_hits,
        seen_windows: t.seen_windows,
        near_windows: t.near_windows,
        crowd: t.crowd_ema,
        tracker_type: t.tracker_type,
        tracker_google_mfr: t.tracker_google_mfr,
        tracker_samsung_subtype: t.tracker_samsung_subtype,
        tracker_confidence: t.tracker_confidence,
        flags: t.flags,
        lat: t.last_lat,
        lon: t.last_lon,
    }
}

/// Snapshot order: watched first, then score descending, then RSSI
/// descending, then index ascending for a stable tie-break.
pub fn sort_views(views: &mut [EntityView]) {
    views.sort_by(|a, b| {
        b.is_watching()
            .cmp(&a.is_watching())
            .then(
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(b.rssi.cmp(&a.rssi))
            .then(a.index.cmp(&b.index))
    });
}
