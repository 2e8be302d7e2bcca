//! Environment segmentation.
//!
//! Splits the observation timeline into segments: contiguous intervals
//! during which the observer is judged stationary. A track that reappears
//! across many segments is moving *with* the observer, which is what the
//! mobility term of the score rewards.
//!
//! Two detection modes with fixed precedence:
//!
//! 1. **GNSS** — whenever a valid fix is held, advance on ≥ 50 m displacement
//!    from the segment anchor, evaluated at most every 10 s.
//! 2. **Fingerprint** — fallback without a fix: every 30 s, compare a top-8
//!    strongest-AP fingerprint against the previous one and advance when the
//!    similarity drops below 0.50.

use crate::config::defaults::{
    ENV_WINDOW_SEC, FP_ANCHOR_FRESH_SEC, FP_SIMILARITY_MIN, FP_TOP_N, GNSS_SEGMENT_DISTANCE_M,
    GNSS_SEGMENT_MIN_PERIOD_S, RSSI_MID_DBM, RSSI_NEAR_DBM,
};
use crate::tracker::scoring::clamp01;
use crate::types::{Anchor, MacAddr};

/// Coarse RSSI distance bucket: near = 2, mid = 1, far = 0.
///
/// Buckets, not raw dBm, so that ordinary fading does not destroy
/// fingerprint similarity.
pub fn rssi_bucket(rssi_dbm: i32) -> u8 {
    if rssi_dbm >= RSSI_NEAR_DBM {
        2
    } else if rssi_dbm >= RSSI_MID_DBM {
        1
    } else {
        0
    }
}

/// One fingerprint item: an AP and its distance bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FpItem {
    pub addr: MacAddr,
    pub bucket: u8,
}

/// Reduction of the strongest nearby APs to at most [`FP_TOP_N`] items.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFingerprint {
    items: [FpItem; FP_TOP_N],
    count: usize,
}

impl EnvFingerprint {
    pub fn items(&self) -> &[FpItem] {
        &self.items[..self.count]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn bucket_of(&self, addr: &MacAddr) -> Option<u8> {
        self.items().iter().find(|i| i.addr == *addr).map(|i| i.bucket)
    }
}

/// Build a fingerprint from the anchors heard within the last
/// [`FP_ANCHOR_FRESH_SEC`] seconds, strongest first.
pub fn build_fingerprint(anchors: &[Anchor], ts_s: u32) -> EnvFingerprint {
    let mut fresh: Vec<(MacAddr, i32)> = anchors
        .iter()
        .filter(|a| a.in_use)
        .filter(|a| ts_s.saturating_sub(a.last_seen_s) <= FP_ANCHOR_FRESH_SEC)
        .map(|a| (a.addr, a.last_rssi))
        .collect();

    fresh.sort_by(|a, b| b.1.cmp(&a.1));

    let mut fp = EnvFingerprint::default();
    for (addr, rssi) in fresh.into_iter().take(FP_TOP_N) {
        fp.items[fp.count] = FpItem {
            addr,
            bucket: rssi_bucket(rssi),
        };
        fp.count += 1;
    }
    fp
}

/// Similarity in [0, 1]: Jaccard over address sets plus a 0.25 bonus per
/// shared address whose bucket also matches, normalised by the union size.
/// Two empty fingerprints compare as identical.
pub fn fp_similarity(a: &EnvFingerprint, b: &EnvFingerprint) -> f32 {
    let mut union = a.len();
    for item in b.items() {
        if a.bucket_of(&item.addr).is_none() {
            union += 1;
        }
    }
    if union == 0 {
        return 1.0;
    }

    let mut inter = 0usize;
    let mut bonus = 0.0f32;
    for item in a.items() {
        if let Some(other_bucket) = b.bucket_of(&item.addr) {
            inter += 1;
            if other_bucket == item.bucket {
                bonus += 0.25;
            }
        }
    }

    let j = inter as f32 / union as f32;
    clamp01(j + bonus / union as f32)
}

// ============================================================================
// Haversine
// ============================================================================

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[inline]
fn deg2rad(d: f64) -> f64 {
    d.to_radians()
}

/// Great-circle distance between two WGS-84 points, in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = deg2rad(lat2 - lat1);
    let d_lon = deg2rad(lon2 - lon1);
    let a = (d_lat / 2.0).sin().powi(2)
        + deg2rad(lat1).cos() * deg2rad(lat2).cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

// ============================================================================
// Engine
// ============================================================================

/// Segmentation state. `segment_id` is monotonically increasing and starts
/// at 1 so that a freshly allocated track (stamped with the current id) can
/// never carry id 0.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    segment_id: u32,
    move_segments: u32,
    last_env_tick_s: u32,
    last_fp: EnvFingerprint,
    gps_anchor: Option<(f64, f64)>,
    last_gps_seg_s: u32,
}

impl Segmentation {
    pub fn new() -> Self {
        Self {
            segment_id: 1,
            ..Self::default()
        }
    }

    pub fn segment_id(&self) -> u32 {
        self.segment_id
    }

    pub fn move_segments(&self) -> u32 {
        self.move_segments
    }

    pub fn last_env_tick_s(&self) -> u32 {
        self.last_env_tick_s
    }

    /// Forget the GNSS anchor (called when the fix is lost, so the next
    /// valid fix re-anchors instead of measuring against stale coordinates).
    pub fn clear_gps_anchor(&mut self) {
        self.gps_anchor = None;
    }

    /// Evaluate segmentation at `ts_s`. `gps_fix` carries the current
    /// position when a valid fix is held; GNSS mode then takes precedence
    /// and the fingerprint path does not run at all.
    pub fn advance(&mut self, ts_s: u32, gps_fix: Option<(f64, f64)>, anchors: &[Anchor]) {
        if let Some((lat, lon)) = gps_fix {
            let Some((anchor_lat, anchor_lon)) = self.gps_anchor else {
                self.gps_anchor = Some((lat, lon));
                self.last_gps_seg_s = ts_s;
                return;
            };

            if ts_s.saturating_sub(self.last_gps_seg_s) >= GNSS_SEGMENT_MIN_PERIOD_S {
                let d = haversine_m(anchor_lat, anchor_lon, lat, lon);
                if d >= GNSS_SEGMENT_DISTANCE_M {
                    self.segment_id += 1;
                    self.move_segments += 1;
                    self.gps_anchor = Some((lat, lon));
                    self.last_gps_seg_s = ts_s;
                    tracing::debug!(
                        segment_id = self.segment_id,
                        moved_m = d as u32,
                        "GNSS segment boundary"
                    );
                }
            }
            return;
        }

        // Fingerprint fallback.
        if self.last_env_tick_s == 0 {
            self.last_env_tick_s = ts_s;
            self.last_fp = build_fingerprint(anchors, ts_s);
            return;
        }
        if ts_s.saturating_sub(self.last_env_tick_s) < ENV_WINDOW_SEC {
            return;
        }
        self.last_env_tick_s = ts_s;

        let fp = build_fingerprint(anchors, ts_s);
        let sim = fp_similarity(&fp, &self.last_fp);
        if sim < FP_SIMILARITY_MIN {
            self.segment_id += 1;
            self.move_segments += 1;
            tracing::debug!(
                segment_id = self.segment_id,
                similarity = sim,
                "fingerprint segment boundary"
            );
        }
        self.last_fp = fp;
    }

    /// Restore boot state. The GNSS fix itself is owned by the caller and
    /// survives; only the segmentation anchor is dropped.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
