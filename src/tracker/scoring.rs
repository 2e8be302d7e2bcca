//! Interest scoring.
//!
//! Deterministic, closed-form score in [0, 100] for a track given the
//! current movement history. Rule-based on purpose: scores must be stable,
//! explainable, and identical across devices observing the same history.
//!
//! # Score components
//!
//! - P (persistence, up to 30): log-saturating dwell time, capped at
//!   [`T_CAP_MIN`] minutes.
//! - R (regularity, up to 25): 70% near-window fraction, 30% RSSI stability.
//! - M (mobility coverage, up to 35): fraction of the observer's movement
//!   segments in which the device reappeared. The strongest signal — a
//!   radio that follows you across environments.
//! - C (crowd penalty, down to −25): devices seen amid many others are
//!   usually ambient, not following.
//! - I (idle penalty, down to −20): while the observer is stationary,
//!   persistence is expected and proves nothing.
//!
//! The sum is clamped to [0, 100]. AP anchors are never scored; the snapshot
//! assigns them 0.0.

use crate::config::defaults::{CROWD_HI, CROWD_LO, RSSI_DEV_CAP, T_CAP_MIN};
use crate::types::Track;

#[inline]
pub(crate) fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Score one track. `move_segments` is the segmentation engine's lifetime
/// boundary count; `stationary_ratio` ∈ [0, 1] is the caller's estimate of
/// how long the observer has been still.
pub fn score_track(t: &Track, move_segments: u32, stationary_ratio: f32) -> f32 {
    let t_min = t.last_seen_s.saturating_sub(t.first_seen_s) as f32 / 60.0;
    let p = 30.0 * clamp01((1.0 + t_min).ln() / (1.0 + T_CAP_MIN).ln());

    let f_near = if t.seen_windows > 0 {
        t.near_windows as f32 / t.seen_windows as f32
    } else {
        0.0
    };
    let stability = clamp01(1.0 - t.ema_abs_dev / RSSI_DEV_CAP);
    let r = 25.0 * clamp01(0.7 * f_near + 0.3 * stability);

    let coverage = t.env_hits as f32 / move_segments.max(1) as f32;
    let m = 35.0 * clamp01(coverage);

    let crowd_norm = clamp01((t.crowd_ema - CROWD_LO) / (CROWD_HI - CROWD_LO));
    let c = -25.0 * crowd_norm;

    let i = -20.0 * clamp01(stationary_ratio);

    (p + r + m + c + i).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_track() -> Track {
        Track {
            in_use: true,
            first_seen_s: 0,
            last_seen_s: 600,
            seen_windows: 10,
            near_windows: 5,
            ema_abs_dev: 2.0,
            env_hits: 2,
            crowd_ema: 3.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_score_in_range() {
        let t = base_track();
        for ratio in [0.0, 0.5, 1.0] {
            for segs in [0, 1, 5, 100] {
                let s = score_track(&t, segs, ratio);
                assert!((0.0..=100.0).contains(&s), "score {} out of range", s);
            }
        }
    }

    #[test]
    fn test_persistence_monotonic_in_dwell() {
        let mut t = base_track();
        let mut prev = score_track(&t, 4, 0.0);
        for last_seen in [900, 1200, 1800, 3600] {
            t.last_seen_s = last_seen;
            let s = score_track(&t, 4, 0.0);
            assert!(s >= prev, "dwell {} lowered score: {} < {}", last_seen, s, prev);
            prev = s;
        }
    }

    #[test]
    fn test_persistence_saturates_at_cap() {
        let mut t = base_track();
        t.last_seen_s = 30 * 60; // exactly T_CAP_MIN
        let at_cap = score_track(&t, 4, 0.0);
        t.last_seen_s = 300 * 60;
        let beyond = score_track(&t, 4, 0.0);
        assert!((beyond - at_cap).abs() < 1e-4);
    }

    #[test]
    fn test_crowd_never_increases_score() {
        let mut t = base_track();
        let mut prev = score_track(&t, 4, 0.0);
        for crowd in [5.0, 10.0, 20.0, 40.0, 80.0] {
            t.crowd_ema = crowd;
            let s = score_track(&t, 4, 0.0);
            assert!(s <= prev, "crowd {} raised score: {} > {}", crowd, s, prev);
            prev = s;
        }
    }

    #[test]
    fn test_mobility_coverage_rewards_reappearance() {
        let mut follower = base_track();
        follower.env_hits = 8;
        let mut ambient = base_track();
        ambient.env_hits = 1;
        assert!(score_track(&follower, 8, 0.0) > score_track(&ambient, 8, 0.0));
    }

    #[test]
    fn test_idle_penalty_applies_when_stationary() {
        let t = base_track();
        let moving = score_track(&t, 4, 0.0);
        let still = score_track(&t, 4, 1.0);
        assert!(moving - still >= 19.99, "idle penalty missing: {} vs {}", moving, still);
    }

    #[test]
    fn test_near_fraction_rewards_proximity() {
        let mut near = base_track();
        near.near_windows = 10;
        let mut far = base_track();
        far.near_windows = 0;
        assert!(score_track(&near, 4, 0.0) > score_track(&far, 4, 0.0));
    }

    #[test]
    fn test_zero_windows_track_scores_without_panic() {
        let mut t = base_track();
        t.seen_windows = 0;
        t.near_windows = 0;
        let s = score_track(&t, 1, 0.0);
        assert!((0.0..=100.0).contains(&s));
    }
}
