//! Entity records: tracks (client-like radios) and anchors (access points).
//!
//! Both tables hold fixed-capacity slot records; a slot with `in_use = false`
//! is free and its remaining fields are meaningless. Slots are only mutated
//! by the processing loop under the tracker lock.

use serde::{Deserialize, Serialize};

use super::beacon::{GoogleFmnManufacturer, SamsungTrackerSubtype, TrackerType};
use super::mac::MacAddr;
use crate::config::defaults::EMA_RSSI_INIT;
use crate::vendor::Vendor;

/// Kind tag for snapshot rows and watchlist items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    WifiClient,
    BleAdv,
    WifiAp,
}

impl EntityKind {
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::WifiClient => "WifiClient",
            EntityKind::BleAdv => "BleAdv",
            EntityKind::WifiAp => "WifiAp",
        }
    }
}

/// Kind tag for track slots. Tracks are keyed by `(kind, addr)`: a Wi-Fi
/// client and a BLE advertiser with the same bytes are distinct entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackKind {
    #[default]
    WifiClient,
    BleAdv,
}

impl From<TrackKind> for EntityKind {
    fn from(k: TrackKind) -> Self {
        match k {
            TrackKind::WifiClient => EntityKind::WifiClient,
            TrackKind::BleAdv => EntityKind::BleAdv,
        }
    }
}

// ============================================================================
// Flags
// ============================================================================

/// Per-entity flag bits.
///
/// `WATCHING` protects a slot from eviction and idle expiry and marks it for
/// watchlist persistence. `HAS_GEO` records that at least one valid GNSS fix
/// was held while the entity was observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityFlags(u8);

impl EntityFlags {
    pub const NONE: EntityFlags = EntityFlags(0);
    pub const HAS_GEO: EntityFlags = EntityFlags(1 << 0);
    pub const WATCHING: EntityFlags = EntityFlags(1 << 1);

    pub fn contains(self, f: EntityFlags) -> bool {
        self.0 & f.0 != 0
    }

    pub fn insert(&mut self, f: EntityFlags) {
        self.0 |= f.0;
    }

    pub fn remove(&mut self, f: EntityFlags) {
        self.0 &= !f.0;
    }

    pub fn set(&mut self, f: EntityFlags, on: bool) {
        if on {
            self.insert(f);
        } else {
            self.remove(f);
        }
    }
}

// ============================================================================
// SSID buffer
// ============================================================================

/// Fixed 32-byte SSID buffer. Zero length means hidden/absent.
#[derive(Debug, Clone, Copy)]
pub struct Ssid {
    bytes: [u8; 32],
    len: u8,
}

impl Default for Ssid {
    fn default() -> Self {
        Self {
            bytes: [0; 32],
            len: 0,
        }
    }
}

impl Ssid {
    /// Copy from raw IE bytes, truncating at 32.
    pub fn from_bytes(src: &[u8]) -> Self {
        let mut s = Self::default();
        s.assign(src);
        s
    }

    pub fn assign(&mut self, src: &[u8]) {
        let n = src.len().min(32);
        self.bytes[..n].copy_from_slice(&src[..n]);
        self.len = n as u8;
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Lossy UTF-8 view for display and persistence.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl PartialEq for Ssid {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

// ============================================================================
// Track
// ============================================================================

/// A client-like radio: a Wi-Fi client (probe requests) or a BLE advertiser.
#[derive(Debug, Clone)]
pub struct Track {
    pub in_use: bool,
    pub kind: TrackKind,
    pub addr: MacAddr,

    pub vendor: Vendor,
    pub flags: EntityFlags,

    /// Stable identity for UI selection; unique across in-use slots, never 0.
    pub index: u16,
    pub first_seen_s: u32,
    pub last_seen_s: u32,

    pub last_window: u32,
    pub seen_windows: u32,
    pub near_windows: u32,

    pub ema_rssi: f32,
    pub ema_abs_dev: f32,

    pub last_segment_id: u32,
    pub env_hits: u32,

    pub crowd_ema: f32,

    // Observer position when this device was last seen (not the device's own
    // position; a passive monitor cannot know that).
    pub last_geo_s: u32,
    pub last_lat: f64,
    pub last_lon: f64,

    pub tracker_type: TrackerType,
    pub tracker_google_mfr: GoogleFmnManufacturer,
    pub tracker_samsung_subtype: SamsungTrackerSubtype,
    pub tracker_confidence: u8,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            in_use: false,
            kind: TrackKind::default(),
            addr: MacAddr::default(),
            vendor: Vendor::Unknown,
            flags: EntityFlags::NONE,
            index: 0,
            first_seen_s: 0,
            last_seen_s: 0,
            last_window: 0,
            seen_windows: 0,
            near_windows: 0,
            ema_rssi: EMA_RSSI_INIT,
            ema_abs_dev: 0.0,
            last_segment_id: 0,
            env_hits: 0,
            crowd_ema: 0.0,
            last_geo_s: 0,
            last_lat: 0.0,
            last_lon: 0.0,
            tracker_type: TrackerType::Unknown,
            tracker_google_mfr: GoogleFmnManufacturer::Unknown,
            tracker_samsung_subtype: SamsungTrackerSubtype::Unknown,
            tracker_confidence: 0,
        }
    }
}

impl Track {
    pub fn is_watching(&self) -> bool {
        self.flags.contains(EntityFlags::WATCHING)
    }

    pub fn has_geo(&self) -> bool {
        self.flags.contains(EntityFlags::HAS_GEO)
    }
}

// ============================================================================
// Anchor
// ============================================================================

/// A Wi-Fi access point, keyed by BSSID.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub in_use: bool,
    pub addr: MacAddr,

    pub vendor: Vendor,
    pub flags: EntityFlags,

    pub ssid: Ssid,

    pub index: u16,
    pub last_rssi: i32,
    pub last_seen_s: u32,

    // Observer position when this AP was last heard.
    pub last_geo_s: u32,
    pub last_lat: f64,
    pub last_lon: f64,

    // Best-pass position: where the strongest RSSI was observed.
    pub best_rssi: i32,
    pub best_lat: f64,
    pub best_lon: f64,

    // RSSI-weighted centroid accumulators.
    pub w_sum: f64,
    pub w_lat: f64,
    pub w_lon: f64,
}

impl Default for Anchor {
    fn default() -> Self {
        Self {
            in_use: false,
            addr: MacAddr::default(),
            vendor: Vendor::Unknown,
            flags: EntityFlags::NONE,
            ssid: Ssid::default(),
            index: 0,
            last_rssi: -100,
            last_seen_s: 0,
            last_geo_s: 0,
            last_lat: 0.0,
            last_lon: 0.0,
            best_rssi: -127,
            best_lat: 0.0,
            best_lon: 0.0,
            w_sum: 0.0,
            w_lat: 0.0,
            w_lon: 0.0,
        }
    }
}

impl Anchor {
    pub fn is_watching(&self) -> bool {
        self.flags.contains(EntityFlags::WATCHING)
    }

    pub fn has_geo(&self) -> bool {
        self.flags.contains(EntityFlags::HAS_GEO)
    }

    /// Display position: the weighted centroid once it has accumulated enough
    /// weight, otherwise the best-pass fix. `None` without geo.
    pub fn display_geo(&self) -> Option<(f64, f64)> {
        if !self.has_geo() {
            return None;
        }
        if self.w_sum >= crate::config::defaults::CENTROID_MIN_WEIGHT {
            Some((self.w_lat / self.w_sum, self.w_lon / self.w_sum))
        } else {
            Some((self.best_lat, self.best_lon))
        }
    }
}

// ============================================================================
// EntityView
// ============================================================================

/// Read-only projection of a track or anchor handed to UI/export consumers.
///
/// Views are owned values; nothing aliases table slots across the lock
/// boundary.
#[derive(Debug, Clone)]
pub struct EntityView {
    pub kind: EntityKind,
    pub index: u16,
    pub addr: MacAddr,
    pub vendor: Vendor,
    pub ssid: Ssid,
    /// 0..=100 for tracks; always 0.0 for AP anchors.
    pub score: f32,
    /// dBm: rounded EMA for tracks, last observation for anchors.
    pub rssi: i32,
    /// Tracks: dwell (last-first). Anchors: seconds since last seen.
    pub age_s: u32,
    pub last_seen_s: u32,
    pub env_hits: u32,
    pub seen_windows: u32,
    pub near_windows: u32,
    pub crowd: f32,
    pub tracker_type: TrackerType,
    pub tracker_google_mfr: GoogleFmnManufacturer,
    pub tracker_samsung_subtype: SamsungTrackerSubtype,
    pub tracker_confidence: u8,
    pub flags: EntityFlags,
    pub lat: f64,
    pub lon: f64,
}

impl EntityView {
    pub fn is_watching(&self) -> bool {
        self.flags.contains(EntityFlags::WATCHING)
    }

    pub fn has_geo(&self) -> bool {
        self.flags.contains(EntityFlags::HAS_GEO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_set_and_clear() {
        let mut f = EntityFlags::NONE;
        assert!(!f.contains(EntityFlags::WATCHING));
        f.insert(EntityFlags::WATCHING);
        f.insert(EntityFlags::HAS_GEO);
        assert!(f.contains(EntityFlags::WATCHING));
        assert!(f.contains(EntityFlags::HAS_GEO));
        f.set(EntityFlags::WATCHING, false);
        assert!(!f.contains(EntityFlags::WATCHING));
        assert!(f.contains(EntityFlags::HAS_GEO));
    }

    #[test]
    fn test_ssid_truncates_at_32() {
        let long = [0x41u8; 40];
        let ssid = Ssid::from_bytes(&long);
        assert_eq!(ssid.len(), 32);
        assert_eq!(ssid.as_bytes(), &long[..32]);
    }

    #[test]
    fn test_anchor_display_geo_prefers_centroid() {
        let mut a = Anchor {
            in_use: true,
            ..Default::default()
        };
        assert_eq!(a.display_geo(), None);

        a.flags.insert(EntityFlags::HAS_GEO);
        a.best_lat = 1.0;
        a.best_lon = 2.0;
        assert_eq!(a.display_geo(), Some((1.0, 2.0)));

        // Enough centroid weight flips the preference.
        a.w_sum = 4.0;
        a.w_lat = 4.0 * 10.0;
        a.w_lon = 4.0 * 20.0;
        assert_eq!(a.display_geo(), Some((10.0, 20.0)));
    }
}
