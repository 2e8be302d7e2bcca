//! Observation records produced by the radio sources.

use super::beacon::TrackerInfo;
use super::entity::Ssid;
use super::mac::MacAddr;

/// What kind of frame produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObsKind {
    /// Management subtype 4 — a client looking for networks (SA in addr2).
    WifiProbeReq,
    /// Management subtype 8 — an AP announcing itself (BSSID in addr3).
    WifiApBeacon,
    /// Management subtype 5 — an AP answering a probe (BSSID in addr3).
    WifiApProbeResp,
    /// A BLE advertisement.
    BleAdv,
}

/// One radio sighting, copied by value through the observation queue.
///
/// Producers fill this in interrupt/driver context: no heap, no locks.
/// For BLE the classifier verdict rides along so the processing loop never
/// has to re-parse advertising data.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub kind: ObsKind,
    pub rssi_dbm: i8,
    pub addr: MacAddr,
    /// AP SSID for beacon/probe-response; zero length means hidden.
    pub ssid: Ssid,
    /// Monotonic seconds since boot.
    pub ts_s: u32,
    /// Classifier verdict; meaningful only for [`ObsKind::BleAdv`].
    pub tracker: TrackerInfo,
}

impl Observation {
    /// Convenience constructor for Wi-Fi observations.
    pub fn wifi(kind: ObsKind, addr: MacAddr, rssi_dbm: i8, ssid: Ssid, ts_s: u32) -> Self {
        Self {
            kind,
            rssi_dbm,
            addr,
            ssid,
            ts_s,
            tracker: TrackerInfo::default(),
        }
    }

    /// Convenience constructor for BLE observations.
    pub fn ble(addr: MacAddr, rssi_dbm: i8, tracker: TrackerInfo, ts_s: u32) -> Self {
        Self {
            kind: ObsKind::BleAdv,
            rssi_dbm,
            addr,
            ssid: Ssid::default(),
            ts_s,
            tracker,
        }
    }
}
