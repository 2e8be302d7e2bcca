//! IEEE 802.11 management-frame parsing and scan-result ingestion.
//!
//! The sniffer delivers raw management frames with a receive RSSI. Only
//! three subtypes matter to the tracker:
//!
//! | subtype | frame          | entity key | IEs begin at |
//! |---------|----------------|------------|--------------|
//! | 4       | probe request  | SA (addr2) | 24           |
//! | 5       | probe response | BSSID (addr3) | 36        |
//! | 8       | beacon         | BSSID (addr3) | 36        |
//!
//! Everything else, and anything malformed, parses to `None`.

use crate::config::defaults::{HOP_MS, WIFI_CH_MAX, WIFI_CH_MIN};
use crate::types::{MacAddr, ObsKind, Observation, Ssid};

/// Minimum management header: fc(2) dur(2) addr1(6) addr2(6) addr3(6) seq(2).
const MGMT_HDR_LEN: usize = 24;

/// Beacon/probe-response fixed parameters after the header:
/// timestamp(8) + interval(2) + capabilities(2).
const BEACON_FIXED_LEN: usize = 12;

const SUBTYPE_PROBE_REQ: u8 = 4;
const SUBTYPE_PROBE_RESP: u8 = 5;
const SUBTYPE_BEACON: u8 = 8;

#[inline]
fn fc_type(fc: u16) -> u8 {
    ((fc >> 2) & 0x3) as u8
}

#[inline]
fn fc_subtype(fc: u16) -> u8 {
    ((fc >> 4) & 0xF) as u8
}

#[inline]
fn addr_at(payload: &[u8], offset: usize) -> MacAddr {
    let mut b = [0u8; 6];
    b.copy_from_slice(&payload[offset..offset + 6]);
    MacAddr(b)
}

/// Walk an information-element list and extract the SSID (IE id 0).
///
/// A present, zero-length SSID means hidden and yields an empty [`Ssid`] —
/// the same result as an absent IE. A length that overruns the buffer
/// terminates the walk (malformed IE list).
fn extract_ssid_ie(ies: &[u8]) -> Ssid {
    let mut i = 0;
    while i + 2 <= ies.len() {
        let id = ies[i];
        let len = ies[i + 1] as usize;
        i += 2;

        if i + len > ies.len() {
            break;
        }

        if id == 0 {
            return Ssid::from_bytes(&ies[i..i + len]);
        }

        i += len;
    }
    Ssid::default()
}

/// Parse one raw management frame into an [`Observation`].
///
/// Returns `None` for non-management frames, uninteresting subtypes, and
/// frames too short to carry the fields we need. Never panics on hostile
/// input: every offset is bounds-checked before use.
pub fn parse_mgmt_frame(payload: &[u8], rssi_dbm: i8, ts_s: u32) -> Option<Observation> {
    if payload.len() < MGMT_HDR_LEN {
        return None;
    }

    let fc = u16::from_le_bytes([payload[0], payload[1]]);
    if fc_type(fc) != 0 {
        return None;
    }

    match fc_subtype(fc) {
        st @ (SUBTYPE_BEACON | SUBTYPE_PROBE_RESP) => {
            let ie_start = MGMT_HDR_LEN + BEACON_FIXED_LEN;
            if payload.len() <= ie_start {
                return None;
            }
            let kind = if st == SUBTYPE_BEACON {
                ObsKind::WifiApBeacon
            } else {
                ObsKind::WifiApProbeResp
            };
            let bssid = addr_at(payload, 16);
            let ssid = extract_ssid_ie(&payload[ie_start..]);
            Some(Observation::wifi(kind, bssid, rssi_dbm, ssid, ts_s))
        }
        SUBTYPE_PROBE_REQ => {
            // Client SA in addr2; IEs follow the header directly. The probed
            // SSID is carried on the observation but does not populate track
            // state.
            let sa = addr_at(payload, 10);
            let ssid = extract_ssid_ie(&payload[MGMT_HDR_LEN..]);
            Some(Observation::wifi(
                ObsKind::WifiProbeReq,
                sa,
                rssi_dbm,
                ssid,
                ts_s,
            ))
        }
        _ => None,
    }
}

// ============================================================================
// Active-scan results
// ============================================================================

/// One record from a completed active scan.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub rssi_dbm: i8,
    pub channel: u8,
    pub bssid: MacAddr,
    pub ssid: Ssid,
}

impl ScanRecord {
    /// Scan results are ingested as AP beacon observations.
    pub fn into_observation(self, ts_s: u32) -> Observation {
        Observation::wifi(
            ObsKind::WifiApBeacon,
            self.bssid,
            self.rssi_dbm,
            self.ssid,
            ts_s,
        )
    }
}

// ============================================================================
// Channel hop plan
// ============================================================================

/// Round-robin hop plan over the 2.4 GHz channels the sniffer listens on.
///
/// The hop task calls [`advance`](Self::advance) every [`dwell`](Self::dwell)
/// and retunes the radio to the returned channel.
#[derive(Debug, Clone)]
pub struct ChannelHopPlan {
    next: u8,
}

impl Default for ChannelHopPlan {
    fn default() -> Self {
        Self { next: WIFI_CH_MIN }
    }
}

impl ChannelHopPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-channel dwell time.
    pub fn dwell(&self) -> std::time::Duration {
        std::time::Duration::from_millis(HOP_MS)
    }

    /// Channel to tune next; wraps from [`WIFI_CH_MAX`] back to [`WIFI_CH_MIN`].
    pub fn advance(&mut self) -> u8 {
        let ch = self.next;
        self.next = if ch >= WIFI_CH_MAX {
            WIFI_CH_MIN
        } else {
            ch + 1
        };
        ch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a management frame: header with the given subtype and addresses,
    /// then `body` (fixed params + IEs for beacon-class frames).
    fn mgmt_frame(subtype: u8, addr2: [u8; 6], addr3: [u8; 6], body: &[u8]) -> Vec<u8> {
        let fc: u16 = (subtype as u16) << 4; // type = 0 (management)
        let mut f = Vec::new();
        f.extend_from_slice(&fc.to_le_bytes());
        f.extend_from_slice(&[0, 0]); // duration
        f.extend_from_slice(&[0xFF; 6]); // addr1 (DA)
        f.extend_from_slice(&addr2);
        f.extend_from_slice(&addr3);
        f.extend_from_slice(&[0, 0]); // seq
        f.extend_from_slice(body);
        f
    }

    fn beacon_body(ies: &[u8]) -> Vec<u8> {
        let mut b = vec![0u8; 12]; // timestamp + interval + capabilities
        b.extend_from_slice(ies);
        b
    }

    const BSSID: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
    const CLIENT: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    #[test]
    fn test_beacon_with_ssid() {
        let ies = [&[0x00, 0x08][..], b"OfficeAP"].concat();
        let frame = mgmt_frame(8, [0; 6], BSSID, &beacon_body(&ies));
        let obs = parse_mgmt_frame(&frame, -55, 100).unwrap();
        assert_eq!(obs.kind, ObsKind::WifiApBeacon);
        assert_eq!(obs.addr, MacAddr(BSSID));
        assert_eq!(obs.rssi_dbm, -55);
        assert_eq!(obs.ssid.as_bytes(), b"OfficeAP");
    }

    #[test]
    fn test_hidden_ssid_beacon() {
        let ies = [0x00, 0x00]; // SSID IE present, zero length
        let frame = mgmt_frame(8, [0; 6], BSSID, &beacon_body(&ies));
        let obs = parse_mgmt_frame(&frame, -70, 5).unwrap();
        assert!(obs.ssid.is_empty());
    }

    #[test]
    fn test_ssid_after_other_ies() {
        // Rates IE first, then SSID.
        let ies = [&[0x01, 0x03, 0x02, 0x04, 0x0B][..], &[0x00, 0x03], b"lab"].concat();
        let frame = mgmt_frame(5, [0; 6], BSSID, &beacon_body(&ies));
        let obs = parse_mgmt_frame(&frame, -60, 7).unwrap();
        assert_eq!(obs.kind, ObsKind::WifiApProbeResp);
        assert_eq!(obs.ssid.as_bytes(), b"lab");
    }

    #[test]
    fn test_probe_request_uses_addr2() {
        let ies = [0x00, 0x00]; // wildcard SSID
        let frame = mgmt_frame(4, CLIENT, [0; 6], &ies);
        let obs = parse_mgmt_frame(&frame, -48, 42).unwrap();
        assert_eq!(obs.kind, ObsKind::WifiProbeReq);
        assert_eq!(obs.addr, MacAddr(CLIENT));
    }

    #[test]
    fn test_rejects_short_and_non_mgmt_frames() {
        assert!(parse_mgmt_frame(&[0u8; 10], -50, 0).is_none());

        // Data frame (type = 2).
        let mut frame = mgmt_frame(8, [0; 6], BSSID, &beacon_body(&[0x00, 0x00]));
        frame[0] = 0x88;
        assert!(parse_mgmt_frame(&frame, -50, 0).is_none());

        // Uninteresting management subtype (association request = 0).
        let frame = mgmt_frame(0, CLIENT, BSSID, &beacon_body(&[]));
        assert!(parse_mgmt_frame(&frame, -50, 0).is_none());
    }

    #[test]
    fn test_beacon_without_ie_section_rejected() {
        // Header + fixed params but nothing after: no room for IEs.
        let frame = mgmt_frame(8, [0; 6], BSSID, &vec![0u8; 12]);
        assert!(parse_mgmt_frame(&frame, -50, 0).is_none());
    }

    #[test]
    fn test_malformed_ie_length_stops_walk() {
        // IE claims 200 bytes but the buffer ends; SSID stays hidden.
        let ies = [0x01, 200, 0x02];
        let frame = mgmt_frame(8, [0; 6], BSSID, &beacon_body(&ies));
        let obs = parse_mgmt_frame(&frame, -50, 0).unwrap();
        assert!(obs.ssid.is_empty());
    }

    #[test]
    fn test_scan_record_becomes_beacon_observation() {
        let rec = ScanRecord {
            rssi_dbm: -40,
            channel: 6,
            bssid: MacAddr(BSSID),
            ssid: Ssid::from_bytes(b"cafe"),
        };
        let obs = rec.into_observation(90);
        assert_eq!(obs.kind, ObsKind::WifiApBeacon);
        assert_eq!(obs.ts_s, 90);
        assert_eq!(obs.ssid.as_bytes(), b"cafe");
    }

    #[test]
    fn test_hop_plan_cycles() {
        let mut plan = ChannelHopPlan::new();
        let first: Vec<u8> = (0..11).map(|_| plan.advance()).collect();
        assert_eq!(first, (1..=11).collect::<Vec<u8>>());
        assert_eq!(plan.advance(), 1); // wraps
    }
}
