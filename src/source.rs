//! Observation source abstraction for replay and bench runs.
//!
//! Provides a unified trait for feeding the tracker without physical radios:
//! JSONL files (replay), stdin (live pipe from a capture tool), and a
//! synthetic generator. Real deployments bypass this entirely — radio
//! callbacks push into the queue directly.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::classify::Advertisement;
use crate::radio::ble;
use crate::types::{MacAddr, ObsKind, Observation, Ssid, TrackerInfo};

/// Events produced by an observation source.
pub enum SourceEvent {
    /// A decoded observation ready to enqueue.
    Observation(Observation),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where replayed observations come from.
#[async_trait]
pub trait ObservationSource: Send + 'static {
    /// Read the next observation. Implementations handle pacing and
    /// malformed-line skipping internally.
    async fn next_observation(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "JSONL", "stdin", "synthetic").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Wire record
// ============================================================================

/// One JSONL line. BLE records may carry raw classification inputs
/// (service UUIDs, hex manufacturer data, local name) so replays exercise
/// the classifier exactly like live scans do.
#[derive(Debug, Deserialize)]
struct ObsRecord {
    kind: RecordKind,
    mac: MacAddr,
    rssi: i8,
    #[serde(default)]
    ssid: Option<String>,
    #[serde(default)]
    ts_s: Option<u32>,
    #[serde(default)]
    services: Vec<u16>,
    #[serde(default)]
    mfg: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
enum RecordKind {
    WifiProbeReq,
    WifiApBeacon,
    WifiApProbeResp,
    BleAdv,
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

impl ObsRecord {
    fn into_observation(self, fallback_ts: u32) -> Observation {
        let ts = self.ts_s.unwrap_or(fallback_ts);
        match self.kind {
            RecordKind::WifiProbeReq | RecordKind::WifiApBeacon | RecordKind::WifiApProbeResp => {
                let kind = match self.kind {
                    RecordKind::WifiProbeReq => ObsKind::WifiProbeReq,
                    RecordKind::WifiApBeacon => ObsKind::WifiApBeacon,
                    _ => ObsKind::WifiApProbeResp,
                };
                let ssid = self
                    .ssid
                    .map(|s| Ssid::from_bytes(s.as_bytes()))
                    .unwrap_or_default();
                Observation::wifi(kind, self.mac, self.rssi, ssid, ts)
            }
            RecordKind::BleAdv => {
                let mfg = self.mfg.as_deref().and_then(decode_hex);
                let adv = Advertisement::from_parts(
                    &self.services,
                    mfg.as_deref(),
                    self.name.as_deref().map(|n| n.as_bytes()),
                );
                ble::observation_from_advertisement(self.mac, self.rssi, &adv, ts)
            }
        }
    }
}

// ============================================================================
// JSONL file source
// ============================================================================

/// Replays observation records from a JSONL file, one per line.
pub struct JsonlSource {
    reader: BufReader<tokio::fs::File>,
    line: String,
    started: Instant,
}

impl JsonlSource {
    pub async fn open(path: &std::path::Path) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file),
            line: String::with_capacity(512),
            started: Instant::now(),
        })
    }
}

#[async_trait]
impl ObservationSource for JsonlSource {
    async fn next_observation(&mut self) -> Result<SourceEvent> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(SourceEvent::Eof);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ObsRecord>(line) {
                Ok(rec) => {
                    let fallback = self.started.elapsed().as_secs() as u32;
                    return Ok(SourceEvent::Observation(rec.into_observation(fallback)));
                }
                Err(e) => {
                    tracing::warn!("[JsonlSource] skipping malformed line: {}", e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "JSONL"
    }
}

// ============================================================================
// Stdin source
// ============================================================================

/// Reads observation records from stdin. Use with a capture tool:
/// `capture --json | pigtail --stdin`
pub struct StdinSource {
    reader: BufReader<tokio::io::Stdin>,
    line: String,
    started: Instant,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            line: String::with_capacity(512),
            started: Instant::now(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationSource for StdinSource {
    async fn next_observation(&mut self) -> Result<SourceEvent> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(SourceEvent::Eof);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ObsRecord>(line) {
                Ok(rec) => {
                    let fallback = self.started.elapsed().as_secs() as u32;
                    return Ok(SourceEvent::Observation(rec.into_observation(fallback)));
                }
                Err(e) => {
                    tracing::warn!("[StdinSource] skipping malformed line: {}", e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Synthetic source
// ============================================================================

/// Generates a plausible radio environment: a handful of APs, a crowd of
/// Wi-Fi clients, and a couple of BLE item trackers. Deterministic for a
/// given seed.
pub struct SyntheticSource {
    rng: StdRng,
    started: Instant,
    tick_ms: u64,
}

impl SyntheticSource {
    pub fn new(seed: u64, tick_ms: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            started: Instant::now(),
            tick_ms,
        }
    }

    fn mac(&mut self, class: u8, n: u8) -> MacAddr {
        // Stable per (class, n); first byte keeps the locally-administered
        // bit for client-like devices.
        MacAddr([class, 0x5E, 0x10, 0x00, 0x00, n])
    }
}

#[async_trait]
impl ObservationSource for SyntheticSource {
    async fn next_observation(&mut self) -> Result<SourceEvent> {
        tokio::time::sleep(std::time::Duration::from_millis(self.tick_ms)).await;
        let ts = self.started.elapsed().as_secs() as u32;

        let obs = match self.rng.gen_range(0..10) {
            // Half the traffic: AP beacons.
            0..=4 => {
                let n = self.rng.gen_range(0..6u8);
                let mac = self.mac(0xA0, n);
                let ssid = Ssid::from_bytes(format!("net-{}", n).as_bytes());
                let rssi = self.rng.gen_range(-88..=-40i32) as i8;
                Observation::wifi(ObsKind::WifiApBeacon, mac, rssi, ssid, ts)
            }
            // Wi-Fi clients probing.
            5..=7 => {
                let n = self.rng.gen_range(0..12u8);
                let mac = self.mac(0xDA, n);
                let rssi = self.rng.gen_range(-90..=-50i32) as i8;
                Observation::wifi(ObsKind::WifiProbeReq, mac, rssi, Ssid::default(), ts)
            }
            // A persistent AirTag-like advertiser.
            8 => {
                let mac = self.mac(0xDE, 1);
                let mfg = [0x4C, 0x00, 0x12, 0x19, 0x10];
                let adv = Advertisement::from_parts(&[], Some(&mfg), None);
                let rssi = self.rng.gen_range(-70..=-55i32) as i8;
                ble::observation_from_advertisement(mac, rssi, &adv, ts)
            }
            // Miscellaneous BLE chatter.
            _ => {
                let n = self.rng.gen_range(0..8u8);
                let mac = self.mac(0xDE, 0x80 + n);
                let rssi = self.rng.gen_range(-95..=-60i32) as i8;
                Observation::ble(mac, rssi, TrackerInfo::default(), ts)
            }
        };

        Ok(SourceEvent::Observation(obs))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackerType;

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("4c001219"), Some(vec![0x4C, 0x00, 0x12, 0x19]));
        assert_eq!(decode_hex("zz"), None);
        assert_eq!(decode_hex("abc"), None);
    }

    #[test]
    fn test_wifi_record_conversion() {
        let rec: ObsRecord = serde_json::from_str(
            r#"{"kind":"WifiApBeacon","mac":"AA:BB:CC:DD:EE:FF","rssi":-55,"ssid":"OfficeAP","ts_s":42}"#,
        )
        .unwrap();
        let obs = rec.into_observation(0);
        assert_eq!(obs.kind, ObsKind::WifiApBeacon);
        assert_eq!(obs.rssi_dbm, -55);
        assert_eq!(obs.ts_s, 42);
        assert_eq!(obs.ssid.as_bytes(), b"OfficeAP");
    }

    #[test]
    fn test_ble_record_runs_classifier() {
        let rec: ObsRecord = serde_json::from_str(
            r#"{"kind":"BleAdv","mac":"11:22:33:44:55:66","rssi":-60,"mfg":"4c00121910"}"#,
        )
        .unwrap();
        let obs = rec.into_observation(7);
        assert_eq!(obs.kind, ObsKind::BleAdv);
        assert_eq!(obs.tracker.tracker_type, TrackerType::AppleAirTag);
        assert_eq!(obs.ts_s, 7);
    }

    #[test]
    fn test_missing_ts_uses_fallback() {
        let rec: ObsRecord = serde_json::from_str(
            r#"{"kind":"WifiProbeReq","mac":"11:22:33:44:55:66","rssi":-60}"#,
        )
        .unwrap();
        assert_eq!(rec.into_observation(99).ts_s, 99);
    }
}
