//! End-to-end tracker scenarios.
//!
//! Exercises the deterministic engine ([`TrackerCore`]) with literal
//! observation sequences and checks catalog state, scoring bounds, snapshot
//! ordering, segmentation, and the facade's lossy queue behaviour.

use pigtail::classify::{self, Advertisement, SVC_TILE};
use pigtail::radio::ble::parse_advertising_data;
use pigtail::types::{
    EntityKind, MacAddr, ObsKind, Observation, Ssid, TrackerInfo, TrackerType,
};
use pigtail::{DeviceTracker, TrackerCore};

fn mac(bytes: [u8; 6]) -> MacAddr {
    MacAddr(bytes)
}

fn ble_obs(addr: MacAddr, rssi: i8, ts: u32) -> Observation {
    Observation::ble(addr, rssi, TrackerInfo::default(), ts)
}

fn beacon_obs(addr: MacAddr, rssi: i8, ts: u32, ssid: &[u8]) -> Observation {
    Observation::wifi(ObsKind::WifiApBeacon, addr, rssi, Ssid::from_bytes(ssid), ts)
}

// ============================================================================
// Spec scenarios
// ============================================================================

/// Scenario: a single BLE observation creates one track whose EMA moved from
/// the −100 seed toward the observed RSSI.
#[test]
fn fresh_track_single_observation() {
    let mut core = TrackerCore::default();
    core.process_observation(&ble_obs(
        mac([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
        -60,
        100,
    ));

    let rows = core.build_snapshot(100, 64, 0.0);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.kind, EntityKind::BleAdv);
    assert_eq!(row.index, 1);
    assert_eq!(row.rssi, -92); // round(0.8·(−100) + 0.2·(−60))
    assert_eq!(row.seen_windows, 1);
    assert_eq!(row.near_windows, 1);
}

/// Scenario: a Tile advertisement classifies from its service UUID alone.
#[test]
fn classifier_tile_from_service_uuid() {
    let adv = Advertisement::from_parts(&[SVC_TILE], None, None);
    let info = classify::inspect(&adv);
    assert_eq!(info.tracker_type, TrackerType::Tile);
    assert_eq!(info.confidence, 95);
    assert_eq!(info.google_mfr, Default::default());
    assert_eq!(info.samsung_subtype, Default::default());
}

/// Scenario: Apple manufacturer data 0x12 0x19 0x10 without FE33 is an
/// AirTag at confidence 75 — end to end from raw advertising bytes.
#[test]
fn classifier_airtag_from_raw_advertising_data() {
    let raw = [0x06, 0xFF, 0x4C, 0x00, 0x12, 0x19, 0x10];
    let adv = parse_advertising_data(&raw);
    let info = classify::inspect(&adv);
    assert_eq!(info.tracker_type, TrackerType::AppleAirTag);
    assert_eq!(info.confidence, 75);

    // Determinism: a second pass yields the identical verdict.
    assert_eq!(classify::inspect(&adv), info);
}

/// Scenario: GNSS segmentation advances on a ≥ 50 m move evaluated at ≥ 10 s
/// spacing, and not before.
#[test]
fn gnss_segmentation_thresholds() {
    let mut core = TrackerCore::default();

    core.set_gps_fix(true, 37.7749, -122.4194);
    core.advance_segmentation(0);
    assert_eq!(core.segment_id(), 1);

    // ~44 m east of the anchor: no boundary.
    core.set_gps_fix(true, 37.7749, -122.4199);
    core.advance_segmentation(20);
    assert_eq!(core.segment_id(), 1);
    assert_eq!(core.move_segments(), 0);

    // ~53 m east of the anchor: exactly one boundary.
    core.set_gps_fix(true, 37.7749, -122.4200);
    core.advance_segmentation(30);
    assert_eq!(core.segment_id(), 2);
    assert_eq!(core.move_segments(), 1);
}

/// A track observed in every segment keeps full mobility coverage; one that
/// vanishes after the first segment decays relative to it.
#[test]
fn mobility_coverage_separates_follower_from_ambient() {
    let mut core = TrackerCore::default();
    let follower = mac([0x02, 0, 0, 0, 0, 1]);
    let ambient = mac([0x02, 0, 0, 0, 0, 2]);

    core.set_gps_fix(true, 0.0, 0.0);
    core.advance_segmentation(0);

    let mut ts = 10;
    for step in 1..=4u32 {
        core.process_observation(&ble_obs(follower, -60, ts));
        if step == 1 {
            core.process_observation(&ble_obs(ambient, -60, ts));
        }
        // Move ~110 m between observations.
        core.set_gps_fix(true, 0.001 * step as f64, 0.0);
        core.advance_segmentation(ts + 5);
        ts += 20;
    }
    // Observe the follower once more in the final segment.
    core.process_observation(&ble_obs(follower, -60, ts));

    let rows = core.build_snapshot(ts, 64, 0.0);
    let follower_row = rows.iter().find(|r| r.addr == follower).unwrap();
    let ambient_row = rows.iter().find(|r| r.addr == ambient).unwrap();
    assert!(follower_row.env_hits > ambient_row.env_hits);
    assert!(follower_row.score > ambient_row.score);
}

// ============================================================================
// Universal invariants
// ============================================================================

/// After a mixed operation sequence: indices unique and nonzero, scores in
/// range, anchors scored 0, snapshot order correct.
#[test]
fn universal_invariants_after_mixed_traffic() {
    let mut core = TrackerCore::default();

    for n in 0..40u8 {
        core.process_observation(&ble_obs(mac([0x02, 0, 0, 0, 1, n]), -60 - (n % 30) as i8, 50 + n as u32));
    }
    for n in 0..10u8 {
        core.process_observation(&beacon_obs(
            mac([0xA0, 0, 0, 0, 2, n]),
            -50 - n as i8,
            60 + n as u32,
            b"net",
        ));
    }
    core.update_entity(EntityKind::BleAdv, 5, true);
    core.expire_tables(120);

    let rows = core.build_snapshot(120, 512, 0.3);

    let mut seen = std::collections::HashSet::new();
    for r in &rows {
        assert_ne!(r.index, 0, "index 0 leaked into snapshot");
        assert!(seen.insert(r.index), "duplicate index {}", r.index);
        assert!(
            (0.0..=100.0).contains(&r.score),
            "score {} out of range",
            r.score
        );
        if r.kind == EntityKind::WifiAp {
            assert_eq!(r.score, 0.0, "anchors are never scored");
        }
        assert!(r.last_seen_s >= r.age_s || r.kind == EntityKind::WifiAp);
    }

    // Lexicographic snapshot order.
    for pair in rows.windows(2) {
        let key = |v: &pigtail::EntityView| {
            (
                v.is_watching() as u8,
                v.score,
                v.rssi,
                -(v.index as i32),
            )
        };
        let (a, b) = (key(&pair[0]), key(&pair[1]));
        assert!(
            a.0 > b.0 || (a.0 == b.0 && (a.1 > b.1 || (a.1 == b.1 && (a.2 > b.2 || (a.2 == b.2 && a.3 >= b.3))))),
            "snapshot order violated: {:?} before {:?}",
            a,
            b
        );
    }
}

/// Watched entities survive both expiry and reset; the index counter stays
/// above every surviving index.
#[test]
fn watched_entities_survive_expiry_and_reset() {
    let mut core = TrackerCore::default();
    let kept = mac([0x02, 0, 0, 0, 0, 1]);
    let dropped = mac([0x02, 0, 0, 0, 0, 2]);

    core.process_observation(&ble_obs(kept, -60, 0));
    core.process_observation(&ble_obs(dropped, -60, 0));
    assert!(core.update_entity(EntityKind::BleAdv, 1, true));

    // Both would be idle-expired at 21 minutes; only the watched one stays.
    core.expire_tables(21 * 60);
    let rows = core.build_snapshot(21 * 60, 64, 0.0);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].addr, kept);

    core.reset();
    let rows = core.build_snapshot(21 * 60, 64, 0.0);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].addr, kept);
    assert_eq!(core.segment_id(), 1);
}

/// update_entity is a selector: unknown identities are rejected, and only
/// the Watching bit changes.
#[test]
fn update_entity_toggles_only_watching() {
    let mut core = TrackerCore::default();
    core.process_observation(&ble_obs(mac([0x02, 0, 0, 0, 0, 1]), -60, 10));

    assert!(!core.update_entity(EntityKind::WifiClient, 1, true)); // wrong kind
    assert!(!core.update_entity(EntityKind::BleAdv, 99, true)); // wrong index
    assert!(core.update_entity(EntityKind::BleAdv, 1, true));
    assert!(core.build_snapshot(10, 8, 0.0)[0].is_watching());

    assert!(core.update_entity(EntityKind::BleAdv, 1, false));
    assert!(!core.build_snapshot(10, 8, 0.0)[0].is_watching());
}

// ============================================================================
// Facade / queue
// ============================================================================

/// Producers never block: flooding the queue far past capacity drops the
/// excess, counts it, and later observations still flow intact.
#[tokio::test]
async fn queue_is_lossy_and_uncorrupted() {
    let mut tracker = DeviceTracker::new();
    let sender = tracker.sender();

    // Flood before the consumer starts: exactly the queue capacity fits.
    for n in 0..300u16 {
        sender.send(ble_obs(
            mac([0x02, 0, 0, (n >> 8) as u8, n as u8, 1]),
            -60,
            1,
        ));
    }
    let stats = tracker.stats();
    assert_eq!(stats.enqueued + stats.queue_full_drops, 300);
    assert!(stats.queue_full_drops > 0);

    tracker.begin().unwrap();
    // A fresh observation after the flood must survive undamaged.
    let fresh = mac([0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0x01]);
    sender.send(ble_obs(fresh, -40, 2));

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let views = tracker.build_snapshot(512, 0.0);
    assert!(views.iter().any(|v| v.addr == fresh));
    assert_eq!(tracker.stats().processed, tracker.stats().enqueued);

    tracker.shutdown().await;
}

/// reset() invalidates queued observations: nothing enqueued before the
/// reset repopulates the cleared tables.
#[tokio::test]
async fn reset_drains_pending_observations() {
    let mut tracker = DeviceTracker::new();
    let sender = tracker.sender();

    for n in 0..20u8 {
        sender.send(ble_obs(mac([0x02, 0, 0, 0, 9, n]), -60, 1));
    }
    tracker.reset();

    tracker.begin().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    assert!(tracker.build_snapshot(64, 0.0).is_empty());
    assert_eq!(tracker.stats().stale_drops, 20);

    tracker.shutdown().await;
}

/// The driver-callback contract: raw frames and advertisements go through
/// the sender's parse-and-enqueue helpers; malformed frames are counted,
/// never propagated.
#[tokio::test]
async fn driver_callbacks_parse_classify_and_count() {
    let mut tracker = DeviceTracker::new();
    tracker.begin().unwrap();
    let sender = tracker.sender();

    // Beacon for BSSID AA:BB:CC:DD:EE:FF, SSID "cafe".
    let mut frame: Vec<u8> = vec![0x80, 0x00, 0x00, 0x00]; // fc (subtype 8) + duration
    frame.extend_from_slice(&[0xFF; 6]); // addr1
    frame.extend_from_slice(&[0x00; 6]); // addr2
    frame.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]); // addr3 = BSSID
    frame.extend_from_slice(&[0x00, 0x00]); // seq
    frame.extend_from_slice(&[0x00; 12]); // fixed params
    frame.extend_from_slice(&[0x00, 0x04, b'c', b'a', b'f', b'e']); // SSID IE
    assert!(sender.send_mgmt_frame(&frame, -50));

    // Too short to be a management frame: counted, dropped, no panic.
    assert!(!sender.send_mgmt_frame(&[0x80, 0x00, 0x01], -50));

    // AirTag-style advertisement through the BLE callback path.
    let adv = [0x06, 0xFF, 0x4C, 0x00, 0x12, 0x19, 0x10];
    let tag = mac([0xDA, 0x00, 0x00, 0x00, 0x00, 0x01]);
    assert!(sender.send_ble_advertisement(tag, -60, &adv));

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let views = tracker.build_snapshot(64, 0.0);
    let ap = views
        .iter()
        .find(|v| v.kind == EntityKind::WifiAp)
        .expect("beacon ingested");
    assert_eq!(ap.ssid.as_bytes(), b"cafe");

    let track = views.iter().find(|v| v.addr == tag).expect("adv ingested");
    assert_eq!(track.tracker_type, TrackerType::AppleAirTag);

    assert_eq!(tracker.stats().malformed_frames, 1);
    tracker.shutdown().await;
}

/// begin() is one-shot.
#[tokio::test]
async fn begin_twice_fails() {
    let mut tracker = DeviceTracker::new();
    tracker.begin().unwrap();
    assert!(tracker.begin().is_err());
    tracker.shutdown().await;
}
