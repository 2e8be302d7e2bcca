//! Passive trackable-beacon classifier.
//!
//! Classifies a BLE advertisement into a [`TrackerInfo`] using only the
//! advertised service UUIDs, manufacturer data, and local name — never a
//! connection or GATT read. The decision order is fixed: strong service-UUID
//! signals first, then Apple manufacturer-data heuristics, then the non-Apple
//! FE33 fallthrough. First match wins, with a confidence reflecting how
//! specific the matched signal is.
//!
//! The service UUIDs and the Apple payload masks follow the filter set
//! published by the AirGuard project.

use crate::types::{GoogleFmnManufacturer, SamsungTrackerSubtype, TrackerInfo, TrackerType};
use crate::vendor::Vendor;

/// Bluetooth SIG company identifier for Apple.
pub const COMPANY_ID_APPLE: u16 = 0x004C;

/// Tile.
pub const SVC_TILE: u16 = 0xFEED;
/// Samsung SmartTag (SmartThings tracker).
pub const SVC_SMARTTAG: u16 = 0xFD5A;
/// Samsung Find My Mobile.
pub const SVC_SMARTTHINGS_FIND: u16 = 0xFD69;
/// Google Find Hub network.
pub const SVC_FIND_HUB: u16 = 0xFEAA;
/// PebbleBee.
pub const SVC_PEBBLEBEE: u16 = 0xFA25;
/// Apple/Chipolo offline finding.
pub const SVC_OFFLINE_FINDING: u16 = 0xFE33;

/// Maximum 16-bit service UUIDs retained from one advertisement.
pub const MAX_ADV_SERVICES: usize = 8;

// ============================================================================
// Advertisement view
// ============================================================================

/// Borrowed view of one advertisement's classification-relevant fields.
///
/// Built by the radio layer (or a replay source) without allocating; the
/// manufacturer data and name borrow from the raw advertising payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Advertisement<'a> {
    services: [u16; MAX_ADV_SERVICES],
    service_count: u8,
    /// Complete manufacturer-specific data AD structure payload, company id
    /// in the first two little-endian bytes.
    pub manufacturer_data: Option<&'a [u8]>,
    /// Shortened or complete local name (AD types 0x08/0x09), raw bytes.
    pub local_name: Option<&'a [u8]>,
}

impl<'a> Advertisement<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-decoded parts (replay and tests).
    pub fn from_parts(
        services: &[u16],
        manufacturer_data: Option<&'a [u8]>,
        local_name: Option<&'a [u8]>,
    ) -> Self {
        let mut adv = Self {
            manufacturer_data,
            local_name,
            ..Self::default()
        };
        for &uuid in services {
            adv.push_service(uuid);
        }
        adv
    }

    /// Record an advertised 16-bit service UUID. Silently ignores anything
    /// past [`MAX_ADV_SERVICES`]; real trackers advertise one or two.
    pub fn push_service(&mut self, uuid: u16) {
        if (self.service_count as usize) < MAX_ADV_SERVICES {
            self.services[self.service_count as usize] = uuid;
            self.service_count += 1;
        }
    }

    pub fn has_service(&self, uuid: u16) -> bool {
        self.services[..self.service_count as usize].contains(&uuid)
    }

    pub fn services(&self) -> &[u16] {
        &self.services[..self.service_count as usize]
    }

    /// Apple manufacturer payload (after the company id), if this
    /// advertisement carries Apple manufacturer data.
    fn apple_mfg_payload(&self) -> Option<&'a [u8]> {
        let mfg = self.manufacturer_data?;
        if mfg.len() < 2 {
            return None;
        }
        let company = u16::from_le_bytes([mfg[0], mfg[1]]);
        if company != COMPANY_ID_APPLE {
            return None;
        }
        Some(&mfg[2..])
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Classify one advertisement. Pure and deterministic: the same input always
/// yields the same verdict.
pub fn inspect(adv: &Advertisement) -> TrackerInfo {
    let name = adv.local_name.unwrap_or(&[]);

    // Strong service-UUID signals first.
    if adv.has_service(SVC_TILE) {
        return TrackerInfo {
            tracker_type: TrackerType::Tile,
            confidence: 95,
            ..TrackerInfo::default()
        };
    }

    if adv.has_service(SVC_SMARTTAG) {
        return TrackerInfo {
            tracker_type: TrackerType::SmartThingsTracker,
            confidence: 95,
            samsung_subtype: guess_samsung_subtype(name),
            ..TrackerInfo::default()
        };
    }

    if adv.has_service(SVC_SMARTTHINGS_FIND) {
        return TrackerInfo {
            tracker_type: TrackerType::SmartThingsFind,
            confidence: 90,
            ..TrackerInfo::default()
        };
    }

    if adv.has_service(SVC_FIND_HUB) {
        return TrackerInfo {
            tracker_type: TrackerType::GoogleFindHub,
            confidence: 90,
            google_mfr: guess_google_mfr(name),
            ..TrackerInfo::default()
        };
    }

    if adv.has_service(SVC_PEBBLEBEE) {
        return TrackerInfo {
            tracker_type: TrackerType::PebbleBee,
            confidence: 90,
            ..TrackerInfo::default()
        };
    }

    // Apple manufacturer-data heuristics. The 0x12 0x19 prefix marks Apple's
    // offline-finding advertisements; the third byte's 0x18 mask separates
    // AirPods-class from AirTag/Find My accessories.
    if let Some(payload) = adv.apple_mfg_payload() {
        if payload.len() >= 2 && payload[0] == 0x12 && payload[1] == 0x19 {
            if payload.len() >= 3 {
                let b2 = payload[2];

                if b2 & 0x18 == 0x18 {
                    return TrackerInfo {
                        tracker_type: TrackerType::AppleAirPods,
                        confidence: 85,
                        ..TrackerInfo::default()
                    };
                }

                if b2 & 0x18 == 0x10 {
                    // FE33 alongside the Apple payload marks a licensed
                    // Find My accessory rather than an AirTag proper.
                    let (tracker_type, confidence) = if adv.has_service(SVC_OFFLINE_FINDING) {
                        (TrackerType::AppleFindMy, 80)
                    } else {
                        (TrackerType::AppleAirTag, 75)
                    };
                    return TrackerInfo {
                        tracker_type,
                        confidence,
                        ..TrackerInfo::default()
                    };
                }
            }

            // Tracking-related Apple payload, subtype unknown.
            return TrackerInfo {
                tracker_type: TrackerType::AppleFindMy,
                confidence: 65,
                ..TrackerInfo::default()
            };
        }
    }

    // FE33 without a matching Apple payload: Chipolo or another accessory.
    if adv.has_service(SVC_OFFLINE_FINDING) {
        return TrackerInfo {
            tracker_type: TrackerType::Chipolo,
            confidence: 80,
            ..TrackerInfo::default()
        };
    }

    TrackerInfo::default()
}

/// Vendor tag implied by a tracker family, used when the OUI lookup came up
/// empty (BLE trackers rotate locally-administered addresses).
pub fn vendor_from_tracker_type(t: TrackerType) -> Vendor {
    match t {
        TrackerType::AppleAirPods | TrackerType::AppleAirTag | TrackerType::AppleFindMy => {
            Vendor::Apple
        }
        TrackerType::Chipolo => Vendor::Chipolo,
        TrackerType::GoogleFindHub => Vendor::Google,
        TrackerType::PebbleBee => Vendor::Pebblebee,
        TrackerType::SmartThingsFind | TrackerType::SmartThingsTracker => Vendor::Samsung,
        TrackerType::Tile => Vendor::Tile,
        TrackerType::Unknown => Vendor::Unknown,
    }
}

// ============================================================================
// Name heuristics
// ============================================================================

/// Case-insensitive substring search over raw name bytes.
fn contains_ignore_case(haystack: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| {
        w.iter()
            .zip(needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// Guess the hardware maker of a Find Hub tag from its advertised name.
fn guess_google_mfr(name: &[u8]) -> GoogleFmnManufacturer {
    if name.is_empty() {
        return GoogleFmnManufacturer::Unknown;
    }
    if contains_ignore_case(name, "pebblebee") {
        return GoogleFmnManufacturer::PebbleBee;
    }
    if contains_ignore_case(name, "chipolo") {
        return GoogleFmnManufacturer::Chipolo;
    }
    if contains_ignore_case(name, "eufy") {
        return GoogleFmnManufacturer::Eufy;
    }
    if contains_ignore_case(name, "motorola") || contains_ignore_case(name, "moto") {
        return GoogleFmnManufacturer::Motorola;
    }
    if contains_ignore_case(name, "jio") {
        return GoogleFmnManufacturer::Jio;
    }
    if contains_ignore_case(name, "rolling square") {
        return GoogleFmnManufacturer::RollingSquare;
    }
    GoogleFmnManufacturer::Unknown
}

/// Guess the SmartTag generation from the advertised name. Without GATT reads
/// a bare "SmartTag" could be a 1 or a 1+; assume the 1.
fn guess_samsung_subtype(name: &[u8]) -> SamsungTrackerSubtype {
    if name.is_empty() {
        return SamsungTrackerSubtype::Unknown;
    }
    if contains_ignore_case(name, "smarttag2")
        || contains_ignore_case(name, "smart tag2")
        || contains_ignore_case(name, "smart tag 2")
    {
        return SamsungTrackerSubtype::SmartTag2;
    }
    if contains_ignore_case(name, "solum") {
        return SamsungTrackerSubtype::Solum;
    }
    if contains_ignore_case(name, "smarttag+") || contains_ignore_case(name, "smart tag+") {
        return SamsungTrackerSubtype::SmartTag1Plus;
    }
    if contains_ignore_case(name, "smarttag") || contains_ignore_case(name, "smart tag") {
        return SamsungTrackerSubtype::SmartTag1;
    }
    SamsungTrackerSubtype::Unknown
}
