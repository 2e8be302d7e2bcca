//! Persistent watchlist.
//!
//! The watchlist is a small JSON document (version 2) listing the entities
//! the operator explicitly marked Watching, with enough state to survive a
//! reboot: identity, SSID, last-known coordinates, and the BLE classifier
//! verdict. Unknown/absent fields round-trip as absent.
//!
//! Load policy: an unreadable or structurally invalid document fails the
//! whole load; individually malformed items are skipped and counted so one
//! corrupt entry cannot take the rest of the list down with it.

pub mod kml;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::defaults::WATCHLIST_VERSION;
use crate::tracker::TrackerCore;
use crate::types::{
    EntityKind, EntityView, GoogleFmnManufacturer, MacAddr, SamsungTrackerSubtype, TrackerType,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("invalid watchlist JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watchlist document has no items array")]
    MissingItems,

    #[error("watchlist I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying a watchlist document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub loaded: usize,
    pub skipped: usize,
}

// ============================================================================
// Document model
// ============================================================================

/// Coordinates persist with exactly 8 fractional digits (~1 mm), so two
/// devices serialising the same fix produce byte-identical documents.
mod coord_8dp {
    use serde::{Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(x) => {
                // Parsing keeps the digit string intact (arbitrary_precision),
                // so the document shows exactly 8 fractional digits.
                let n: serde_json::Number = format!("{:.8}", x)
                    .parse()
                    .map_err(serde::ser::Error::custom)?;
                n.serialize(s)
            }
            None => s.serialize_none(),
        }
    }
}

/// One persisted watchlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub kind: EntityKind,
    pub mac: MacAddr,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "coord_8dp::serialize"
    )]
    pub lat: Option<f64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "coord_8dp::serialize"
    )]
    pub lon: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_google_mfr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_samsung_subtype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_confidence: Option<u8>,
}

impl WatchlistItem {
    /// Tracker fields persist as display strings; unparseable values are
    /// treated as absent rather than failing the item.
    pub fn parsed_tracker_type(&self) -> Option<TrackerType> {
        self.tracker_type.as_deref().and_then(TrackerType::parse)
    }

    pub fn parsed_google_mfr(&self) -> Option<GoogleFmnManufacturer> {
        self.tracker_google_mfr
            .as_deref()
            .and_then(GoogleFmnManufacturer::parse)
    }

    pub fn parsed_samsung_subtype(&self) -> Option<SamsungTrackerSubtype> {
        self.tracker_samsung_subtype
            .as_deref()
            .and_then(SamsungTrackerSubtype::parse)
    }
}

#[derive(Serialize)]
struct WatchlistDoc<'a> {
    version: u32,
    items: &'a [WatchlistItem],
}

// ============================================================================
// Parse / serialize
// ============================================================================

/// Parse a watchlist document. Returns the well-formed items and the number
/// of malformed items skipped. Structural failures (not JSON, no `items`
/// array) fail the whole parse.
pub fn parse(json: &str) -> Result<(Vec<WatchlistItem>, usize), WatchlistError> {
    let doc: serde_json::Value = serde_json::from_str(json)?;

    if let Some(version) = doc.get("version").and_then(|v| v.as_u64()) {
        if version != WATCHLIST_VERSION as u64 {
            warn!(version, "watchlist document version differs; loading anyway");
        }
    }

    let raw_items = doc
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or(WatchlistError::MissingItems)?;

    let mut items = Vec::with_capacity(raw_items.len());
    let mut skipped = 0;
    for raw in raw_items {
        match serde_json::from_value::<WatchlistItem>(raw.clone()) {
            Ok(item) => items.push(item),
            Err(e) => {
                skipped += 1;
                debug!("skipping malformed watchlist item: {}", e);
            }
        }
    }

    Ok((items, skipped))
}

/// Restore parsed items into the tracker. Items that cannot be placed
/// (table saturated with watched slots) count as skipped.
pub fn apply(items: &[WatchlistItem], core: &mut TrackerCore, ts_s: u32) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for item in items {
        if core.restore_watch_item(item, ts_s) {
            outcome.loaded += 1;
        } else {
            outcome.skipped += 1;
        }
    }
    outcome
}

/// Serialize Watching entity views as the version-2 document.
pub fn to_json(views: &[EntityView]) -> Result<String, WatchlistError> {
    let items: Vec<WatchlistItem> = views
        .iter()
        .filter(|v| v.is_watching())
        .map(item_from_view)
        .collect();
    let doc = WatchlistDoc {
        version: WATCHLIST_VERSION,
        items: &items,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn item_from_view(v: &EntityView) -> WatchlistItem {
    let is_ap = v.kind == EntityKind::WifiAp;
    let (lat, lon) = if v.has_geo() {
        (Some(v.lat), Some(v.lon))
    } else {
        (None, None)
    };

    WatchlistItem {
        kind: v.kind,
        mac: v.addr,
        ssid: (is_ap && !v.ssid.is_empty()).then(|| v.ssid.to_string_lossy()),
        lat,
        lon,
        tracker_type: (!is_ap && v.tracker_type != TrackerType::Unknown)
            .then(|| v.tracker_type.name().to_string()),
        tracker_google_mfr: (!is_ap && v.tracker_google_mfr != GoogleFmnManufacturer::Unknown)
            .then(|| v.tracker_google_mfr.name().to_string()),
        tracker_samsung_subtype: (!is_ap
            && v.tracker_samsung_subtype != SamsungTrackerSubtype::Unknown)
            .then(|| v.tracker_samsung_subtype.name().to_string()),
        tracker_confidence: (!is_ap && v.tracker_confidence > 0).then_some(v.tracker_confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_document() {
        let json = r#"{
            "version": 2,
            "items": [
                {"kind":"WifiAp","mac":"AA:BB:CC:DD:EE:FF","ssid":"OfficeAP","lat":37.12345678,"lon":-122.12345678},
                {"kind":"BleAdv","mac":"11:22:33:44:55:66","tracker_type":"AirTag","tracker_confidence":75}
            ]
        }"#;
        let (items, skipped) = parse(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(skipped, 0);
        assert_eq!(items[0].kind, EntityKind::WifiAp);
        assert_eq!(items[0].ssid.as_deref(), Some("OfficeAP"));
        assert!((items[0].lat.unwrap() - 37.12345678).abs() < 1e-9);
        assert_eq!(
            items[1].parsed_tracker_type(),
            Some(TrackerType::AppleAirTag)
        );
        assert_eq!(items[1].tracker_confidence, Some(75));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            parse("{not json"),
            Err(WatchlistError::Json(_))
        ));
    }

    #[test]
    fn test_parse_requires_items_array() {
        assert!(matches!(
            parse(r#"{"version":2}"#),
            Err(WatchlistError::MissingItems)
        ));
        assert!(matches!(
            parse(r#"{"version":2,"items":"nope"}"#),
            Err(WatchlistError::MissingItems)
        ));
    }

    #[test]
    fn test_parse_skips_malformed_items() {
        let json = r#"{
            "version": 2,
            "items": [
                {"kind":"WifiAp","mac":"AA:BB:CC:DD:EE:FF"},
                {"kind":"WifiAp","mac":"not-a-mac"},
                {"kind":"Dishwasher","mac":"11:22:33:44:55:66"},
                {"kind":"BleAdv","mac":"11:22:33:44:55:66"}
            ]
        }"#;
        let (items, skipped) = parse(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_unparseable_tracker_strings_treated_as_absent() {
        let json = r#"{"version":2,"items":[
            {"kind":"BleAdv","mac":"11:22:33:44:55:66","tracker_type":"Warp Drive"}
        ]}"#;
        let (items, _) = parse(json).unwrap();
        assert_eq!(items[0].parsed_tracker_type(), None);
    }

    #[test]
    fn test_coordinates_serialize_with_8_decimals() {
        let item = WatchlistItem {
            kind: EntityKind::WifiAp,
            mac: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            ssid: None,
            lat: Some(1.0),
            lon: Some(-122.123456789),
            tracker_type: None,
            tracker_google_mfr: None,
            tracker_samsung_subtype: None,
            tracker_confidence: None,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("1.00000000"), "json: {}", json);
        assert!(json.contains("-122.12345679"), "json: {}", json);
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let item = WatchlistItem {
            kind: EntityKind::BleAdv,
            mac: "11:22:33:44:55:66".parse().unwrap(),
            ssid: None,
            lat: None,
            lon: None,
            tracker_type: None,
            tracker_google_mfr: None,
            tracker_samsung_subtype: None,
            tracker_confidence: None,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("ssid"));
        assert!(!json.contains("lat"));
        assert!(!json.contains("tracker_type"));
        assert!(!json.contains("tracker_confidence"));
    }
}
