//! KML export of the watchlist.
//!
//! One `<Placemark>` per Watching entity that has geo, suitable for direct
//! import into Google Earth. Coordinates are `lon,lat,0` with 8 fractional
//! digits; all text content is XML-escaped.

use crate::types::{
    EntityKind, EntityView, GoogleFmnManufacturer, SamsungTrackerSubtype, TrackerType,
};
use crate::vendor::Vendor;

/// Escape the five XML special characters. `&` must go first.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Render a KML document for the given views. Entities without geo are
/// silently omitted — a placemark without coordinates is useless.
pub fn render(views: &[EntityView]) -> String {
    let mut out = String::with_capacity(512);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\"><Document>\n");
    out.push_str("  <name>PT Watchlist</name>\n");

    for v in views.iter().filter(|v| v.is_watching() && v.has_geo()) {
        out.push_str("  <Placemark><name>");
        out.push_str(&xml_escape(&placemark_name(v)));
        out.push_str("</name>\n    <description>");
        out.push_str(&placemark_description(v));
        out.push_str("</description>\n    <Point><coordinates>");
        out.push_str(&format!("{:.8},{:.8},0", v.lon, v.lat));
        out.push_str("</coordinates></Point></Placemark>\n");
    }

    out.push_str("</Document></kml>\n");
    out
}

/// Placemark title: SSID for anchors, tracker family for tracks, with the
/// MAC for disambiguation; falls back to vendor, then bare MAC.
fn placemark_name(v: &EntityView) -> String {
    let label = match v.kind {
        EntityKind::WifiAp if !v.ssid.is_empty() => Some(v.ssid.to_string_lossy()),
        EntityKind::WifiAp => None,
        _ if v.tracker_type != TrackerType::Unknown => Some(v.tracker_type.name().to_string()),
        _ if v.vendor != Vendor::Unknown => Some(v.vendor.display_name().to_string()),
        _ => None,
    };
    match label {
        Some(label) => format!("{} ({})", label, v.addr),
        None => v.addr.to_string(),
    }
}

/// Description body: one field per line, joined with the XML newline
/// reference. Each value is escaped individually so the `&#10;` separators
/// survive.
fn placemark_description(v: &EntityView) -> String {
    let mut parts: Vec<String> = vec![
        format!("Kind: {}", v.kind.name()),
        format!("MAC: {}", v.addr),
    ];

    match v.kind {
        EntityKind::WifiAp => {
            if !v.ssid.is_empty() {
                parts.push(format!("SSID: {}", xml_escape(&v.ssid.to_string_lossy())));
            }
        }
        _ => {
            if v.tracker_type != TrackerType::Unknown {
                parts.push(format!("Tracker: {}", v.tracker_type.name()));
            }
            if v.tracker_google_mfr != GoogleFmnManufacturer::Unknown {
                parts.push(format!("Maker: {}", v.tracker_google_mfr.name()));
            }
            if v.tracker_samsung_subtype != SamsungTrackerSubtype::Unknown {
                parts.push(format!("Subtype: {}", v.tracker_samsung_subtype.name()));
            }
            if v.tracker_confidence > 0 {
                parts.push(format!("Confidence: {}", v.tracker_confidence));
            }
        }
    }

    parts.join("&#10;")
}
