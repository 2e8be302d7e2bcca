//! Trackable-beacon classification types.
//!
//! Closed sum types for the passive BLE classifier outputs. The display
//! strings are part of the persisted watchlist format and must stay stable;
//! parsing is case-insensitive.

use serde::{Deserialize, Serialize};

/// Commercial lost-item tracker families identifiable from advertising data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerType {
    #[default]
    Unknown,
    AppleAirPods,
    AppleAirTag,
    AppleFindMy,
    Chipolo,
    GoogleFindHub,
    PebbleBee,
    SmartThingsFind,
    SmartThingsTracker,
    Tile,
}

impl TrackerType {
    /// Short display string (also the persisted form).
    pub fn name(self) -> &'static str {
        match self {
            TrackerType::Unknown => "Unknown",
            TrackerType::AppleAirPods => "AirPods",
            TrackerType::AppleAirTag => "AirTag",
            TrackerType::AppleFindMy => "Find My",
            TrackerType::Chipolo => "Chipolo",
            TrackerType::GoogleFindHub => "Find Hub",
            TrackerType::PebbleBee => "PebbleBee",
            TrackerType::SmartThingsFind => "ST Find",
            TrackerType::SmartThingsTracker => "ST Tracker",
            TrackerType::Tile => "Tile",
        }
    }

    /// Case-insensitive parse of [`name()`](Self::name) output.
    pub fn parse(s: &str) -> Option<Self> {
        let all = [
            TrackerType::Unknown,
            TrackerType::AppleAirPods,
            TrackerType::AppleAirTag,
            TrackerType::AppleFindMy,
            TrackerType::Chipolo,
            TrackerType::GoogleFindHub,
            TrackerType::PebbleBee,
            TrackerType::SmartThingsFind,
            TrackerType::SmartThingsTracker,
            TrackerType::Tile,
        ];
        all.into_iter().find(|t| t.name().eq_ignore_ascii_case(s))
    }
}

/// Hardware manufacturers seen inside Google's Find Hub network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoogleFmnManufacturer {
    #[default]
    Unknown,
    PebbleBee,
    Chipolo,
    Eufy,
    Motorola,
    Jio,
    RollingSquare,
}

impl GoogleFmnManufacturer {
    pub fn name(self) -> &'static str {
        match self {
            GoogleFmnManufacturer::Unknown => "Unknown",
            GoogleFmnManufacturer::PebbleBee => "PebbleBee",
            GoogleFmnManufacturer::Chipolo => "Chipolo",
            GoogleFmnManufacturer::Eufy => "Eufy",
            GoogleFmnManufacturer::Motorola => "Motorola",
            GoogleFmnManufacturer::Jio => "Jio",
            GoogleFmnManufacturer::RollingSquare => "Rolling Square",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let all = [
            GoogleFmnManufacturer::Unknown,
            GoogleFmnManufacturer::PebbleBee,
            GoogleFmnManufacturer::Chipolo,
            GoogleFmnManufacturer::Eufy,
            GoogleFmnManufacturer::Motorola,
            GoogleFmnManufacturer::Jio,
            GoogleFmnManufacturer::RollingSquare,
        ];
        all.into_iter().find(|m| m.name().eq_ignore_ascii_case(s))
    }
}

/// Samsung SmartTag generations, guessed from the advertised name only.
/// Reliable subtype detection needs GATT reads, which a passive monitor
/// never performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamsungTrackerSubtype {
    #[default]
    Unknown,
    SmartTag1,
    SmartTag1Plus,
    SmartTag2,
    Solum,
}

impl SamsungTrackerSubtype {
    pub fn name(self) -> &'static str {
        match self {
            SamsungTrackerSubtype::Unknown => "Unknown",
            SamsungTrackerSubtype::SmartTag1 => "SmartTag 1",
            SamsungTrackerSubtype::SmartTag1Plus => "SmartTag+",
            SamsungTrackerSubtype::SmartTag2 => "SmartTag 2",
            SamsungTrackerSubtype::Solum => "Solum SmartTag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let all = [
            SamsungTrackerSubtype::Unknown,
            SamsungTrackerSubtype::SmartTag1,
            SamsungTrackerSubtype::SmartTag1Plus,
            SamsungTrackerSubtype::SmartTag2,
            SamsungTrackerSubtype::Solum,
        ];
        all.into_iter().find(|s2| s2.name().eq_ignore_ascii_case(s))
    }
}

/// Classifier verdict for one advertisement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerInfo {
    pub tracker_type: TrackerType,
    /// Heuristic 0..=100.
    pub confidence: u8,
    pub google_mfr: GoogleFmnManufacturer,
    pub samsung_subtype: SamsungTrackerSubtype,
}
