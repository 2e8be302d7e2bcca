//! Pigtail: passive proximity monitor.
//!
//! Ingests Wi-Fi management-frame observations, scan results, and BLE
//! advertisements; maintains a bounded catalog of nearby radios with a
//! per-entity interest score, geo-tagging, trackable-beacon classification,
//! environment-change segmentation, and a persistent watchlist.
//!
//! ## Architecture
//!
//! - **Radio glue**: pure parsers turning raw frames/advertisements into
//!   [`Observation`](types::Observation) values
//! - **Observation queue**: bounded MPSC, lossy for producers, single
//!   consumer
//! - **Tracker**: fixed-capacity track/anchor tables, windowed statistics,
//!   interest scoring, environment segmentation
//! - **Watchlist**: persistent JSON document with KML export

pub mod classify;
pub mod config;
pub mod gnss;
pub mod radio;
pub mod source;
pub mod tracker;
pub mod types;
pub mod vendor;
pub mod watchlist;

// Re-export the surface most consumers touch.
pub use classify::{inspect, Advertisement};
pub use gnss::{GnssFix, GnssHandle};
pub use tracker::{
    sort_views, stationary_ratio, DeviceTracker, ObservationSender, StatsSnapshot, TrackerCore,
    TrackerStats,
};
pub use types::{
    EntityFlags, EntityKind, EntityView, MacAddr, ObsKind, Observation, Ssid, TrackerInfo,
    TrackerType,
};
pub use vendor::Vendor;
pub use watchlist::{LoadOutcome, WatchlistError, WatchlistItem};
