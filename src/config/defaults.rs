//! System-wide tuning constants.
//!
//! Centralises the tracker's magic numbers in one place. These values are
//! deliberate calibration choices; changing any of them shifts historical
//! scores, so treat edits as a product decision, not a refactor.

// ============================================================================
// Windows & statistics
// ============================================================================

/// Quantum for seen/near window counters (seconds).
///
/// `window_id = ts_s / WINDOW_SEC`.
pub const WINDOW_SEC: u32 = 10;

/// EMA coefficient for per-track RSSI smoothing.
pub const EMA_RSSI_ALPHA: f32 = 0.2;

/// EMA coefficient for per-track absolute RSSI deviation.
pub const EMA_DEV_BETA: f32 = 0.2;

/// EMA coefficient for the crowd estimator (unique hits per window).
pub const CROWD_EMA_ALPHA: f32 = 0.1;

/// Seed value for `ema_rssi` on a fresh track (dBm).
pub const EMA_RSSI_INIT: f32 = -100.0;

/// RSSI at or above which an observation counts as "near" (dBm).
pub const RSSI_NEAR_DBM: i32 = -65;

/// RSSI at or above which an observation counts as "mid" distance (dBm).
pub const RSSI_MID_DBM: i32 = -80;

// ============================================================================
// Entity tables
// ============================================================================

/// Fixed capacity of the track table (Wi-Fi clients + BLE advertisers).
pub const MAX_TRACKS: usize = 256;

/// Fixed capacity of the anchor table (Wi-Fi access points).
pub const MAX_ANCHORS: usize = 128;

/// Idle expiry for Wi-Fi client tracks (seconds). 15 minutes.
pub const TRACK_IDLE_SEC_WIFI: u32 = 15 * 60;

/// Idle expiry for BLE advertiser tracks (seconds). 20 minutes.
///
/// Longer than Wi-Fi because item trackers advertise at low duty cycles.
pub const TRACK_IDLE_SEC_BLE: u32 = 20 * 60;

/// Idle expiry for AP anchors (seconds). 10 minutes.
pub const ANCHOR_IDLE_SEC: u32 = 10 * 60;

// ============================================================================
// Environment segmentation
// ============================================================================

/// Cadence of fingerprint-based segmentation evaluation (seconds).
pub const ENV_WINDOW_SEC: u32 = 30;

/// Number of strongest anchors kept in an environment fingerprint.
pub const FP_TOP_N: usize = 8;

/// Anchors older than this are excluded from fingerprints (seconds).
pub const FP_ANCHOR_FRESH_SEC: u32 = 60;

/// Fingerprint similarity below which a segment boundary is declared.
pub const FP_SIMILARITY_MIN: f32 = 0.50;

/// GNSS displacement that declares a segment boundary (metres).
pub const GNSS_SEGMENT_DISTANCE_M: f64 = 50.0;

/// Minimum interval between GNSS segmentation evaluations (seconds).
pub const GNSS_SEGMENT_MIN_PERIOD_S: u32 = 10;

// ============================================================================
// Scoring
// ============================================================================

/// Persistence cap: dwell times beyond this many minutes saturate P.
pub const T_CAP_MIN: f32 = 30.0;

/// Absolute-deviation cap for the RSSI stability term (dB).
pub const RSSI_DEV_CAP: f32 = 10.0;

/// Crowd EMA below which no crowd penalty applies.
pub const CROWD_LO: f32 = 5.0;

/// Crowd EMA at which the crowd penalty saturates.
pub const CROWD_HI: f32 = 40.0;

/// Seconds without a segmentation tick after which the observer counts as
/// fully stationary (used by the stationary-ratio heuristic).
pub const STATIONARY_FULL_SEC: u32 = 120;

// ============================================================================
// Observation pipeline
// ============================================================================

/// Bounded observation queue depth. Producers drop when full.
pub const OBS_QUEUE_CAPACITY: usize = 256;

/// Consumer receive timeout (milliseconds). Segmentation advance and table
/// expiry run on every loop iteration regardless of arrivals.
pub const RECV_TIMEOUT_MS: u64 = 250;

// ============================================================================
// Wi-Fi sniffer
// ============================================================================

/// Lowest 2.4 GHz channel visited by the hop plan.
pub const WIFI_CH_MIN: u8 = 1;

/// Highest 2.4 GHz channel visited by the hop plan.
pub const WIFI_CH_MAX: u8 = 11;

/// Dwell per channel for the sniffer hop plan (milliseconds).
pub const HOP_MS: u64 = 250;

// ============================================================================
// Geo-tagging
// ============================================================================

/// Minimum accumulated centroid weight before the weighted average is
/// preferred over the best-pass position for display.
pub const CENTROID_MIN_WEIGHT: f64 = 3.0;

// ============================================================================
// Watchlist
// ============================================================================

/// Version stamp of the persisted watchlist document.
pub const WATCHLIST_VERSION: u32 = 2;
