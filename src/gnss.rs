//! GNSS fix snapshot contract.
//!
//! The serial NMEA driver lives outside this crate; it publishes fixes at
//! roughly 5 Hz through a [`GnssHandle`]. Consumers read a value copy — the
//! lock is held only for the copy, never across parsing or I/O.

use std::sync::{Arc, Mutex};

/// Value snapshot of the current GNSS state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GnssFix {
    pub valid: bool,
    pub lat: f64,
    pub lon: f64,
    pub sats: u32,
    pub speed_kmph: f64,
    pub course_deg: f64,
    pub alt_m: f64,
    /// Milliseconds since boot at the last NMEA update.
    pub last_update_ms: u64,
}

/// Shared fix publisher/reader handle. Clone freely; all clones see the same
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct GnssHandle {
    snap: Arc<Mutex<GnssFix>>,
}

impl GnssHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published fix (called by the serial driver task).
    pub fn publish(&self, fix: GnssFix) {
        *self.snap.lock().expect("gnss snapshot lock poisoned") = fix;
    }

    /// Read a value copy of the current fix.
    pub fn snapshot(&self) -> GnssFix {
        *self.snap.lock().expect("gnss snapshot lock poisoned")
    }
}
