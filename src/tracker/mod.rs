//! Device tracker: bounded entity tables fed by a lossy observation queue.
//!
//! [`DeviceTracker`] is the facade the application owns. Radio callbacks get
//! a cheap [`ObservationSender`]; a single consumer task mutates the tables;
//! UI/export readers pull sorted [`EntityView`] snapshots. All shared state
//! lives behind one mutex with short critical sections — no I/O, no
//! unbounded loops under the lock.
//!
//! [`EntityView`]: crate::types::EntityView

pub mod core;
pub mod processing;
pub mod scoring;
pub mod segmentation;
pub mod tables;

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use self::core::{sort_views, TrackerCore};
pub use self::processing::ObservationSender;
pub use self::scoring::score_track;
pub use self::segmentation::{haversine_m, Segmentation};

use self::processing::{ProcessingLoop, QueuedObservation};
use crate::config::defaults::{OBS_QUEUE_CAPACITY, STATIONARY_FULL_SEC};
use crate::types::{EntityKind, EntityView};
use crate::watchlist::{self, LoadOutcome, WatchlistError};

// ============================================================================
// Diagnostics counters
// ============================================================================

/// Operator diagnostics. Deliberately not part of the snapshot: these are
/// health counters, not tracking state.
#[derive(Debug, Default)]
pub struct TrackerStats {
    enqueued: AtomicU64,
    queue_full_drops: AtomicU64,
    malformed_frames: AtomicU64,
    processed: AtomicU64,
    stale_drops: AtomicU64,
    alloc_failures: AtomicU64,
}

/// Value copy of [`TrackerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub queue_full_drops: u64,
    pub malformed_frames: u64,
    pub processed: u64,
    pub stale_drops: u64,
    pub alloc_failures: u64,
}

impl TrackerStats {
    pub fn note_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_queue_full_drop(&self) {
        self.queue_full_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Counted by radio glue when a frame fails to parse.
    pub fn note_malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_stale_drop(&self) {
        self.stale_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_alloc_failure(&self) {
        self.alloc_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            queue_full_drops: self.queue_full_drops.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            stale_drops: self.stale_drops.load(Ordering::Relaxed),
            alloc_failures: self.alloc_failures.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker already started")]
    AlreadyStarted,
}

// ============================================================================
// Facade
// ============================================================================

/// The application-owned tracker instance. All state — queue, tables,
/// segmentation, counters — lives inside; there are no globals.
pub struct DeviceTracker {
    core: Arc<Mutex<TrackerCore>>,
    stats: Arc<TrackerStats>,
    epoch: Arc<AtomicU32>,
    tx: mpsc::Sender<QueuedObservation>,
    rx: Option<mpsc::Receiver<QueuedObservation>>,
    started: Instant,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Default for DeviceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTracker {
    pub fn new() -> Self {
        let stats = Arc::new(TrackerStats::default());
        let (tx, rx) = mpsc::channel(OBS_QUEUE_CAPACITY);
        Self {
            core: Arc::new(Mutex::new(TrackerCore::new(stats.clone()))),
            stats,
            epoch: Arc::new(AtomicU32::new(0)),
            tx,
            rx: Some(rx),
            started: Instant::now(),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Start the processing task. One-shot: a second call fails.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin(&mut self) -> Result<(), TrackerError> {
        let rx = self.rx.take().ok_or(TrackerError::AlreadyStarted)?;
        let pipeline = ProcessingLoop {
            rx,
            core: self.core.clone(),
            epoch: self.epoch.clone(),
            stats: self.stats.clone(),
            started: self.started,
            cancel: self.cancel.clone(),
        };
        self.task = Some(tokio::spawn(pipeline.run()));
        info!("DeviceTracker started");
        Ok(())
    }

    /// [`begin`](Self::begin), preceded by a watchlist load when the file
    /// exists. A missing file is a fresh device, not an error; a corrupt
    /// file is logged and skipped.
    pub fn begin_with_watchlist(&mut self, path: &Path) -> Result<(), TrackerError> {
        if path.exists() {
            match self.load_watchlist_file(path) {
                Ok(outcome) => info!(
                    loaded = outcome.loaded,
                    skipped = outcome.skipped,
                    "watchlist restored from {}",
                    path.display()
                ),
                Err(e) => warn!("watchlist load failed ({}); starting empty", e),
            }
        }
        self.begin()
    }

    /// Handle for radio callbacks and replay sources. Clone freely.
    pub fn sender(&self) -> ObservationSender {
        ObservationSender::new(
            self.tx.clone(),
            self.epoch.clone(),
            self.stats.clone(),
            self.started,
        )
    }

    /// Monotonic seconds since this tracker was created.
    pub fn now_s(&self) -> u32 {
        self.started.elapsed().as_secs() as u32
    }

    /// Update the GNSS fix snapshot; safe to call at any rate.
    pub fn set_gps_fix(&self, valid: bool, lat: f64, lon: f64) {
        self.lock_core().set_gps_fix(valid, lat, lon);
    }

    /// Sorted snapshot of up to `max_out` entities. Rows are collected under
    /// the lock and sorted after releasing it.
    pub fn build_snapshot(&self, max_out: usize, stationary_ratio: f32) -> Vec<EntityView> {
        let ts = self.now_s();
        let mut rows = self
            .lock_core()
            .collect_snapshot(ts, max_out, stationary_ratio);
        sort_views(&mut rows);
        rows
    }

    /// Toggle the Watching flag on the entity identified by `(kind, index)`.
    pub fn update_entity(&self, kind: EntityKind, index: u16, watching: bool) -> bool {
        self.lock_core().update_entity(kind, index, watching)
    }

    /// Discard all transient state (watched entities survive) and invalidate
    /// every queued observation.
    pub fn reset(&self) {
        // Epoch first: in-flight observations predate the reset and must not
        // repopulate the cleared tables.
        self.epoch.fetch_add(1, Ordering::Relaxed);
        self.lock_core().reset();
    }

    pub fn segment_id(&self) -> u32 {
        self.lock_core().segment_id()
    }

    pub fn move_segments(&self) -> u32 {
        self.lock_core().move_segments()
    }

    pub fn last_env_tick_s(&self) -> u32 {
        self.lock_core().last_env_tick_s()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the processing task and wait for it.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    // ------------------------------------------------------------------
    // Watchlist I/O
    // ------------------------------------------------------------------

    /// Parse a watchlist document and restore its items.
    pub fn load_watchlist_str(&self, json: &str) -> Result<LoadOutcome, WatchlistError> {
        let (items, parse_skipped) = watchlist::parse(json)?;
        let ts = self.now_s();
        let mut core = self.lock_core();
        let mut outcome = watchlist::apply(&items, &mut core, ts);
        outcome.skipped += parse_skipped;
        Ok(outcome)
    }

    pub fn load_watchlist_file(&self, path: &Path) -> Result<LoadOutcome, WatchlistError> {
        let json = std::fs::read_to_string(path)?;
        self.load_watchlist_str(&json)
    }

    /// Serialize all Watching entities as the version-2 JSON document.
    pub fn watchlist_json(&self) -> Result<String, WatchlistError> {
        let views = self.watching_views();
        watchlist::to_json(&views)
    }

    pub fn write_watchlist_file(&self, path: &Path) -> Result<(), WatchlistError> {
        let json = self.watchlist_json()?;
        std::fs::write(path, json)?;
        info!("watchlist written to {}", path.display());
        Ok(())
    }

    /// KML document with one placemark per Watching entity that has geo.
    pub fn watchlist_kml(&self) -> String {
        watchlist::kml::render(&self.watching_views())
    }

    pub fn write_watchlist_kml_file(&self, path: &Path) -> Result<(), WatchlistError> {
        std::fs::write(path, self.watchlist_kml())?;
        info!("watchlist KML written to {}", path.display());
        Ok(())
    }

    /// Write both export formats (`watchlist.json`, `watchlist.kml`) into a
    /// directory.
    pub fn output_lists(&self, dir: &Path) -> Result<(), WatchlistError> {
        self.write_watchlist_file(&dir.join("watchlist.json"))?;
        self.write_watchlist_kml_file(&dir.join("watchlist.kml"))?;
        Ok(())
    }

    /// Log the persisted watchlist file verbatim (operator debugging aid).
    pub fn dump_watchlist_file(&self, path: &Path) -> Result<(), WatchlistError> {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines() {
            info!("[watchlist] {}", line);
        }
        Ok(())
    }

    fn watching_views(&self) -> Vec<EntityView> {
        let ts = self.now_s();
        self.lock_core().collect_watching(ts)
    }

    fn lock_core(&self) -> std::sync::MutexGuard<'_, TrackerCore> {
        self.core.lock().expect("tracker lock poisoned")
    }
}

// ============================================================================
// Stationary-ratio heuristic
// ============================================================================

/// Observer-stillness estimate in [0, 1] from the segmentation tick age:
/// no environment change for [`STATIONARY_FULL_SEC`] counts as fully
/// stationary. Shared so every `build_snapshot` caller scores identically.
pub fn stationary_ratio(now_s: u32, last_env_tick_s: u32) -> f32 {
    if last_env_tick_s == 0 {
        return 0.0;
    }
    let dt = now_s.saturating_sub(last_env_tick_s);
    (dt as f32 / STATIONARY_FULL_SEC as f32).min(1.0)
}
