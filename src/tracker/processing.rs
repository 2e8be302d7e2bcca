//! Observation queue and the single-consumer processing loop.
//!
//! Producers (radio callbacks) enqueue with a non-blocking `try_send`; a
//! full queue drops the observation and bumps a counter — backpressure is a
//! loss policy here, never a stall. The sole consumer drains the queue with
//! a 250 ms receive timeout so segmentation advance and table expiry run on
//! wall-clock even when the air is quiet.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::core::TrackerCore;
use super::TrackerStats;
use crate::config::defaults::RECV_TIMEOUT_MS;
use crate::types::{MacAddr, Observation};

/// Queue element: the observation plus the reset epoch it was enqueued in.
/// `reset()` bumps the epoch, so anything already in flight is discarded by
/// the consumer instead of repopulating freshly cleared tables.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedObservation {
    pub epoch: u32,
    pub obs: Observation,
}

/// Cloneable producer handle handed to radio callbacks and replay sources.
#[derive(Debug, Clone)]
pub struct ObservationSender {
    tx: mpsc::Sender<QueuedObservation>,
    epoch: Arc<AtomicU32>,
    stats: Arc<TrackerStats>,
    started: Instant,
}

impl ObservationSender {
    pub(crate) fn new(
        tx: mpsc::Sender<QueuedObservation>,
        epoch: Arc<AtomicU32>,
        stats: Arc<TrackerStats>,
        started: Instant,
    ) -> Self {
        Self {
            tx,
            epoch,
            stats,
            started,
        }
    }

    /// Monotonic seconds on the tracker's clock, for stamping observations
    /// from driver callbacks.
    pub fn now_s(&self) -> u32 {
        self.started.elapsed().as_secs() as u32
    }

    /// Enqueue without blocking. Returns false when the observation was
    /// dropped (queue full or consumer gone). Safe from any context; never
    /// awaits, never allocates, never logs.
    pub fn send(&self, obs: Observation) -> bool {
        let queued = QueuedObservation {
            epoch: self.epoch.load(Ordering::Relaxed),
            obs,
        };
        match self.tx.try_send(queued) {
            Ok(()) => {
                self.stats.note_enqueued();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.note_queue_full_drop();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Wi-Fi sniffer callback contract: parse a raw management frame, stamp
    /// the current time, enqueue. Frames that do not parse (short, bad IE
    /// list, uninteresting subtype) are counted and dropped silently.
    pub fn send_mgmt_frame(&self, payload: &[u8], rssi_dbm: i8) -> bool {
        match crate::radio::wifi::parse_mgmt_frame(payload, rssi_dbm, self.now_s()) {
            Some(obs) => self.send(obs),
            None => {
                self.stats.note_malformed_frame();
                false
            }
        }
    }

    /// BLE scan callback contract: parse raw advertising data, classify,
    /// stamp, enqueue.
    pub fn send_ble_advertisement(&self, addr: MacAddr, rssi_dbm: i8, adv_data: &[u8]) -> bool {
        let adv = crate::radio::ble::parse_advertising_data(adv_data);
        let obs =
            crate::radio::ble::observation_from_advertisement(addr, rssi_dbm, &adv, self.now_s());
        self.send(obs)
    }
}

/// The single consumer task body.
pub(crate) struct ProcessingLoop {
    pub rx: mpsc::Receiver<QueuedObservation>,
    pub core: Arc<Mutex<TrackerCore>>,
    pub epoch: Arc<AtomicU32>,
    pub stats: Arc<TrackerStats>,
    pub started: Instant,
    pub cancel: CancellationToken,
}

impl ProcessingLoop {
    fn now_s(&self) -> u32 {
        self.started.elapsed().as_secs() as u32
    }

    /// Run until cancellation (or every sender dropping, which only happens
    /// in replay harnesses). Each iteration: receive with timeout, apply the
    /// observation if fresh, then advance segmentation and expiry off the
    /// monotonic clock — the timeout is a liveness knob, not a correctness
    /// boundary.
    pub async fn run(mut self) {
        info!("[Processing] consumer started");

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("[Processing] shutdown requested");
                    break;
                }
                r = tokio::time::timeout(
                    Duration::from_millis(RECV_TIMEOUT_MS),
                    self.rx.recv(),
                ) => r,
            };

            match received {
                Ok(Some(q)) => {
                    if q.epoch == self.epoch.load(Ordering::Relaxed) {
                        let mut core = self.core.lock().expect("tracker lock poisoned");
                        core.process_observation(&q.obs);
                        drop(core);
                        self.stats.note_processed();
                    } else {
                        self.stats.note_stale_drop();
                    }
                }
                Ok(None) => {
                    info!("[Processing] all producers gone; stopping");
                    let ts = self.now_s();
                    let mut core = self.core.lock().expect("tracker lock poisoned");
                    core.advance_segmentation(ts);
                    core.expire_tables(ts);
                    break;
                }
                Err(_elapsed) => {}
            }

            let ts = self.now_s();
            let mut core = self.core.lock().expect("tracker lock poisoned");
            core.advance_segmentation(ts);
            core.expire_tables(ts);
        }

        let snapshot = self.stats.snapshot();
        info!(
            processed = snapshot.processed,
            queue_full_drops = snapshot.queue_full_drops,
            alloc_failures = snapshot.alloc_failures,
            "[Processing] consumer stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MacAddr, Observation, TrackerInfo};

    fn obs(n: u8) -> Observation {
        Observation::ble(MacAddr([2, 0, 0, 0, 0, n]), -60, TrackerInfo::default(), 10)
    }

    #[test]
    fn test_try_send_is_lossy_not_blocking() {
        let (tx, _rx) = mpsc::channel(4);
        let stats = Arc::new(TrackerStats::default());
        let sender =
            ObservationSender::new(tx, Arc::new(AtomicU32::new(0)), stats.clone(), Instant::now());

        let mut accepted = 0;
        for i in 0..10 {
            if sender.send(obs(i)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 4);
        assert_eq!(stats.snapshot().queue_full_drops, 6);
        assert_eq!(stats.snapshot().enqueued, 4);
    }

    #[test]
    fn test_send_after_consumer_gone_fails_quietly() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sender = ObservationSender::new(
            tx,
            Arc::new(AtomicU32::new(0)),
            Arc::new(TrackerStats::default()),
            Instant::now(),
        );
        assert!(!sender.send(obs(1)));
    }

    #[tokio::test]
    async fn test_loop_drops_stale_epoch_observations() {
        let (tx, rx) = mpsc::channel(16);
        let stats = Arc::new(TrackerStats::default());
        let epoch = Arc::new(AtomicU32::new(0));
        let core = Arc::new(Mutex::new(TrackerCore::new(stats.clone())));
        let cancel = CancellationToken::new();

        let sender = ObservationSender::new(tx, epoch.clone(), stats.clone(), Instant::now());
        sender.send(obs(1));
        sender.send(obs(2));

        // Reset happened after enqueue: epoch moves on.
        epoch.fetch_add(1, Ordering::Relaxed);
        sender.send(obs(3));

        let handle = tokio::spawn(
            ProcessingLoop {
                rx,
                core: core.clone(),
                epoch,
                stats: stats.clone(),
                started: Instant::now(),
                cancel: cancel.clone(),
            }
            .run(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        let s = stats.snapshot();
        assert_eq!(s.processed, 1);
        assert_eq!(s.stale_drops, 2);
        let (tracks, _) = core.lock().unwrap().in_use_counts();
        assert_eq!(tracks, 1);
    }
}
