use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::types::BatchProgress;

/// Default report interval.
const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Callback invoked with each periodic report.
pub type ReportCallback = Box<dyn Fn(&ProgressReport) + Send + Sync>;

/// A progress snapshot enriched with throughput figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub progress: BatchProgress,
    /// Byte throughput over the recent window.
    pub bytes_per_second: f64,
    /// Estimated time to send the remaining known bytes.
    pub eta: Option<Duration>,
}

/// Emits periodic progress reports for a running batch.
///
/// Reports are taken from a watch channel on a fixed interval. One final
/// report is always emitted when the batch reaches a terminal status.
pub struct ProgressReporter {
    inner: Arc<ReporterInner>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

struct ReporterInner {
    callbacks: RwLock<Vec<ReportCallback>>,
    speed: SpeedCalculator,
    interval: Duration,
}

impl ReporterInner {
    fn emit(&self, progress: BatchProgress) {
        self.speed.observe(progress.bytes_transferred);
        let remaining = progress
            .bytes_total
            .saturating_sub(progress.bytes_transferred);
        let report = ProgressReport {
            bytes_per_second: self.speed.bytes_per_second(),
            eta: self.speed.eta(remaining),
            progress,
        };
        for cb in self.callbacks.read().unwrap().iter() {
            cb(&report);
        }
    }
}

impl ProgressReporter {
    /// Creates a reporter. If `interval` is `None`, defaults to 500 ms.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ReporterInner {
                callbacks: RwLock::new(Vec::new()),
                speed: SpeedCalculator::new(None, None),
                interval: interval.unwrap_or(DEFAULT_INTERVAL),
            }),
            stop: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Registers a report callback.
    pub fn on_report(&self, callback: ReportCallback) {
        self.inner.callbacks.write().unwrap().push(callback);
    }

    /// Sends a one-off report for `progress`.
    pub fn report_now(&self, progress: BatchProgress) {
        self.inner.emit(progress);
    }

    /// Starts reporting from `progress` in a background task.
    ///
    /// The task ends after the terminal report, when the sender side of
    /// the channel goes away, or on [`stop`](Self::stop).
    pub fn start(&self, mut progress: watch::Receiver<BatchProgress>) -> JoinHandle<()> {
        let (tx, mut stop_rx) = oneshot::channel();
        {
            let mut stop = self.stop.lock().unwrap();
            drop(stop.take());
            *stop = Some(tx);
        }
        self.inner.speed.reset();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = progress.borrow_and_update().clone();
                        let done = snapshot.status.is_terminal();
                        inner.emit(snapshot);
                        if done {
                            break;
                        }
                    }
                    changed = progress.changed() => {
                        let snapshot = progress.borrow_and_update().clone();
                        if changed.is_err() || snapshot.status.is_terminal() {
                            inner.emit(snapshot);
                            break;
                        }
                    }
                    _ = &mut stop_rx => {
                        break;
                    }
                }
            }
        })
    }

    /// Stops the reporting task without a final report.
    pub fn stop(&self) {
        let mut stop = self.stop.lock().unwrap();
        drop(stop.take());
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    /// Cumulative bytes at `timestamp`.
    bytes: u64,
    timestamp: Instant,
}

/// Derives throughput from cumulative byte counts in a sliding window.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records the cumulative byte count observed now.
    pub fn observe(&self, total_bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes: total_bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }
        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average bytes/second across the window; 0.0 with fewer than two
    /// samples or no elapsed time.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let (Some(first), Some(last)) = (s.samples.first(), s.samples.last()) else {
            return 0.0;
        };
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }
        last.bytes.saturating_sub(first.bytes) as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        self.inner.lock().unwrap().samples.clear();
    }
}
