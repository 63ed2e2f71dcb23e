//! Turning WiFi scan rounds into histograms

use crossbeam_channel::{select, unbounded, Sender};
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};

use crate::core::{current_time_ms, Fingerprint, Point2D};
use crate::hardware::{ScanRound, SensorError, SensorResult, WifiScanner};
use crate::processing::histogram::{HistogramBuilder, SignalHistogram};

/// How scan rounds are grouped into histograms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    /// Batch `rounds` scan rounds into one histogram
    MakeFingerprint,
    /// One histogram per scan round
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Rounds per histogram in MakeFingerprint mode
    pub rounds: usize,
    /// Samples older than this are dropped when building (0 keeps all)
    pub max_sample_age_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Continuous,
            rounds: 5,
            max_sample_age_ms: 0,
        }
    }
}

/// Accumulates scan rounds until a histogram is due
#[derive(Debug, Clone)]
pub struct ScanCollector {
    config: ScanConfig,
    builder: HistogramBuilder,
    rounds: usize,
    produced: u64,
}

impl ScanCollector {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            builder: HistogramBuilder::new(),
            rounds: 0,
            produced: 0,
        }
    }

    fn rounds_per_histogram(&self) -> usize {
        match self.config.mode {
            ScanMode::Continuous => 1,
            ScanMode::MakeFingerprint => self.config.rounds.max(1),
        }
    }

    pub fn pending_rounds(&self) -> usize {
        self.rounds
    }

    /// Add one round; returns a histogram once the batch is complete
    pub fn add_round(&mut self, round: ScanRound, now_ms: u64) -> Option<SignalHistogram> {
        self.builder.add_samples(round);
        self.rounds += 1;
        if self.rounds < self.rounds_per_histogram() {
            return None;
        }

        let id = format!("scan-{}", self.produced);
        let histogram = self.take_histogram(id, now_ms);
        self.produced += 1;
        (!histogram.is_empty()).then_some(histogram)
    }

    /// Build a fingerprint from every round collected so far
    pub fn make_fingerprint(
        &mut self,
        id: impl Into<String>,
        position: Point2D,
        now_ms: u64,
    ) -> Option<Fingerprint> {
        let id = id.into();
        let histogram = self.take_histogram(id.clone(), now_ms);
        if histogram.is_empty() {
            return None;
        }
        Some(Fingerprint {
            id,
            position,
            histogram,
        })
    }

    pub fn reset(&mut self) {
        self.builder.clear();
        self.rounds = 0;
    }

    fn take_histogram(&mut self, id: String, now_ms: u64) -> SignalHistogram {
        let histogram = self.builder.build(id, self.config.max_sample_age_ms, now_ms);
        self.reset();
        histogram
    }
}

struct CollectorWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs a [`WifiScanner`] and forwards finished histograms
pub struct WifiCollector {
    scanner: Box<dyn WifiScanner>,
    config: ScanConfig,
    worker: Option<CollectorWorker>,
}

impl WifiCollector {
    pub fn new(scanner: Box<dyn WifiScanner>, config: ScanConfig) -> Self {
        Self {
            scanner,
            config,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start scanning into `sink`; no-op when already running
    pub fn start(&mut self, sink: Sender<SignalHistogram>) -> SensorResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (round_tx, round_rx) = unbounded::<ScanRound>();
        let (stop_tx, stop_rx) = unbounded::<()>();
        self.scanner.start_scan(round_tx)?;

        let mut collector = ScanCollector::new(self.config.clone());
        let spawned = thread::Builder::new()
            .name("wifi-collector".into())
            .spawn(move || loop {
                select! {
                    recv(round_rx) -> msg => match msg {
                        Ok(round) => {
                            if let Some(histogram) = collector.add_round(round, current_time_ms()) {
                                log::debug!(
                                    "Histogram {} ready with {} access points",
                                    histogram.id,
                                    histogram.access_point_count()
                                );
                                if sink.send(histogram).is_err() {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    },
                    recv(stop_rx) -> _ => break,
                }
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(CollectorWorker { stop_tx, handle });
                log::info!("WiFi collector started ({:?} mode)", self.config.mode);
                Ok(())
            }
            Err(e) => {
                self.scanner.stop_scan();
                Err(SensorError::Thread(e.to_string()))
            }
        }
    }

    /// Stop scanning; no-op when not running
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.scanner.stop_scan();
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            log::warn!("WiFi collector thread panicked");
        }
        log::info!("WiFi collector stopped");
    }
}

impl Drop for WifiCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RssiSample;
    use crate::hardware::MockWifiScanner;
    use std::time::Duration;

    fn round(level: i32, ts: u64) -> ScanRound {
        vec![RssiSample::new("a", level, ts), RssiSample::new("b", level - 10, ts)]
    }

    #[test]
    fn test_continuous_emits_every_round() {
        let mut collector = ScanCollector::new(ScanConfig::default());
        let h = collector.add_round(round(-50, 1), 10).unwrap();
        assert_eq!(h.access_point_count(), 2);
        assert!(collector.add_round(round(-51, 2), 10).is_some());
    }

    #[test]
    fn test_fingerprint_mode_batches_rounds() {
        let mut collector = ScanCollector::new(ScanConfig {
            mode: ScanMode::MakeFingerprint,
            rounds: 5,
            max_sample_age_ms: 0,
        });
        for i in 0..4 {
            assert!(collector.add_round(round(-50 - i, i as u64), 10).is_none());
        }
        let h = collector.add_round(round(-60, 5), 10).unwrap();
        assert_eq!(h.distribution("a").unwrap().len(), 5);
        assert_eq!(collector.pending_rounds(), 0);
    }

    #[test]
    fn test_empty_round_yields_nothing() {
        let mut collector = ScanCollector::new(ScanConfig::default());
        assert!(collector.add_round(Vec::new(), 10).is_none());
    }

    #[test]
    fn test_make_fingerprint() {
        let mut collector = ScanCollector::new(ScanConfig {
            mode: ScanMode::MakeFingerprint,
            ..Default::default()
        });
        assert!(collector.make_fingerprint("fp", Point2D::new(1.0, 2.0), 10).is_none());

        collector.add_round(round(-50, 1), 10);
        collector.add_round(round(-52, 2), 10);
        let fp = collector.make_fingerprint("fp", Point2D::new(1.0, 2.0), 10).unwrap();
        assert_eq!(fp.id, "fp");
        assert_eq!(fp.histogram.distribution("a").unwrap().len(), 2);
    }

    #[test]
    fn test_collector_thread_forwards_histograms() {
        let scanner = MockWifiScanner::new();
        let handle = scanner.handle();
        let mut collector = WifiCollector::new(Box::new(scanner), ScanConfig::default());
        let (tx, rx) = unbounded();

        collector.start(tx.clone()).unwrap();
        collector.start(tx).unwrap();
        assert_eq!(handle.start_count(), 1);

        assert!(handle.emit_round(round(-40, current_time_ms())));
        let h = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(h.access_point_count(), 2);

        collector.stop();
        collector.stop();
        assert!(!handle.is_scanning());
        assert!(!collector.is_running());
    }
}
