//! Mock sensor platform and WiFi scanner for testing and simulation

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::hardware::{
    ScanRound, SensorError, SensorEvent, SensorKind, SensorPlatform, SensorResult, WifiScanner,
};

#[derive(Debug)]
struct MockState<T> {
    sink: Mutex<Option<Sender<T>>>,
    registrations: AtomicUsize,
}

impl<T> Default for MockState<T> {
    fn default() -> Self {
        Self {
            sink: Mutex::new(None),
            registrations: AtomicUsize::new(0),
        }
    }
}

impl<T> MockState<T> {
    fn emit(&self, item: T) -> bool {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.send(item).is_ok(),
            None => false,
        }
    }
}

/// Sensor platform driven by a test through a [`MockSensorHandle`]
#[derive(Debug)]
pub struct MockSensorPlatform {
    has_linear: bool,
    fail_registration: bool,
    state: Arc<MockState<SensorEvent>>,
}

/// Test-side handle pushing samples into a registered mock platform
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Arc<MockState<SensorEvent>>,
}

impl MockSensorPlatform {
    pub fn new(has_linear_accelerometer: bool) -> Self {
        Self {
            has_linear: has_linear_accelerometer,
            fail_registration: false,
            state: Arc::new(MockState::default()),
        }
    }

    /// Make every registration attempt fail
    pub fn failing() -> Self {
        Self {
            fail_registration: true,
            ..Self::new(true)
        }
    }

    pub fn handle(&self) -> MockSensorHandle {
        MockSensorHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockSensorHandle {
    /// Deliver a sample; false when nobody is registered
    pub fn emit(&self, kind: SensorKind, values: [f64; 3]) -> bool {
        self.state.emit(SensorEvent::new(kind, values))
    }

    pub fn is_registered(&self) -> bool {
        self.state.sink.lock().is_some()
    }

    /// Number of successful registrations so far
    pub fn registration_count(&self) -> usize {
        self.state.registrations.load(Ordering::SeqCst)
    }
}

impl SensorPlatform for MockSensorPlatform {
    fn has_linear_accelerometer(&self) -> bool {
        self.has_linear
    }

    fn register(&mut self, sink: Sender<SensorEvent>) -> SensorResult<()> {
        if self.fail_registration {
            return Err(SensorError::Registration("mock platform refuses listeners".to_string()));
        }
        *self.state.sink.lock() = Some(sink);
        self.state.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unregister(&mut self) {
        self.state.sink.lock().take();
    }
}

/// WiFi scanner driven by a test through a [`MockWifiHandle`]
#[derive(Debug, Default)]
pub struct MockWifiScanner {
    state: Arc<MockState<ScanRound>>,
}

#[derive(Debug, Clone)]
pub struct MockWifiHandle {
    state: Arc<MockState<ScanRound>>,
}

impl MockWifiScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MockWifiHandle {
        MockWifiHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockWifiHandle {
    /// Deliver a finished scan round; false when the scanner is stopped
    pub fn emit_round(&self, round: ScanRound) -> bool {
        self.state.emit(round)
    }

    pub fn is_scanning(&self) -> bool {
        self.state.sink.lock().is_some()
    }

    pub fn start_count(&self) -> usize {
        self.state.registrations.load(Ordering::SeqCst)
    }
}

impl WifiScanner for MockWifiScanner {
    fn start_scan(&mut self, sink: Sender<ScanRound>) -> SensorResult<()> {
        *self.state.sink.lock() = Some(sink);
        self.state.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.state.sink.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RssiSample;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_emit_requires_registration() {
        let mut platform = MockSensorPlatform::new(true);
        let handle = platform.handle();
        assert!(!handle.emit(SensorKind::Accelerometer, [0.0, 0.0, 9.81]));

        let (tx, rx) = unbounded();
        platform.register(tx).unwrap();
        assert!(handle.emit(SensorKind::Accelerometer, [0.0, 0.0, 9.81]));
        assert_eq!(rx.try_recv().unwrap().kind, SensorKind::Accelerometer);

        platform.unregister();
        platform.unregister();
        assert!(!handle.is_registered());
    }

    #[test]
    fn test_failing_platform() {
        let mut platform = MockSensorPlatform::failing();
        let (tx, _rx) = unbounded();
        assert!(matches!(platform.register(tx), Err(SensorError::Registration(_))));
        assert_eq!(platform.handle().registration_count(), 0);
    }

    #[test]
    fn test_wifi_rounds() {
        let mut scanner = MockWifiScanner::new();
        let handle = scanner.handle();
        let (tx, rx) = unbounded();
        scanner.start_scan(tx).unwrap();

        assert!(handle.emit_round(vec![RssiSample::new("ap", -40, 1)]));
        assert_eq!(rx.try_recv().unwrap().len(), 1);

        scanner.stop_scan();
        assert!(!handle.emit_round(Vec::new()));
    }
}
