//! Inertial and magnetic dead reckoning
//!
//! Accelerometer, magnetic field and linear acceleration each run through
//! their own low-pass filter. Heading and the moving flag are written to
//! the fusion lock after every sample, and a periodic integration tick
//! turns them into an accumulated displacement.

use crossbeam_channel::{select, tick, unbounded, Sender};
use nalgebra::Vector3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::{DeltaVector, SharedFusion};
use crate::hardware::{SensorError, SensorEvent, SensorKind, SensorPlatform, SensorResult};
use crate::processing::low_pass::{normalize_angle, CircularLowPassFilter, LowPassFilter};

/// Weight of the slow gravity estimate used without a linear accelerometer
const GRAVITY_FILTER_WEIGHT: f64 = 0.05;

/// Below this the east vector is degenerate (free fall or magnetic interference)
const MIN_EAST_NORM: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadReckoningConfig {
    /// Integration tick period (milliseconds)
    pub timestep_ms: u64,
    /// Assumed walking speed while moving (m/s)
    pub speed_m_s: f64,
    pub accelerometer_weight: f64,
    pub magnetic_weight: f64,
    pub linear_weight: f64,
    /// Azimuth smoothing weight when the compass filter is enabled
    pub compass_weight: f64,
    /// Linear acceleration magnitude above which the user is moving (m/s²)
    pub moving_threshold: f64,
    /// Threshold multiplier when linear acceleration is derived from the raw accelerometer
    pub no_linear_sensor_threshold_factor: f64,
    pub compass_filter_enabled: bool,
}

impl Default for DeadReckoningConfig {
    fn default() -> Self {
        Self {
            timestep_ms: 50,
            speed_m_s: 1.0,
            accelerometer_weight: 0.2,
            magnetic_weight: 0.2,
            linear_weight: 0.3,
            compass_weight: 0.15,
            moving_threshold: 0.6,
            no_linear_sensor_threshold_factor: 2.0,
            compass_filter_enabled: true,
        }
    }
}

#[derive(Debug)]
struct SensorState {
    accelerometer: LowPassFilter,
    magnetic: LowPassFilter,
    linear: LowPassFilter,
    gravity: LowPassFilter,
    compass: CircularLowPassFilter,
    has_linear_sensor: bool,
    /// Radians between map north and magnetic north
    base_angle: f64,
    /// Map units per meter
    scale: f64,
}

impl SensorState {
    fn new(config: &DeadReckoningConfig) -> Self {
        let compass_weight = if config.compass_filter_enabled {
            config.compass_weight
        } else {
            1.0
        };
        Self {
            accelerometer: LowPassFilter::new(config.accelerometer_weight),
            magnetic: LowPassFilter::new(config.magnetic_weight),
            linear: LowPassFilter::new(config.linear_weight),
            gravity: LowPassFilter::new(GRAVITY_FILTER_WEIGHT),
            compass: CircularLowPassFilter::new(compass_weight),
            has_linear_sensor: false,
            base_angle: 0.0,
            scale: 1.0,
        }
    }

    fn reset_filters(&mut self) {
        self.accelerometer.reset();
        self.magnetic.reset();
        self.linear.reset();
        self.gravity.reset();
        self.compass.reset();
    }

    /// Heading from the smoothed gravity and magnetic vectors, 0 = north, π/2 = east
    fn update_azimuth(&mut self) -> Option<f64> {
        let gravity = self.accelerometer.value()?;
        let magnetic = self.magnetic.value()?;

        let east = magnetic.cross(&gravity);
        let east_norm = east.norm();
        let gravity_norm = gravity.norm();
        if east_norm < MIN_EAST_NORM || gravity_norm <= f64::EPSILON {
            return None;
        }
        let east = east / east_norm;
        let up = gravity / gravity_norm;
        let north = up.cross(&east);

        let raw = normalize_angle(east.y.atan2(north.y));
        Some(self.compass.update(raw))
    }

    fn is_moving(&self, config: &DeadReckoningConfig) -> bool {
        let Some(linear) = self.linear.value() else {
            return false;
        };
        let threshold = if self.has_linear_sensor {
            config.moving_threshold
        } else {
            config.moving_threshold * config.no_linear_sensor_threshold_factor
        };
        linear.norm_squared() > threshold * threshold
    }
}

/// The part of the estimator shared with its sensor thread
#[derive(Debug, Clone)]
struct Pipeline {
    config: DeadReckoningConfig,
    fusion: SharedFusion,
    state: Arc<Mutex<SensorState>>,
}

impl Pipeline {
    fn handle_event(&self, event: &SensorEvent) {
        let sample = Vector3::from(event.values);
        let mut state = self.state.lock();

        let azimuth = match event.kind {
            SensorKind::Accelerometer => {
                state.accelerometer.update(sample);
                if !state.has_linear_sensor {
                    let gravity = state.gravity.update(sample);
                    state.linear.update(sample - gravity);
                }
                state.update_azimuth()
            }
            SensorKind::MagneticField => {
                state.magnetic.update(sample);
                state.update_azimuth()
            }
            SensorKind::LinearAcceleration => {
                if state.has_linear_sensor {
                    state.linear.update(sample);
                }
                self.fusion.azimuth()
            }
        };
        let moving = state.is_moving(&self.config);
        drop(state);

        self.fusion.set_heading(azimuth, moving);
    }

    fn integrate(&self) -> Option<DeltaVector> {
        let base_angle = self.state.lock().base_angle;
        let distance = self.config.speed_m_s * self.config.timestep_ms as f64 / 1000.0;
        self.fusion.integrate_step(distance, base_angle)
    }
}

struct SensorWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Heading, motion and displacement estimation from the sensor platform
pub struct DeadReckoningEstimator {
    pipeline: Pipeline,
    platform: Mutex<Option<Box<dyn SensorPlatform>>>,
    worker: Mutex<Option<SensorWorker>>,
}

impl std::fmt::Debug for DeadReckoningEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadReckoningEstimator")
            .field("config", &self.pipeline.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl DeadReckoningEstimator {
    pub fn new(config: DeadReckoningConfig, fusion: SharedFusion) -> Self {
        let state = SensorState::new(&config);
        Self {
            pipeline: Pipeline {
                config,
                fusion,
                state: Arc::new(Mutex::new(state)),
            },
            platform: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DeadReckoningConfig {
        &self.pipeline.config
    }

    /// Attach the sensor source used by [`start_sensors`](Self::start_sensors)
    pub fn set_platform(&self, platform: Box<dyn SensorPlatform>) {
        let has_linear = platform.has_linear_accelerometer();
        if !has_linear {
            log::info!("No linear accelerometer, deriving linear acceleration from the raw accelerometer");
        }
        self.pipeline.state.lock().has_linear_sensor = has_linear;
        *self.platform.lock() = Some(platform);
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Register for sensor samples and start the integration tick.
    /// Calling it while running is a no-op.
    pub fn start_sensors(&self) -> SensorResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let mut platform = self.platform.lock();
        let platform = platform
            .as_mut()
            .ok_or(SensorError::NotAvailable("sensor platform"))?;

        self.pipeline.state.lock().reset_filters();
        let (event_tx, event_rx) = unbounded::<SensorEvent>();
        let (stop_tx, stop_rx) = unbounded::<()>();
        platform.register(event_tx)?;

        let pipeline = self.pipeline.clone();
        let period = Duration::from_millis(pipeline.config.timestep_ms.max(1));
        let spawned = thread::Builder::new()
            .name("dead-reckoning".into())
            .spawn(move || {
                let ticker = tick(period);
                loop {
                    select! {
                        recv(event_rx) -> msg => match msg {
                            Ok(event) => pipeline.handle_event(&event),
                            Err(_) => break,
                        },
                        recv(ticker) -> _ => {
                            pipeline.integrate();
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(SensorWorker { stop_tx, handle });
                log::info!("Dead reckoning started ({} ms timestep)", period.as_millis());
                Ok(())
            }
            Err(e) => {
                platform.unregister();
                Err(SensorError::Thread(e.to_string()))
            }
        }
    }

    /// Unregister sensors and cancel the tick; no-op when stopped
    pub fn stop_sensors(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if let Some(platform) = self.platform.lock().as_mut() {
            platform.unregister();
        }
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            log::warn!("Dead reckoning thread panicked");
        }
        log::info!("Dead reckoning stopped");
    }

    /// Feed one sensor sample
    pub fn on_event(&self, event: &SensorEvent) {
        self.pipeline.handle_event(event);
    }

    /// One integration step; returns the step added, if any
    pub fn tick(&self) -> Option<DeltaVector> {
        self.pipeline.integrate()
    }

    /// Read and zero the accumulated displacement, in map units
    pub fn get_delta(&self) -> DeltaVector {
        let scale = self.pipeline.state.lock().scale;
        self.pipeline.fusion.take_delta().scaled(scale)
    }

    pub fn set_base_angle(&self, degrees: f64) {
        self.pipeline.state.lock().base_angle = degrees.to_radians();
    }

    pub fn base_angle(&self) -> f64 {
        self.pipeline.state.lock().base_angle
    }

    pub fn set_scale(&self, scale: f64) {
        self.pipeline.state.lock().scale = scale;
    }

    pub fn set_compass_filter_enabled(&self, enabled: bool) {
        let weight = if enabled {
            self.pipeline.config.compass_weight
        } else {
            1.0
        };
        self.pipeline.state.lock().compass.set_weight(weight);
    }

    pub fn azimuth(&self) -> Option<f64> {
        self.pipeline.fusion.azimuth()
    }

    pub fn is_moving(&self) -> bool {
        self.pipeline.fusion.is_moving()
    }
}

impl Drop for DeadReckoningEstimator {
    fn drop(&mut self) {
        self.stop_sensors();
    }
}
