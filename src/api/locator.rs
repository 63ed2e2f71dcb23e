//! Orchestration of matching, dead reckoning and fix production
//!
//! Three pipelines meet in the fusion lock. The matching thread turns WiFi
//! histograms into a pending point, the dead-reckoning thread accumulates a
//! displacement, and the tick thread consumes both at a fixed cadence to
//! publish one fix per period.

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::algorithms::dead_reckoning::DeadReckoningEstimator;
use crate::algorithms::map_matching::{match_point, MapMatchingMode};
use crate::algorithms::particle_filter::{Particle, ParticleFilter};
use crate::api::types::{
    Diagnostics, FloorData, LocalizationMode, LocatorError, LocatorResult, OutlierMode,
    TrackingState,
};
use crate::core::{Edge, FloorId, MapMetadata, Point2D, SharedFusion};
use crate::hardware::{SensorPlatform, WifiCollector, WifiScanner};
use crate::processing::histogram::SignalHistogram;
use crate::processing::interpolation::interpolate;
use crate::processing::matcher::{detect_floor, nearest_neighbours, FingerprintMatcher};
use crate::processing::outlier::OutlierEliminator;
use crate::processing::smoother::{PositionHistorySmoother, StatisticFilterMode};
use crate::utils::config::LocatorConfig;

/// Values buffered per subscriber before new ones are dropped
const SUBSCRIBER_CAPACITY: usize = 64;

/// Fan-out of published values to channel subscribers
struct Subscribers<T> {
    senders: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> Subscribers<T> {
    fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.senders.lock().push(tx);
        rx
    }

    /// Send to every live subscriber, forgetting dropped ones.
    /// A subscriber that has fallen behind misses the value.
    fn publish(&self, value: &T) {
        self.senders
            .lock()
            .retain(|tx| !matches!(tx.try_send(value.clone()), Err(TrySendError::Disconnected(_))));
    }
}

fn build_eliminator(mode: OutlierMode, config: &LocatorConfig) -> OutlierEliminator {
    match mode {
        OutlierMode::None => OutlierEliminator::None,
        OutlierMode::CentroidMedian => OutlierEliminator::CentroidMedian {
            threshold: config.outlier_threshold,
        },
        OutlierMode::Plasmona => OutlierEliminator::Plasmona(config.plasmona),
    }
}

/// State touched by histogram processing
struct WifiStage {
    matchers: BTreeMap<FloorId, FingerprintMatcher>,
    edges: BTreeMap<FloorId, Vec<Edge>>,
    active_floor: Option<FloorId>,
    eliminator: OutlierEliminator,
    neighbour_count: usize,
    auto_floor_detection: bool,
}

/// State touched by the fix tick
struct FixStage {
    mode: LocalizationMode,
    statistic_filter_mode: StatisticFilterMode,
    map_matching_mode: MapMatchingMode,
    edges: Vec<Edge>,
    map: MapMetadata,
    particle_filter: ParticleFilter,
    smoother: PositionHistorySmoother,
    published: Option<Point2D>,
}

impl FixStage {
    /// Apply a WiFi estimate according to the active mode
    fn correct(&mut self, current: Option<Point2D>, wifi: Point2D) -> Option<Point2D> {
        match self.mode {
            LocalizationMode::Wifi => Some(wifi),
            LocalizationMode::DeadReckoning => current,
            LocalizationMode::ParticleFilter => {
                let pf = &mut self.particle_filter;
                if !pf.is_initialized() {
                    pf.initialize(wifi.x, wifi.y);
                } else if pf.update_sensor(wifi.x, wifi.y) {
                    pf.resampling();
                } else {
                    log::info!("Particle cloud lost track, reseeding at ({:.2}, {:.2})", wifi.x, wifi.y);
                    pf.initialize(wifi.x, wifi.y);
                }
                pf.calculate_position().or(Some(wifi))
            }
        }
    }

    /// Apply a dead-reckoning displacement according to the active mode
    fn predict(&mut self, current: Option<Point2D>, dx: f64, dy: f64) -> Option<Point2D> {
        let moved = current.map(|p| Point2D::new(p.x + dx, p.y + dy));
        match self.mode {
            LocalizationMode::Wifi => current,
            LocalizationMode::DeadReckoning => moved,
            LocalizationMode::ParticleFilter => {
                let pf = &mut self.particle_filter;
                if pf.is_initialized() {
                    pf.update_action(dx, dy);
                    pf.calculate_position().or(moved)
                } else {
                    moved
                }
            }
        }
    }
}

/// Everything the worker threads share
struct LocatorCore {
    fusion: SharedFusion,
    wifi: Mutex<WifiStage>,
    fix: Mutex<FixStage>,
    dead_reckoning: DeadReckoningEstimator,
    diagnostics: Mutex<Diagnostics>,
    diagnostics_subscribers: Subscribers<Diagnostics>,
    fix_subscribers: Subscribers<Point2D>,
}

impl LocatorCore {
    /// Make `floor` active; the caller holds the WiFi stage lock
    fn switch_floor(&self, wifi: &mut WifiStage, floor: FloorId) {
        wifi.active_floor = Some(floor);
        let edges = wifi.edges.get(&floor).cloned().unwrap_or_default();

        let mut fix = self.fix.lock();
        fix.edges = edges;
        fix.smoother.clear();
        fix.particle_filter.reset();
    }

    fn process_histogram(&self, histogram: &SignalHistogram) -> Option<Point2D> {
        let mut wifi = self.wifi.lock();

        if wifi.auto_floor_detection && wifi.matchers.len() > 1 {
            if let Some(floor) = detect_floor(&wifi.matchers, histogram) {
                if wifi.active_floor != Some(floor) {
                    log::info!("Floor detection switched to floor {}", floor);
                    self.switch_floor(&mut wifi, floor);
                }
            }
        }

        let matcher = wifi.active_floor.and_then(|floor| wifi.matchers.get(&floor));
        let Some(matcher) = matcher else {
            log::debug!("No fingerprints for the active floor, skipping histogram {}", histogram.id);
            return None;
        };

        let ranked = matcher.match_histogram(histogram);
        let mut neighbours = nearest_neighbours(&ranked, wifi.neighbour_count);
        if neighbours.is_empty() {
            log::debug!("Histogram {} matched no fingerprints", histogram.id);
            return None;
        }

        let candidates: Vec<_> = neighbours.iter().copied().collect();
        let outliers = wifi.eliminator.remove_outliers(&mut neighbours);
        let estimate = interpolate(&neighbours);
        drop(wifi);

        if let Some(point) = estimate {
            log::debug!("WiFi estimate ({:.2}, {:.2}) from {} neighbours", point.x, point.y, neighbours.len());
            self.fusion.set_pending_wifi(point);
        }

        let snapshot = {
            let mut diagnostics = self.diagnostics.lock();
            diagnostics.neighbours = candidates;
            diagnostics.outliers = outliers;
            diagnostics.clone()
        };
        self.diagnostics_subscribers.publish(&snapshot);

        estimate
    }

    fn publish_particles(&self, particles: Vec<Particle>) {
        let snapshot = {
            let mut diagnostics = self.diagnostics.lock();
            diagnostics.particles = particles;
            diagnostics.clone()
        };
        self.diagnostics_subscribers.publish(&snapshot);
    }

    fn tick(&self) -> Option<Point2D> {
        let mut fix = self.fix.lock();

        if self.fusion.current_point().is_none() {
            self.fusion.set_current_point(fix.map.bounding_box_center);
        }
        let current = self.fusion.current_point();

        let (estimate, updated) = match self.fusion.take_pending_wifi() {
            Some(wifi) => (fix.correct(current, wifi), true),
            None => {
                let delta = self.dead_reckoning.get_delta();
                if delta.is_zero() {
                    (current, false)
                } else {
                    (fix.predict(current, delta.dx, delta.dy), true)
                }
            }
        };
        let estimate = estimate?;

        let snapped = match_point(fix.map_matching_mode, estimate, &fix.edges);
        self.fusion.set_current_point(Some(snapped));

        let mode = fix.statistic_filter_mode;
        let smoothed = fix.smoother.apply(mode, snapped);
        fix.published = Some(smoothed);

        let particles = (updated
            && fix.mode == LocalizationMode::ParticleFilter
            && fix.particle_filter.is_initialized())
        .then(|| fix.particle_filter.particles().to_vec());
        drop(fix);

        self.fix_subscribers.publish(&smoothed);
        if let Some(particles) = particles {
            self.publish_particles(particles);
        }

        Some(smoothed)
    }

    fn clear_position(&self) {
        let mut fix = self.fix.lock();
        fix.published = None;
        fix.smoother.clear();
        fix.particle_filter.reset();
        self.fusion.clear_position();
    }
}

struct TrackingWorkers {
    stop_tx: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

fn spawn_worker<F>(name: &str, body: F) -> LocatorResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| LocatorError::Thread(e.to_string()))
}

/// Indoor position tracker publishing fixes at a fixed cadence
pub struct Locator {
    config: LocatorConfig,
    core: Arc<LocatorCore>,
    collectors: Vec<WifiCollector>,
    histogram_tx: Sender<SignalHistogram>,
    histogram_rx: Receiver<SignalHistogram>,
    workers: Option<TrackingWorkers>,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> LocatorResult<Self> {
        config.validate()?;

        let fusion = SharedFusion::new();
        let wifi = WifiStage {
            matchers: BTreeMap::new(),
            edges: BTreeMap::new(),
            active_floor: None,
            eliminator: build_eliminator(config.outlier_mode, &config),
            neighbour_count: config.neighbour_count,
            auto_floor_detection: config.auto_floor_detection,
        };
        let fix = FixStage {
            mode: config.localization_mode,
            statistic_filter_mode: config.statistic_filter_mode,
            map_matching_mode: config.map_matching_mode,
            edges: Vec::new(),
            map: MapMetadata::default(),
            particle_filter: ParticleFilter::new(config.particle_filter.clone(), 1.0),
            smoother: PositionHistorySmoother::new(config.history_size),
            published: None,
        };
        let core = LocatorCore {
            dead_reckoning: DeadReckoningEstimator::new(config.dead_reckoning.clone(), fusion.clone()),
            fusion,
            wifi: Mutex::new(wifi),
            fix: Mutex::new(fix),
            diagnostics: Mutex::new(Diagnostics::default()),
            diagnostics_subscribers: Subscribers::new(),
            fix_subscribers: Subscribers::new(),
        };

        let (histogram_tx, histogram_rx) = unbounded();
        Ok(Self {
            config,
            core: Arc::new(core),
            collectors: Vec::new(),
            histogram_tx,
            histogram_rx,
            workers: None,
        })
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn state(&self) -> TrackingState {
        if self.workers.is_some() {
            TrackingState::Tracking
        } else {
            TrackingState::Stopped
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.workers.is_some()
    }

    /// The dead-reckoning estimator, e.g. for feeding samples by hand
    pub fn dead_reckoning(&self) -> &DeadReckoningEstimator {
        &self.core.dead_reckoning
    }

    pub fn set_sensor_platform(&mut self, platform: Box<dyn SensorPlatform>) {
        self.core.dead_reckoning.set_platform(platform);
    }

    /// Add a WiFi scanner; it starts immediately when already tracking
    pub fn register_wifi_scanner(&mut self, scanner: Box<dyn WifiScanner>) -> LocatorResult<()> {
        let mut collector = WifiCollector::new(scanner, self.config.scan.clone());
        if self.is_tracking() {
            collector.start(self.histogram_tx.clone())?;
        }
        self.collectors.push(collector);
        Ok(())
    }

    /// Replace the per-floor map data. The lowest floor becomes active
    /// unless the active floor is still present.
    pub fn set_floors(&self, floors: BTreeMap<FloorId, FloorData>) {
        let mut wifi = self.core.wifi.lock();
        wifi.matchers.clear();
        wifi.edges.clear();
        for (floor, data) in floors {
            wifi.matchers.insert(floor, FingerprintMatcher::new(data.fingerprints));
            wifi.edges.insert(floor, data.edges);
        }

        let keep = wifi.active_floor.filter(|f| wifi.matchers.contains_key(f));
        match keep.or_else(|| wifi.matchers.keys().next().copied()) {
            Some(floor) => self.core.switch_floor(&mut wifi, floor),
            None => {
                wifi.active_floor = None;
                self.core.fix.lock().edges.clear();
            }
        }
        log::info!("Loaded map data for {} floors", wifi.matchers.len());
    }

    pub fn select_floor(&self, floor: FloorId) -> LocatorResult<()> {
        let mut wifi = self.core.wifi.lock();
        if !wifi.matchers.contains_key(&floor) {
            return Err(LocatorError::UnknownFloor(floor));
        }
        if wifi.active_floor != Some(floor) {
            log::info!("Switching to floor {}", floor);
            self.core.switch_floor(&mut wifi, floor);
        }
        Ok(())
    }

    pub fn active_floor(&self) -> Option<FloorId> {
        self.core.wifi.lock().active_floor
    }

    /// Floor the histogram most likely belongs to
    pub fn detect_floor(&self, histogram: &SignalHistogram) -> Option<FloorId> {
        detect_floor(&self.core.wifi.lock().matchers, histogram)
    }

    pub fn set_map_metadata(&self, metadata: MapMetadata) {
        let dr = &self.core.dead_reckoning;
        dr.set_base_angle(metadata.base_angle_deg);
        dr.set_scale(metadata.scale);

        let mut fix = self.core.fix.lock();
        fix.particle_filter.set_scale(metadata.scale);
        fix.map = metadata;
    }

    pub fn localization_mode(&self) -> LocalizationMode {
        self.config.localization_mode
    }

    /// Switch the localization mode, resetting mode specific state.
    /// Selecting ParticleFilter reseeds the cloud at the current position.
    pub fn set_localization_mode(&mut self, mode: LocalizationMode) {
        self.config.localization_mode = mode;

        let mut fix = self.core.fix.lock();
        fix.mode = mode;
        fix.smoother.clear();
        fix.particle_filter.reset();
        // a delta gathered under the old mode must not leak into the new one
        self.core.fusion.take_delta();

        let mut particles = None;
        if mode == LocalizationMode::ParticleFilter {
            if let Some(p) = self.core.fusion.current_point() {
                fix.particle_filter.initialize(p.x, p.y);
                particles = Some(fix.particle_filter.particles().to_vec());
            }
        }
        drop(fix);

        if let Some(particles) = particles {
            self.core.publish_particles(particles);
        }
        log::info!("Localization mode set to {:?}", mode);
    }

    pub fn set_outlier_mode(&mut self, mode: OutlierMode) {
        self.config.outlier_mode = mode;
        self.core.wifi.lock().eliminator = build_eliminator(mode, &self.config);
    }

    pub fn set_statistic_filter_mode(&mut self, mode: StatisticFilterMode) {
        self.config.statistic_filter_mode = mode;
        let mut fix = self.core.fix.lock();
        fix.statistic_filter_mode = mode;
        fix.smoother.clear();
    }

    pub fn set_map_matching_mode(&mut self, mode: MapMatchingMode) {
        self.config.map_matching_mode = mode;
        self.core.fix.lock().map_matching_mode = mode;
    }

    pub fn set_auto_floor_detection(&mut self, enabled: bool) {
        self.config.auto_floor_detection = enabled;
        self.core.wifi.lock().auto_floor_detection = enabled;
    }

    /// Start sensors, scanners and the fix tick; no-op when already tracking
    pub fn start_tracking(&mut self) -> LocatorResult<()> {
        if self.workers.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = unbounded::<()>();
        let mut handles = Vec::with_capacity(2);

        let core = Arc::clone(&self.core);
        let histograms = self.histogram_rx.clone();
        let stop = stop_rx.clone();
        handles.push(spawn_worker("locator-matching", move || loop {
            select! {
                recv(histograms) -> msg => match msg {
                    Ok(histogram) => {
                        core.process_histogram(&histogram);
                    }
                    Err(_) => break,
                },
                recv(stop) -> _ => break,
            }
        })?);

        let core = Arc::clone(&self.core);
        let period = Duration::from_millis(self.config.tick_period_ms.max(1));
        let tick_thread = spawn_worker("locator-tick", move || {
            let ticker = tick(period);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        core.tick();
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
        });
        match tick_thread {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                drop(stop_tx);
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(e);
            }
        }
        self.workers = Some(TrackingWorkers { stop_tx, handles });

        // missing sensors degrade tracking, they never stop it
        if let Err(e) = self.core.dead_reckoning.start_sensors() {
            log::warn!("Dead reckoning unavailable: {}", e);
        }
        for collector in &mut self.collectors {
            if let Err(e) = collector.start(self.histogram_tx.clone()) {
                log::warn!("WiFi scanner failed to start: {}", e);
            }
        }

        log::info!(
            "Tracking started ({:?} mode, {} ms tick)",
            self.config.localization_mode,
            period.as_millis()
        );
        Ok(())
    }

    /// Halt everything and clear the published position; no-op when stopped
    pub fn stop_tracking(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };

        for collector in &mut self.collectors {
            collector.stop();
        }
        self.core.dead_reckoning.stop_sensors();

        // disconnecting the stop channel wakes every worker
        drop(workers.stop_tx);
        for handle in workers.handles {
            if handle.join().is_err() {
                log::warn!("Locator worker thread panicked");
            }
        }

        while self.histogram_rx.try_recv().is_ok() {}
        self.core.clear_position();
        log::info!("Tracking stopped");
    }

    /// Queue a histogram for matching without blocking
    pub fn add_histogram(&self, histogram: SignalHistogram) {
        if self.histogram_tx.send(histogram).is_err() {
            log::warn!("Histogram channel closed, dropping histogram");
        }
    }

    /// Match a histogram on the calling thread, storing the result as the
    /// pending WiFi point
    pub fn process_histogram(&self, histogram: &SignalHistogram) -> Option<Point2D> {
        self.core.process_histogram(histogram)
    }

    /// Run one fix tick on the calling thread
    pub fn tick(&self) -> Option<Point2D> {
        self.core.tick()
    }

    /// Last published fix
    pub fn current_position(&self) -> Option<Point2D> {
        self.core.fix.lock().published
    }

    pub fn subscribe_fixes(&self) -> Receiver<Point2D> {
        self.core.fix_subscribers.subscribe()
    }

    pub fn subscribe_diagnostics(&self) -> Receiver<Diagnostics> {
        self.core.diagnostics_subscribers.subscribe()
    }

    /// Latest diagnostics snapshot
    pub fn diagnostics(&self) -> Diagnostics {
        self.core.diagnostics.lock().clone()
    }
}

impl Drop for Locator {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}
