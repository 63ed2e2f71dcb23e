use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use indoor_locator::api::{FingerprintDocument, FloorData, Locator};
use indoor_locator::core::{
    current_time_ms, Edge, Fingerprint, GeoPoint, GeoReference, MapMetadata, Point2D, RssiSample,
};
use indoor_locator::hardware::{MockSensorPlatform, MockWifiScanner, ScanRound, SensorKind};
use indoor_locator::processing::SignalHistogram;
use indoor_locator::utils::LocatorConfig;

const CORRIDOR_LENGTH_M: f64 = 30.0;
const FINGERPRINT_SPACING_M: f64 = 2.0;
const WALK_SPEED_M_S: f64 = 1.0;
const SIMULATION_STEP_MS: u64 = 50;
const SCAN_INTERVAL_MS: u64 = 1000;

/// Simulated access points along the corridor
fn access_points() -> Vec<(&'static str, Point2D)> {
    vec![
        ("ap-west", Point2D::new(0.0, 3.0)),
        ("ap-middle", Point2D::new(15.0, -3.0)),
        ("ap-east", Point2D::new(30.0, 3.0)),
    ]
}

/// Log-distance path loss model
fn rssi_at(position: &Point2D, ap: &Point2D) -> i32 {
    let d = position.distance_to(ap).max(1.0);
    (-40.0 - 25.0 * d.log10()).round() as i32
}

fn scan_at(position: &Point2D, timestamp_ms: u64) -> ScanRound {
    access_points()
        .iter()
        .map(|(id, ap)| RssiSample::new(*id, rssi_at(position, ap), timestamp_ms))
        .collect()
}

fn corridor_floor() -> FloorData {
    let count = (CORRIDOR_LENGTH_M / FINGERPRINT_SPACING_M) as usize;
    let fingerprints = (0..=count)
        .map(|i| {
            let position = Point2D::new(i as f64 * FINGERPRINT_SPACING_M, 0.0);
            let levels = access_points()
                .into_iter()
                .map(|(id, ap)| (id, rssi_at(&position, &ap)));
            let id = format!("corridor-{:02}", i);
            Fingerprint {
                histogram: SignalHistogram::from_levels(id.clone(), levels),
                id,
                position,
            }
        })
        .collect();
    let edges = vec![Edge::new(Point2D::new(0.0, 0.0), Point2D::new(CORRIDOR_LENGTH_M, 0.0))];
    FloorData::new(fingerprints, edges)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let export = args.iter().any(|a| a == "--export");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => LocatorConfig::from_file(path)?,
        None => LocatorConfig {
            tick_period_ms: 100,
            ..Default::default()
        },
    };

    let floor = corridor_floor();
    if export {
        let reference = GeoReference::new(
            GeoPoint {
                latitude: 47.4979,
                longitude: 19.0402,
            },
            1.0,
        );
        let document = FingerprintDocument::from_fingerprints(&floor.fingerprints, &reference);
        println!("{}", document.to_json()?);
        return Ok(());
    }

    let mut locator = Locator::new(config)?;
    locator.set_floors(BTreeMap::from([(0, floor)]));
    locator.set_map_metadata(MapMetadata {
        base_angle_deg: 0.0,
        scale: 1.0,
        bounding_box_center: Some(Point2D::new(CORRIDOR_LENGTH_M / 2.0, 0.0)),
    });

    let platform = MockSensorPlatform::new(true);
    let sensors = platform.handle();
    locator.set_sensor_platform(Box::new(platform));
    let scanner = MockWifiScanner::new();
    let wifi = scanner.handle();
    locator.register_wifi_scanner(Box::new(scanner))?;

    let fixes = locator.subscribe_fixes();
    locator.start_tracking()?;

    // walk east along the corridor
    let mut truth = Point2D::new(1.0, 0.0);
    let mut elapsed_ms = 0;
    while truth.x < CORRIDOR_LENGTH_M - 1.0 {
        sensors.emit(SensorKind::Accelerometer, [0.0, 0.0, 9.81]);
        sensors.emit(SensorKind::MagneticField, [-20.0, 0.0, -40.0]);
        sensors.emit(SensorKind::LinearAcceleration, [0.9, 0.6, 0.2]);

        if elapsed_ms % SCAN_INTERVAL_MS == 0 {
            wifi.emit_round(scan_at(&truth, current_time_ms()));
        }

        thread::sleep(Duration::from_millis(SIMULATION_STEP_MS));
        elapsed_ms += SIMULATION_STEP_MS;
        truth.x += WALK_SPEED_M_S * SIMULATION_STEP_MS as f64 / 1000.0;

        for fix in fixes.try_iter() {
            println!(
                "t={:>5} ms  truth=({:6.2}, {:5.2})  fix=({:6.2}, {:5.2})  error={:.2} m",
                elapsed_ms,
                truth.x,
                truth.y,
                fix.x,
                fix.y,
                fix.distance_to(&truth)
            );
        }
    }

    let diagnostics = locator.diagnostics();
    println!(
        "Last match: {} neighbours, {} outliers, {} particles",
        diagnostics.neighbours.len(),
        diagnostics.outliers.len(),
        diagnostics.particles.len()
    );

    locator.stop_tracking();
    Ok(())
}
