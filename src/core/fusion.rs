//! Fused state shared between sensor callbacks, WiFi matching and the fix tick
//!
//! One mutex guards every cross-cutting value. Each operation takes the lock
//! for a single read or write and releases it before returning.

use parking_lot::Mutex;
use std::sync::Arc;

use super::types::{DeltaVector, Point2D};

/// Values written by one pipeline stage and read by another
#[derive(Debug, Default)]
pub struct FusedState {
    current_point: Option<Point2D>,
    pending_wifi_point: Option<Point2D>,
    azimuth: Option<f64>,
    moving: bool,
    delta: DeltaVector,
}

/// Cloneable handle to the fusion lock
#[derive(Debug, Clone, Default)]
pub struct SharedFusion {
    inner: Arc<Mutex<FusedState>>,
}

impl SharedFusion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_point(&self) -> Option<Point2D> {
        self.inner.lock().current_point
    }

    pub fn set_current_point(&self, point: Option<Point2D>) {
        self.inner.lock().current_point = point;
    }

    /// Store the latest WiFi estimate, replacing any unconsumed one
    pub fn set_pending_wifi(&self, point: Point2D) {
        self.inner.lock().pending_wifi_point = Some(point);
    }

    /// Consume the pending WiFi estimate, if any
    pub fn take_pending_wifi(&self) -> Option<Point2D> {
        self.inner.lock().pending_wifi_point.take()
    }

    pub fn set_heading(&self, azimuth: Option<f64>, moving: bool) {
        let mut state = self.inner.lock();
        state.azimuth = azimuth;
        state.moving = moving;
    }

    pub fn azimuth(&self) -> Option<f64> {
        self.inner.lock().azimuth
    }

    pub fn is_moving(&self) -> bool {
        self.inner.lock().moving
    }

    /// Integrate one step along the current heading.
    ///
    /// Returns the step that was added, or `None` when standing still or
    /// the heading is unknown.
    pub fn integrate_step(&self, distance: f64, base_angle: f64) -> Option<DeltaVector> {
        let mut state = self.inner.lock();
        let azimuth = match (state.moving, state.azimuth) {
            (true, Some(azimuth)) => azimuth,
            _ => return None,
        };
        let direction = azimuth - base_angle;
        let step = DeltaVector::new(distance * direction.sin(), distance * direction.cos());
        state.delta.dx += step.dx;
        state.delta.dy += step.dy;
        Some(step)
    }

    /// Read and zero the accumulated displacement
    pub fn take_delta(&self) -> DeltaVector {
        std::mem::take(&mut self.inner.lock().delta)
    }

    /// Drop every fused value
    pub fn clear(&self) {
        *self.inner.lock() = FusedState::default();
    }

    /// Drop position related values, keeping heading state
    pub fn clear_position(&self) {
        let mut state = self.inner.lock();
        state.current_point = None;
        state.pending_wifi_point = None;
        state.delta = DeltaVector::default();
    }
}
