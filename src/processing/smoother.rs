//! Windowed damping of published fixes

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::Point2D;
use crate::processing::outlier::median;

/// Statistic applied over the fix history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatisticFilterMode {
    None,
    Median,
    Average,
}

/// Bounded FIFO of recent fixes
#[derive(Debug, Clone)]
pub struct PositionHistorySmoother {
    capacity: usize,
    history: VecDeque<Point2D>,
}

impl PositionHistorySmoother {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a fix, evicting the oldest beyond capacity
    pub fn add(&mut self, point: Point2D) {
        self.history.push_back(point);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Componentwise median of the buffered fixes
    pub fn median_point(&self) -> Option<Point2D> {
        let mut xs: Vec<f64> = self.history.iter().map(|p| p.x).collect();
        let mut ys: Vec<f64> = self.history.iter().map(|p| p.y).collect();
        Some(Point2D::new(median(&mut xs)?, median(&mut ys)?))
    }

    /// Componentwise mean of the buffered fixes
    pub fn average_point(&self) -> Option<Point2D> {
        if self.history.is_empty() {
            return None;
        }
        let n = self.history.len() as f64;
        let (sx, sy) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point2D::new(sx / n, sy / n))
    }

    /// Add `point` and return the smoothed fix for `mode`
    pub fn apply(&mut self, mode: StatisticFilterMode, point: Point2D) -> Point2D {
        match mode {
            StatisticFilterMode::None => point,
            StatisticFilterMode::Median => {
                self.add(point);
                self.median_point().unwrap_or(point)
            }
            StatisticFilterMode::Average => {
                self.add(point);
                self.average_point().unwrap_or(point)
            }
        }
    }
}
