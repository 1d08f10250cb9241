//! # estimate
//!
//! why: describe robot state and capabilities so request models can predict outcomes
//! relations: inputs to request.rs models, implemented by delivery.rs
//! what: Position, State, Constraints, Parameters, Estimate, EstimateCache

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

/// A point on the floor plan, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    fn key(&self) -> (u64, u64) {
        (self.x.to_bits(), self.y.to_bits())
    }
}

/// Where a robot is, when, and how much charge it has
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub location: Position,
    pub time: DateTime<Utc>,
    /// State of charge in `[0, 1]`
    pub battery_soc: f64,
}

impl State {
    pub fn new(location: Position, time: DateTime<Utc>, battery_soc: f64) -> Self {
        Self {
            location,
            time,
            battery_soc,
        }
    }
}

/// Limits the planner must respect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Tasks that would leave the battery below this are infeasible
    pub threshold_soc: f64,
    /// Charge level a recharge brings the battery back up to
    pub recharge_soc: f64,
}

impl Constraints {
    pub fn new(threshold_soc: f64, recharge_soc: f64) -> Result<Self> {
        check_fraction("threshold_soc", threshold_soc)?;
        check_fraction("recharge_soc", recharge_soc)?;
        if threshold_soc > recharge_soc {
            return Err(TaskError::InvalidParameter {
                name: "threshold_soc",
                value: threshold_soc,
            });
        }
        Ok(Self {
            threshold_soc,
            recharge_soc,
        })
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            threshold_soc: 0.2,
            recharge_soc: 1.0,
        }
    }
}

/// Physical characteristics of a robot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Cruising speed in meters per second
    pub nominal_speed: f64,
    /// Fraction of charge used per second of motion
    pub motion_drain: f64,
    /// Fraction of charge used per second while standing still
    pub idle_drain: f64,
}

impl Parameters {
    pub fn new(nominal_speed: f64, motion_drain: f64, idle_drain: f64) -> Result<Self> {
        if !(nominal_speed > 0.0) || !nominal_speed.is_finite() {
            return Err(TaskError::InvalidParameter {
                name: "nominal_speed",
                value: nominal_speed,
            });
        }
        check_non_negative("motion_drain", motion_drain)?;
        check_non_negative("idle_drain", idle_drain)?;
        Ok(Self {
            nominal_speed,
            motion_drain,
            idle_drain,
        })
    }

    /// Time to drive straight from `from` to `to`
    pub fn travel_time(&self, from: &Position, to: &Position) -> Duration {
        seconds(from.distance_to(to) / self.nominal_speed)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            nominal_speed: 1.0,
            motion_drain: 0.0002,
            idle_drain: 0.00005,
        }
    }
}

/// Predicted outcome of carrying out a request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Robot state once the request is done
    pub finish_state: State,
    /// Earliest time the robot should set off
    pub wait_until: DateTime<Utc>,
}

/// Memo of travel times shared between models during one planning pass
#[derive(Debug, Default)]
pub struct EstimateCache {
    travel: Mutex<HashMap<((u64, u64), (u64, u64)), Duration>>,
}

impl EstimateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Travel time between two positions, computed once per pair
    pub fn travel_time(&self, from: &Position, to: &Position, parameters: &Parameters) -> Duration {
        *self
            .travel
            .lock()
            .entry((from.key(), to.key()))
            .or_insert_with(|| parameters.travel_time(from, to))
    }

    pub fn len(&self) -> usize {
        self.travel.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.travel.lock().is_empty()
    }

    pub fn clear(&self) {
        self.travel.lock().clear();
    }
}

pub(crate) fn seconds(value: f64) -> Duration {
    Duration::milliseconds((value * 1000.0).round() as i64)
}

pub(crate) fn as_seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

fn check_fraction(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TaskError::InvalidParameter { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TaskError::InvalidParameter { name, value })
    }
}
