//! # delivery
//!
//! why: the standard pick-up-and-drop-off request
//! relations: implements request.rs traits, produces task.rs phases
//! what: Delivery description, DeliveryModel

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::estimate::{
    as_seconds, Constraints, Estimate, EstimateCache, Parameters, Position, State,
};
use crate::request::{Description, Model};
use crate::task::Phase;

/// Carry something from `pickup` to `dropoff`
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub pickup: Position,
    pub pickup_wait: Duration,
    pub dropoff: Position,
    pub dropoff_wait: Duration,
}

impl Delivery {
    pub fn new(
        pickup: Position,
        pickup_wait: Duration,
        dropoff: Position,
        dropoff_wait: Duration,
    ) -> Self {
        Self {
            pickup,
            pickup_wait,
            dropoff,
            dropoff_wait,
        }
    }

    /// The phases an active delivery goes through, with travel estimated
    /// from `start` using `parameters`
    pub fn phases(&self, start: &Position, parameters: &Parameters) -> Vec<Phase> {
        vec![
            Phase::new(
                "Go to pick up",
                format!("Moving to ({}, {})", self.pickup.x, self.pickup.y),
                parameters.travel_time(start, &self.pickup),
            ),
            Phase::new("Pick up", "Waiting for the item to be loaded", self.pickup_wait),
            Phase::new(
                "Go to drop off",
                format!("Moving to ({}, {})", self.dropoff.x, self.dropoff.y),
                parameters.travel_time(&self.pickup, &self.dropoff),
            ),
            Phase::new("Drop off", "Waiting for the item to be unloaded", self.dropoff_wait),
        ]
    }
}

impl Description for Delivery {
    fn make_model(
        &self,
        earliest_start_time: DateTime<Utc>,
        parameters: &Parameters,
    ) -> Arc<dyn Model> {
        let haul = parameters.travel_time(&self.pickup, &self.dropoff);
        Arc::new(DeliveryModel {
            earliest_start_time,
            parameters: *parameters,
            pickup: self.pickup,
            dropoff: self.dropoff,
            haul,
            idle: self.pickup_wait + self.dropoff_wait,
        })
    }
}

/// Model of a delivery for one robot
#[derive(Debug, Clone)]
pub struct DeliveryModel {
    earliest_start_time: DateTime<Utc>,
    parameters: Parameters,
    pickup: Position,
    dropoff: Position,
    /// Travel time from pickup to dropoff
    haul: Duration,
    /// Total dwell time at both ends
    idle: Duration,
}

impl Model for DeliveryModel {
    fn estimate_finish(
        &self,
        initial_state: &State,
        constraints: &Constraints,
        cache: &EstimateCache,
    ) -> Option<Estimate> {
        let approach = cache.travel_time(&initial_state.location, &self.pickup, &self.parameters);

        let wait_until = (self.earliest_start_time - approach).max(initial_state.time);
        let finish_time = wait_until + approach + self.invariant_duration();

        let moving = as_seconds(approach + self.haul);
        let standing = as_seconds(self.idle);
        let drain = moving * self.parameters.motion_drain + standing * self.parameters.idle_drain;
        let battery_soc = initial_state.battery_soc - drain;

        if battery_soc < constraints.threshold_soc {
            debug!(
                battery_soc,
                threshold = constraints.threshold_soc,
                "delivery is infeasible on the remaining charge"
            );
            return None;
        }

        Some(Estimate {
            finish_state: State::new(self.dropoff, finish_time, battery_soc),
            wait_until,
        })
    }

    fn invariant_duration(&self) -> Duration {
        self.haul + self.idle
    }
}
