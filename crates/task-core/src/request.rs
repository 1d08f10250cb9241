//! # request
//!
//! why: describe work a fleet is asked to do and how to predict its cost
//! relations: uses priority.rs and estimate.rs, implemented by delivery.rs, booked by task.rs
//! what: Tag, Model and Description traits, Request

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::estimate::{Constraints, Estimate, EstimateCache, Parameters, State};
use crate::priority::PriorityPtr;

/// Identifying information of a request
#[derive(Debug, Clone)]
pub struct Tag {
    id: String,
    earliest_start_time: DateTime<Utc>,
    priority: Option<PriorityPtr>,
    automatic: bool,
}

impl Tag {
    pub fn new(
        id: impl Into<String>,
        earliest_start_time: DateTime<Utc>,
        priority: Option<PriorityPtr>,
        automatic: bool,
    ) -> Self {
        Self {
            id: id.into(),
            earliest_start_time,
            priority,
            automatic,
        }
    }

    /// Unique id of the request
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Earliest time the request may begin
    pub fn earliest_start_time(&self) -> DateTime<Utc> {
        self.earliest_start_time
    }

    /// `None` for requests without a priority
    pub fn priority(&self) -> Option<&PriorityPtr> {
        self.priority.as_ref()
    }

    /// Whether the request was generated by the system rather than a user
    pub fn automatic(&self) -> bool {
        self.automatic
    }
}

/// Predicts the outcome of one request for one robot
pub trait Model: Send + Sync {
    /// State of the robot once the request is finished, and how long it has
    /// to wait before starting. `None` if the robot cannot do it.
    fn estimate_finish(
        &self,
        initial_state: &State,
        constraints: &Constraints,
        cache: &EstimateCache,
    ) -> Option<Estimate>;

    /// The part of the duration that does not depend on where the robot starts
    fn invariant_duration(&self) -> Duration;
}

/// What a request asks for. Each kind of request implements this.
pub trait Description: fmt::Debug + Send + Sync {
    fn make_model(
        &self,
        earliest_start_time: DateTime<Utc>,
        parameters: &Parameters,
    ) -> Arc<dyn Model>;
}

#[derive(Debug, Clone)]
pub struct Request {
    tag: Arc<Tag>,
    description: Arc<dyn Description>,
}

impl Request {
    pub fn new(
        id: impl Into<String>,
        earliest_start_time: DateTime<Utc>,
        priority: Option<PriorityPtr>,
        description: Arc<dyn Description>,
        automatic: bool,
    ) -> Self {
        let tag = Tag::new(id, earliest_start_time, priority, automatic);
        Self::from_tag(Arc::new(tag), description)
    }

    pub fn from_tag(tag: Arc<Tag>, description: Arc<dyn Description>) -> Self {
        Self { tag, description }
    }

    pub fn tag(&self) -> &Arc<Tag> {
        &self.tag
    }

    pub fn description(&self) -> &Arc<dyn Description> {
        &self.description
    }

    /// Build the model of this request for a robot with `parameters`
    pub fn make_model(&self, parameters: &Parameters) -> Arc<dyn Model> {
        self.description
            .make_model(self.tag.earliest_start_time(), parameters)
    }
}
