//! # priority
//!
//! why: let the planner order competing requests
//! relations: attached to request tags in request.rs
//! what: Priority trait, BinaryPriority scheme, ordering helper

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A priority attached to a request. Higher rank wins.
pub trait Priority: fmt::Debug + Send + Sync {
    fn rank(&self) -> u64;
}

pub type PriorityPtr = Arc<dyn Priority>;

/// Two-level priority scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BinaryPriority {
    Low,
    High,
}

impl BinaryPriority {
    pub fn high() -> PriorityPtr {
        Arc::new(Self::High)
    }

    pub fn low() -> PriorityPtr {
        Arc::new(Self::Low)
    }
}

impl Priority for BinaryPriority {
    fn rank(&self) -> u64 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

/// Order two optional priorities. A request without a priority ranks below
/// any request that has one.
pub fn compare(a: Option<&dyn Priority>, b: Option<&dyn Priority>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.rank().cmp(&b.rank()),
    }
}
