//! # task-core
//!
//! why: support library for multi-robot task allocation with per-task diagnostic history
//! relations: task-storage persists the backups produced here
//! what: diagnostic log and incremental readers, requests and estimates, active tasks, monitor

pub mod delivery;
pub mod error;
pub mod estimate;
pub mod log;
pub mod monitor;
pub mod priority;
pub mod reader;
pub mod request;
pub mod task;

pub use delivery::{Delivery, DeliveryModel};
pub use error::TaskError;
pub use estimate::{Constraints, Estimate, EstimateCache, Parameters, Position, State};
pub use log::{Clock, Entry, Log, LogId, Tier, View};
pub use monitor::{Monitor, MonitorConfig};
pub use priority::{BinaryPriority, Priority, PriorityPtr};
pub use reader::{Iter, Iterable, Reader};
pub use request::{Description, Model, Request, Tag};
pub use task::{ActiveTask, Backup, Phase, Status};
