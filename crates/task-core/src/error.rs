//! # error
//!
//! why: one error type for everything in task-core that can be rejected
//! relations: returned by task.rs transitions/backups and estimate.rs validation
//! what: TaskError

use thiserror::Error;

use crate::task::Status;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {task_id} cannot {action} while {status:?}")]
    InvalidTransition {
        task_id: String,
        action: &'static str,
        status: Status,
    },

    #[error("backup state could not be decoded: {0}")]
    InvalidBackup(#[from] serde_json::Error),

    #[error("backup belongs to task {found}, not {expected}")]
    BackupMismatch { expected: String, found: String },

    #[error("backup has {completed} completed phases but the task only has {available}")]
    BackupOutOfRange { completed: usize, available: usize },

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

pub type Result<T> = std::result::Result<T, TaskError>;
