//! # task
//!
//! why: carry out a booked request phase by phase and narrate it to a log
//! relations: writes log.rs entries, booked from request.rs tags, backed up via task-storage
//! what: Phase, Status, Backup, ActiveTask state machine

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TaskError};
use crate::log::{Log, View};
use crate::request::Tag;

/// One step of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    name: String,
    detail: String,
    estimate: Duration,
}

impl Phase {
    pub fn new(name: impl Into<String>, detail: impl Into<String>, estimate: Duration) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            estimate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn estimate(&self) -> Duration {
        self.estimate
    }
}

/// Lifecycle of an active task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Booked but not started
    Queued,
    /// Working through its phases
    Underway,
    /// Every phase finished
    Completed,
    /// Stopped on request
    Canceled,
    /// Stopped abruptly
    Killed,
}

impl Status {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Killed)
    }
}

/// Snapshot of a task's progress that can be used to restore it later.
///
/// `sequence` grows with every backup the task produces so that stores can
/// tell a newer backup from a stale one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    sequence: u64,
    state: String,
}

impl Backup {
    pub fn new(sequence: u64, state: impl Into<String>) -> Self {
        Self {
            sequence,
            state: state.into(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// JSON document describing the task's progress
    pub fn state(&self) -> &str {
        &self.state
    }
}

/// contents of Backup::state
#[derive(Debug, Serialize, Deserialize)]
struct Progress {
    task_id: String,
    status: Status,
    completed: usize,
}

/// A task being executed by a robot
#[derive(Debug)]
pub struct ActiveTask {
    tag: Arc<Tag>,
    log: Log,
    pending: VecDeque<Phase>,
    active: Option<Phase>,
    completed: Vec<Phase>,
    status: Status,
    backup_sequence: u64,
}

impl ActiveTask {
    /// Book a task that will run through `phases` in order
    pub fn new(tag: Arc<Tag>, phases: Vec<Phase>) -> Self {
        Self::with_log(tag, phases, Log::new())
    }

    /// Same as [`ActiveTask::new`] but narrating into `log`
    pub fn with_log(tag: Arc<Tag>, phases: Vec<Phase>, log: Log) -> Self {
        Self {
            tag,
            log,
            pending: phases.into(),
            active: None,
            completed: Vec::new(),
            status: Status::Queued,
            backup_sequence: 0,
        }
    }

    /// Rebuild a task from a backup, skipping the phases it had already finished
    pub fn restore(tag: Arc<Tag>, phases: Vec<Phase>, backup: &Backup, log: Log) -> Result<Self> {
        let progress: Progress = serde_json::from_str(backup.state())?;
        if progress.task_id != tag.id() {
            return Err(TaskError::BackupMismatch {
                expected: tag.id().to_string(),
                found: progress.task_id,
            });
        }
        if progress.completed > phases.len() {
            return Err(TaskError::BackupOutOfRange {
                completed: progress.completed,
                available: phases.len(),
            });
        }

        let mut task = Self::with_log(tag, phases, log);
        task.backup_sequence = backup.sequence();
        task.completed = task.pending.drain(..progress.completed).collect();
        task.log.info(format!(
            "Restored task [{}] from backup #{}, skipping {} finished phase(s)",
            task.tag.id(),
            backup.sequence(),
            progress.completed
        ));
        info!(task = task.tag.id(), skipped = progress.completed, "restored task from backup");

        match progress.status {
            Status::Queued => {}
            Status::Underway => {
                task.status = Status::Underway;
                task.start_next_phase();
            }
            finished => {
                task.pending.clear();
                task.status = finished;
            }
        }

        Ok(task)
    }

    /// Start working on the first phase
    pub fn begin(&mut self) -> Result<()> {
        self.expect(Status::Queued, "begin")?;
        self.status = Status::Underway;
        self.log.info(format!("Beginning task [{}]", self.tag.id()));
        info!(task = self.tag.id(), phases = self.pending.len(), "task started");
        self.start_next_phase();
        Ok(())
    }

    /// Finish the current phase and move to the next one. Returns the phase
    /// now underway, or `None` once the task is complete.
    pub fn advance(&mut self) -> Result<Option<&Phase>> {
        self.expect(Status::Underway, "advance")?;
        if let Some(phase) = self.active.take() {
            self.log.info(format!("Finished phase [{}]", phase.name()));
            self.completed.push(phase);
        }
        self.start_next_phase();
        Ok(self.active.as_ref())
    }

    /// Stop the task gracefully
    pub fn cancel(&mut self) -> Result<()> {
        self.stop(Status::Canceled, "cancel")?;
        self.log.warn(format!("Task [{}] was canceled", self.tag.id()));
        warn!(task = self.tag.id(), "task canceled");
        Ok(())
    }

    /// Stop the task immediately
    pub fn kill(&mut self) -> Result<()> {
        self.stop(Status::Killed, "kill")?;
        self.log.error(format!("Task [{}] was killed", self.tag.id()));
        error!(task = self.tag.id(), "task killed");
        Ok(())
    }

    /// Record a problem that does not change the task's status
    pub fn report_issue(&mut self, text: impl Into<String>) {
        self.log.warn(text);
    }

    /// Snapshot of everything the task has narrated so far
    pub fn view(&self) -> View {
        self.log.view()
    }

    pub fn backup(&mut self) -> Result<Backup> {
        let progress = Progress {
            task_id: self.tag.id().to_string(),
            status: self.status,
            completed: self.completed.len(),
        };
        self.backup_sequence += 1;
        debug!(task = self.tag.id(), sequence = self.backup_sequence, "task backup taken");
        Ok(Backup::new(self.backup_sequence, serde_json::to_string(&progress)?))
    }

    /// Sum of the estimates of the active and pending phases
    pub fn estimate_remaining(&self) -> Duration {
        self.active
            .iter()
            .chain(self.pending.iter())
            .fold(Duration::zero(), |total, phase| total + phase.estimate())
    }

    pub fn tag(&self) -> &Arc<Tag> {
        &self.tag
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn active_phase(&self) -> Option<&Phase> {
        self.active.as_ref()
    }

    pub fn pending_phases(&self) -> impl Iterator<Item = &Phase> {
        self.pending.iter()
    }

    pub fn completed_phases(&self) -> &[Phase] {
        &self.completed
    }

    fn start_next_phase(&mut self) {
        match self.pending.pop_front() {
            Some(phase) => {
                self.log.info(format!("Beginning phase [{}]: {}", phase.name(), phase.detail()));
                debug!(task = self.tag.id(), phase = phase.name(), "phase started");
                self.active = Some(phase);
            }
            None => {
                self.status = Status::Completed;
                self.log.info(format!("Task [{}] is complete", self.tag.id()));
                info!(task = self.tag.id(), "task completed");
            }
        }
    }

    fn stop(&mut self, status: Status, action: &'static str) -> Result<()> {
        if self.status.is_finished() {
            return Err(self.invalid(action));
        }
        self.status = status;
        self.active = None;
        self.pending.clear();
        Ok(())
    }

    fn expect(&self, status: Status, action: &'static str) -> Result<()> {
        if self.status == status {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> TaskError {
        TaskError::InvalidTransition {
            task_id: self.tag.id().to_string(),
            action,
            status: self.status,
        }
    }
}
