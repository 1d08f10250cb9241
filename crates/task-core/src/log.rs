//! # log
//!
//! why: record what a task is doing as an append-only list of diagnostic entries
//! relations: read back through reader.rs, written by task.rs, consumed by monitor.rs
//! what: Tier, Entry, Log (single writer), View (immutable snapshot of a range)

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::reader::Iterable;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Normal narration of progress
    Info,
    /// Something unexpected that the task can work around
    Warning,
    /// Something that stops the task from proceeding normally
    Error,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A single timestamped diagnostic record. Never changes once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    tier: Tier,
    time: DateTime<Utc>,
    text: String,
}

impl Entry {
    /// Create a new entry
    pub fn new(tier: Tier, time: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            tier,
            time,
            text: text.into(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.time.to_rfc3339(), self.tier, self.text)
    }
}

/// Source of timestamps for new entries
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Backing store shared by a log and everything that reads it.
///
/// Entries are only ever pushed, so an entry's index is a stable position
/// that stays valid for as long as anyone holds the arena.
pub(crate) type Arena = RwLock<Vec<Arc<Entry>>>;

/// Identity of a log's arena, used by readers to recognise the same log
/// across views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogId(usize);

impl LogId {
    pub(crate) fn of(arena: &Arc<Arena>) -> Self {
        Self(Arc::as_ptr(arena) as *const () as usize)
    }
}

/// Closed range of positions `[begin, last]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) begin: usize,
    pub(crate) last: usize,
}

impl Span {
    /// Build a span, or nothing if either end is missing or the ends are crossed
    pub(crate) fn between(begin: Option<usize>, last: Option<usize>) -> Option<Self> {
        match (begin, last) {
            (Some(begin), Some(last)) if begin <= last => Some(Self { begin, last }),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.last - self.begin + 1
    }
}

/// Append-only diagnostic log with a pluggable clock.
///
/// The owner of a `Log` is its only writer. Views and iterables hold shared
/// access to the entries and may outlive the log itself.
pub struct Log {
    clock: Clock,
    entries: Arc<Arena>,
}

impl Log {
    /// Create a log stamped with the wall clock
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Create a log stamped by `clock`, typically a fixed clock in tests
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            clock: Arc::new(clock),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a log that shares an existing clock
    pub fn with_shared_clock(clock: Clock) -> Self {
        Self {
            clock,
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push_tier(Tier::Info, text.into());
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.push_tier(Tier::Warning, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push_tier(Tier::Error, text.into());
    }

    /// Append an entry that was built elsewhere, e.g. merged from another log
    pub fn insert(&mut self, entry: Entry) {
        self.entries.write().push(Arc::new(entry));
    }

    /// Snapshot the range of entries that exist right now
    pub fn view(&self) -> View {
        let len = self.entries.read().len();
        let span = len.checked_sub(1).map(|last| Span { begin: 0, last });
        View {
            shared: Arc::clone(&self.entries),
            span,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Identity that views of this log report
    pub fn id(&self) -> LogId {
        LogId::of(&self.entries)
    }

    fn push_tier(&mut self, tier: Tier, text: String) {
        let entry = Entry::new(tier, (self.clock)(), text);
        trace!(%tier, text = entry.text(), "appending log entry");
        self.insert(entry);
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("id", &self.id())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of a log's entries as of the moment it was taken.
///
/// `begin` and `last` are both absent when the log was empty; otherwise
/// `begin` is the first entry ever appended and `last` the newest one at
/// snapshot time. Entries appended afterwards are not part of the view.
#[derive(Clone)]
pub struct View {
    shared: Arc<Arena>,
    span: Option<Span>,
}

impl View {
    pub fn begin(&self) -> Option<usize> {
        self.span.map(|span| span.begin)
    }

    pub fn last(&self) -> Option<usize> {
        self.span.map(|span| span.last)
    }

    pub fn len(&self) -> usize {
        self.span.map_or(0, |span| span.len())
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_none()
    }

    /// Identity of the log this view was taken from
    pub fn identity(&self) -> LogId {
        LogId::of(&self.shared)
    }

    /// Every entry in the view, oldest first. Can be called any number of times.
    pub fn iter(&self) -> Iterable {
        Iterable::new(Arc::clone(&self.shared), self.span, false)
    }

    pub(crate) fn shared(&self) -> &Arc<Arena> {
        &self.shared
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("identity", &self.identity())
            .field("begin", &self.begin())
            .field("last", &self.last())
            .finish()
    }
}

impl<'a> IntoIterator for &'a View {
    type Item = Arc<Entry>;
    type IntoIter = crate::reader::Iter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter().iter()
    }
}
