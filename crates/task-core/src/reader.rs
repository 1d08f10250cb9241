//! # reader
//!
//! why: let each consumer replay only the log entries it has not seen yet
//! relations: consumes log.rs views, owned by monitor.rs
//! what: Reader (per-log resume positions), Iterable (bounded range), Iter

use std::collections::HashMap;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::{Arc, Weak};

use crate::log::{Arena, Entry, LogId, Span, View};

/// What a reader remembers about one log
#[derive(Debug)]
struct Memory {
    /// Does not keep the entries alive; a dead reference means the log is gone
    weak: Weak<Arena>,
    /// Position of the last entry handed out for this log
    last: Option<usize>,
}

impl Memory {
    fn new() -> Self {
        Self {
            weak: Weak::new(),
            last: None,
        }
    }
}

/// Tracks, per log, how far this consumer has read.
///
/// Consecutive calls to [`Reader::iterate`] for the same log hand out the
/// entry that was last in the previous call again as the first entry of the
/// next call. Consumers that care should use [`Iterable::without_boundary`].
#[derive(Debug, Default)]
pub struct Reader {
    memories: HashMap<LogId, Memory>,
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entries of `view` that are new since this reader last saw the
    /// same log, including the previous boundary entry.
    pub fn iterate(&mut self, view: &View) -> Iterable {
        let memory = self
            .memories
            .entry(view.identity())
            .or_insert_with(Memory::new);

        let mut resumed = false;
        if memory.weak.upgrade().is_some() {
            match memory.last {
                Some(_) => resumed = true,
                None => memory.last = view.begin(),
            }
        } else {
            // first sighting, or the log we tracked under this identity is gone
            memory.weak = Arc::downgrade(view.shared());
            memory.last = view.begin();
        }

        let span = Span::between(memory.last, view.last());
        let iterable = Iterable::new(Arc::clone(view.shared()), span, resumed);

        // an older view must not move the frontier backwards
        memory.last = match (memory.last, view.last()) {
            (Some(previous), last) if resumed => Some(last.map_or(previous, |l| previous.max(l))),
            (_, last) => last,
        };

        iterable
    }

    /// Number of logs this reader has a record for
    pub fn tracked(&self) -> usize {
        self.memories.len()
    }

    /// Drop records for logs whose entries no longer exist. Returns how many
    /// records were removed.
    pub fn forget_expired(&mut self) -> usize {
        let before = self.memories.len();
        self.memories
            .retain(|_, memory| memory.weak.strong_count() > 0);
        before - self.memories.len()
    }
}

/// A finite, restartable range of entries in append order
#[derive(Clone)]
pub struct Iterable {
    shared: Arc<Arena>,
    span: Option<Span>,
    resumed: bool,
}

impl Iterable {
    pub(crate) fn new(shared: Arc<Arena>, span: Option<Span>, resumed: bool) -> Self {
        Self {
            shared,
            span,
            resumed,
        }
    }

    /// Start a fresh pass over the range
    pub fn iter(&self) -> Iter {
        Iter {
            shared: Arc::clone(&self.shared),
            cursor: self.span.map(|span| Cursor {
                current: span.begin,
                last: span.last,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.span.map_or(0, |span| span.len())
    }

    pub fn is_empty(&self) -> bool {
        self.span.is_none()
    }

    /// Position of the first entry in the range
    pub fn first_position(&self) -> Option<usize> {
        self.span.map(|span| span.begin)
    }

    /// Whether the first entry was already delivered by the previous call
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// The same range without the redelivered boundary entry
    pub fn without_boundary(&self) -> Iterable {
        if !self.resumed {
            return self.clone();
        }

        let span = self
            .span
            .and_then(|span| Span::between(Some(span.begin + 1), Some(span.last)));
        Self::new(Arc::clone(&self.shared), span, false)
    }
}

impl fmt::Debug for Iterable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iterable")
            .field("span", &self.span)
            .field("resumed", &self.resumed)
            .finish()
    }
}

impl IntoIterator for Iterable {
    type Item = Arc<Entry>;
    type IntoIter = Iter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a Iterable {
    type Item = Arc<Entry>;
    type IntoIter = Iter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    current: usize,
    last: usize,
}

/// Cursor over an [`Iterable`]. Terminal once it steps past the bound.
#[derive(Clone)]
pub struct Iter {
    shared: Arc<Arena>,
    cursor: Option<Cursor>,
}

impl Iter {
    /// Entry under the cursor, or `None` once terminal
    pub fn get(&self) -> Option<Arc<Entry>> {
        let cursor = self.cursor?;
        self.shared.read().get(cursor.current).cloned()
    }

    pub fn position(&self) -> Option<usize> {
        self.cursor.map(|cursor| cursor.current)
    }

    pub fn is_end(&self) -> bool {
        self.cursor.is_none()
    }

    /// Step to the next entry. Stepping from the bound, or from a terminal
    /// cursor, leaves the cursor terminal.
    pub fn advance(&mut self) {
        self.cursor = match self.cursor {
            Some(cursor) if cursor.current < cursor.last => Some(Cursor {
                current: cursor.current + 1,
                last: cursor.last,
            }),
            _ => None,
        };
    }
}

impl Iterator for Iter {
    type Item = Arc<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.get()?;
        self.advance();
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .cursor
            .map_or(0, |cursor| cursor.last - cursor.current + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter {}

impl FusedIterator for Iter {}

impl PartialEq for Iter {
    fn eq(&self, other: &Self) -> bool {
        match (self.cursor, other.cursor) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.current == b.current && Arc::ptr_eq(&self.shared, &other.shared)
            }
            _ => false,
        }
    }
}

impl Eq for Iter {}

impl fmt::Debug for Iter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("position", &self.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Log;

    fn texts(iterable: &Iterable) -> Vec<String> {
        iterable.iter().map(|e| e.text().to_string()).collect()
    }

    #[test]
    fn fresh_reader_gets_everything() {
        let mut log = Log::new();
        log.info("a");
        log.info("b");

        let mut reader = Reader::new();
        let iterable = reader.iterate(&log.view());
        assert_eq!(texts(&iterable), vec!["a", "b"]);
        assert!(!iterable.is_resumed());
    }

    #[test]
    fn second_read_repeats_boundary() {
        let mut log = Log::new();
        log.info("a");
        log.info("b");

        let mut reader = Reader::new();
        reader.iterate(&log.view());
        log.info("c");

        let iterable = reader.iterate(&log.view());
        assert!(iterable.is_resumed());
        assert_eq!(texts(&iterable), vec!["b", "c"]);
        assert_eq!(texts(&iterable.without_boundary()), vec!["c"]);
    }

    #[test]
    fn empty_view_then_entries() {
        let mut log = Log::new();
        let mut reader = Reader::new();
        assert!(reader.iterate(&log.view()).is_empty());

        log.info("first");
        let iterable = reader.iterate(&log.view());
        assert_eq!(texts(&iterable), vec!["first"]);
    }

    #[test]
    fn older_view_does_not_rewind() {
        let mut log = Log::new();
        log.info("a");
        let old = log.view();
        log.info("b");
        log.info("c");

        let mut reader = Reader::new();
        reader.iterate(&log.view());
        assert!(reader.iterate(&old).is_empty());

        log.info("d");
        assert_eq!(texts(&reader.iterate(&log.view())), vec!["c", "d"]);
    }

    #[test]
    fn older_empty_view_does_not_rewind() {
        let mut log = Log::new();
        let empty = log.view();
        log.info("a");
        log.info("b");

        let mut reader = Reader::new();
        assert_eq!(texts(&reader.iterate(&log.view())), vec!["a", "b"]);
        assert!(reader.iterate(&empty).is_empty());

        let again = reader.iterate(&log.view());
        assert!(again.is_resumed());
        assert_eq!(texts(&again), vec!["b"]);
    }

    #[test]
    fn advancing_terminal_iter_is_a_no_op() {
        let log = Log::new();
        let mut iter = log.view().iter().iter();
        assert!(iter.is_end());
        assert!(iter.get().is_none());
        iter.advance();
        assert!(iter.is_end());
    }

    #[test]
    fn forget_expired_only_drops_dead_logs() {
        let mut kept = Log::new();
        kept.info("kept");
        let mut reader = Reader::new();
        reader.iterate(&kept.view());

        {
            let mut dropped = Log::new();
            dropped.info("gone");
            reader.iterate(&dropped.view());
        }

        assert_eq!(reader.tracked(), 2);
        assert_eq!(reader.forget_expired(), 1);
        assert_eq!(reader.tracked(), 1);
    }
}
