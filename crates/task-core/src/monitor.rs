//! # monitor
//!
//! why: surface what tasks narrate without handing out the same entry twice
//! relations: owns a reader.rs Reader, polls views from task.rs / log.rs
//! what: MonitorConfig, Monitor

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::log::{Entry, Tier, View};
use crate::reader::Reader;

/// Monitor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Drop the entry that a reader hands out again at the start of each poll
    pub skip_boundary: bool,
    /// Emit every delivered entry as a tracing event
    pub forward_to_tracing: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            skip_boundary: true,
            forward_to_tracing: true,
        }
    }
}

/// Polls task logs and collects their new entries
#[derive(Debug)]
pub struct Monitor {
    name: String,
    config: MonitorConfig,
    reader: Reader,
    delivered: u64,
}

impl Monitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, MonitorConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: MonitorConfig) -> Self {
        Self {
            name: name.into(),
            config,
            reader: Reader::new(),
            delivered: 0,
        }
    }

    /// Collect the entries of `view` this monitor has not delivered yet
    pub fn poll(&mut self, view: &View) -> Vec<Arc<Entry>> {
        let mut iterable = self.reader.iterate(view);
        if self.config.skip_boundary {
            iterable = iterable.without_boundary();
        }

        let entries: Vec<_> = iterable.iter().collect();
        if self.config.forward_to_tracing {
            for entry in &entries {
                self.forward(entry);
            }
        }

        self.delivered += entries.len() as u64;
        entries
    }

    /// Forget logs that no longer exist
    pub fn prune(&mut self) -> usize {
        self.reader.forget_expired()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Total number of entries handed out so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn forward(&self, entry: &Entry) {
        let time = entry.time().to_rfc3339();
        match entry.tier() {
            Tier::Info => info!(monitor = %self.name, %time, "{}", entry.text()),
            Tier::Warning => warn!(monitor = %self.name, %time, "{}", entry.text()),
            Tier::Error => error!(monitor = %self.name, %time, "{}", entry.text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Log;

    #[test]
    fn skips_boundary_by_default() {
        let mut log = Log::new();
        log.info("a");
        let mut monitor = Monitor::new("ops");

        assert_eq!(monitor.poll(&log.view()).len(), 1);
        assert!(monitor.poll(&log.view()).is_empty());

        log.info("b");
        let entries = monitor.poll(&log.view());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text(), "b");
        assert_eq!(monitor.delivered(), 2);
    }

    #[test]
    fn stale_empty_view_does_not_cause_replay() {
        let mut log = Log::new();
        let empty = log.view();
        log.info("a");
        log.info("b");
        let mut monitor = Monitor::new("ops");

        assert_eq!(monitor.poll(&log.view()).len(), 2);
        assert!(monitor.poll(&empty).is_empty());
        assert!(monitor.poll(&log.view()).is_empty());
        assert_eq!(monitor.delivered(), 2);

        log.info("c");
        let entries = monitor.poll(&log.view());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text(), "c");
        assert_eq!(monitor.delivered(), 3);
    }

    #[test]
    fn raw_mode_keeps_boundary() {
        let mut log = Log::new();
        log.info("a");
        let config = MonitorConfig {
            skip_boundary: false,
            forward_to_tracing: false,
        };
        let mut monitor = Monitor::with_config("raw", config);

        monitor.poll(&log.view());
        log.info("b");
        let texts: Vec<_> = monitor
            .poll(&log.view())
            .iter()
            .map(|e| e.text().to_string())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
