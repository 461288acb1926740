//! Day-scoped flavour registry.
//!
//! Entries only live for the calendar day they were added on. Every operation
//! prunes entries from earlier days before it reads or mutates anything, so
//! positions handed out to users always refer to today's list.

use crate::error::{CommandError, CommandResult};
use chrono::{Local, NaiveDate};

/// A single reported flavour and the day it was reported on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub label: String,
    pub day: NaiveDate,
}

/// Outcome of an `add`: the labels appended and their 1-based positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Added {
    pub labels: Vec<String>,
    pub positions: Vec<usize>,
}

impl Added {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

/// Split raw command input into trimmed, non-empty labels.
pub fn split_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// Current calendar day in the host timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry not created on `today`.
    pub fn prune(&mut self, today: NaiveDate) {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.day == today);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::debug!("Pruned {} stale entries (today is {})", dropped, today);
        }
    }

    pub fn add_on(&mut self, raw: &str, today: NaiveDate) -> Added {
        self.prune(today);
        let labels = split_labels(raw);
        let first = self.entries.len() + 1;
        let positions = (first..first + labels.len()).collect();
        self.entries.extend(labels.iter().map(|label| Entry {
            label: label.clone(),
            day: today,
        }));
        Added { labels, positions }
    }

    /// Remove the entry shown at 1-based `position` in today's list.
    pub fn delete_on(&mut self, position: usize, today: NaiveDate) -> CommandResult<String> {
        if position == 0 {
            return Err(CommandError::InvalidInput(
                "position must be a positive integer".into(),
            ));
        }
        self.prune(today);
        let len = self.entries.len();
        if position > len {
            return Err(CommandError::OutOfRange { position, len });
        }
        Ok(self.entries.remove(position - 1).label)
    }

    pub fn list_on(&mut self, today: NaiveDate) -> Vec<(usize, String)> {
        self.prune(today);
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i + 1, entry.label.clone()))
            .collect()
    }

    /// Empty the registry, returning how many of today's entries were removed.
    pub fn clear_on(&mut self, today: NaiveDate) -> usize {
        self.prune(today);
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }
}
