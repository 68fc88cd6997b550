// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Event accumulator: the ordered, deduplicated list of loaded events.
//!
//! The [`EventAccumulator`] is the data layer for the activity feed. It keeps
//! events in arrival order next to an id index so that no two entries ever share
//! an `eventId`, however many pages are merged and however much the backend's
//! pages overlap at their boundaries.

use std::collections::HashSet;

use super::Event;

/// How an incoming page is merged into the existing list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Incoming page replaces the list (filter change or explicit refresh).
    Reset,
    /// Incoming events are appended unless their id is already present.
    Append,
}

/// Ordered event list with an id index.
#[derive(Debug, Default, Clone)]
pub struct EventAccumulator {
    events: Vec<Event>,
    ids: HashSet<String>,
}

impl EventAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list. Duplicate ids inside `incoming` keep their first occurrence.
    pub fn replace(&mut self, incoming: Vec<Event>) -> usize {
        self.clear();
        self.append(incoming)
    }

    /// Append events whose id is not yet present, in arrival order.
    ///
    /// Returns the number of events actually added.
    pub fn append(&mut self, incoming: Vec<Event>) -> usize {
        let before = self.events.len();
        for event in incoming {
            if self.ids.insert(event.id.clone()) {
                self.events.push(event);
            }
        }
        self.events.len() - before
    }

    /// Merge a page according to `mode`. Returns the number of events added.
    pub fn merge(&mut self, incoming: Vec<Event>, mode: MergeMode) -> usize {
        match mode {
            MergeMode::Reset => self.replace(incoming),
            MergeMode::Append => self.append(incoming),
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        if !self.contains(id) {
            return None;
        }
        self.events.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }
}

/// Pure form of [`EventAccumulator::merge`] over plain slices.
pub fn merge(existing: &[Event], incoming: Vec<Event>, mode: MergeMode) -> Vec<Event> {
    let mut acc = EventAccumulator::new();
    if mode == MergeMode::Append {
        acc.append(existing.to_vec());
    }
    acc.append(incoming);
    acc.events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn ev(id: &str) -> Event {
        Event::new(id, EventKind::CronRun, "Completed")
    }

    fn ids(acc: &EventAccumulator) -> Vec<&str> {
        acc.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_append_skips_known_ids() {
        let mut acc = EventAccumulator::new();
        assert_eq!(acc.append(vec![ev("a"), ev("b")]), 2);
        assert_eq!(acc.append(vec![ev("b"), ev("c")]), 1);
        assert_eq!(ids(&acc), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_replace_discards_previous_list() {
        let mut acc = EventAccumulator::new();
        acc.append(vec![ev("a"), ev("b")]);
        acc.replace(vec![ev("c")]);
        assert_eq!(ids(&acc), vec!["c"]);
        assert!(!acc.contains("a"));
        assert!(acc.get("a").is_none());
    }

    #[test]
    fn test_duplicates_inside_one_page_are_collapsed() {
        let mut acc = EventAccumulator::new();
        let added = acc.replace(vec![ev("a"), ev("a"), ev("b")]);
        assert_eq!(added, 2);
        assert_eq!(ids(&acc), vec!["a", "b"]);
    }

    #[test]
    fn test_repeated_overlapping_pages_never_duplicate() {
        let mut acc = EventAccumulator::new();
        acc.merge(vec![ev("1"), ev("2"), ev("3")], MergeMode::Reset);
        for _ in 0..5 {
            acc.merge(vec![ev("3"), ev("4"), ev("5")], MergeMode::Append);
        }
        assert_eq!(ids(&acc), vec!["1", "2", "3", "4", "5"]);

        let unique: HashSet<&str> = acc.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(unique.len(), acc.len());
    }

    #[test]
    fn test_pure_merge_preserves_existing_order() {
        let existing = vec![ev("x"), ev("y")];
        let merged = merge(&existing, vec![ev("y"), ev("z")], MergeMode::Append);
        let got: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(got, vec!["x", "y", "z"]);

        let reset = merge(&existing, vec![ev("z")], MergeMode::Reset);
        assert_eq!(reset.len(), 1);
        assert_eq!(reset[0].id, "z");
    }
}
