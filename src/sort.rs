// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Stable ordering of events by a time-valued field.
//!
//! Missing timestamps sort as the Unix epoch so incomplete records sink to one
//! end instead of being dropped. `Vec::sort_by` is stable, so ties keep their
//! input order in both directions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FeedError;
use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// When the event was recorded.
    Timestamp,
    /// Metadata `enqueuedAt`.
    Enqueued,
    /// Metadata `startedAt`.
    Started,
    /// Metadata `completedAt`, falling back to the event timestamp.
    Completed,
    /// `completed - started` when both are known, else metadata `durationMs`.
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Timestamp => "timestamp",
            SortField::Enqueued => "enqueued",
            SortField::Started => "started",
            SortField::Completed => "completed",
            SortField::Duration => "duration",
        }
    }

    /// Sort key in milliseconds since the epoch (or duration in milliseconds).
    fn key(self, event: &Event) -> i64 {
        let timing = event.metadata.timing();
        match self {
            SortField::Timestamp => millis(event.timestamp),
            SortField::Enqueued => millis(timing.enqueued_at),
            SortField::Started => millis(timing.started_at),
            SortField::Completed => millis(timing.completed_at.or(event.timestamp)),
            SortField::Duration => match (timing.started_at, timing.completed_at) {
                (Some(start), Some(end)) => (end - start).num_milliseconds().max(0),
                _ => timing
                    .duration_ms
                    .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX))
                    .unwrap_or(0),
            },
        }
    }
}

fn millis(at: Option<DateTime<Utc>>) -> i64 {
    at.map(|t| t.timestamp_millis()).unwrap_or(0)
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" | "time" | "created" => Ok(SortField::Timestamp),
            "enqueued" | "enqueued_at" | "queued" => Ok(SortField::Enqueued),
            "started" | "started_at" | "start" => Ok(SortField::Started),
            "completed" | "completed_at" | "end" => Ok(SortField::Completed),
            "duration" => Ok(SortField::Duration),
            _ => Err(FeedError::invalid("sort", s)),
        }
    }
}

impl FromStr for SortDirection {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            _ => Err(FeedError::invalid("direction", s)),
        }
    }
}

/// Return a copy of `events` ordered by `field` in `direction`. Stable.
pub fn sort_events(events: &[Event], field: SortField, direction: SortDirection) -> Vec<Event> {
    let mut keyed: Vec<(i64, &Event)> = events.iter().map(|e| (field.key(e), e)).collect();
    keyed.sort_by(|(a, _), (b, _)| compare(*a, *b, direction));
    keyed.into_iter().map(|(_, e)| e.clone()).collect()
}

fn compare(a: i64, b: i64, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => a.cmp(&b),
        SortDirection::Desc => b.cmp(&a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CronRunMetadata, EventKind, EventMetadata};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn cron(id: &str, started: Option<i64>, completed: Option<i64>) -> Event {
        Event::new(id, EventKind::CronRun, "Completed").with_metadata(EventMetadata::CronRun(CronRunMetadata {
            started_at: started.map(at),
            completed_at: completed.map(at),
            ..Default::default()
        }))
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_ties_keep_input_order_in_both_directions() {
        let events = vec![
            Event::new("first", EventKind::CronRun, "").with_timestamp(at(50)),
            Event::new("second", EventKind::CronRun, "").with_timestamp(at(50)),
            Event::new("later", EventKind::CronRun, "").with_timestamp(at(90)),
        ];
        let asc = sort_events(&events, SortField::Timestamp, SortDirection::Asc);
        assert_eq!(ids(&asc), vec!["first", "second", "later"]);
        let desc = sort_events(&events, SortField::Timestamp, SortDirection::Desc);
        assert_eq!(ids(&desc), vec!["later", "first", "second"]);
    }

    #[test]
    fn test_missing_timestamps_sort_as_minimum() {
        let events = vec![
            cron("no-start", None, Some(10)),
            cron("early", Some(5), Some(10)),
            cron("late", Some(8), Some(10)),
        ];
        let asc = sort_events(&events, SortField::Started, SortDirection::Asc);
        assert_eq!(ids(&asc), vec!["no-start", "early", "late"]);
        let desc = sort_events(&events, SortField::Started, SortDirection::Desc);
        assert_eq!(ids(&desc), vec!["late", "early", "no-start"]);
    }

    #[test]
    fn test_duration_is_completed_minus_started() {
        let events = vec![
            cron("short", Some(100), Some(101)),
            cron("long", Some(100), Some(160)),
            cron("unknown", None, None),
        ];
        let desc = sort_events(&events, SortField::Duration, SortDirection::Desc);
        assert_eq!(ids(&desc), vec!["long", "short", "unknown"]);
    }

    #[test]
    fn test_duration_falls_back_to_metadata() {
        let measured = Event::new("measured", EventKind::CronRun, "").with_metadata(EventMetadata::CronRun(
            CronRunMetadata {
                duration_ms: Some(5_000),
                ..Default::default()
            },
        ));
        let events = vec![cron("short", Some(0), Some(1)), measured];
        let desc = sort_events(&events, SortField::Duration, SortDirection::Desc);
        assert_eq!(ids(&desc), vec!["measured", "short"]);
    }

    #[test]
    fn test_completed_falls_back_to_event_timestamp() {
        let events = vec![
            Event::new("a", EventKind::CronRun, "").with_timestamp(at(1)),
            Event::new("b", EventKind::SecurityReport, "Failed").with_timestamp(at(2)),
            Event::new("c", EventKind::SecurityReport, "Sent").with_timestamp(at(3)),
        ];
        let desc = sort_events(&events, SortField::Completed, SortDirection::Desc);
        assert_eq!(ids(&desc), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_parse_sort_options() {
        assert_eq!("Completed".parse::<SortField>().unwrap(), SortField::Completed);
        assert_eq!("ASC".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
