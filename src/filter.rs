// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Local filter engine over loaded events.
//!
//! Filters are user-selected predicates (type bucket, success/failure status,
//! organization substring, date range) that compose by logical AND. Filtering is
//! pure: it allocates a new list and never touches its input. The type buckets
//! reuse the categorizer's sub-type signals so the dropdown options match the
//! displayed badges.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{is_batch, is_completion, is_failure, is_sent};
use crate::error::FeedError;
use crate::event::{Event, EventKind};

/// Whether an event represents a success, a failure, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    /// The kind has no success signal, or the event carries none.
    Unknown,
}

/// Success/failure signal for an event, inferred per kind.
///
/// Cron runs are failed on an error sub-type or a metadata `status` other than
/// `completed`, succeeded on `status == completed` or a completion sub-type, and
/// unknown otherwise. Reports, licenses, credits, organizations and accounts are
/// failed on an error sub-type and succeeded otherwise. Unrecognized kinds are
/// always unknown.
pub fn outcome(event: &Event) -> Outcome {
    let sub = event.sub_type.as_str();
    match &event.kind {
        EventKind::CronRun => {
            if is_failure(sub) {
                return Outcome::Failed;
            }
            match event.metadata.status() {
                Some(status) if status.trim().eq_ignore_ascii_case("completed") => Outcome::Success,
                Some(_) => Outcome::Failed,
                None if is_completion(sub) => Outcome::Success,
                None => Outcome::Unknown,
            }
        }
        EventKind::SecurityReport
        | EventKind::License
        | EventKind::Credit
        | EventKind::Organization
        | EventKind::Account => {
            if is_failure(sub) {
                Outcome::Failed
            } else {
                Outcome::Success
            }
        }
        EventKind::Other(_) => Outcome::Unknown,
    }
}

/// Named event-type buckets offered by the type dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeFilter {
    #[default]
    All,
    Cron,
    CronFailed,
    Reports,
    ReportsSent,
    ReportsFailed,
    Batch,
    License,
    Credit,
    Organization,
    Account,
}

impl TypeFilter {
    pub const ALL: [TypeFilter; 11] = [
        TypeFilter::All,
        TypeFilter::Cron,
        TypeFilter::CronFailed,
        TypeFilter::Reports,
        TypeFilter::ReportsSent,
        TypeFilter::ReportsFailed,
        TypeFilter::Batch,
        TypeFilter::License,
        TypeFilter::Credit,
        TypeFilter::Organization,
        TypeFilter::Account,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TypeFilter::All => "all",
            TypeFilter::Cron => "cron",
            TypeFilter::CronFailed => "cron-failed",
            TypeFilter::Reports => "reports",
            TypeFilter::ReportsSent => "reports-sent",
            TypeFilter::ReportsFailed => "reports-failed",
            TypeFilter::Batch => "batch",
            TypeFilter::License => "license",
            TypeFilter::Credit => "credit",
            TypeFilter::Organization => "organization",
            TypeFilter::Account => "account",
        }
    }

    pub fn matches(self, event: &Event) -> bool {
        let sub = event.sub_type.as_str();
        match self {
            TypeFilter::All => true,
            TypeFilter::Cron => event.kind == EventKind::CronRun,
            TypeFilter::CronFailed => event.kind == EventKind::CronRun && outcome(event) == Outcome::Failed,
            TypeFilter::Reports => event.kind == EventKind::SecurityReport,
            TypeFilter::ReportsSent => {
                event.kind == EventKind::SecurityReport && is_sent(sub) && !is_failure(sub)
            }
            TypeFilter::ReportsFailed => event.kind == EventKind::SecurityReport && is_failure(sub),
            TypeFilter::Batch => {
                matches!(event.kind, EventKind::CronRun | EventKind::SecurityReport) && is_batch(sub)
            }
            TypeFilter::License => event.kind == EventKind::License,
            TypeFilter::Credit => event.kind == EventKind::Credit,
            TypeFilter::Organization => event.kind == EventKind::Organization,
            TypeFilter::Account => event.kind == EventKind::Account,
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeFilter {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        TypeFilter::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| FeedError::invalid("type", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Success,
    Failed,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Success => "success",
            StatusFilter::Failed => "failed",
        }
    }

    /// Events with an [`Outcome::Unknown`] never match `Success` or `Failed`.
    pub fn matches(self, event: &Event) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Success => outcome(event) == Outcome::Success,
            StatusFilter::Failed => outcome(event) == Outcome::Failed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(StatusFilter::All),
            "success" | "succeeded" | "ok" => Ok(StatusFilter::Success),
            "failed" | "failure" | "error" => Ok(StatusFilter::Failed),
            _ => Err(FeedError::invalid("status", s)),
        }
    }
}

/// The full set of local filters. The default is the identity filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedFilters {
    pub type_filter: TypeFilter,
    pub status: StatusFilter,
    /// Case-insensitive substring of the org label (`orgId`, or "System" for
    /// system-level events); empty matches everything.
    pub org_substring: String,
    /// Inclusive lower bound on the event timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the event timestamp.
    pub until: Option<DateTime<Utc>>,
}

impl FeedFilters {
    pub fn is_identity(&self) -> bool {
        *self == FeedFilters::default()
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.type_filter.matches(event)
            && self.status.matches(event)
            && self.matches_org(event)
            && self.matches_range(event)
    }

    fn matches_org(&self, event: &Event) -> bool {
        let needle = self.org_substring.trim();
        if needle.is_empty() {
            return true;
        }
        // System-level events are matched by their "System" label.
        event.org_label().to_lowercase().contains(&needle.to_lowercase())
    }

    fn matches_range(&self, event: &Event) -> bool {
        if self.since.is_none() && self.until.is_none() {
            return true;
        }
        let Some(ts) = event.timestamp else {
            return false;
        };
        self.since.map(|s| ts >= s).unwrap_or(true) && self.until.map(|u| ts <= u).unwrap_or(true)
    }
}

/// Apply `filters` to `events`, returning a new list in input order.
pub fn apply_filters(events: &[Event], filters: &FeedFilters) -> Vec<Event> {
    events.iter().filter(|e| filters.matches(e)).cloned().collect()
}
