// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Consolidated feed state and its transitions.
//!
//! [`FeedState`] holds everything the feed knows: server query, local filters,
//! sort order, loaded events, pagination cursor and the loader state machine.
//! Transitions are plain methods with no I/O, so the whole load cycle can be
//! driven and tested without a runtime:
//!
//! ```text
//! Idle --begin_reset--> Loading --complete--> Idle | Exhausted
//! Idle --begin_load_more--> LoadingMore --complete--> Idle | Exhausted
//! ```
//!
//! Every fetch carries the generation it was started under. Changing the server
//! query or starting a new reset bumps the generation, and a completion whose
//! generation no longer matches is dropped without touching state.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::classify::{summarize, FeedSummary};
use crate::error::{FeedError, Result};
use crate::event::{Event, EventAccumulator, MergeMode};
use crate::filter::{apply_filters, FeedFilters};
use crate::sort::{sort_events, SortSpec};
use crate::source::{FetchError, Page, PageQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderState {
    #[default]
    Idle,
    /// A reset fetch (first page) is in flight.
    Loading,
    /// A pagination fetch is in flight.
    LoadingMore,
    /// The backend reported no further pages.
    Exhausted,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoaderState::Idle => "idle",
            LoaderState::Loading => "loading",
            LoaderState::LoadingMore => "loading-more",
            LoaderState::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Reset,
    More,
}

impl FetchKind {
    fn merge_mode(self) -> MergeMode {
        match self {
            FetchKind::Reset => MergeMode::Reset,
            FetchKind::More => MergeMode::Append,
        }
    }
}

/// Everything a fetch needs, captured when it starts.
///
/// Not `Clone`: each ticket is completed at most once.
#[derive(Debug)]
pub struct FetchTicket {
    pub generation: u64,
    pub kind: FetchKind,
    pub query: PageQuery,
    pub continuation_token: Option<String>,
}

/// What [`FeedState::complete`] did with a fetch result.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The page was merged. `added` counts events that were not already present.
    Applied { added: usize, has_more: bool },
    /// The fetch belonged to an older generation and was discarded.
    Stale,
    /// The fetch failed; the error was recorded for the caller to surface.
    Failed(FetchError),
}

/// A key accepted by [`FeedState::set_filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKey {
    Type,
    Status,
    Org,
    Since,
    Until,
    Days,
    PageSize,
    /// Domain-specific backend flag, written `flag:<name>`.
    Flag(String),
}

impl FilterKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim();
        if let Some(name) = key.strip_prefix("flag:") {
            if name.is_empty() {
                return Err(FeedError::UnknownFilterKey(raw.to_string()));
            }
            return Ok(FilterKey::Flag(name.to_string()));
        }
        match key.to_ascii_lowercase().as_str() {
            "type" => Ok(FilterKey::Type),
            "status" => Ok(FilterKey::Status),
            "org" | "orgid" | "organization" => Ok(FilterKey::Org),
            "since" | "from" => Ok(FilterKey::Since),
            "until" | "to" => Ok(FilterKey::Until),
            "days" => Ok(FilterKey::Days),
            "pagesize" | "page_size" => Ok(FilterKey::PageSize),
            _ => Err(FeedError::UnknownFilterKey(raw.to_string())),
        }
    }

    /// Server-side keys change what the backend returns and need a reset fetch.
    pub fn is_server_side(&self) -> bool {
        matches!(self, FilterKey::Days | FilterKey::PageSize | FilterKey::Flag(_))
    }
}

/// Effect of a filter change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    /// Only the visible subset changed.
    Local,
    /// Server query changed; the caller must start a reset fetch.
    RequiresReload,
}

/// Read-only snapshot for status lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatus {
    pub loader: LoaderState,
    pub generation: u64,
    pub loaded: usize,
    pub visible: usize,
    pub has_more: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedState {
    query: PageQuery,
    filters: FeedFilters,
    sort: Option<SortSpec>,
    events: EventAccumulator,
    loader: LoaderState,
    generation: u64,
    continuation_token: Option<String>,
    has_more: bool,
    last_error: Option<String>,
}

impl FeedState {
    pub fn new(query: PageQuery) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    /// Start a reset fetch, optionally with a new server query.
    ///
    /// Always allowed: a newer reset supersedes anything in flight.
    pub fn begin_reset(&mut self, query: Option<PageQuery>) -> FetchTicket {
        if let Some(query) = query {
            self.query = query;
        }
        self.generation += 1;
        self.loader = LoaderState::Loading;
        self.last_error = None;
        FetchTicket {
            generation: self.generation,
            kind: FetchKind::Reset,
            query: self.query.clone(),
            continuation_token: None,
        }
    }

    /// Start a pagination fetch, or `None` if one must not start now.
    ///
    /// Requires the loader to be idle, the backend to have reported more pages,
    /// and a continuation token to be present. Rapid repeated triggers therefore
    /// start at most one fetch.
    pub fn begin_load_more(&mut self) -> Option<FetchTicket> {
        if self.loader != LoaderState::Idle || !self.has_more {
            return None;
        }
        let token = self.continuation_token.clone()?;
        self.loader = LoaderState::LoadingMore;
        self.last_error = None;
        Some(FetchTicket {
            generation: self.generation,
            kind: FetchKind::More,
            query: self.query.clone(),
            continuation_token: Some(token),
        })
    }

    /// Apply the result of a fetch started with `ticket`.
    pub fn complete(&mut self, ticket: FetchTicket, result: std::result::Result<Page, FetchError>) -> Completion {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "dropping stale {:?} fetch result",
                ticket.kind
            );
            return Completion::Stale;
        }

        match result {
            Ok(page) => {
                let added = self.events.merge(page.events, ticket.kind.merge_mode());
                self.continuation_token = page.continuation_token;
                self.has_more = page.has_more && self.continuation_token.is_some();
                self.loader = if self.has_more {
                    LoaderState::Idle
                } else {
                    LoaderState::Exhausted
                };
                self.last_error = None;
                Completion::Applied {
                    added,
                    has_more: self.has_more,
                }
            }
            Err(err) => {
                if ticket.kind == FetchKind::Reset {
                    self.events.clear();
                    self.continuation_token = None;
                    self.has_more = false;
                }
                self.loader = LoaderState::Idle;
                self.last_error = Some(err.message().to_string());
                Completion::Failed(err)
            }
        }
    }

    /// Change one filter. Server-side keys bump the generation, so any fetch in
    /// flight becomes stale, and ask the caller for a reset fetch.
    pub fn set_filter(&mut self, key: &str, value: &str) -> Result<FilterChange> {
        let key = FilterKey::parse(key)?;
        let value = value.trim();
        match &key {
            FilterKey::Type => self.filters.type_filter = value.parse()?,
            FilterKey::Status => self.filters.status = value.parse()?,
            FilterKey::Org => self.filters.org_substring = value.to_string(),
            FilterKey::Since => self.filters.since = parse_bound(value, false)?,
            FilterKey::Until => self.filters.until = parse_bound(value, true)?,
            FilterKey::Days => self.query.days = parse_positive("days", value)?,
            FilterKey::PageSize => self.query.page_size = parse_positive("pageSize", value)?,
            FilterKey::Flag(name) => {
                if value.is_empty() {
                    self.query.flags.remove(name);
                } else {
                    self.query.flags.insert(name.clone(), value.to_string());
                }
            }
        }

        if !key.is_server_side() {
            return Ok(FilterChange::Local);
        }

        self.generation += 1;
        self.continuation_token = None;
        self.has_more = false;
        self.loader = LoaderState::Idle;
        Ok(FilterChange::RequiresReload)
    }

    pub fn set_filters(&mut self, filters: FeedFilters) {
        self.filters = filters;
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
    }

    /// Loaded events after local filters and the selected sort.
    pub fn visible_events(&self) -> Vec<Event> {
        let filtered = apply_filters(self.events.as_slice(), &self.filters);
        match self.sort {
            Some(spec) => sort_events(&filtered, spec.field, spec.direction),
            None => filtered,
        }
    }

    pub fn summary(&self) -> FeedSummary {
        summarize(self.events.iter())
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            loader: self.loader,
            generation: self.generation,
            loaded: self.events.len(),
            visible: self.visible_events().len(),
            has_more: self.has_more,
            last_error: self.last_error.clone(),
        }
    }

    pub fn loader(&self) -> LoaderState {
        self.loader
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn query(&self) -> &PageQuery {
        &self.query
    }

    pub fn filters(&self) -> &FeedFilters {
        &self.filters
    }

    pub fn events(&self) -> &EventAccumulator {
        &self.events
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(FeedError::invalid(key, value)),
    }
}

/// Empty clears the bound. Accepts RFC 3339 or a bare date; a bare `until`
/// date covers the whole day.
fn parse_bound(value: &str, end_of_day: bool) -> Result<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let key = if end_of_day { "until" } else { "since" };
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FeedError::invalid(key, value))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| FeedError::invalid(key, value))?;
    Ok(Some(date.and_time(time).and_utc()))
}
