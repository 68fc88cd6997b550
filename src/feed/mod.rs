// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Incremental loader for the activity feed.
//!
//! [`ActivityFeed`] owns a [`FeedState`] and an [`EventSource`]. Each operation
//! takes a [`FetchTicket`] from the state under the lock, releases the lock for
//! the network round-trip, then hands the result back. The state decides whether
//! the result still applies, so overlapping calls from several tasks are safe:
//! superseded fetches come back as [`Completion::Stale`] and change nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::classify::FeedSummary;
use crate::error::Result;
use crate::event::Event;
use crate::filter::FeedFilters;
use crate::sort::SortSpec;
use crate::source::{EventSource, FetchError, PageQuery};

pub mod state;

pub use state::{
    Completion, FeedState, FeedStatus, FetchKind, FetchTicket, FilterChange, FilterKey, LoaderState,
};

pub struct ActivityFeed {
    source: Arc<dyn EventSource>,
    state: Mutex<FeedState>,
}

impl ActivityFeed {
    pub fn new(source: Arc<dyn EventSource>, query: PageQuery) -> Self {
        Self {
            source,
            state: Mutex::new(FeedState::new(query)),
        }
    }

    // The lock is only ever held for synchronous transitions, so a poisoned
    // guard still holds a consistent state.
    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the server query and load its first page.
    pub async fn load_initial(&self, query: PageQuery) -> Completion {
        let ticket = self.state().begin_reset(Some(query));
        self.run(ticket).await
    }

    /// Reload the first page with the current query.
    pub async fn refresh(&self) -> Completion {
        let ticket = self.state().begin_reset(None);
        self.run(ticket).await
    }

    /// Fetch the next page. `None` when a fetch is already in flight, the feed
    /// is exhausted, or nothing has been loaded yet.
    pub async fn load_more(&self) -> Option<Completion> {
        let ticket = self.state().begin_load_more()?;
        Some(self.run(ticket).await)
    }

    /// Scroll sentinel hook: load the next page when the sentinel becomes visible.
    pub async fn on_sentinel_visible(&self, visible: bool) -> Option<Completion> {
        if !visible {
            return None;
        }
        self.load_more().await
    }

    /// Change one filter. Server-side keys trigger a reset fetch, whose
    /// completion is returned.
    pub async fn set_filter(&self, key: &str, value: &str) -> Result<Option<Completion>> {
        let ticket = {
            let mut state = self.state();
            match state.set_filter(key, value)? {
                FilterChange::Local => return Ok(None),
                FilterChange::RequiresReload => state.begin_reset(None),
            }
        };
        tracing::debug!(key, value, "server query changed, reloading");
        Ok(Some(self.run(ticket).await))
    }

    pub fn set_filters(&self, filters: FeedFilters) {
        self.state().set_filters(filters);
    }

    pub fn set_sort(&self, sort: Option<SortSpec>) {
        self.state().set_sort(sort);
    }

    /// Load the first page, then keep paging until the backend is exhausted or
    /// `max_pages` pages have been applied. Returns the number of pages applied;
    /// `max_pages == 0` fetches nothing.
    pub async fn load_pages(&self, query: PageQuery, max_pages: u32) -> std::result::Result<u32, FetchError> {
        if max_pages == 0 {
            return Ok(0);
        }
        let mut pages = 0;
        let mut next = Some(self.load_initial(query).await);
        while let Some(completion) = next {
            match completion {
                Completion::Applied { has_more, .. } => {
                    pages += 1;
                    if !has_more || pages >= max_pages {
                        break;
                    }
                }
                Completion::Failed(err) => return Err(err),
                Completion::Stale => break,
            }
            next = self.load_more().await;
        }
        Ok(pages)
    }

    pub fn visible_events(&self) -> Vec<Event> {
        self.state().visible_events()
    }

    pub fn summary(&self) -> FeedSummary {
        self.state().summary()
    }

    pub fn status(&self) -> FeedStatus {
        self.state().status()
    }

    pub fn loader(&self) -> LoaderState {
        self.state().loader()
    }

    async fn run(&self, ticket: FetchTicket) -> Completion {
        let kind = ticket.kind;
        let generation = ticket.generation;
        let result = self
            .source
            .fetch_page(&ticket.query, ticket.continuation_token.as_deref())
            .await;

        let completion = self.state().complete(ticket, result);
        match &completion {
            Completion::Applied { added, has_more } => tracing::info!(
                source = self.source.name(),
                generation,
                added,
                has_more,
                "applied {:?} page",
                kind
            ),
            Completion::Stale => tracing::debug!(generation, "discarded stale {:?} page", kind),
            Completion::Failed(err) => tracing::warn!(
                source = self.source.name(),
                generation,
                "{:?} fetch failed: {}",
                kind,
                err
            ),
        }
        completion
    }
}
