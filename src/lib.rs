// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Activity feed aggregation for audit events.
//!
//! Pages of events are pulled from an [`EventSource`], accumulated without
//! duplicates, classified for display, and narrowed and ordered by local filters
//! and sort settings. [`ActivityFeed`] drives loading and keeps late responses
//! from overwriting newer ones.

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod filter;
pub mod logging;
pub mod sort;
pub mod source;

pub use classify::{classify, summarize, Category, Classification, FeedSummary};
pub use error::FeedError;
pub use event::{Event, EventAccumulator, EventKind, EventMetadata};
pub use feed::{ActivityFeed, Completion, FeedState, LoaderState};
pub use filter::{apply_filters, FeedFilters, StatusFilter, TypeFilter};
pub use sort::{sort_events, SortDirection, SortField, SortSpec};
pub use source::{EventSource, FetchError, HttpEventSource, Page, PageQuery};
