// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Event sources: where pages of audit events come from.
//!
//! [`EventSource`] is the seam between the feed controller and the backend. The
//! production implementation is [`http::HttpEventSource`]; tests plug in their
//! own sources to script page contents, overlap and latency.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::event::Event;

pub mod http;

pub use http::HttpEventSource;

/// Message shown when the backend gives no usable reason for a failure.
pub const GENERIC_FETCH_ERROR: &str = "Failed to load activity events";

/// Server-side query parameters, forwarded verbatim on every page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Time window in days.
    pub days: u32,
    pub page_size: u32,
    /// Domain-specific flags (e.g. `includeSystem=true`), sent as extra query pairs.
    pub flags: BTreeMap<String, String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            days: 7,
            page_size: 50,
            flags: BTreeMap::new(),
        }
    }
}

impl PageQuery {
    /// Query pairs for one request. The continuation token is omitted on the first page.
    pub fn to_pairs(&self, continuation_token: Option<&str>) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("pageSize".to_string(), self.page_size.to_string()),
            ("days".to_string(), self.days.to_string()),
        ];
        if let Some(token) = continuation_token {
            pairs.push(("continuationToken".to_string(), token.to_string()));
        }
        for (k, v) in &self.flags {
            pairs.push((k.clone(), v.clone()));
        }
        pairs
    }
}

/// One page of events plus the cursor for the next one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub events: Vec<Event>,
    /// Opaque backend cursor. Never parsed or built locally.
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Why a page could not be loaded. Each variant carries a user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network or HTTP-level failure.
    #[error("{0}")]
    Transport(String),

    /// The backend answered with `success: false`.
    #[error("{0}")]
    Backend(String),

    /// The response body was not a valid envelope.
    #[error("{0}")]
    Decode(String),
}

impl FetchError {
    pub fn message(&self) -> &str {
        match self {
            FetchError::Transport(m) | FetchError::Backend(m) | FetchError::Decode(m) => m,
        }
    }
}

/// A backend that serves pages of audit events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Fetch one page. `continuation_token` is `None` for the first page.
    async fn fetch_page(
        &self,
        query: &PageQuery,
        continuation_token: Option<&str>,
    ) -> Result<Page, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_omits_token() {
        let query = PageQuery::default();
        let pairs = query.to_pairs(None);
        assert!(pairs.iter().all(|(k, _)| k != "continuationToken"));
        assert!(pairs.contains(&("pageSize".to_string(), "50".to_string())));
        assert!(pairs.contains(&("days".to_string(), "7".to_string())));
    }

    #[test]
    fn test_token_and_flags_are_forwarded_verbatim() {
        let mut query = PageQuery {
            days: 30,
            page_size: 20,
            flags: BTreeMap::new(),
        };
        query.flags.insert("includeSystem".into(), "true".into());

        let pairs = query.to_pairs(Some("opaque==/+cursor"));
        assert!(pairs.contains(&("continuationToken".to_string(), "opaque==/+cursor".to_string())));
        assert!(pairs.contains(&("includeSystem".to_string(), "true".to_string())));
        assert!(pairs.contains(&("days".to_string(), "30".to_string())));
    }

    #[test]
    fn test_fetch_error_message() {
        let err = FetchError::Backend("quota exceeded".into());
        assert_eq!(err.message(), "quota exceeded");
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
