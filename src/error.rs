// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

use thiserror::Error;

/// Errors from feed state transitions driven by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("unknown filter key: {0}")]
    UnknownFilterKey(String),

    #[error("invalid value {value:?} for filter {key}")]
    InvalidFilterValue { key: String, value: String },
}

impl FeedError {
    pub(crate) fn invalid(key: &str, value: &str) -> Self {
        FeedError::InvalidFilterValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T, E = FeedError> = core::result::Result<T, E>;
