// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Audit event data model.
//!
//! An [`Event`] is one immutable audit/telemetry record returned by the backend.
//! The wire shape is camelCase JSON with a loosely-typed `metadata` bag; on the
//! way in, `eventType` is parsed into an [`EventKind`] and the bag is decoded into
//! the typed [`EventMetadata`] variant for that kind. Decoding never fails on
//! unexpected shapes: bad timestamps become `None` and bad metadata falls back
//! to [`EventMetadata::Unknown`].

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod metadata;
pub mod store;

pub use metadata::{
    CreditMetadata, CronRunMetadata, EventMetadata, LicenseMetadata, SecurityReportMetadata,
    Timing,
};
pub use store::{merge, EventAccumulator, MergeMode};

/// `orgId` value the backend uses for events not owned by any organization.
pub const SYSTEM_ORG: &str = "system";

/// Coarse event category parsed from the wire `eventType` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Scheduled job execution (`CRONRUN`).
    CronRun,
    /// Security report generation and delivery (`SECURITY_REPORT`).
    SecurityReport,
    /// License issuance, renewal and revocation (`LICENSE`).
    License,
    /// Credit purchases and consumption (`CREDIT`).
    Credit,
    /// Organization lifecycle (`ORGANIZATION`).
    Organization,
    /// User account activity (`ACCOUNT` or `USER`).
    Account,
    /// Anything this client does not know about, kept verbatim.
    Other(String),
}

impl EventKind {
    /// Parse a wire `eventType`. Total: unknown tags become [`EventKind::Other`].
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "CRONRUN" | "CRON_RUN" | "CRON" => EventKind::CronRun,
            "SECURITY_REPORT" | "SECURITYREPORT" | "REPORT" => EventKind::SecurityReport,
            "LICENSE" | "LICENCE" => EventKind::License,
            "CREDIT" | "CREDITS" | "BILLING" => EventKind::Credit,
            "ORGANIZATION" | "ORGANISATION" | "ORG" => EventKind::Organization,
            "ACCOUNT" | "USER" => EventKind::Account,
            _ => EventKind::Other(raw.to_string()),
        }
    }

    /// The canonical wire tag for this kind.
    ///
    /// Aliases accepted by [`EventKind::parse`] (`USER`, `REPORT`, `BILLING`,
    /// `ORG`, ...) are not remembered, so serializing an [`Event`] always emits
    /// the canonical tag. Only [`EventKind::Other`] echoes the backend's text.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::CronRun => "CRONRUN",
            EventKind::SecurityReport => "SECURITY_REPORT",
            EventKind::License => "LICENSE",
            EventKind::Credit => "CREDIT",
            EventKind::Organization => "ORGANIZATION",
            EventKind::Account => "ACCOUNT",
            EventKind::Other(raw) => raw,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit/telemetry occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEvent", into = "WireEvent")]
pub struct Event {
    /// Unique identifier; the dedup key within a loaded session.
    pub id: String,
    pub kind: EventKind,
    /// Fine-grained status/kind within `kind`, e.g. "Failed" or "Batch Sent".
    pub sub_type: String,
    /// When the event occurred. `None` when the backend omitted it or sent garbage.
    pub timestamp: Option<DateTime<Utc>>,
    /// Owning organization; `None` or [`SYSTEM_ORG`] means system-level.
    pub org_id: Option<String>,
    pub description: String,
    pub metadata: EventMetadata,
    pub performed_by: Option<String>,
    pub target_id: Option<String>,
    pub target_type: Option<String>,
}

impl Event {
    /// Minimal event with empty metadata, mostly useful for fixtures and callers
    /// that synthesize events locally.
    pub fn new(id: impl Into<String>, kind: EventKind, sub_type: impl Into<String>) -> Self {
        let metadata = EventMetadata::decode(&kind, Value::Null);
        Self {
            id: id.into(),
            kind,
            sub_type: sub_type.into(),
            timestamp: None,
            org_id: None,
            description: String::new(),
            metadata,
            performed_by: None,
            target_id: None,
            target_type: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns `true` if the event is not owned by any organization.
    pub fn is_system_level(&self) -> bool {
        match self.org_id.as_deref() {
            None => true,
            Some(org) => org.is_empty() || org.eq_ignore_ascii_case(SYSTEM_ORG),
        }
    }

    /// Organization label for display.
    pub fn org_label(&self) -> &str {
        if self.is_system_level() {
            "System"
        } else {
            self.org_id.as_deref().unwrap_or("System")
        }
    }
}

/// Wire representation of an [`Event`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    event_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    event_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    sub_type: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    description: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    performed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_type: Option<String>,
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        let kind = EventKind::parse(&wire.event_type);
        let metadata = EventMetadata::decode(&kind, wire.metadata);
        Self {
            id: wire.event_id,
            kind,
            sub_type: wire.sub_type,
            timestamp: wire.timestamp,
            org_id: wire.org_id,
            description: wire.description,
            metadata,
            performed_by: wire.performed_by,
            target_id: wire.target_id,
            target_type: wire.target_type,
        }
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        Self {
            event_id: event.id,
            event_type: event.kind.as_str().to_string(),
            sub_type: event.sub_type,
            timestamp: event.timestamp,
            org_id: event.org_id,
            description: event.description,
            metadata: event.metadata.to_value(),
            performed_by: event.performed_by,
            target_id: event.target_id,
            target_type: event.target_type,
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 strings or epoch milliseconds; anything else is `None`.
pub(crate) fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

/// Interpret a JSON value as a timestamp.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            s.parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
