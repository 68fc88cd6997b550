// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Typed event metadata.
//!
//! The backend sends `metadata` as an open key/value bag whose shape depends on
//! `eventType`. Known kinds decode into their own struct with every field
//! optional; everything else, or a bag that does not fit its kind's shape, is
//! kept as [`EventMetadata::Unknown`] so nothing is lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient_timestamp, parse_timestamp, EventKind};

const NOT_AVAILABLE: &str = "N/A";

/// Scheduled job execution details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronRunMetadata {
    pub job_name: Option<String>,
    /// Backend job status; `completed` is the success sentinel.
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub enqueued_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub processed_count: Option<u64>,
    pub error: Option<String>,
}

/// Security report generation/delivery details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityReportMetadata {
    pub report_id: Option<String>,
    pub report_type: Option<String>,
    pub recipient_count: Option<u64>,
    pub sent_count: Option<u64>,
    pub failed_count: Option<u64>,
    pub batch_size: Option<u64>,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LicenseMetadata {
    pub license_id: Option<String>,
    pub product: Option<String>,
    pub seats: Option<u64>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreditMetadata {
    /// Signed change; negative for consumption.
    pub amount: Option<i64>,
    pub balance: Option<i64>,
    pub reason: Option<String>,
}

/// Metadata bag, keyed by the owning event's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventMetadata {
    CronRun(CronRunMetadata),
    SecurityReport(SecurityReportMetadata),
    License(LicenseMetadata),
    Credit(CreditMetadata),
    /// Raw bag for kinds without a typed shape, or bags that failed to decode.
    Unknown(Map<String, Value>),
}

/// Timing facts extracted from metadata, used by the sort engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub enqueued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl EventMetadata {
    /// Decode a raw bag for the given kind. Never fails.
    pub fn decode(kind: &EventKind, raw: Value) -> Self {
        let map = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                return EventMetadata::Unknown(map);
            }
        };

        let decoded = match kind {
            EventKind::CronRun => decode_typed(&map).map(EventMetadata::CronRun),
            EventKind::SecurityReport => decode_typed(&map).map(EventMetadata::SecurityReport),
            EventKind::License => decode_typed(&map).map(EventMetadata::License),
            EventKind::Credit => decode_typed(&map).map(EventMetadata::Credit),
            _ => None,
        };

        match decoded {
            Some(meta) => meta,
            None => {
                if !matches!(kind, EventKind::Other(_) | EventKind::Organization | EventKind::Account) {
                    tracing::debug!("metadata for {} did not match its typed shape, keeping raw", kind);
                }
                EventMetadata::Unknown(map)
            }
        }
    }

    /// Re-encode to the wire bag.
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            EventMetadata::CronRun(m) => serde_json::to_value(m),
            EventMetadata::SecurityReport(m) => serde_json::to_value(m),
            EventMetadata::License(m) => serde_json::to_value(m),
            EventMetadata::Credit(m) => serde_json::to_value(m),
            EventMetadata::Unknown(map) => return Value::Object(map.clone()),
        };
        match encoded {
            Ok(Value::Object(map)) => {
                Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
            }
            _ => Value::Object(Map::new()),
        }
    }

    /// The `status` field, whichever variant carries it.
    pub fn status(&self) -> Option<&str> {
        match self {
            EventMetadata::CronRun(m) => m.status.as_deref(),
            EventMetadata::Unknown(map) => map.get("status").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn timing(&self) -> Timing {
        match self {
            EventMetadata::CronRun(m) => Timing {
                enqueued_at: m.enqueued_at,
                started_at: m.started_at,
                completed_at: m.completed_at,
                duration_ms: m.duration_ms,
            },
            EventMetadata::Unknown(map) => Timing {
                enqueued_at: map.get("enqueuedAt").and_then(parse_timestamp),
                started_at: map.get("startedAt").and_then(parse_timestamp),
                completed_at: map.get("completedAt").and_then(parse_timestamp),
                duration_ms: map.get("durationMs").and_then(Value::as_u64),
            },
            _ => Timing::default(),
        }
    }

    /// Label/value pairs for a detail view, with `0` / `N/A` for missing values.
    pub fn display_fields(&self) -> Vec<(String, String)> {
        match self {
            EventMetadata::CronRun(m) => vec![
                field("Job", text(&m.job_name)),
                field("Status", text(&m.status)),
                field("Enqueued", time(&m.enqueued_at)),
                field("Started", time(&m.started_at)),
                field("Completed", time(&m.completed_at)),
                field("Duration", duration(m.duration_ms)),
                field("Processed", count(m.processed_count)),
                field("Error", text(&m.error)),
            ],
            EventMetadata::SecurityReport(m) => vec![
                field("Report", text(&m.report_id)),
                field("Type", text(&m.report_type)),
                field("Recipients", count(m.recipient_count)),
                field("Sent", count(m.sent_count)),
                field("Failed", count(m.failed_count)),
                field("Batch size", count(m.batch_size)),
                field("Error code", text(&m.error_code)),
            ],
            EventMetadata::License(m) => vec![
                field("License", text(&m.license_id)),
                field("Product", text(&m.product)),
                field("Seats", count(m.seats)),
                field("Expires", time(&m.expires_at)),
            ],
            EventMetadata::Credit(m) => vec![
                field("Amount", m.amount.unwrap_or(0).to_string()),
                field("Balance", m.balance.map(|b| b.to_string()).unwrap_or_else(|| NOT_AVAILABLE.to_string())),
                field("Reason", text(&m.reason)),
            ],
            EventMetadata::Unknown(map) => map
                .iter()
                .map(|(k, v)| {
                    let rendered = match v {
                        Value::Null => NOT_AVAILABLE.to_string(),
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), rendered)
                })
                .collect(),
        }
    }
}

fn decode_typed<T: serde::de::DeserializeOwned>(map: &Map<String, Value>) -> Option<T> {
    serde_json::from_value(Value::Object(map.clone())).ok()
}

fn field(label: &str, value: String) -> (String, String) {
    (label.to_string(), value)
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn count(value: Option<u64>) -> String {
    value.unwrap_or(0).to_string()
}

fn time(value: &Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn duration(ms: Option<u64>) -> String {
    match ms {
        None => NOT_AVAILABLE.to_string(),
        Some(ms) if ms < 1_000 => format!("{}ms", ms),
        Some(ms) => format!("{:.1}s", ms as f64 / 1_000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_cron_metadata() {
        let meta = EventMetadata::decode(
            &EventKind::CronRun,
            json!({
                "jobName": "license-expiry",
                "status": "completed",
                "startedAt": "2026-03-01T10:00:00Z",
                "completedAt": "2026-03-01T10:00:05Z"
            }),
        );
        let timing = meta.timing();
        assert!(timing.started_at.is_some());
        assert!(timing.completed_at.is_some());
        assert_eq!(meta.status(), Some("completed"));
    }

    #[test]
    fn test_decode_mistyped_bag_falls_back_to_unknown() {
        let meta = EventMetadata::decode(
            &EventKind::SecurityReport,
            json!({ "recipientCount": "lots" }),
        );
        match meta {
            EventMetadata::Unknown(map) => assert_eq!(map["recipientCount"], "lots"),
            other => panic!("expected unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_object_bag() {
        let meta = EventMetadata::decode(&EventKind::CronRun, json!([1, 2, 3]));
        match meta {
            EventMetadata::Unknown(map) => assert!(map.contains_key("value")),
            other => panic!("expected unknown, got {:?}", other),
        }
    }

    #[test]
    fn test_null_bag_decodes_to_empty_typed_shape() {
        let meta = EventMetadata::decode(&EventKind::Credit, Value::Null);
        assert_eq!(meta, EventMetadata::Credit(CreditMetadata::default()));
    }

    #[test]
    fn test_display_fields_use_fallbacks() {
        let meta = EventMetadata::SecurityReport(SecurityReportMetadata::default());
        let fields = meta.display_fields();
        let recipients = fields.iter().find(|(k, _)| k == "Recipients").unwrap();
        assert_eq!(recipients.1, "0");
        let report = fields.iter().find(|(k, _)| k == "Report").unwrap();
        assert_eq!(report.1, "N/A");
    }

    #[test]
    fn test_unknown_bag_timing_is_read_leniently() {
        let meta = EventMetadata::decode(
            &EventKind::Other("IMPORT".into()),
            json!({ "startedAt": 1_700_000_000_000i64, "durationMs": 42 }),
        );
        let timing = meta.timing();
        assert!(timing.started_at.is_some());
        assert_eq!(timing.duration_ms, Some(42));
    }

    #[test]
    fn test_to_value_drops_empty_fields() {
        let meta = EventMetadata::CronRun(CronRunMetadata {
            job_name: Some("sync".into()),
            ..Default::default()
        });
        let value = meta.to_value();
        assert_eq!(value, json!({ "jobName": "sync" }));
    }
}
