// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! Event categorizer.
//!
//! Maps an event's kind, sub-type and metadata to a display [`Category`], a
//! [`Badge`] style and an [`Icon`]. Dispatch is by kind first, then by
//! case-insensitive substring checks on the sub-type. Classification is total:
//! an unknown kind is shown as a generic cron run with a neutral badge, and an
//! unknown sub-type under a known kind lands in that kind's generic bucket.
//!
//! The sub-type signal helpers are shared with the filter engine so the filter
//! dropdown and the displayed badges never disagree.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::event::{Event, EventKind, EventMetadata};
use crate::filter::{outcome, Outcome};

/// Display category derived from an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    CronRun,
    CronStarted,
    CronFailure,
    BatchRun,
    ReportGenerated,
    ReportSent,
    ReportPartial,
    ReportFailed,
    BatchReport,
    ReportActivity,
    LicenseIssued,
    LicenseRenewed,
    LicenseRevoked,
    LicenseExpired,
    LicenseActivity,
    CreditAdded,
    CreditUsage,
    CreditActivity,
    OrganizationCreated,
    OrganizationUpdated,
    OrganizationDeleted,
    OrganizationActivity,
    SignIn,
    SignInFailed,
    AccountActivity,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::CronRun => "Cron Run",
            Category::CronStarted => "Cron Started",
            Category::CronFailure => "Cron Failure",
            Category::BatchRun => "Batch Run",
            Category::ReportGenerated => "Report Generated",
            Category::ReportSent => "Report Sent",
            Category::ReportPartial => "Report Partially Delivered",
            Category::ReportFailed => "Report Failed",
            Category::BatchReport => "Batch Report",
            Category::ReportActivity => "Report Activity",
            Category::LicenseIssued => "License Issued",
            Category::LicenseRenewed => "License Renewed",
            Category::LicenseRevoked => "License Revoked",
            Category::LicenseExpired => "License Expired",
            Category::LicenseActivity => "License Activity",
            Category::CreditAdded => "Credits Added",
            Category::CreditUsage => "Credit Usage",
            Category::CreditActivity => "Credit Activity",
            Category::OrganizationCreated => "Organization Created",
            Category::OrganizationUpdated => "Organization Updated",
            Category::OrganizationDeleted => "Organization Deleted",
            Category::OrganizationActivity => "Organization Activity",
            Category::SignIn => "Sign-in",
            Category::SignInFailed => "Sign-in Failed",
            Category::AccountActivity => "Account Activity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Badge style token. Rendering decides the actual colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Icon {
    Clock,
    Play,
    AlertTriangle,
    Layers,
    FileText,
    Mail,
    Key,
    CreditCard,
    Building,
    User,
    LogIn,
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub badge: Badge,
    pub icon: Icon,
}

impl Classification {
    fn new(category: Category, badge: Badge, icon: Icon) -> Self {
        Self { category, badge, icon }
    }
}

fn has_any(sub_type: &str, needles: &[&str]) -> bool {
    let lowered = sub_type.to_lowercase();
    needles.iter().any(|n| lowered.contains(n))
}

/// Sub-type reports an error or failure.
pub fn is_failure(sub_type: &str) -> bool {
    has_any(sub_type, &["fail", "error"])
}

pub fn is_batch(sub_type: &str) -> bool {
    has_any(sub_type, &["batch"])
}

pub fn is_sent(sub_type: &str) -> bool {
    has_any(sub_type, &["sent", "deliver"])
}

/// Sub-type reports successful completion.
pub fn is_completion(sub_type: &str) -> bool {
    has_any(sub_type, &["complete", "success", "finish", "done"])
}

pub fn is_started(sub_type: &str) -> bool {
    has_any(sub_type, &["start", "running", "queued"])
}

/// Classify an event for display. Pure and total.
pub fn classify(event: &Event) -> Classification {
    let sub = event.sub_type.as_str();
    match &event.kind {
        EventKind::CronRun => classify_cron(event),
        EventKind::SecurityReport => classify_report(sub, &event.metadata),
        EventKind::License => classify_license(sub),
        EventKind::Credit => classify_credit(sub, &event.metadata),
        EventKind::Organization => classify_organization(sub),
        EventKind::Account => classify_account(sub),
        EventKind::Other(_) => Classification::new(Category::CronRun, Badge::Neutral, Icon::Clock),
    }
}

// Failure follows the same outcome the `cron-failed` bucket and `status=failed` use.
fn classify_cron(event: &Event) -> Classification {
    let sub = event.sub_type.as_str();
    if outcome(event) == Outcome::Failed {
        Classification::new(Category::CronFailure, Badge::Danger, Icon::AlertTriangle)
    } else if is_batch(sub) {
        Classification::new(Category::BatchRun, Badge::Info, Icon::Layers)
    } else if is_started(sub) {
        Classification::new(Category::CronStarted, Badge::Info, Icon::Play)
    } else if is_completion(sub) {
        Classification::new(Category::CronRun, Badge::Success, Icon::Clock)
    } else {
        Classification::new(Category::CronRun, Badge::Neutral, Icon::Clock)
    }
}

fn classify_report(sub: &str, metadata: &EventMetadata) -> Classification {
    if is_failure(sub) {
        return Classification::new(Category::ReportFailed, Badge::Danger, Icon::AlertTriangle);
    }
    if is_batch(sub) {
        return Classification::new(Category::BatchReport, Badge::Info, Icon::Layers);
    }
    if is_sent(sub) {
        let failed_count = match metadata {
            EventMetadata::SecurityReport(m) => m.failed_count.unwrap_or(0),
            _ => 0,
        };
        if failed_count > 0 {
            return Classification::new(Category::ReportPartial, Badge::Warning, Icon::Mail);
        }
        return Classification::new(Category::ReportSent, Badge::Success, Icon::Mail);
    }
    if has_any(sub, &["generat", "created"]) {
        return Classification::new(Category::ReportGenerated, Badge::Info, Icon::FileText);
    }
    Classification::new(Category::ReportActivity, Badge::Neutral, Icon::FileText)
}

fn classify_license(sub: &str) -> Classification {
    if has_any(sub, &["revoke", "suspend"]) {
        Classification::new(Category::LicenseRevoked, Badge::Danger, Icon::Key)
    } else if has_any(sub, &["expire"]) {
        Classification::new(Category::LicenseExpired, Badge::Warning, Icon::Key)
    } else if has_any(sub, &["renew", "extend"]) {
        Classification::new(Category::LicenseRenewed, Badge::Success, Icon::Key)
    } else if has_any(sub, &["issue", "created", "generat"]) {
        Classification::new(Category::LicenseIssued, Badge::Success, Icon::Key)
    } else {
        Classification::new(Category::LicenseActivity, Badge::Neutral, Icon::Key)
    }
}

fn classify_credit(sub: &str, metadata: &EventMetadata) -> Classification {
    let amount = match metadata {
        EventMetadata::Credit(m) => m.amount,
        _ => None,
    };
    let usage = has_any(sub, &["deduct", "consum", "usage", "spent"]);
    let added = has_any(sub, &["add", "purchase", "grant", "topup", "top-up"]);
    if added || (!usage && amount.map(|a| a > 0).unwrap_or(false)) {
        Classification::new(Category::CreditAdded, Badge::Success, Icon::CreditCard)
    } else if usage || amount.map(|a| a < 0).unwrap_or(false) {
        Classification::new(Category::CreditUsage, Badge::Info, Icon::CreditCard)
    } else {
        Classification::new(Category::CreditActivity, Badge::Neutral, Icon::CreditCard)
    }
}

fn classify_organization(sub: &str) -> Classification {
    if has_any(sub, &["delete", "removed"]) {
        Classification::new(Category::OrganizationDeleted, Badge::Danger, Icon::Building)
    } else if has_any(sub, &["create", "added"]) {
        Classification::new(Category::OrganizationCreated, Badge::Success, Icon::Building)
    } else if has_any(sub, &["update", "changed", "edit"]) {
        Classification::new(Category::OrganizationUpdated, Badge::Info, Icon::Building)
    } else {
        Classification::new(Category::OrganizationActivity, Badge::Neutral, Icon::Building)
    }
}

fn classify_account(sub: &str) -> Classification {
    let login = has_any(sub, &["login", "log in", "sign-in", "signin", "sign in"]);
    if login && is_failure(sub) {
        Classification::new(Category::SignInFailed, Badge::Danger, Icon::LogIn)
    } else if login {
        Classification::new(Category::SignIn, Badge::Info, Icon::LogIn)
    } else {
        Classification::new(Category::AccountActivity, Badge::Neutral, Icon::User)
    }
}

/// Per-category and per-outcome counts for a feed header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub succeeded: usize,
    pub failed: usize,
    pub unknown: usize,
}

pub fn summarize<'a>(events: impl IntoIterator<Item = &'a Event>) -> FeedSummary {
    let mut summary = FeedSummary::default();
    for event in events {
        summary.total += 1;
        *summary.by_category.entry(classify(event).category).or_insert(0) += 1;
        match outcome(event) {
            Outcome::Success => summary.succeeded += 1,
            Outcome::Failed => summary.failed += 1,
            Outcome::Unknown => summary.unknown += 1,
        }
    }
    summary
}
