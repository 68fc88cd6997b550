// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! auditfeed: page through audit events from the command line.
//!
//! Usage: `auditfeed [OPTIONS] <list|summary>`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use auditfeed::classify::classify;
use auditfeed::config::Config;
use auditfeed::logging::init_tracing;
use auditfeed::sort::{SortDirection, SortField, SortSpec};
use auditfeed::{ActivityFeed, Event, FeedSummary, HttpEventSource, PageQuery};

#[derive(Parser)]
#[command(name = "auditfeed")]
#[command(about = "Browse the audit activity feed")]
#[command(version)]
struct Cli {
    /// Config file (default: /etc/auditfeed/config.toml, then ./config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    query: QueryArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Time window in days
    #[arg(long, global = true)]
    days: Option<u32>,

    /// Events per page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Maximum pages to load
    #[arg(long, global = true)]
    max_pages: Option<u32>,

    /// Extra backend flag as name=value (repeatable)
    #[arg(long = "flag", global = true, value_parser = parse_flag)]
    flags: Vec<(String, String)>,

    /// Type bucket (all, cron, cron-failed, reports, reports-sent, reports-failed,
    /// batch, license, credit, organization, account)
    #[arg(short = 't', long = "type", global = true)]
    type_filter: Option<String>,

    /// Outcome: all, success or failed
    #[arg(short, long, global = true)]
    status: Option<String>,

    /// Organization id substring
    #[arg(long, global = true)]
    org: Option<String>,

    /// Earliest timestamp (RFC 3339 or YYYY-MM-DD)
    #[arg(long, global = true)]
    since: Option<String>,

    /// Latest timestamp (RFC 3339 or YYYY-MM-DD)
    #[arg(long, global = true)]
    until: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List events, newest first unless a sort is given
    List {
        /// Sort field: timestamp, enqueued, started, completed or duration
        #[arg(long)]
        sort: Option<SortField>,

        /// Sort direction: asc or desc
        #[arg(long, default_value = "desc")]
        direction: SortDirection,

        /// Show typed metadata under each event
        #[arg(long)]
        details: bool,
    },

    /// Count loaded events by category and outcome
    Summary,
}

fn parse_flag(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(k, _)| !k.trim().is_empty())
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;
    init_tracing(&config.logging.level);

    let mut query: PageQuery = config.feed.page_query();
    if let Some(days) = cli.query.days {
        query.days = days;
    }
    if let Some(page_size) = cli.query.page_size {
        query.page_size = page_size;
    }
    query.flags.extend(cli.query.flags.iter().cloned());
    let max_pages = cli.query.max_pages.unwrap_or(config.feed.max_pages).max(1);

    let source = HttpEventSource::new(&config.backend).context("Failed to build HTTP client")?;
    tracing::debug!(url = source.url(), days = query.days, page_size = query.page_size, "starting");
    let feed = ActivityFeed::new(Arc::new(source), query.clone());

    let local = [
        ("type", &cli.query.type_filter),
        ("status", &cli.query.status),
        ("org", &cli.query.org),
        ("since", &cli.query.since),
        ("until", &cli.query.until),
    ];
    for (key, value) in local {
        if let Some(value) = value {
            feed.set_filter(key, value).await?;
        }
    }

    let pages = feed.load_pages(query, max_pages).await?;
    tracing::info!(pages, loaded = feed.status().loaded, "feed loaded");

    match cli.command {
        Commands::List { sort, direction, details } => {
            feed.set_sort(Some(SortSpec {
                field: sort.unwrap_or(SortField::Timestamp),
                direction,
            }));
            let events = feed.visible_events();
            if cli.query.json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                print_events(&events, details);
                if feed.status().has_more {
                    println!("(more events available; raise --max-pages to load them)");
                }
            }
        }
        Commands::Summary => {
            let summary = feed.summary();
            if cli.query.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
    }
    Ok(())
}

fn print_events(events: &[Event], details: bool) {
    if events.is_empty() {
        println!("No events match the current filters.");
        return;
    }
    for event in events {
        let when = event
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let category = classify(event).category;
        println!(
            "{:<19}  {:<22}  {:<16}  {}",
            when,
            category.label(),
            event.org_label(),
            event.description
        );
        if details {
            for (label, value) in event.metadata.display_fields() {
                println!("{:>23} {}: {}", "", label, value);
            }
        }
    }
}

fn print_summary(summary: &FeedSummary) {
    println!("Events:    {}", summary.total);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed:    {}", summary.failed);
    println!("Unknown:   {}", summary.unknown);
    if !summary.by_category.is_empty() {
        println!();
        for (category, count) in &summary.by_category {
            println!("  {:<24} {}", category.label(), count);
        }
    }
}
