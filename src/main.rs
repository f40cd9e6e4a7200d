//! gh-triage - Command-line entry point
//!
//! Thin glue over the core: one-shot sync, cache-backed listing and
//! stats, and mark-done. An interactive front end would use the same
//! read API and worker bus; none of that lives here.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gh_triage::config::{self, Config};
use gh_triage::db::{self, notifications};
use gh_triage::github::{auth, GithubClient};
use gh_triage::messages::{Request, Response};
use gh_triage::sync;
use gh_triage::worker::Worker;

const COL_REPO_MAX: usize = 28;
const COL_TITLE_MAX: usize = 48;

/// Command-line arguments for gh-triage
#[derive(Parser, Debug)]
#[command(name = "gh-triage")]
#[command(about = "Local-first triage for the GitHub notification inbox")]
#[command(version)]
struct Args {
    /// Database path (defaults to the per-user data directory)
    #[arg(long, env = "GH_TRIAGE_DB")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch notifications from GitHub and update the local cache
    Sync,
    /// List cached notifications in priority order
    Ls {
        /// Substring filter on title or owner/repo
        #[arg(long, default_value = "")]
        filter: String,
        /// Exact filter on notification reason
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Show aggregate notification statistics
    Stats,
    /// Mark notifications as read upstream and drop them locally
    Done {
        /// Notification IDs to mark done
        #[arg(required = true)]
        notification_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gh_triage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::load_default().context("Failed to load configuration")?;
    let db_path = args.db_path.unwrap_or_else(config::db_file_path);
    let pool = db::open_db(&db_path)
        .await
        .with_context(|| format!("Failed to open cache at {}", db_path.display()))?;

    match args.command {
        Command::Sync => cmd_sync(&pool, &config).await,
        Command::Ls { filter, reason } => cmd_ls(&pool, &filter, &reason).await,
        Command::Stats => cmd_stats(&pool).await,
        Command::Done { notification_ids } => cmd_done(pool, config, notification_ids).await,
    }
}

async fn cmd_sync(pool: &sqlx::SqlitePool, config: &Config) -> Result<()> {
    let token = auth::obtain_token().await.context("Failed to obtain GitHub token")?;
    let client = GithubClient::new(token)?;

    let summary = sync::sync(pool, &client, config, Some(&print_progress))
        .await
        .context("Sync failed")?;

    println!(
        "Synced: {} new, {} updated, {} purged, {} total",
        summary.new, summary.updated, summary.purged, summary.total
    );
    if let Some(reset) = summary.rate_limited_until {
        println!("Rate limited; retry after {reset}");
    }
    Ok(())
}

fn print_progress(current: usize, total: usize) {
    let width = 40;
    let filled = if total > 0 { width * current / total } else { 0 };
    let bar: String = "█".repeat(filled) + &"░".repeat(width - filled);
    eprint!("\r  {bar} {current}/{total}");
    let _ = std::io::stderr().flush();
    if current == total {
        eprintln!();
    }
}

async fn cmd_ls(pool: &sqlx::SqlitePool, filter: &str, reason: &str) -> Result<()> {
    let rows = notifications::list_notifications(pool, filter, reason).await?;
    if rows.is_empty() {
        println!("Inbox is empty. Run `gh-triage sync` to fetch notifications.");
        return Ok(());
    }

    println!("{:2} {:<30} {:<50} {:<20}", "", "Repo", "Title", "Reason");
    println!("{}", "─".repeat(104));
    for row in rows {
        println!(
            "{} {:<30} {:<50} {:<20}",
            tier_indicator(&row.priority_tier),
            truncate(&row.repo(), COL_REPO_MAX),
            truncate(&row.subject_title, COL_TITLE_MAX),
            row.reason
        );
    }
    Ok(())
}

fn tier_indicator(tier: &str) -> &'static str {
    match tier {
        "blocking" => "🔴",
        "action" => "🟡",
        _ => "⚪",
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max - 1).collect();
        format!("{cut}…")
    }
}

async fn cmd_stats(pool: &sqlx::SqlitePool) -> Result<()> {
    let stats = notifications::notification_stats(pool).await?;
    if stats.total == 0 {
        println!("No notifications.");
        return Ok(());
    }

    println!("Total: {}", stats.total);
    for (heading, entries) in [
        ("By tier:", &stats.by_tier),
        ("By repo:", &stats.by_repo),
        ("By reason:", &stats.by_reason),
    ] {
        println!("\n{heading}");
        for stat in entries {
            println!("  {:<40} {}", stat.label, stat.count);
        }
    }
    Ok(())
}

async fn cmd_done(
    pool: sqlx::SqlitePool,
    config: Config,
    notification_ids: Vec<String>,
) -> Result<()> {
    let token = auth::obtain_token().await.context("Failed to obtain GitHub token")?;
    let client = std::sync::Arc::new(GithubClient::new(token)?);

    let (mut handle, join) = Worker::spawn(pool, client, config);
    handle.submit(Request::MarkDone { notification_ids })?;

    match handle.recv().await {
        Some(Response::MarkDone { notification_ids, errors }) => {
            println!("Marked done: {}", notification_ids.len());
            for error in errors {
                eprintln!("Failed: {error}");
            }
        }
        Some(Response::Error { request, message }) => {
            eprintln!("{request} failed: {message}");
        }
        other => eprintln!("Unexpected worker response: {other:?}"),
    }

    handle.shutdown();
    let _ = join.await;
    Ok(())
}
