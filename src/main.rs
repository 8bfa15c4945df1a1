use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use tubefeed::api::{ErrorKind, FetchError};
use tubefeed::config::Config;
use tubefeed::engine::Engine;
use tubefeed::feed::{FeedController, FeedItem, LoadOutcome, PageDirection, PageFetcher};
use tubefeed::history::HistoryEntry;
use tubefeed::storage::{Database, DatabaseError, LocalStore};
use tubefeed::util::{display_width, pad_to_width, truncate_to_width, validate_video_id};

const FALLBACK_WIDTH: usize = 100;
const META_WIDTH: usize = 34;

/// Get the config directory path (~/.config/tubefeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("tubefeed"))
}

#[derive(Parser, Debug)]
#[command(
    name = "tubefeed",
    about = "Browse trending videos, search, and keep a local watch history"
)]
struct Args {
    /// Config file (defaults to ~/.config/tubefeed/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Most popular videos
    Trending {
        /// Region code (e.g. US, GB, JP)
        #[arg(long)]
        region: Option<String>,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Search videos
    Search {
        term: String,
        /// Page to show, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Popular videos of a minute or less
    Shorts {
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Show a video with up-next suggestions and add it to history
    Watch {
        id: String,
        /// Open the video in the browser
        #[arg(long)]
        open: bool,
    },
    /// Show watch history
    History {
        /// Remove all entries
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(config = ?config, "Effective configuration");

    let db_path = config_dir.join("tubefeed.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of tubefeed appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };
    let store: Arc<dyn LocalStore> = Arc::new(db);

    let engine = Engine::from_config(&config, store).context("Failed to create client")?;
    let width = terminal_width();

    let outcome = match args.command {
        Command::Trending { region, pages } => {
            let feed = engine.trending_feed(region.as_deref());
            load_pages(&feed, pages).await.map(|_| print_feed(&feed, width))
        }
        Command::Search { term, page } => {
            if term.trim().is_empty() {
                anyhow::bail!("Search term must not be empty");
            }
            let feed = engine.search_feed(&term);
            step_to_page(&feed, page).await.map(|_| print_feed(&feed, width))
        }
        Command::Shorts { pages } => {
            let feed = engine.shorts_feed();
            load_pages(&feed, pages).await.map(|_| print_feed(&feed, width))
        }
        Command::Watch { id, open } => {
            let id = validate_video_id(&id)?;
            match engine.watch(id).await {
                Ok(Some(view)) => {
                    print_watch(&view.item, width);
                    println!();
                    println!("Up next");
                    if view.suggestions.is_empty() {
                        println!("  (nothing to suggest)");
                    }
                    for item in &view.suggestions {
                        println!("{}", render_item(item, width, Utc::now()));
                    }
                    if open {
                        let url = view.item.watch_url();
                        if let Err(e) = open::that(&url) {
                            tracing::warn!(url = %url, error = %e, "Failed to open browser");
                            eprintln!("Could not open a browser. Watch at {}", url);
                        }
                    }
                    Ok(())
                }
                Ok(None) => {
                    eprintln!("No video found with id {}", id);
                    std::process::exit(1);
                }
                Err(e) => Err(e),
            }
        }
        Command::History { clear } => {
            if clear {
                engine.clear_history().await;
                println!("History cleared.");
            } else {
                print_history(&engine.get_history().await, width);
            }
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", describe_fetch_error(&e));
        std::process::exit(1);
    }

    Ok(())
}

/// Load the first page, then append until `pages` pages are loaded or the feed runs out.
async fn load_pages<F: PageFetcher>(feed: &FeedController<F>, pages: usize) -> Result<(), FetchError> {
    feed.load_initial().await?;
    for _ in 1..pages {
        if feed.load_next().await? == LoadOutcome::Skipped {
            break;
        }
    }
    Ok(())
}

/// Load the first page, then step forward one page at a time to `page`.
async fn step_to_page<F: PageFetcher>(feed: &FeedController<F>, page: usize) -> Result<(), FetchError> {
    feed.load_initial().await?;
    while feed.snapshot().page_index() < page {
        if feed.load_page(PageDirection::Next).await? == LoadOutcome::Skipped {
            break;
        }
    }
    Ok(())
}

fn describe_fetch_error(e: &FetchError) -> String {
    match e.kind() {
        ErrorKind::UpstreamUnavailable => {
            format!("Could not reach the video service ({}). Try again later.", e)
        }
        ErrorKind::MalformedResponse => {
            format!("The video service sent a response we could not read ({}).", e)
        }
    }
}

fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(FALLBACK_WIDTH)
        .max(META_WIDTH + 20)
}

// ============================================================================
// Rendering
// ============================================================================

fn print_feed<F: PageFetcher>(feed: &FeedController<F>, width: usize) {
    let state = feed.snapshot();
    if state.is_empty_result() {
        println!("No videos found.");
        return;
    }

    let now = Utc::now();
    for item in state.items() {
        println!("{}", render_item(item, width, now));
    }

    let mut footer = Vec::new();
    if state.page_index() > 1 {
        footer.push(format!("page {}", state.page_index()));
    }
    footer.push(format!("{} videos", state.items().len()));
    if state.is_exhausted() {
        footer.push("end of feed".to_string());
    }
    println!("-- {} --", footer.join(", "));
}

/// One line: padded title, then channel, views, age and duration.
fn render_item(item: &FeedItem, width: usize, now: DateTime<Utc>) -> String {
    let meta = [
        Some(truncate_to_width(&item.channel_name, 16).into_owned()),
        item.views_label().map(|v| format!("{} views", v)),
        item.age_label(now),
        item.duration_label(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" · ");

    let title_width = width.saturating_sub(display_width(&meta) + 2);
    format!("{}  {}", pad_to_width(&item.title, title_width), meta)
}

fn print_watch(item: &FeedItem, width: usize) {
    println!("{}", truncate_to_width(&item.title, width));
    let mut stats = vec![item.channel_name.clone()];
    if let Some(views) = item.views_label() {
        stats.push(format!("{} views", views));
    }
    if let Some(likes) = item.likes_label() {
        stats.push(format!("{} likes", likes));
    }
    if let Some(age) = item.age_label(Utc::now()) {
        stats.push(age);
    }
    if let Some(duration) = item.duration_label() {
        stats.push(duration);
    }
    println!("{}", truncate_to_width(&stats.join(" · "), width));
    println!("{}", item.watch_url());

    if let Some(description) = item.description.as_deref().filter(|d| !d.is_empty()) {
        println!();
        for line in description.lines().take(8) {
            println!("  {}", truncate_to_width(line, width.saturating_sub(2)));
        }
    }
}

fn print_history(entries: &[HistoryEntry], width: usize) {
    if entries.is_empty() {
        println!("No videos in history yet. Start watching!");
        return;
    }
    let now = Utc::now();
    for entry in entries {
        let age = tubefeed::feed::format::format_relative_age(entry.watched_at, now);
        let meta = format!("{} · watched {}", truncate_to_width(&entry.channel_name, 16), age.to_lowercase());
        let title_width = width.saturating_sub(display_width(&meta) + 14);
        println!(
            "{}  {}  {}",
            entry.id,
            pad_to_width(&entry.title, title_width),
            meta
        );
    }
}
