//! # Post Harness CLI (`ph`)
//!
//! The `ph` binary ingests one or more social-media export archives and
//! browses the posts they contain.
//!
//! ## Usage
//!
//! ```bash
//! ph --config ./config/ph.toml <command> <archives or directories…>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ph ingest` | Run ingestion and print the report |
//! | `ph months` | Print the year/month index |
//! | `ph list` | Print one page of a month's posts |
//! | `ph show --id <ID>` | Print one post in full |
//! | `ph paths` | Print the top-level path segments of the archives |
//! | `ph export --out <FILE>` | Write posts and report as JSON |
//! | `ph serve` | Ingest, then serve the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest a two-part export
//! ph ingest ~/Downloads/facebook-part1.zip ~/Downloads/facebook-part2.zip
//!
//! # Every zip under a directory, March 2021, second page
//! ph list ~/exports --year 2021 --month 3 --page 2
//!
//! # Self-contained JSON with media embedded as data URIs
//! ph export ~/exports --out posts.json --inline-media
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use post_harness::browse::{
    format_datetime, format_month_day, format_time, month_index, page_numbers, paginate,
    post_summary, search, PageMarker, Selection, EMPTY_TEXT,
};
use post_harness::config::{self, Config};
use post_harness::error::IngestError;
use post_harness::ingest::{Harness, Ingestor, Session};
use post_harness::media::{BlobResolver, BlobStore, InlineResolver};
use post_harness::models::Post;
use post_harness::report::IngestReport;
use post_harness::server;
use post_harness::sources::collect_archives;

/// Post Harness CLI: ingest and browse social-media archive exports.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "ph",
    about = "Post Harness: ingest and browse social-media archive exports",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ph.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Archives to ingest: zip files, or directories searched with
/// `[ingest].archive_globs`.
#[derive(Args)]
struct ArchiveArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest archives and print the report.
    Ingest {
        #[command(flatten)]
        archives: ArchiveArgs,
    },

    /// Print years and months with post counts, newest first.
    Months {
        #[command(flatten)]
        archives: ArchiveArgs,
    },

    /// Print one page of posts for a month.
    ///
    /// Defaults to the newest month present.
    List {
        #[command(flatten)]
        archives: ArchiveArgs,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// 1-based page; clamped to the available range.
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Case-insensitive substring filter over post text.
        #[arg(long)]
        search: Option<String>,
    },

    /// Print one post in full.
    Show {
        #[command(flatten)]
        archives: ArchiveArgs,

        /// Post id as printed by `ph list`.
        #[arg(long)]
        id: String,
    },

    /// Print the top-level path segments found in the archives.
    Paths {
        #[command(flatten)]
        archives: ArchiveArgs,
    },

    /// Write posts, report and paths as JSON.
    Export {
        #[command(flatten)]
        archives: ArchiveArgs,

        #[arg(long)]
        out: PathBuf,

        /// Embed media as `data:` URIs so the file is self-contained.
        #[arg(long)]
        inline_media: bool,
    },

    /// Ingest, then serve the HTTP API on `[server].bind`.
    Serve {
        #[command(flatten)]
        archives: ArchiveArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    let limit = cfg.browse.error_display_limit;

    match cli.command {
        Commands::Ingest { archives } => {
            let session = load_session(&cfg, &archives, Arc::new(BlobStore::new())).await?;
            println!(
                "Ingested {} posts from {} archive(s)",
                session.report.adopted, session.report.archive_count
            );
            print!("{}", session.report.render(limit));
            if session.dataset.is_empty() {
                print_no_posts(&session);
            }
        }
        Commands::Months { archives } => {
            let session = load_session(&cfg, &archives, Arc::new(BlobStore::new())).await?;
            for year in month_index(&session.dataset) {
                println!("{}", year.year);
                for month in year.months {
                    println!("  {:02}  {}", month.month, month.count);
                }
            }
        }
        Commands::List {
            archives,
            year,
            month,
            page,
            search: term,
        } => {
            if month.is_some() && year.is_none() {
                bail!("--month requires --year");
            }
            let session = load_session(&cfg, &archives, Arc::new(BlobStore::new())).await?;
            let dataset = &session.dataset;
            let selection = match Selection::resolve(dataset, year, month) {
                Some(selection) => selection,
                None => {
                    print_no_posts(&session);
                    return Ok(());
                }
            };

            let month_posts = dataset.month(selection.year, selection.month);
            let filtered = search(month_posts, term.as_deref().unwrap_or(""));
            let page = paginate(&filtered, page, cfg.browse.page_size);

            println!("{} ({})", selection.label(), month_posts.len());
            if page.items.is_empty() {
                println!("  no posts in this selection");
            }
            for post in page.items {
                println!(
                    "  {}  {}  {}  {}",
                    format_month_day(dataset.zone, post.created_at),
                    format_time(dataset.zone, post.created_at),
                    post.id,
                    post_summary(post, cfg.browse.summary_length)
                );
            }
            println!(
                "page {} of {} ({} posts)  [{}]",
                page.page,
                page.total_pages,
                page.total_items,
                render_page_numbers(&page_numbers(page.total_pages, page.page), page.page)
            );
        }
        Commands::Show { archives, id } => {
            let session = load_session(&cfg, &archives, Arc::new(BlobStore::new())).await?;
            let post = session
                .dataset
                .get(&id)
                .ok_or_else(|| anyhow!("No post with id: {}", id))?;
            print_post(post, &session);
        }
        Commands::Paths { archives } => {
            let session = load_session(&cfg, &archives, Arc::new(BlobStore::new())).await?;
            for path in &session.top_paths {
                println!("{}", path);
            }
        }
        Commands::Export {
            archives,
            out,
            inline_media,
        } => {
            let resolver: Arc<dyn BlobResolver> = if inline_media {
                Arc::new(InlineResolver)
            } else {
                Arc::new(BlobStore::new())
            };
            let session = load_session(&cfg, &archives, resolver).await?;
            write_export(&session, &out)?;
            println!("Exported {} posts to {}", session.dataset.len(), out.display());
        }
        Commands::Serve { archives } => {
            let store = Arc::new(BlobStore::new());
            let session = load_session(&cfg, &archives, store.clone()).await?;
            println!("Ingested {} posts", session.dataset.len());
            server::run_server(&cfg, session, store).await?;
        }
    }

    Ok(())
}

async fn load_session(
    cfg: &Config,
    archives: &ArchiveArgs,
    resolver: Arc<dyn BlobResolver>,
) -> Result<Session> {
    let sources = collect_archives(&archives.paths, &cfg.ingest.archive_globs)?;
    let mut harness = Harness::new(Ingestor::from_config(cfg, resolver)?);

    match harness.run_ingestion(sources).await {
        Ok(_) => {}
        Err(IngestError::NoReadableArchives(report)) => {
            print!("{}", report.render(cfg.browse.error_display_limit));
            bail!(IngestError::NoReadableArchives(report));
        }
        Err(e) => return Err(e.into()),
    }
    harness
        .into_session()
        .ok_or_else(|| anyhow!("Ingestion produced no session"))
}

fn print_no_posts(session: &Session) {
    println!("No posts found. Make sure the export includes your posts.");
    if !session.top_paths.is_empty() {
        println!("Top-level paths in the archives:");
        for path in &session.top_paths {
            println!("  {}", path);
        }
    }
}

fn render_page_numbers(markers: &[PageMarker], current: usize) -> String {
    markers
        .iter()
        .map(|m| match m {
            PageMarker::Number(n) if *n == current => format!("*{}", n),
            PageMarker::Number(n) => n.to_string(),
            PageMarker::Gap => "...".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_post(post: &Post, session: &Session) {
    let zone = session.dataset.zone;
    println!("date:   {}", format_datetime(zone, post.created_at));
    println!("id:     {}", post.id);
    println!("source: {}", post.source_path);
    if post.permalink.is_empty() {
        println!("link:   (none)");
    } else {
        println!("link:   {}", post.permalink);
    }
    if !post.media.is_empty() {
        println!("media:");
        for media in &post.media {
            let kind = media.kind.map(|k| k.as_str()).unwrap_or("missing");
            println!("  [{}] {}", kind, media.uri);
        }
    }
    println!();
    if post.text.is_empty() {
        println!("{}", EMPTY_TEXT);
    } else {
        println!("{}", post.text);
    }
}

#[derive(Serialize)]
struct Export<'a> {
    report: &'a IngestReport,
    top_paths: &'a [String],
    posts: Vec<&'a Post>,
}

fn write_export(session: &Session, out: &std::path::Path) -> Result<()> {
    let export = Export {
        report: &session.report,
        top_paths: &session.top_paths,
        posts: session.dataset.posts.iter().map(|p| p.as_ref()).collect(),
    };
    let file = std::fs::File::create(out)
        .with_context(|| format!("Failed to create export file: {}", out.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &export)
        .with_context(|| format!("Failed to write export file: {}", out.display()))?;
    Ok(())
}
