// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::let_and_return,
    clippy::iter_cloned_collect,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::op_ref
)]

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use itertools::Itertools;
use maas::config::Config;
use maas::gtfs_import::{GtfsFeedImporter, GtfsFeedReader, GtfsFeedUpdater, UpdateOutcome};
use maas::models::{Feed, NewFeed};
use maas::postgres_tools::make_async_pool;
use maas::schema::gtfs::feeds;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Import and update GTFS feeds", long_about = None)]
struct Args {
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a feed from a URL or local path, creating the feed if needed
    Import {
        url_or_path: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ticketing_system_id: Option<i32>,
        #[arg(long)]
        skip_validation: bool,
    },
    /// Re-import feeds whose source changed
    Update {
        #[arg(long)]
        force: bool,
        /// Only applies together with --feed-id
        #[arg(long)]
        skip_validation: bool,
        #[arg(long)]
        feed_id: Option<i32>,
    },
}

async fn find_or_create_feed(
    conn: &mut AsyncPgConnection,
    url_or_path: &str,
    name: Option<String>,
    ticketing_system_id: Option<i32>,
) -> anyhow::Result<Feed> {
    let existing = feeds::table
        .filter(feeds::url_or_path.eq(url_or_path))
        .select(Feed::as_select())
        .first(conn)
        .await
        .optional()?;

    if let Some(feed) = existing {
        info!("Using existing feed {} for {}", feed.id, url_or_path);
        return Ok(feed);
    }

    let feed = diesel::insert_into(feeds::table)
        .values(NewFeed {
            name: name.unwrap_or_default(),
            url_or_path: url_or_path.to_string(),
            ticketing_system_id,
        })
        .returning(Feed::as_returning())
        .get_result(conn)
        .await?;

    info!("Created feed {} for {}", feed.id, url_or_path);

    Ok(feed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = Config::from_env()?;

    let pool = make_async_pool(&config)
        .await
        .map_err(|e| anyhow!("could not create database pool: {}", e))?;
    let mut pooled = pool
        .get()
        .await
        .map_err(|e| anyhow!("could not get database connection: {}", e))?;
    let conn: &mut AsyncPgConnection = &mut pooled;

    let reader = GtfsFeedReader::new(config.feed_download_timeout).context("building HTTP client")?;
    let updater = GtfsFeedUpdater::new(GtfsFeedImporter::new(reader, config.import_batch_size)?);

    match args.command {
        Commands::Import {
            url_or_path,
            name,
            ticketing_system_id,
            skip_validation,
        } => {
            let mut feed = find_or_create_feed(conn, &url_or_path, name, ticketing_system_id).await?;

            updater
                .update_single_feed(conn, &mut feed, true, skip_validation)
                .await?;

            info!("Imported feed {} ({})", feed.id, feed.name);
        }
        Commands::Update {
            force,
            skip_validation,
            feed_id: Some(feed_id),
        } => {
            let mut feed = feeds::table
                .find(feed_id)
                .select(Feed::as_select())
                .first(conn)
                .await
                .optional()?
                .ok_or_else(|| anyhow!("feed {} does not exist", feed_id))?;

            match updater
                .update_single_feed(conn, &mut feed, force, skip_validation)
                .await?
            {
                UpdateOutcome::Imported => info!("Feed {} imported", feed.id),
                UpdateOutcome::SkippedUnchanged => info!("Feed {} unchanged", feed.id),
            }
        }
        Commands::Update {
            force,
            skip_validation,
            feed_id: None,
        } => {
            if skip_validation {
                warn!("--skip-validation only applies together with --feed-id, ignoring it");
            }

            let summary = updater.update_feeds(conn, force).await?;

            if !summary.failed.is_empty() {
                warn!(
                    "Failed feeds: {}",
                    summary
                        .failed
                        .iter()
                        .map(|(id, message)| format!("{} ({})", id, message))
                        .join(", ")
                );
            }
        }
    }

    Ok(())
}
