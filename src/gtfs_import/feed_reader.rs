// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::errors::{FeedReadError, Finding, io_err};
use super::feed_source::{FeedSource, download_to_tempfile, unpack};
use super::fingerprint::feed_fingerprint;
use super::tables::{GtfsTable, GtfsTables};
use super::validation::validate_feed;
use crate::FALLBACK_LANGUAGE;
use crate::models::Feed;

/// A dataset parsed twice: typed by `gtfs_structures` for calendars and
/// referential checks, and as raw tables for field mapping.
pub struct ParsedFeed {
    pub gtfs: gtfs_structures::Gtfs,
    pub tables: GtfsTables,
}

impl ParsedFeed {
    /// feed_info default_lang, then feed_lang, then the first agency's
    /// language.
    pub fn default_language(&self) -> String {
        let feed_info = self.tables.rows("feed_info.txt").next();

        feed_info
            .and_then(|row| row.get("default_lang").or_else(|| row.get("feed_lang")))
            .or_else(|| {
                self.tables
                    .rows("agency.txt")
                    .find_map(|row| row.get("agency_lang"))
            })
            .map(|lang| lang.to_lowercase())
            .filter(|lang| lang != "mul")
            .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
    }
}

/// Reads every `*.txt` file in `root`.
pub fn read_tables(root: &Path) -> Result<GtfsTables, FeedReadError> {
    let mut tables = GtfsTables::new();

    let entries = std::fs::read_dir(root).map_err(|e| io_err!(root, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| io_err!(root, e))?;
        let path = entry.path();

        if !path.is_file() || path.extension().is_none_or(|ext| ext != "txt") {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        let file = std::fs::File::open(&path).map_err(|e| io_err!(&path, e))?;

        let table = GtfsTable::from_reader(file_name, file).map_err(|source| FeedReadError::Csv {
            file_name: file_name.to_string(),
            source,
        })?;

        tables.insert(table);
    }

    Ok(tables)
}

/// Blocking: unpacks if needed and parses the dataset at `path`.
pub fn parse_local(path: &Path) -> Result<ParsedFeed, FeedReadError> {
    let unpacked = unpack(path)?;
    let root = unpacked.root();

    let gtfs = gtfs_structures::Gtfs::new(&root.to_string_lossy())?;
    let tables = read_tables(root)?;

    Ok(ParsedFeed { gtfs, tables })
}

pub struct GtfsFeedReader {
    client: reqwest::Client,
}

impl GtfsFeedReader {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new()
            .use_rustls_tls()
            .user_agent("MaaS GTFS importer")
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(20))
            .deflate(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(GtfsFeedReader { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        GtfsFeedReader { client }
    }

    pub async fn read_feed(&self, location: &str) -> Result<ParsedFeed, FeedReadError> {
        let parsed = match FeedSource::parse(location) {
            FeedSource::Remote(url) => {
                let download = download_to_tempfile(&self.client, &url).await?;

                tokio::task::spawn_blocking(move || parse_local(download.path())).await??
            }
            FeedSource::Local(path) => {
                tokio::task::spawn_blocking(move || parse_local(&path)).await??
            }
        };

        info!(
            "Read feed {}: {} routes, {} trips, {} stops",
            location,
            parsed.gtfs.routes.len(),
            parsed.gtfs.trips.len(),
            parsed.gtfs.stops.len()
        );

        Ok(parsed)
    }

    pub fn validate(&self, parsed: &ParsedFeed) -> Vec<Finding> {
        validate_feed(parsed)
    }

    pub async fn get_feed_fingerprint(&self, feed: &Feed) -> String {
        feed_fingerprint(&self.client, &feed.url_or_path).await
    }
}
