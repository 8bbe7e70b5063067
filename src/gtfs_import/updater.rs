// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{error, info};

use super::errors::GtfsFeedImporterError;
use super::importer::GtfsFeedImporter;
use crate::models::Feed;
use crate::schema::gtfs::feeds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Imported,
    SkippedUnchanged,
}

pub fn needs_import(stored_fingerprint: &str, current_fingerprint: &str, force: bool) -> bool {
    force || stored_fingerprint != current_fingerprint
}

/// What gets written to the feed row after an update attempt.
///
/// `import_attempted_at == imported_at` marks the last attempt as the one
/// that imported. A later `import_attempted_at` with an empty error message
/// is an unchanged check, with a message a failure since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAttempt {
    pub import_attempted_at: DateTime<Utc>,
    pub last_import_error_message: String,
}

impl ImportAttempt {
    pub fn succeeded(feed: &Feed, now: DateTime<Utc>) -> Self {
        ImportAttempt {
            import_attempted_at: feed.imported_at.unwrap_or(now),
            last_import_error_message: String::new(),
        }
    }

    pub fn unchanged(now: DateTime<Utc>) -> Self {
        ImportAttempt {
            import_attempted_at: now,
            last_import_error_message: String::new(),
        }
    }

    pub fn failed(message: &str, now: DateTime<Utc>) -> Self {
        ImportAttempt {
            import_attempted_at: now,
            last_import_error_message: message.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub imported: Vec<i32>,
    pub skipped: Vec<i32>,
    pub failed: Vec<(i32, String)>,
}

pub struct GtfsFeedUpdater {
    importer: GtfsFeedImporter,
}

impl GtfsFeedUpdater {
    pub fn new(importer: GtfsFeedImporter) -> Self {
        GtfsFeedUpdater { importer }
    }

    /// Imports the feed when its fingerprint changed or `force` is set.
    /// The attempt is written to the feed row in every case, outside the
    /// import transaction, and a failed import's error is returned after.
    pub async fn update_single_feed(
        &self,
        conn: &mut AsyncPgConnection,
        feed: &mut Feed,
        force: bool,
        skip_validation: bool,
    ) -> Result<UpdateOutcome, GtfsFeedImporterError> {
        let result = self.try_update(conn, feed, force, skip_validation).await;

        let attempt = match &result {
            Ok(UpdateOutcome::Imported) => ImportAttempt::succeeded(feed, Utc::now()),
            Ok(UpdateOutcome::SkippedUnchanged) => ImportAttempt::unchanged(Utc::now()),
            Err(err) => {
                error!("Import of feed {} failed: {}", feed.id, err);
                ImportAttempt::failed(&err.to_string(), Utc::now())
            }
        };

        match record_attempt(conn, feed.id, &attempt).await {
            Ok(updated) => *feed = updated,
            Err(err) => {
                error!("Could not record import attempt for feed {}: {}", feed.id, err);
                if result.is_ok() {
                    return Err(err.into());
                }
            }
        }

        result
    }

    async fn try_update(
        &self,
        conn: &mut AsyncPgConnection,
        feed: &mut Feed,
        force: bool,
        skip_validation: bool,
    ) -> Result<UpdateOutcome, GtfsFeedImporterError> {
        let fingerprint = self.importer.reader().get_feed_fingerprint(feed).await;

        if !needs_import(&feed.fingerprint, &fingerprint, force) {
            info!(
                "Feed {} ({}) unchanged since last import, fingerprint {}",
                feed.id, feed.url_or_path, fingerprint
            );
            return Ok(UpdateOutcome::SkippedUnchanged);
        }

        info!(
            "Feed {} ({}) fingerprint {} -> {}{}, importing",
            feed.id,
            feed.url_or_path,
            feed.fingerprint,
            fingerprint,
            if force { " (forced)" } else { "" }
        );

        self.importer
            .run_with_fingerprint(conn, feed, skip_validation, Some(fingerprint))
            .await?;

        Ok(UpdateOutcome::Imported)
    }

    /// Updates every feed. One feed failing never stops the others.
    pub async fn update_feeds(
        &self,
        conn: &mut AsyncPgConnection,
        force: bool,
    ) -> Result<UpdateSummary, diesel::result::Error> {
        let all_feeds: Vec<Feed> = feeds::table
            .order(feeds::id)
            .select(Feed::as_select())
            .load(conn)
            .await?;

        info!("Updating {} feeds", all_feeds.len());

        let mut summary = UpdateSummary::default();

        for mut feed in all_feeds {
            match self.update_single_feed(conn, &mut feed, force, false).await {
                Ok(UpdateOutcome::Imported) => summary.imported.push(feed.id),
                Ok(UpdateOutcome::SkippedUnchanged) => summary.skipped.push(feed.id),
                Err(err) => summary.failed.push((feed.id, err.to_string())),
            }
        }

        info!(
            "Feed update finished: {} imported, {} unchanged, {} failed",
            summary.imported.len(),
            summary.skipped.len(),
            summary.failed.len()
        );

        Ok(summary)
    }
}

async fn record_attempt(
    conn: &mut AsyncPgConnection,
    feed_id: i32,
    attempt: &ImportAttempt,
) -> Result<Feed, diesel::result::Error> {
    diesel::update(feeds::table.find(feed_id))
        .set((
            feeds::import_attempted_at.eq(Some(attempt.import_attempted_at)),
            feeds::last_import_error_message.eq(&attempt.last_import_error_message),
            feeds::updated_at.eq(Utc::now()),
        ))
        .returning(Feed::as_returning())
        .get_result(conn)
        .await
}
