// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::{debug, info, warn};

use super::departures::expand_trip_dates;
use super::errors::{Finding, GtfsFeedImporterError};
use super::feed_reader::{GtfsFeedReader, ParsedFeed};
use super::field_mapping::{EntityKind, mapping, validate_field_mappings};
use super::import_context::ImportContext;
use super::row_builders::*;
use super::tables::GtfsTables;
use super::translations::{Translatable, TranslationIndex};
use crate::models::Feed;
use crate::schema::gtfs::{
    agencies, departures, fare_rider_categories, fare_rules, fares, feed_infos, feeds,
    rider_categories, routes, shapes, stop_times, stops, trips,
};

/// Inserts `$rows` in chunks and records the returned `(id, source_id)`
/// pairs so later entity types can reference them.
macro_rules! insert_keyed {
    ($conn:expr, $ctx:expr, $kind:expr, $table:ident, $rows:expr, $batch_size:expr) => {{
        let mut inserted = 0;
        for chunk in $rows.chunks($batch_size) {
            let ids: Vec<(i32, String)> = diesel::insert_into($table::table)
                .values(chunk)
                .returning(($table::id, $table::source_id))
                .get_results($conn)
                .await?;
            inserted += ids.len();
            $ctx.extend($kind, ids);
        }
        inserted
    }};
}

macro_rules! insert_plain {
    ($conn:expr, $table:ident, $rows:expr, $batch_size:expr) => {{
        let mut inserted = 0;
        for chunk in $rows.chunks($batch_size) {
            inserted += diesel::insert_into($table::table)
                .values(chunk)
                .execute($conn)
                .await?;
        }
        inserted
    }};
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub counts: Vec<(EntityKind, usize)>,
    pub departures: usize,
    pub translations_applied: usize,
    pub translations_skipped: usize,
}

impl ImportSummary {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, count)| *count)
    }
}

/// Warnings are logged, any error aborts before a transaction is opened.
pub fn check_findings(findings: Vec<Finding>) -> Result<(), GtfsFeedImporterError> {
    let (errors, warnings): (Vec<Finding>, Vec<Finding>) =
        findings.into_iter().partition(|finding| finding.is_error());

    for warning in &warnings {
        warn!("{}", warning);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(GtfsFeedImporterError::Validation(errors))
    }
}

/// Replaces everything a feed owns with the contents of its source, in one
/// transaction.
pub struct GtfsFeedImporter {
    reader: GtfsFeedReader,
    batch_size: usize,
}

impl GtfsFeedImporter {
    pub fn new(reader: GtfsFeedReader, batch_size: usize) -> Result<Self, GtfsFeedImporterError> {
        validate_field_mappings().map_err(GtfsFeedImporterError::Mapping)?;

        Ok(GtfsFeedImporter {
            reader,
            batch_size: batch_size.max(1),
        })
    }

    pub fn reader(&self) -> &GtfsFeedReader {
        &self.reader
    }

    pub async fn run(
        &self,
        conn: &mut AsyncPgConnection,
        feed: &mut Feed,
        skip_validation: bool,
    ) -> Result<ImportSummary, GtfsFeedImporterError> {
        self.run_with_fingerprint(conn, feed, skip_validation, None)
            .await
    }

    /// Like `run`, reusing a fingerprint the caller already computed.
    pub async fn run_with_fingerprint(
        &self,
        conn: &mut AsyncPgConnection,
        feed: &mut Feed,
        skip_validation: bool,
        fingerprint: Option<String>,
    ) -> Result<ImportSummary, GtfsFeedImporterError> {
        info!("Importing feed {} from {}", feed.id, feed.url_or_path);

        let parsed = self.reader.read_feed(&feed.url_or_path).await?;

        if skip_validation {
            debug!("Skipping validation for feed {}", feed.id);
        } else {
            check_findings(self.reader.validate(&parsed))?;
        }

        let fingerprint = match fingerprint {
            Some(fingerprint) => fingerprint,
            None => self.reader.get_feed_fingerprint(feed).await,
        };
        let default_lang = parsed.default_language();
        let feed_id = feed.id;
        let current_name = feed.name.clone();
        let batch_size = self.batch_size;
        let parsed = &parsed;

        // A savepoint when the caller already holds a transaction.
        let (updated, summary) = conn
            .transaction::<_, GtfsFeedImporterError, _>(|conn| {
                async move {
                    delete_feed_rows(conn, feed_id).await?;

                    let (summary, publisher_name) =
                        import_rows(conn, parsed, feed_id, &default_lang, batch_size).await?;

                    let name = match publisher_name {
                        Some(publisher_name)
                            if current_name.trim().is_empty() && !publisher_name.is_empty() =>
                        {
                            publisher_name
                        }
                        _ => current_name,
                    };

                    let now = Utc::now();

                    let updated = diesel::update(feeds::table.find(feed_id))
                        .set((
                            feeds::fingerprint.eq(&fingerprint),
                            feeds::imported_at.eq(Some(now)),
                            feeds::name.eq(&name),
                            feeds::default_lang.eq(&default_lang),
                            feeds::updated_at.eq(now),
                        ))
                        .returning(Feed::as_returning())
                        .get_result(conn)
                        .await?;

                    Ok((updated, summary))
                }
                .scope_boxed()
            })
            .await?;

        *feed = updated;

        for (kind, count) in &summary.counts {
            info!("Feed {}: imported {} {} rows", feed_id, count, kind.name());
        }
        info!(
            "Feed {}: {} departures, {} translations applied, {} translation rows skipped",
            feed_id, summary.departures, summary.translations_applied, summary.translations_skipped
        );

        Ok(summary)
    }
}

/// Children first so foreign keys never dangle mid-transaction.
async fn delete_feed_rows(
    conn: &mut AsyncPgConnection,
    feed_id: i32,
) -> Result<(), diesel::result::Error> {
    diesel::delete(departures::table.filter(departures::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(stop_times::table.filter(stop_times::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(fare_rider_categories::table.filter(fare_rider_categories::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(fare_rules::table.filter(fare_rules::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(fares::table.filter(fares::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(rider_categories::table.filter(rider_categories::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(trips::table.filter(trips::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(stops::table.filter(stops::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(routes::table.filter(routes::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(agencies::table.filter(agencies::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(shapes::table.filter(shapes::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;
    diesel::delete(feed_infos::table.filter(feed_infos::feed_id.eq(feed_id)))
        .execute(conn)
        .await?;

    Ok(())
}

fn build_rows<T, F>(tables: &GtfsTables, kind: EntityKind, mut build: F) -> Result<Vec<T>, GtfsFeedImporterError>
where
    F: FnMut(&MappedRow) -> Result<T, GtfsFeedImporterError>,
{
    tables
        .rows(mapping(kind).file_name)
        .map(|row| build(&MappedRow::new(kind, row)))
        .collect()
}

fn build_translated_rows<T, F>(
    tables: &GtfsTables,
    kind: EntityKind,
    translations: &TranslationIndex,
    default_lang: &str,
    applied: &mut usize,
    mut build: F,
) -> Result<Vec<T>, GtfsFeedImporterError>
where
    T: Translatable,
    F: FnMut(&MappedRow) -> Result<T, GtfsFeedImporterError>,
{
    tables
        .rows(mapping(kind).file_name)
        .map(|row| {
            let mapped = MappedRow::new(kind, row);
            let mut model = build(&mapped)?;
            *applied += translations.apply(kind, mapped.record_key().as_ref(), &mut model, default_lang);
            Ok(model)
        })
        .collect()
}

/// Entity types go in dependency order. Returns the summary and the
/// publisher name from feed_info, if any.
async fn import_rows(
    conn: &mut AsyncPgConnection,
    parsed: &ParsedFeed,
    feed_id: i32,
    lang: &str,
    batch_size: usize,
) -> Result<(ImportSummary, Option<String>), GtfsFeedImporterError> {
    let tables = &parsed.tables;
    let translations = TranslationIndex::build(tables.get("translations.txt"));
    let mut ctx = ImportContext::new(feed_id);
    let mut summary = ImportSummary {
        translations_skipped: translations.skipped(),
        ..Default::default()
    };
    let mut applied = 0;

    let new_shapes = build_shapes(tables, feed_id);
    let count = insert_keyed!(conn, ctx, EntityKind::Shape, shapes, new_shapes, batch_size);
    summary.counts.push((EntityKind::Shape, count));

    let new_agencies = build_translated_rows(tables, EntityKind::Agency, &translations, lang, &mut applied, |row| {
        Ok(build_agency(row, &ctx, lang))
    })?;
    let count = insert_keyed!(conn, ctx, EntityKind::Agency, agencies, new_agencies, batch_size);
    summary.counts.push((EntityKind::Agency, count));

    let new_routes = build_translated_rows(tables, EntityKind::Route, &translations, lang, &mut applied, |row| {
        build_route(row, &ctx, lang)
    })?;
    let count = insert_keyed!(conn, ctx, EntityKind::Route, routes, new_routes, batch_size);
    summary.counts.push((EntityKind::Route, count));

    let new_trips = build_translated_rows(tables, EntityKind::Trip, &translations, lang, &mut applied, |row| {
        build_trip(row, &ctx, lang)
    })?;
    let count = insert_keyed!(conn, ctx, EntityKind::Trip, trips, new_trips, batch_size);
    summary.counts.push((EntityKind::Trip, count));

    let new_stops = build_translated_rows(tables, EntityKind::Stop, &translations, lang, &mut applied, |row| {
        Ok(build_stop(row, &ctx, lang))
    })?;
    let count = insert_keyed!(conn, ctx, EntityKind::Stop, stops, new_stops, batch_size);
    summary.counts.push((EntityKind::Stop, count));

    let new_stop_times = build_translated_rows(
        tables,
        EntityKind::StopTime,
        &translations,
        lang,
        &mut applied,
        |row| build_stop_time(row, &ctx, lang),
    )?;
    let count = insert_plain!(conn, stop_times, new_stop_times, batch_size);
    summary.counts.push((EntityKind::StopTime, count));

    let new_fares = build_translated_rows(tables, EntityKind::Fare, &translations, lang, &mut applied, |row| {
        build_fare(row, &ctx, lang)
    })?;
    let count = insert_keyed!(conn, ctx, EntityKind::Fare, fares, new_fares, batch_size);
    summary.counts.push((EntityKind::Fare, count));

    let new_fare_rules = build_rows(tables, EntityKind::FareRule, |row| build_fare_rule(row, &ctx))?;
    let count = insert_plain!(conn, fare_rules, new_fare_rules, batch_size);
    summary.counts.push((EntityKind::FareRule, count));

    let new_rider_categories = build_translated_rows(
        tables,
        EntityKind::RiderCategory,
        &translations,
        lang,
        &mut applied,
        |row| Ok(build_rider_category(row, &ctx, lang)),
    )?;
    let count = insert_keyed!(
        conn,
        ctx,
        EntityKind::RiderCategory,
        rider_categories,
        new_rider_categories,
        batch_size
    );
    summary.counts.push((EntityKind::RiderCategory, count));

    let new_fare_rider_categories = build_rows(tables, EntityKind::FareRiderCategory, |row| {
        build_fare_rider_category(row, &ctx)
    })?;
    let count = insert_plain!(conn, fare_rider_categories, new_fare_rider_categories, batch_size);
    summary.counts.push((EntityKind::FareRiderCategory, count));

    let new_feed_infos = build_rows(tables, EntityKind::FeedInfo, |row| Ok(build_feed_info(row, &ctx)))?;
    let publisher_name = <[_]>::first(&new_feed_infos).map(|info| info.publisher_name.clone());
    let count = insert_plain!(conn, feed_infos, new_feed_infos, batch_size);
    summary.counts.push((EntityKind::FeedInfo, count));

    let new_departures = build_departures(&expand_trip_dates(&parsed.gtfs), &ctx);
    summary.departures = insert_plain!(conn, departures, new_departures, batch_size);
    summary.translations_applied = applied;

    Ok((summary, publisher_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_import::feed_reader::parse_local;
    use crate::gtfs_import::test_fixtures::{write_feed_with, write_feed_without, write_ferry_feed};
    use crate::gtfs_import::validation::validate_feed;
    use crate::models::NewFeed;
    use std::time::Duration;

    #[test]
    fn warnings_do_not_abort() {
        let findings = vec![Finding::warning(
            "direction_id 7 is not 0 or 1",
            "trips.txt",
            Some(3),
        )];

        assert!(check_findings(findings).is_ok());
    }

    #[test]
    fn errors_abort_with_only_the_errors() {
        let findings = vec![
            Finding::warning("direction_id 7 is not 0 or 1", "trips.txt", Some(3)),
            Finding::error("currency_type: too long", "fare_rider_categories.txt", Some(1)),
        ];

        match check_findings(findings) {
            Err(GtfsFeedImporterError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].dataset, "fare_rider_categories.txt");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn translated_rows_carry_every_locale() {
        let dir = write_ferry_feed();
        let parsed = parse_local(dir.path()).unwrap();
        let translations = TranslationIndex::build(parsed.tables.get("translations.txt"));

        let mut ctx = ImportContext::new(1);
        ctx.register(EntityKind::Agency, "ferry_company".to_string(), 1);

        let mut applied = 0;
        let stops = build_translated_rows(
            &parsed.tables,
            EntityKind::Stop,
            &translations,
            "fi",
            &mut applied,
            |row| Ok(build_stop(row, &ctx, "fi")),
        )
        .unwrap();

        assert_eq!(applied, 1);
        assert_eq!(
            stops[0].name,
            serde_json::json!({"fi": "Kauppatori", "sv": "Salutorget"})
        );
    }

    #[test]
    fn ambiguous_default_agency_fails_route_building() {
        let dir = write_feed_with(&[(
            "agency.txt",
            "agency_id,agency_name,agency_url,agency_timezone\n\
             a,A,https://a.example,Europe/Helsinki\n\
             b,B,https://b.example,Europe/Helsinki\n",
        )]);
        let parsed = parse_local(dir.path()).unwrap();
        assert!(validate_feed(&parsed).iter().any(|finding| finding.is_error()));

        let mut ctx = ImportContext::new(1);
        ctx.register(EntityKind::Agency, "a".to_string(), 1);
        ctx.register(EntityKind::Agency, "b".to_string(), 2);

        let result = build_rows(&parsed.tables, EntityKind::Route, |row| build_route(row, &ctx, "fi"));

        assert!(matches!(
            result,
            Err(GtfsFeedImporterError::AmbiguousDefaultAgency { count: 2 })
        ));
    }

    #[tokio::test]
    async fn imports_and_reimports_into_postgres() {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };

        let mut conn = AsyncPgConnection::establish(&database_url).await.unwrap();
        conn.begin_test_transaction().await.unwrap();

        let dir = write_ferry_feed();
        let mut feed: Feed = diesel::insert_into(feeds::table)
            .values(NewFeed {
                name: String::new(),
                url_or_path: dir.path().to_string_lossy().to_string(),
                ticketing_system_id: None,
            })
            .returning(Feed::as_returning())
            .get_result(&mut conn)
            .await
            .unwrap();

        let reader = GtfsFeedReader::new(Duration::from_secs(5)).unwrap();
        let importer = GtfsFeedImporter::new(reader, 1).unwrap();

        let first = importer.run(&mut conn, &mut feed, false).await.unwrap();
        assert_eq!(first.count(EntityKind::Stop), 2);
        assert_eq!(first.count(EntityKind::StopTime), 4);
        assert_eq!(first.departures, 6);
        assert_eq!(feed.name, "Ferry Company");
        assert_eq!(feed.default_lang, "fi");
        assert!(feed.imported_at.is_some());

        let first_trip_ids: Vec<uuid::Uuid> = trips::table
            .filter(trips::feed_id.eq(feed.id))
            .order(trips::source_id)
            .select(trips::api_id)
            .load(&mut conn)
            .await
            .unwrap();

        let second = importer.run(&mut conn, &mut feed, false).await.unwrap();
        assert_eq!(first, second);

        let second_trip_ids: Vec<uuid::Uuid> = trips::table
            .filter(trips::feed_id.eq(feed.id))
            .order(trips::source_id)
            .select(trips::api_id)
            .load(&mut conn)
            .await
            .unwrap();
        assert_eq!(first_trip_ids, second_trip_ids);

        let departure_count: i64 = departures::table
            .filter(departures::feed_id.eq(feed.id))
            .count()
            .get_result(&mut conn)
            .await
            .unwrap();
        assert_eq!(departure_count, 6);
    }

    async fn insert_feed(conn: &mut AsyncPgConnection, dir: &tempfile::TempDir) -> Feed {
        diesel::insert_into(feeds::table)
            .values(NewFeed {
                name: String::new(),
                url_or_path: dir.path().to_string_lossy().to_string(),
                ticketing_system_id: None,
            })
            .returning(Feed::as_returning())
            .get_result(conn)
            .await
            .unwrap()
    }

    /// Source and api ids of a feed's stops and trips, plus its departure count.
    async fn snapshot(
        conn: &mut AsyncPgConnection,
        feed_id: i32,
    ) -> (Vec<(String, uuid::Uuid)>, Vec<(String, uuid::Uuid)>, i64) {
        let stop_ids = stops::table
            .filter(stops::feed_id.eq(feed_id))
            .order(stops::source_id)
            .select((stops::source_id, stops::api_id))
            .load(conn)
            .await
            .unwrap();

        let trip_ids = trips::table
            .filter(trips::feed_id.eq(feed_id))
            .order(trips::source_id)
            .select((trips::source_id, trips::api_id))
            .load(conn)
            .await
            .unwrap();

        let departure_count = departures::table
            .filter(departures::feed_id.eq(feed_id))
            .count()
            .get_result(conn)
            .await
            .unwrap();

        (stop_ids, trip_ids, departure_count)
    }

    #[tokio::test]
    async fn failed_import_leaves_previous_data() {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };

        let mut conn = AsyncPgConnection::establish(&database_url).await.unwrap();
        conn.begin_test_transaction().await.unwrap();

        let dir = write_ferry_feed();
        let mut feed = insert_feed(&mut conn, &dir).await;

        let reader = GtfsFeedReader::new(Duration::from_secs(5)).unwrap();
        let importer = GtfsFeedImporter::new(reader, 100).unwrap();

        importer.run(&mut conn, &mut feed, false).await.unwrap();
        let before = snapshot(&mut conn, feed.id).await;
        let imported_at = feed.imported_at;
        let fingerprint = feed.fingerprint.clone();

        let invalid = write_feed_with(&[(
            "rider_categories.txt",
            "rider_category_id,rider_category_name,rider_category_description\n\
             adult,Adult,\n\
             child,Child,7-17 years\n",
        )]);
        feed.url_or_path = invalid.path().to_string_lossy().to_string();

        let result = importer.run(&mut conn, &mut feed, false).await;
        assert!(matches!(result, Err(GtfsFeedImporterError::Validation(_))));

        let missing_stops = write_feed_without(&["stops.txt"]);
        feed.url_or_path = missing_stops.path().to_string_lossy().to_string();

        assert!(importer.run(&mut conn, &mut feed, false).await.is_err());

        assert_eq!(snapshot(&mut conn, feed.id).await, before);
        assert_eq!(before.0.len(), 2);
        assert_eq!(before.2, 6);

        let stored: Feed = feeds::table
            .find(feed.id)
            .select(Feed::as_select())
            .first(&mut conn)
            .await
            .unwrap();
        assert_eq!(stored.imported_at, imported_at);
        assert_eq!(stored.fingerprint, fingerprint);
    }

    #[tokio::test]
    async fn reimport_drops_rows_missing_from_new_dataset() {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };

        let mut conn = AsyncPgConnection::establish(&database_url).await.unwrap();
        conn.begin_test_transaction().await.unwrap();

        let v1 = write_feed_with(&[(
            "stops.txt",
            "stop_id,stop_name,stop_desc,stop_lat,stop_lon,tts_stop_name,wheelchair_boarding\n\
             kauppatori,Kauppatori,,60.1676,24.9525,,1\n\
             suomenlinna,Suomenlinna,Sea fortress,60.1454,24.9881,,0\n\
             vallisaari,Vallisaari,,60.1390,25.0030,,0\n",
        )]);
        let mut feed = insert_feed(&mut conn, &v1).await;

        let reader = GtfsFeedReader::new(Duration::from_secs(5)).unwrap();
        let importer = GtfsFeedImporter::new(reader, 100).unwrap();

        importer.run(&mut conn, &mut feed, false).await.unwrap();
        let (stops_v1, trips_v1, departures_v1) = snapshot(&mut conn, feed.id).await;
        assert_eq!(stops_v1.len(), 3);
        assert_eq!(trips_v1.len(), 2);
        assert_eq!(departures_v1, 6);

        let v2 = write_feed_with(&[
            (
                "trips.txt",
                "route_id,service_id,trip_id,trip_headsign,direction_id,shape_id\n\
                 kauppatori_suomenlinna,weekdays,morning,Suomenlinna,0,ferry_line\n",
            ),
            (
                "stop_times.txt",
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence,stop_headsign\n\
                 morning,08:00:00,08:00:00,kauppatori,1,Suomenlinna\n\
                 morning,08:20:00,08:20:00,suomenlinna,2,\n",
            ),
        ]);
        feed.url_or_path = v2.path().to_string_lossy().to_string();

        let summary = importer.run(&mut conn, &mut feed, false).await.unwrap();
        assert_eq!(summary.count(EntityKind::Stop), 2);
        assert_eq!(summary.count(EntityKind::Trip), 1);

        let (stops_v2, trips_v2, departures_v2) = snapshot(&mut conn, feed.id).await;

        let surviving_stops: Vec<(String, uuid::Uuid)> = stops_v1
            .into_iter()
            .filter(|(source_id, _)| source_id != "vallisaari")
            .collect();
        assert_eq!(stops_v2, surviving_stops);

        let surviving_trips: Vec<(String, uuid::Uuid)> = trips_v1
            .into_iter()
            .filter(|(source_id, _)| source_id != "evening")
            .collect();
        assert_eq!(trips_v2, surviving_trips);

        assert_eq!(departures_v2, 5);

        let stop_time_count: i64 = stop_times::table
            .filter(stop_times::feed_id.eq(feed.id))
            .count()
            .get_result(&mut conn)
            .await
            .unwrap();
        assert_eq!(stop_time_count, 2);
    }
}
