// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Turns raw GTFS rows into insertable models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::conversion;
use super::errors::GtfsFeedImporterError;
use super::field_mapping::{Columns, EntityKind, EntityMapping, FieldKind, RecordKey, mapping};
use super::import_context::ImportContext;
use super::tables::{GtfsRow, GtfsTables};
use crate::WGS_84_SRID;
use crate::api_id::{composite_api_id, departure_api_id, source_api_id};
use crate::localized_text::LocalizedText;
use crate::models::*;

/// A raw row read through its entity's field bindings.
pub struct MappedRow<'a> {
    mapping: &'static EntityMapping,
    row: GtfsRow<'a>,
}

impl<'a> MappedRow<'a> {
    pub fn new(kind: EntityKind, row: GtfsRow<'a>) -> Self {
        MappedRow {
            mapping: mapping(kind),
            row,
        }
    }

    pub fn index(&self) -> usize {
        self.row.index
    }

    fn columns(&self, field: &str) -> (Option<&'a str>, Option<&'a str>) {
        match self.mapping.binding(field).map(|binding| binding.columns) {
            Some(Columns::Single(column)) => (self.row.get(column), None),
            Some(Columns::Pair(first, second)) => (self.row.get(first), self.row.get(second)),
            None => {
                debug_assert!(
                    false,
                    "{} has no binding for {}",
                    self.mapping.kind.name(),
                    field
                );
                (None, None)
            }
        }
    }

    pub fn raw(&self, field: &str) -> Option<&'a str> {
        self.columns(field).0
    }

    pub fn text(&self, field: &str) -> String {
        conversion::to_text(self.raw(field))
    }

    pub fn opt_text(&self, field: &str) -> Option<String> {
        conversion::to_opt_text(self.raw(field))
    }

    pub fn int(&self, field: &str) -> Option<i32> {
        conversion::to_int(self.raw(field))
    }

    pub fn decimal(&self, field: &str) -> Option<Decimal> {
        conversion::to_decimal(self.raw(field))
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        conversion::to_date(self.raw(field))
    }

    pub fn seconds(&self, field: &str) -> Option<i32> {
        conversion::to_seconds(self.raw(field))
    }

    pub fn point(&self, field: &str) -> Option<postgis_diesel::types::Point> {
        let (latitude, longitude) = self.columns(field);
        conversion::to_point(latitude, longitude)
    }

    /// The untranslated value, stored under the feed's default language.
    pub fn localized(&self, field: &str, lang: &str) -> Value {
        LocalizedText::with_value(lang, &self.text(field)).to_json()
    }

    /// Resolves a foreign key column through the import context. Agency
    /// references fall back to the feed's only agency.
    pub fn reference(
        &self,
        field: &str,
        ctx: &ImportContext,
    ) -> Result<Option<i32>, GtfsFeedImporterError> {
        let Some(binding) = self.mapping.binding(field) else {
            return Err(GtfsFeedImporterError::Mapping(format!(
                "{} has no binding for {}",
                self.mapping.kind.name(),
                field
            )));
        };

        let (FieldKind::ForeignKey { target, required }, Columns::Single(column)) =
            (binding.kind, binding.columns)
        else {
            return Err(GtfsFeedImporterError::Mapping(format!(
                "{}.{} is not a foreign key",
                self.mapping.kind.name(),
                field
            )));
        };

        let value = self.row.get(column);

        if target == EntityKind::Agency {
            return ctx.resolve_agency(value).map(Some);
        }

        match value.and_then(|source_id| ctx.resolve(target, source_id)) {
            Some(id) => Ok(Some(id)),
            None if required => Err(GtfsFeedImporterError::UnresolvedReference {
                file_name: self.row.file_name().to_string(),
                row_index: self.row.index,
                column,
                value: value.unwrap_or("").to_string(),
            }),
            None => {
                if let Some(value) = value {
                    debug!(
                        "{} row {}: optional {} '{}' not found",
                        self.row.file_name(),
                        self.row.index,
                        column,
                        value
                    );
                }
                Ok(None)
            }
        }
    }

    fn required_reference(&self, field: &str, ctx: &ImportContext) -> Result<i32, GtfsFeedImporterError> {
        self.reference(field, ctx)?.ok_or_else(|| {
            GtfsFeedImporterError::Mapping(format!(
                "{}.{} resolved to nothing",
                self.mapping.kind.name(),
                field
            ))
        })
    }

    pub fn record_key(&self) -> Option<RecordKey> {
        self.mapping.record_key(&self.row)
    }
}

/// Groups shape points by shape id and orders them by sequence. Shapes with
/// fewer than two points can't form a linestring and are skipped.
pub fn build_shapes(tables: &GtfsTables, feed_id: i32) -> Vec<NewShape> {
    let mut grouped: BTreeMap<String, Vec<(i32, postgis_diesel::types::Point)>> = BTreeMap::new();

    for row in tables.rows(mapping(EntityKind::Shape).file_name) {
        let mapped = MappedRow::new(EntityKind::Shape, row);

        let (Some(shape_id), Some(point)) = (mapped.opt_text("source_id"), mapped.point("geometry")) else {
            continue;
        };

        grouped
            .entry(shape_id)
            .or_default()
            .push((mapped.int("sequence").unwrap_or(0), point));
    }

    grouped
        .into_iter()
        .filter_map(|(shape_id, mut points)| {
            if points.len() < 2 {
                warn!("Skipping shape {} with {} point(s)", shape_id, points.len());
                return None;
            }

            points.sort_by_key(|(sequence, _)| *sequence);

            Some(NewShape {
                feed_id,
                api_id: source_api_id("Shape", feed_id, &shape_id),
                source_id: shape_id,
                geometry: postgis_diesel::types::LineString {
                    points: points.into_iter().map(|(_, point)| point).collect(),
                    srid: Some(WGS_84_SRID),
                },
            })
        })
        .collect()
}

pub fn build_agency(row: &MappedRow, ctx: &ImportContext, lang: &str) -> NewAgency {
    let source_id = row.text("source_id");

    NewAgency {
        feed_id: ctx.feed_id(),
        api_id: source_api_id("Agency", ctx.feed_id(), &source_id),
        source_id,
        name: row.localized("name", lang),
        url: row.localized("url", lang),
        timezone: row.text("timezone"),
        lang: row.opt_text("lang"),
        phone: row.opt_text("phone"),
        fare_url: row.localized("fare_url", lang),
        email: row.opt_text("email"),
        logo_url: row.opt_text("logo_url"),
    }
}

pub fn build_route(
    row: &MappedRow,
    ctx: &ImportContext,
    lang: &str,
) -> Result<NewRoute, GtfsFeedImporterError> {
    let source_id = row.text("source_id");

    Ok(NewRoute {
        feed_id: ctx.feed_id(),
        api_id: source_api_id("Route", ctx.feed_id(), &source_id),
        source_id,
        agency_id: row.required_reference("agency", ctx)?,
        short_name: row.localized("short_name", lang),
        long_name: row.localized("long_name", lang),
        description: row.localized("description", lang),
        route_type: row.int("route_type"),
        url: row.localized("url", lang),
        sort_order: row.int("sort_order"),
        capacity_sales: row.int("capacity_sales").unwrap_or(0),
    })
}

pub fn build_trip(
    row: &MappedRow,
    ctx: &ImportContext,
    lang: &str,
) -> Result<NewTrip, GtfsFeedImporterError> {
    let source_id = row.text("source_id");

    Ok(NewTrip {
        feed_id: ctx.feed_id(),
        api_id: source_api_id("Trip", ctx.feed_id(), &source_id),
        source_id,
        route_id: row.required_reference("route", ctx)?,
        shape_id: row.reference("shape", ctx)?,
        service_id: row.text("service_id"),
        headsign: row.localized("headsign", lang),
        short_name: row.localized("short_name", lang),
        direction_id: row.int("direction_id"),
        block_id: row.text("block_id"),
        wheelchair_accessible: row.int("wheelchair_accessible"),
        bikes_allowed: row.int("bikes_allowed"),
    })
}

pub fn build_stop(row: &MappedRow, ctx: &ImportContext, lang: &str) -> NewStop {
    let source_id = row.text("source_id");

    NewStop {
        feed_id: ctx.feed_id(),
        api_id: source_api_id("Stop", ctx.feed_id(), &source_id),
        source_id,
        code: row.text("code"),
        name: row.localized("name", lang),
        description: row.localized("description", lang),
        tts_name: row.localized("tts_name", lang),
        point: row.point("point"),
        wheelchair_boarding: row.int("wheelchair_boarding"),
    }
}

pub fn build_stop_time(
    row: &MappedRow,
    ctx: &ImportContext,
    lang: &str,
) -> Result<NewStopTime, GtfsFeedImporterError> {
    Ok(NewStopTime {
        feed_id: ctx.feed_id(),
        trip_id: row.required_reference("trip", ctx)?,
        stop_id: row.required_reference("stop", ctx)?,
        arrival_time: row.seconds("arrival_time"),
        departure_time: row.seconds("departure_time"),
        stop_sequence: row.int("stop_sequence").unwrap_or(0),
        stop_headsign: row.localized("stop_headsign", lang),
        timepoint: row.int("timepoint").unwrap_or(1),
    })
}

pub fn build_fare(
    row: &MappedRow,
    ctx: &ImportContext,
    lang: &str,
) -> Result<NewFare, GtfsFeedImporterError> {
    let source_id = row.text("source_id");

    Ok(NewFare {
        feed_id: ctx.feed_id(),
        api_id: source_api_id("Fare", ctx.feed_id(), &source_id),
        source_id,
        agency_id: row.required_reference("agency", ctx)?,
        price: row.decimal("price").unwrap_or(Decimal::ZERO),
        currency_type: row.text("currency_type"),
        payment_method: row.int("payment_method"),
        transfers: row.int("transfers"),
        name: row.localized("name", lang),
        description: row.localized("description", lang),
        instructions: row.localized("instructions", lang),
    })
}

pub fn build_fare_rule(
    row: &MappedRow,
    ctx: &ImportContext,
) -> Result<NewFareRule, GtfsFeedImporterError> {
    Ok(NewFareRule {
        feed_id: ctx.feed_id(),
        fare_id: row.required_reference("fare", ctx)?,
        route_id: row.reference("route", ctx)?,
    })
}

pub fn build_rider_category(row: &MappedRow, ctx: &ImportContext, lang: &str) -> NewRiderCategory {
    let source_id = row.text("source_id");

    NewRiderCategory {
        feed_id: ctx.feed_id(),
        api_id: source_api_id("RiderCategory", ctx.feed_id(), &source_id),
        source_id,
        name: row.localized("name", lang),
        description: row.localized("description", lang),
    }
}

pub fn build_fare_rider_category(
    row: &MappedRow,
    ctx: &ImportContext,
) -> Result<NewFareRiderCategory, GtfsFeedImporterError> {
    Ok(NewFareRiderCategory {
        feed_id: ctx.feed_id(),
        api_id: composite_api_id(
            "FareRiderCategory",
            ctx.feed_id(),
            &row.text("fare"),
            &row.text("rider_category"),
        ),
        fare_id: row.required_reference("fare", ctx)?,
        rider_category_id: row.required_reference("rider_category", ctx)?,
        price: row.decimal("price").unwrap_or(Decimal::ZERO),
        currency_type: row.text("currency_type"),
    })
}

pub fn build_feed_info(row: &MappedRow, ctx: &ImportContext) -> FeedInfo {
    FeedInfo {
        feed_id: ctx.feed_id(),
        publisher_name: row.text("publisher_name"),
        publisher_url: row.text("publisher_url"),
        lang: row.text("lang"),
        default_lang: row.text("default_lang"),
        start_date: row.date("start_date"),
        end_date: row.date("end_date"),
        version: row.text("version"),
        contact_email: row.text("contact_email"),
        contact_url: row.text("contact_url"),
    }
}

/// Pairs whose trip was not imported are dropped.
pub fn build_departures(pairs: &[(String, NaiveDate)], ctx: &ImportContext) -> Vec<NewDeparture> {
    pairs
        .iter()
        .filter_map(|(trip_source_id, date)| {
            let trip_id = ctx.resolve(EntityKind::Trip, trip_source_id)?;

            Some(NewDeparture {
                feed_id: ctx.feed_id(),
                trip_id,
                date: *date,
                api_id: departure_api_id(ctx.feed_id(), trip_source_id, *date),
            })
        })
        .collect()
}
