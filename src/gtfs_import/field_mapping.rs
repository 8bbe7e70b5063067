//! Static description of how GTFS columns land in model fields.
//!
//! Row builders read values through these bindings, and the translation
//! overlay uses them in reverse to turn a GTFS `field_name` back into the
//! model field it belongs to.

use std::collections::HashSet;

use super::conversion::to_int;
use super::tables::GtfsRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Shape,
    Agency,
    Route,
    Trip,
    Stop,
    StopTime,
    Fare,
    FareRule,
    RiderCategory,
    FareRiderCategory,
    FeedInfo,
}

impl EntityKind {
    /// Shapes first since trips reference them, then parents before children.
    pub const IMPORT_ORDER: [EntityKind; 11] = [
        EntityKind::Shape,
        EntityKind::Agency,
        EntityKind::Route,
        EntityKind::Trip,
        EntityKind::Stop,
        EntityKind::StopTime,
        EntityKind::Fare,
        EntityKind::FareRule,
        EntityKind::RiderCategory,
        EntityKind::FareRiderCategory,
        EntityKind::FeedInfo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Shape => "Shape",
            EntityKind::Agency => "Agency",
            EntityKind::Route => "Route",
            EntityKind::Trip => "Trip",
            EntityKind::Stop => "Stop",
            EntityKind::StopTime => "StopTime",
            EntityKind::Fare => "Fare",
            EntityKind::FareRule => "FareRule",
            EntityKind::RiderCategory => "RiderCategory",
            EntityKind::FareRiderCategory => "FareRiderCategory",
            EntityKind::FeedInfo => "FeedInfo",
        }
    }

    pub fn is_translatable(&self) -> bool {
        matches!(
            self,
            EntityKind::Agency
                | EntityKind::Route
                | EntityKind::Trip
                | EntityKind::Stop
                | EntityKind::StopTime
                | EntityKind::Fare
                | EntityKind::RiderCategory
        )
    }

    fn import_position(&self) -> usize {
        EntityKind::IMPORT_ORDER
            .iter()
            .position(|kind| kind == self)
            .unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Columns {
    Single(&'static str),
    /// A field built from two columns, e.g. a point from (lat, lon).
    Pair(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Date,
    Time,
    Point,
    ForeignKey { target: EntityKind, required: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBinding {
    pub field: &'static str,
    pub columns: Columns,
    pub kind: FieldKind,
    pub translatable: bool,
}

const fn text(field: &'static str, column: &'static str) -> FieldBinding {
    FieldBinding {
        field,
        columns: Columns::Single(column),
        kind: FieldKind::Text,
        translatable: false,
    }
}

const fn localized(field: &'static str, column: &'static str) -> FieldBinding {
    FieldBinding {
        field,
        columns: Columns::Single(column),
        kind: FieldKind::Text,
        translatable: true,
    }
}

const fn integer(field: &'static str, column: &'static str) -> FieldBinding {
    FieldBinding {
        field,
        columns: Columns::Single(column),
        kind: FieldKind::Integer,
        translatable: false,
    }
}

const fn of_kind(field: &'static str, column: &'static str, kind: FieldKind) -> FieldBinding {
    FieldBinding {
        field,
        columns: Columns::Single(column),
        kind,
        translatable: false,
    }
}

const fn reference(
    field: &'static str,
    column: &'static str,
    target: EntityKind,
    required: bool,
) -> FieldBinding {
    FieldBinding {
        field,
        columns: Columns::Single(column),
        kind: FieldKind::ForeignKey { target, required },
        translatable: false,
    }
}

/// Which columns identify a row for `translations.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKeyColumns {
    None,
    Single(&'static str),
    /// `record_id` plus `record_sub_id`, used by stop_times.
    Pair(&'static str, &'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub record_id: String,
    pub record_sub_id: Option<String>,
}

impl RecordKey {
    pub fn new(record_id: &str, record_sub_id: Option<&str>) -> Self {
        RecordKey {
            record_id: record_id.to_string(),
            record_sub_id: record_sub_id.map(normalize_sub_id),
        }
    }
}

/// stop_sequence values are compared as integers so "01" and "1" match.
fn normalize_sub_id(value: &str) -> String {
    match to_int(Some(value)) {
        Some(number) => number.to_string(),
        None => value.trim().to_string(),
    }
}

#[derive(Debug)]
pub struct EntityMapping {
    pub kind: EntityKind,
    pub file_name: &'static str,
    /// `table_name` values in translations.txt that target this entity.
    pub translation_tables: &'static [&'static str],
    pub record_key: RecordKeyColumns,
    pub fields: &'static [FieldBinding],
}

impl EntityMapping {
    pub fn binding(&self, field: &str) -> Option<&'static FieldBinding> {
        self.fields.iter().find(|binding| binding.field == field)
    }

    /// Reverse lookup from a GTFS column name to the model field.
    pub fn binding_for_column(&self, column: &str) -> Option<&'static FieldBinding> {
        self.fields.iter().find(|binding| match binding.columns {
            Columns::Single(c) => c == column,
            Columns::Pair(a, b) => a == column || b == column,
        })
    }

    pub fn record_key(&self, row: &GtfsRow) -> Option<RecordKey> {
        match self.record_key {
            RecordKeyColumns::None => None,
            RecordKeyColumns::Single(column) => Some(RecordKey::new(row.get(column).unwrap_or(""), None)),
            RecordKeyColumns::Pair(column, sub_column) => Some(RecordKey::new(
                row.get(column)?,
                Some(row.get(sub_column)?),
            )),
        }
    }
}

pub static MAPPINGS: [EntityMapping; 11] = [
    EntityMapping {
        kind: EntityKind::Shape,
        file_name: "shapes.txt",
        translation_tables: &[],
        record_key: RecordKeyColumns::None,
        fields: &[
            text("source_id", "shape_id"),
            FieldBinding {
                field: "geometry",
                columns: Columns::Pair("shape_pt_lat", "shape_pt_lon"),
                kind: FieldKind::Point,
                translatable: false,
            },
            integer("sequence", "shape_pt_sequence"),
        ],
    },
    EntityMapping {
        kind: EntityKind::Agency,
        file_name: "agency.txt",
        translation_tables: &["agency", "agencies"],
        record_key: RecordKeyColumns::Single("agency_id"),
        fields: &[
            text("source_id", "agency_id"),
            localized("name", "agency_name"),
            localized("url", "agency_url"),
            text("timezone", "agency_timezone"),
            text("lang", "agency_lang"),
            text("phone", "agency_phone"),
            localized("fare_url", "agency_fare_url"),
            text("email", "agency_email"),
            text("logo_url", "agency_logo_url"),
        ],
    },
    EntityMapping {
        kind: EntityKind::Route,
        file_name: "routes.txt",
        translation_tables: &["routes"],
        record_key: RecordKeyColumns::Single("route_id"),
        fields: &[
            text("source_id", "route_id"),
            reference("agency", "agency_id", EntityKind::Agency, false),
            localized("short_name", "route_short_name"),
            localized("long_name", "route_long_name"),
            localized("description", "route_desc"),
            integer("route_type", "route_type"),
            localized("url", "route_url"),
            integer("sort_order", "route_sort_order"),
            integer("capacity_sales", "capacity_sales"),
        ],
    },
    EntityMapping {
        kind: EntityKind::Trip,
        file_name: "trips.txt",
        translation_tables: &["trips"],
        record_key: RecordKeyColumns::Single("trip_id"),
        fields: &[
            text("source_id", "trip_id"),
            reference("route", "route_id", EntityKind::Route, true),
            reference("shape", "shape_id", EntityKind::Shape, false),
            text("service_id", "service_id"),
            localized("headsign", "trip_headsign"),
            localized("short_name", "trip_short_name"),
            integer("direction_id", "direction_id"),
            text("block_id", "block_id"),
            integer("wheelchair_accessible", "wheelchair_accessible"),
            integer("bikes_allowed", "bikes_allowed"),
        ],
    },
    EntityMapping {
        kind: EntityKind::Stop,
        file_name: "stops.txt",
        translation_tables: &["stops"],
        record_key: RecordKeyColumns::Single("stop_id"),
        fields: &[
            text("source_id", "stop_id"),
            text("code", "stop_code"),
            localized("name", "stop_name"),
            localized("description", "stop_desc"),
            localized("tts_name", "tts_stop_name"),
            FieldBinding {
                field: "point",
                columns: Columns::Pair("stop_lat", "stop_lon"),
                kind: FieldKind::Point,
                translatable: false,
            },
            integer("wheelchair_boarding", "wheelchair_boarding"),
        ],
    },
    EntityMapping {
        kind: EntityKind::StopTime,
        file_name: "stop_times.txt",
        translation_tables: &["stop_times"],
        record_key: RecordKeyColumns::Pair("trip_id", "stop_sequence"),
        fields: &[
            reference("trip", "trip_id", EntityKind::Trip, true),
            reference("stop", "stop_id", EntityKind::Stop, true),
            of_kind("arrival_time", "arrival_time", FieldKind::Time),
            of_kind("departure_time", "departure_time", FieldKind::Time),
            integer("stop_sequence", "stop_sequence"),
            localized("stop_headsign", "stop_headsign"),
            integer("timepoint", "timepoint"),
        ],
    },
    EntityMapping {
        kind: EntityKind::Fare,
        file_name: "fare_attributes.txt",
        translation_tables: &["fare_attributes", "fares"],
        record_key: RecordKeyColumns::Single("fare_id"),
        fields: &[
            text("source_id", "fare_id"),
            reference("agency", "agency_id", EntityKind::Agency, false),
            of_kind("price", "price", FieldKind::Decimal),
            text("currency_type", "currency_type"),
            integer("payment_method", "payment_method"),
            integer("transfers", "transfers"),
            localized("name", "fare_name"),
            localized("description", "fare_description"),
            localized("instructions", "fare_instructions"),
        ],
    },
    EntityMapping {
        kind: EntityKind::FareRule,
        file_name: "fare_rules.txt",
        translation_tables: &[],
        record_key: RecordKeyColumns::None,
        fields: &[
            reference("fare", "fare_id", EntityKind::Fare, true),
            reference("route", "route_id", EntityKind::Route, false),
        ],
    },
    EntityMapping {
        kind: EntityKind::RiderCategory,
        file_name: "rider_categories.txt",
        translation_tables: &["rider_categories"],
        record_key: RecordKeyColumns::Single("rider_category_id"),
        fields: &[
            text("source_id", "rider_category_id"),
            localized("name", "rider_category_name"),
            localized("description", "rider_category_description"),
        ],
    },
    EntityMapping {
        kind: EntityKind::FareRiderCategory,
        file_name: "fare_rider_categories.txt",
        translation_tables: &[],
        record_key: RecordKeyColumns::None,
        fields: &[
            reference("fare", "fare_id", EntityKind::Fare, true),
            reference("rider_category", "rider_category_id", EntityKind::RiderCategory, true),
            of_kind("price", "price", FieldKind::Decimal),
            text("currency_type", "currency_type"),
        ],
    },
    EntityMapping {
        kind: EntityKind::FeedInfo,
        file_name: "feed_info.txt",
        translation_tables: &[],
        record_key: RecordKeyColumns::None,
        fields: &[
            text("publisher_name", "feed_publisher_name"),
            text("publisher_url", "feed_publisher_url"),
            text("lang", "feed_lang"),
            text("default_lang", "default_lang"),
            of_kind("start_date", "feed_start_date", FieldKind::Date),
            of_kind("end_date", "feed_end_date", FieldKind::Date),
            text("version", "feed_version"),
            text("contact_email", "feed_contact_email"),
            text("contact_url", "feed_contact_url"),
        ],
    },
];

pub fn mapping(kind: EntityKind) -> &'static EntityMapping {
    &MAPPINGS[kind.import_position()]
}

pub fn mapping_for_translation_table(table_name: &str) -> Option<&'static EntityMapping> {
    MAPPINGS
        .iter()
        .find(|mapping| mapping.translation_tables.iter().any(|t| *t == table_name))
}

/// Checks the table once at importer construction.
pub fn validate_field_mappings() -> Result<(), String> {
    for (position, kind) in EntityKind::IMPORT_ORDER.iter().enumerate() {
        let entity = &MAPPINGS[position];

        if entity.kind != *kind {
            return Err(format!(
                "mapping at position {} is for {}, expected {}",
                position,
                entity.kind.name(),
                kind.name()
            ));
        }

        let mut seen = HashSet::new();

        for binding in entity.fields {
            if !seen.insert(binding.field) {
                return Err(format!(
                    "{} maps field '{}' twice",
                    kind.name(),
                    binding.field
                ));
            }

            if binding.translatable && !kind.is_translatable() {
                return Err(format!(
                    "{}.{} is translatable but {} is not",
                    kind.name(),
                    binding.field,
                    kind.name()
                ));
            }

            if let FieldKind::ForeignKey { target, .. } = binding.kind {
                if target.import_position() >= position {
                    return Err(format!(
                        "{}.{} references {} which is not imported before it",
                        kind.name(),
                        binding.field,
                        target.name()
                    ));
                }
            }

            if matches!(binding.kind, FieldKind::Point) != matches!(binding.columns, Columns::Pair(..)) {
                return Err(format!(
                    "{}.{} must combine exactly two columns when it is a point",
                    kind.name(),
                    binding.field
                ));
            }
        }

        if kind.is_translatable() && entity.record_key == RecordKeyColumns::None {
            return Err(format!(
                "{} is translatable but has no record key",
                kind.name()
            ));
        }
    }

    Ok(())
}
