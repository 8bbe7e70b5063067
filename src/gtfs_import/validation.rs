//! Feed validation on top of what `gtfs_structures` already enforces while
//! parsing.
//!
//! Extension files get a strict per-column schema. Error findings abort the
//! import before anything is written; warnings are only logged.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::conversion::decimal_digits;
use super::errors::Finding;
use super::feed_reader::ParsedFeed;
use super::tables::{GtfsRow, GtfsTables};

pub const REQUIRED_FILES: [&str; 5] = [
    "agency.txt",
    "routes.txt",
    "trips.txt",
    "stops.txt",
    "stop_times.txt",
];

#[derive(Debug, Clone, Copy)]
enum ColumnRule {
    Text {
        column: &'static str,
        required: bool,
        max_length: Option<usize>,
    },
    Decimal {
        column: &'static str,
        required: bool,
        max_digits: u32,
        decimal_places: u32,
    },
}

struct ExtensionSchema {
    file_name: &'static str,
    rules: &'static [ColumnRule],
    /// At least one of these columns must be filled in.
    one_of: &'static [&'static str],
}

const EXTENSION_SCHEMAS: [ExtensionSchema; 3] = [
    ExtensionSchema {
        file_name: "rider_categories.txt",
        rules: &[
            ColumnRule::Text {
                column: "rider_category_id",
                required: true,
                max_length: Some(255),
            },
            ColumnRule::Text {
                column: "rider_category_name",
                required: true,
                max_length: Some(255),
            },
            ColumnRule::Text {
                column: "rider_category_description",
                required: true,
                max_length: Some(255),
            },
        ],
        one_of: &[],
    },
    ExtensionSchema {
        file_name: "fare_rider_categories.txt",
        rules: &[
            ColumnRule::Text {
                column: "fare_id",
                required: true,
                max_length: Some(255),
            },
            ColumnRule::Text {
                column: "rider_category_id",
                required: true,
                max_length: Some(255),
            },
            ColumnRule::Decimal {
                column: "price",
                required: true,
                max_digits: 10,
                decimal_places: 2,
            },
            ColumnRule::Text {
                column: "currency_type",
                required: true,
                max_length: Some(3),
            },
        ],
        one_of: &[],
    },
    ExtensionSchema {
        file_name: "translations.txt",
        rules: &[
            ColumnRule::Text {
                column: "table_name",
                required: true,
                max_length: None,
            },
            ColumnRule::Text {
                column: "field_name",
                required: true,
                max_length: None,
            },
            ColumnRule::Text {
                column: "language",
                required: true,
                max_length: None,
            },
            ColumnRule::Text {
                column: "translation",
                required: true,
                max_length: None,
            },
        ],
        one_of: &["record_id", "field_value"],
    },
];

fn check_rule(rule: &ColumnRule, row: &GtfsRow) -> Option<String> {
    match *rule {
        ColumnRule::Text {
            column,
            required,
            max_length,
        } => match row.get(column) {
            None if required => Some(format!("{}: This field is required.", column)),
            None => None,
            Some(value) => match max_length {
                Some(max) if value.chars().count() > max => Some(format!(
                    "{}: Ensure this field has no more than {} characters.",
                    column, max
                )),
                _ => None,
            },
        },
        ColumnRule::Decimal {
            column,
            required,
            max_digits,
            decimal_places,
        } => match row.get(column) {
            None if required => Some(format!("{}: This field is required.", column)),
            None => None,
            Some(value) => match Decimal::from_str(value) {
                Err(_) => Some(format!("{}: A valid number is required.", column)),
                Ok(number) => {
                    let (digits, places) = decimal_digits(&number);

                    if digits > max_digits {
                        Some(format!(
                            "{}: Ensure that there are no more than {} digits in total.",
                            column, max_digits
                        ))
                    } else if places > decimal_places {
                        Some(format!(
                            "{}: Ensure that there are no more than {} decimal places.",
                            column, decimal_places
                        ))
                    } else if digits - places > max_digits - decimal_places {
                        Some(format!(
                            "{}: Ensure that there are no more than {} digits before the decimal point.",
                            column,
                            max_digits - decimal_places
                        ))
                    } else {
                        None
                    }
                }
            },
        },
    }
}

pub fn validate_extension_files(tables: &GtfsTables) -> Vec<Finding> {
    let mut findings = vec![];

    for schema in EXTENSION_SCHEMAS.iter() {
        for row in tables.rows(schema.file_name) {
            let mut errors: Vec<String> = schema
                .rules
                .iter()
                .filter_map(|rule| check_rule(rule, &row))
                .collect();

            if !schema.one_of.is_empty()
                && schema.one_of.iter().all(|column| row.get(column).is_none())
            {
                errors.push(format!(
                    "One of {} is required.",
                    schema.one_of.join(", ")
                ));
            }

            if !errors.is_empty() {
                findings.push(Finding::error(
                    errors.join(" "),
                    schema.file_name,
                    Some(row.index),
                ));
            }
        }
    }

    findings
}

/// Reference and presence checks that would otherwise surface halfway
/// through an import.
pub fn validate_references(tables: &GtfsTables) -> Vec<Finding> {
    let mut findings = vec![];

    for file_name in REQUIRED_FILES {
        if !tables.contains(file_name) {
            findings.push(Finding::error(
                format!("{} is missing", file_name),
                file_name,
                None,
            ));
        }
    }

    let agency_ids: Vec<&str> = tables
        .rows("agency.txt")
        .map(|row| row.get("agency_id").unwrap_or(""))
        .collect();

    for (file_name, entity) in [("routes.txt", "route"), ("fare_attributes.txt", "fare")] {
        for row in tables.rows(file_name) {
            let known = row
                .get("agency_id")
                .is_some_and(|agency_id| agency_ids.contains(&agency_id));

            if !known && agency_ids.len() != 1 {
                findings.push(Finding::error(
                    format!(
                        "{} has no agency_id and the default agency is ambiguous ({} agencies)",
                        entity,
                        agency_ids.len()
                    ),
                    file_name,
                    Some(row.index),
                ));
            }
        }
    }

    let route_ids: Vec<&str> = tables
        .rows("routes.txt")
        .filter_map(|row| row.get("route_id"))
        .collect();

    for row in tables.rows("trips.txt") {
        match row.get("route_id") {
            Some(route_id) if route_ids.contains(&route_id) => {}
            route_id => findings.push(Finding::error(
                format!("unknown route_id '{}'", route_id.unwrap_or("")),
                "trips.txt",
                Some(row.index),
            )),
        }

        if let Some(direction) = row.get("direction_id") {
            if direction != "0" && direction != "1" {
                findings.push(Finding::warning(
                    format!("unexpected direction_id '{}'", direction),
                    "trips.txt",
                    Some(row.index),
                ));
            }
        }
    }

    let fare_ids: Vec<&str> = tables
        .rows("fare_attributes.txt")
        .filter_map(|row| row.get("fare_id"))
        .collect();
    let rider_category_ids: Vec<&str> = tables
        .rows("rider_categories.txt")
        .filter_map(|row| row.get("rider_category_id"))
        .collect();

    for row in tables.rows("fare_rider_categories.txt") {
        if let Some(fare_id) = row.get("fare_id") {
            if !fare_ids.contains(&fare_id) {
                findings.push(Finding::error(
                    format!("unknown fare_id '{}'", fare_id),
                    "fare_rider_categories.txt",
                    Some(row.index),
                ));
            }
        }

        if let Some(rider_category_id) = row.get("rider_category_id") {
            if !rider_category_ids.contains(&rider_category_id) {
                findings.push(Finding::error(
                    format!("unknown rider_category_id '{}'", rider_category_id),
                    "fare_rider_categories.txt",
                    Some(row.index),
                ));
            }
        }
    }

    findings
}

pub fn validate_feed(feed: &ParsedFeed) -> Vec<Finding> {
    let mut findings = validate_references(&feed.tables);
    findings.extend(validate_extension_files(&feed.tables));
    findings
}
