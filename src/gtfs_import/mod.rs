// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Reading GTFS datasets and replacing a feed's rows with their contents.

pub mod conversion;
pub mod departures;
pub mod errors;
pub mod feed_reader;
pub mod feed_source;
pub mod field_mapping;
pub mod fingerprint;
pub mod import_context;
pub mod importer;
pub mod row_builders;
pub mod tables;
pub mod translations;
pub mod updater;
pub mod validation;

#[cfg(test)]
mod test_fixtures;

pub use errors::{FeedReadError, Finding, GtfsFeedImporterError, Severity};
pub use feed_reader::{GtfsFeedReader, ParsedFeed};
pub use importer::{GtfsFeedImporter, ImportSummary};
pub use updater::{GtfsFeedUpdater, UpdateOutcome, UpdateSummary};
