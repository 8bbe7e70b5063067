// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license

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
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::deprecated_clippy_cfg_attr,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod api_id;
pub mod bookings;
pub mod config;
pub mod gtfs_import;
pub mod hashfolder;
pub mod localized_text;
pub mod maas;
pub mod models;
pub mod postgres_tools;
pub mod schema;

pub const WGS_84_SRID: u32 = 4326;

/// Language used when neither feed_info nor agency.txt declares one.
pub const FALLBACK_LANGUAGE: &str = "fi";

/// Languages tickets and localized payloads are served in.
pub const SUPPORTED_LANGUAGES: [&str; 3] = ["fi", "en", "sv"];
