// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::feeds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Feed {
    pub id: i32,
    pub name: String,
    pub url_or_path: String,
    pub fingerprint: String,
    pub imported_at: Option<DateTime<Utc>>,
    pub import_attempted_at: Option<DateTime<Utc>>,
    pub last_import_error_message: String,
    pub ticketing_system_id: Option<i32>,
    pub default_lang: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::gtfs::feeds)]
pub struct NewFeed {
    pub name: String,
    pub url_or_path: String,
    pub ticketing_system_id: Option<i32>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::gtfs::shapes)]
pub struct NewShape {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub geometry: postgis_diesel::types::LineString<postgis_diesel::types::Point>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::agencies)]
pub struct NewAgency {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub name: Value,
    pub url: Value,
    pub timezone: String,
    pub lang: Option<String>,
    pub phone: Option<String>,
    pub fare_url: Value,
    pub email: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::routes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Route {
    pub id: i32,
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub agency_id: i32,
    pub short_name: Value,
    pub long_name: Value,
    pub description: Value,
    pub route_type: Option<i32>,
    pub url: Value,
    pub sort_order: Option<i32>,
    pub capacity_sales: i32,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::routes)]
pub struct NewRoute {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub agency_id: i32,
    pub short_name: Value,
    pub long_name: Value,
    pub description: Value,
    pub route_type: Option<i32>,
    pub url: Value,
    pub sort_order: Option<i32>,
    pub capacity_sales: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::trips)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Trip {
    pub id: i32,
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub route_id: i32,
    pub shape_id: Option<i32>,
    pub service_id: String,
    pub headsign: Value,
    pub short_name: Value,
    pub direction_id: Option<i32>,
    pub block_id: String,
    pub wheelchair_accessible: Option<i32>,
    pub bikes_allowed: Option<i32>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::trips)]
pub struct NewTrip {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub route_id: i32,
    pub shape_id: Option<i32>,
    pub service_id: String,
    pub headsign: Value,
    pub short_name: Value,
    pub direction_id: Option<i32>,
    pub block_id: String,
    pub wheelchair_accessible: Option<i32>,
    pub bikes_allowed: Option<i32>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::stops)]
pub struct NewStop {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub code: String,
    pub name: Value,
    pub description: Value,
    pub tts_name: Value,
    pub point: Option<postgis_diesel::types::Point>,
    pub wheelchair_boarding: Option<i32>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::stop_times)]
pub struct NewStopTime {
    pub feed_id: i32,
    pub trip_id: i32,
    pub stop_id: i32,
    pub arrival_time: Option<i32>,
    pub departure_time: Option<i32>,
    pub stop_sequence: i32,
    pub stop_headsign: Value,
    pub timepoint: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::fares)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Fare {
    pub id: i32,
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub agency_id: i32,
    pub price: Decimal,
    pub currency_type: String,
    pub payment_method: Option<i32>,
    pub transfers: Option<i32>,
    pub name: Value,
    pub description: Value,
    pub instructions: Value,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::fares)]
pub struct NewFare {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub agency_id: i32,
    pub price: Decimal,
    pub currency_type: String,
    pub payment_method: Option<i32>,
    pub transfers: Option<i32>,
    pub name: Value,
    pub description: Value,
    pub instructions: Value,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::fare_rules)]
pub struct NewFareRule {
    pub feed_id: i32,
    pub fare_id: i32,
    pub route_id: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::rider_categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RiderCategory {
    pub id: i32,
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub name: Value,
    pub description: Value,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::rider_categories)]
pub struct NewRiderCategory {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub name: Value,
    pub description: Value,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::fare_rider_categories)]
pub struct NewFareRiderCategory {
    pub feed_id: i32,
    pub api_id: Uuid,
    pub fare_id: i32,
    pub rider_category_id: i32,
    pub price: Decimal,
    pub currency_type: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::feed_infos)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FeedInfo {
    pub feed_id: i32,
    pub publisher_name: String,
    pub publisher_url: String,
    pub lang: String,
    pub default_lang: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub version: String,
    pub contact_email: String,
    pub contact_url: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::departures)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Departure {
    pub id: i32,
    pub feed_id: i32,
    pub trip_id: i32,
    pub date: NaiveDate,
    pub api_id: Uuid,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::gtfs::departures)]
pub struct NewDeparture {
    pub feed_id: i32,
    pub trip_id: i32,
    pub date: NaiveDate,
    pub api_id: Uuid,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::maas::ticketing_systems)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TicketingSystem {
    pub id: i32,
    pub name: String,
    pub api_key: Option<String>,
    pub bookings_api_url: String,
    pub availability_api_url: String,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::maas::maas_operators)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MaasOperator {
    pub id: i32,
    pub name: String,
    pub identifier: String,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::maas::transport_service_providers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransportServiceProvider {
    pub id: i32,
    pub name: String,
    pub ticketing_system_id: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::maas::permissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Permission {
    pub id: i32,
    pub maas_operator_id: i32,
    pub transport_service_provider_id: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::maas::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Booking {
    pub id: i32,
    pub api_id: Uuid,
    pub source_id: String,
    pub maas_operator_id: i32,
    pub ticketing_system_id: i32,
    pub status: String,
    pub transaction_id: String,
    pub ticket_count: i32,
    pub route_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::maas::bookings)]
pub struct NewBooking {
    pub api_id: Uuid,
    pub source_id: String,
    pub maas_operator_id: i32,
    pub ticketing_system_id: i32,
    pub status: String,
    pub transaction_id: String,
    pub ticket_count: i32,
    pub route_name: String,
}
