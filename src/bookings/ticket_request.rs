//! Turning a booking request expressed in api ids into the source ids the
//! ticketing system knows, and the checks a request must pass before it is
//! sent anywhere.

use ahash::AHashMap;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::BookingError;
use super::responses::{DepartureKey, PassthroughParameters, ReservationRequest, TicketKey};
use crate::localized_text::LocalizedText;
use crate::SUPPORTED_LANGUAGES;
use crate::maas::feeds_for_maas_operator;
use crate::models::{Feed, Route};
use crate::schema::gtfs::{departures, fare_rider_categories, fare_rules, fares, rider_categories, routes, trips};

/// How a route sells capacity. Stored as an integer on the route row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacitySales {
    Disabled = 0,
    Enabled = 1,
    RequiredForOutbound = 2,
    RequiredForInbound = 3,
}

impl CapacitySales {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(CapacitySales::Disabled),
            1 => Some(CapacitySales::Enabled),
            2 => Some(CapacitySales::RequiredForOutbound),
            3 => Some(CapacitySales::RequiredForInbound),
            _ => None,
        }
    }

    /// The trip direction a booking must include exactly one departure of.
    pub fn required_direction(&self) -> Option<i32> {
        match self {
            CapacitySales::RequiredForOutbound => Some(0),
            CapacitySales::RequiredForInbound => Some(1),
            CapacitySales::Disabled | CapacitySales::Enabled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TicketSelection {
    pub ticket_type_id: Uuid,
    pub customer_type_id: Uuid,
}

/// A booking request as a MaaS operator sends it. When `route_id` is
/// missing the route of the first departure is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TicketRequest {
    #[serde(default)]
    pub route_id: Option<Uuid>,
    #[serde(default)]
    pub departure_ids: Vec<Uuid>,
    pub tickets: Vec<TicketSelection>,
    #[serde(flatten)]
    pub params: PassthroughParameters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDeparture {
    pub api_id: Uuid,
    pub route_id: i32,
    pub trip_source_id: String,
    pub date: NaiveDate,
    pub direction_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTicket {
    pub fare_source_id: String,
    pub rider_category_source_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTicketRequest {
    pub route: Route,
    pub default_lang: String,
    pub ticketing_system_id: i32,
    pub departures: Vec<ResolvedDeparture>,
    pub tickets: Vec<ResolvedTicket>,
    pub params: PassthroughParameters,
}

fn does_not_exist(api_id: Uuid) -> BookingError {
    BookingError::Validation(format!("Invalid ID \"{}\" - object does not exist.", api_id))
}

pub fn validate_departures(route: &Route, departures: &[ResolvedDeparture]) -> Result<(), BookingError> {
    if departures.is_empty() {
        return Err(BookingError::Validation(
            "At least one departure must be selected.".to_string(),
        ));
    }

    if departures.iter().any(|departure| departure.route_id != route.id) {
        return Err(BookingError::Validation(
            "All departures must belong to the same route.".to_string(),
        ));
    }

    let capacity_sales = CapacitySales::from_i32(route.capacity_sales).unwrap_or(CapacitySales::Disabled);

    if let Some(direction) = capacity_sales.required_direction() {
        let matching = departures
            .iter()
            .filter(|departure| departure.direction_id == Some(direction))
            .count();

        if matching != 1 {
            let which = if direction == 0 { "outbound" } else { "inbound" };
            return Err(BookingError::Validation(format!(
                "Exactly one {} departure must be selected for this route.",
                which
            )));
        }
    }

    Ok(())
}

pub fn validate_locale(params: &PassthroughParameters) -> Result<(), BookingError> {
    match params.locale.as_deref() {
        Some(locale) if !SUPPORTED_LANGUAGES.contains(&locale) => Err(BookingError::Validation(format!(
            "\"{}\" is not a valid choice for locale.",
            locale
        ))),
        _ => Ok(()),
    }
}

/// Long name in the feed language, else the short name.
pub fn route_name(route: &Route, default_lang: &str) -> String {
    [&route.long_name, &route.short_name]
        .into_iter()
        .find_map(|value| {
            LocalizedText::from_json(value)
                .resolve(Some(default_lang), default_lang)
                .map(|name| name.to_string())
        })
        .unwrap_or_default()
}

impl ResolvedTicketRequest {
    pub fn validate(&self) -> Result<(), BookingError> {
        validate_locale(&self.params)?;
        validate_departures(&self.route, &self.departures)?;
        self.ticket_count()?;

        if self.tickets.is_empty() {
            return Err(BookingError::Validation(
                "At least one ticket must be selected.".to_string(),
            ));
        }

        Ok(())
    }

    pub fn route_name(&self) -> String {
        route_name(&self.route, &self.default_lang)
    }

    pub fn ticket_count(&self) -> Result<i32, BookingError> {
        i32::try_from(self.tickets.len())
            .map_err(|_| BookingError::Validation("Too many tickets selected.".to_string()))
    }

    pub fn to_reservation_request(&self) -> ReservationRequest {
        ReservationRequest {
            params: self.params.clone(),
            route_id: self.route.source_id.clone(),
            departures: self
                .departures
                .iter()
                .map(|departure| DepartureKey {
                    trip_id: departure.trip_source_id.clone(),
                    date: departure.date,
                })
                .collect(),
            tickets: self
                .tickets
                .iter()
                .map(|ticket| TicketKey {
                    ticket_type_id: ticket.fare_source_id.clone(),
                    customer_type_id: ticket.rider_category_source_id.clone(),
                })
                .collect(),
        }
    }
}

/// Looks up everything a request refers to within the feeds the operator
/// may book on, then validates it.
pub async fn resolve_ticket_request(
    conn: &mut AsyncPgConnection,
    maas_operator_id: i32,
    request: &TicketRequest,
) -> Result<ResolvedTicketRequest, BookingError> {
    let visible: AHashMap<i32, Feed> = feeds_for_maas_operator(conn, maas_operator_id, Utc::now())
        .await?
        .into_iter()
        .map(|feed| (feed.id, feed))
        .collect();
    let feed_ids: Vec<i32> = visible.keys().copied().collect();

    let departures = load_departures(conn, &feed_ids, &request.departure_ids).await?;

    let route = match (request.route_id, <[ResolvedDeparture]>::first(&departures)) {
        (Some(route_api_id), _) => routes::table
            .filter(routes::api_id.eq(route_api_id))
            .filter(routes::feed_id.eq_any(&feed_ids))
            .select(Route::as_select())
            .first(conn)
            .await
            .optional()?
            .ok_or_else(|| does_not_exist(route_api_id))?,
        (None, Some(first)) => {
            routes::table
                .filter(routes::id.eq(first.route_id))
                .select(Route::as_select())
                .first(conn)
                .await?
        }
        (None, None) => {
            return Err(BookingError::Validation(
                "At least one departure must be selected.".to_string(),
            ));
        }
    };

    let feed = visible
        .get(&route.feed_id)
        .ok_or_else(|| does_not_exist(route.api_id))?;

    let ticketing_system_id = feed.ticketing_system_id.ok_or_else(|| {
        BookingError::Validation(format!("Route {} has no ticketing system.", route.api_id))
    })?;

    let tickets = load_tickets(conn, route.id, &request.tickets).await?;

    let resolved = ResolvedTicketRequest {
        default_lang: feed.default_lang.clone(),
        route,
        ticketing_system_id,
        departures,
        tickets,
        params: request.params.clone(),
    };

    resolved.validate()?;

    Ok(resolved)
}

async fn load_departures(
    conn: &mut AsyncPgConnection,
    feed_ids: &[i32],
    api_ids: &[Uuid],
) -> Result<Vec<ResolvedDeparture>, BookingError> {
    let rows: Vec<(Uuid, NaiveDate, i32, String, Option<i32>)> = departures::table
        .inner_join(trips::table.on(trips::id.eq(departures::trip_id)))
        .filter(departures::api_id.eq_any(api_ids))
        .filter(departures::feed_id.eq_any(feed_ids))
        .select((
            departures::api_id,
            departures::date,
            trips::route_id,
            trips::source_id,
            trips::direction_id,
        ))
        .load(conn)
        .await?;

    let by_id: AHashMap<Uuid, ResolvedDeparture> = rows
        .into_iter()
        .map(|(api_id, date, route_id, trip_source_id, direction_id)| {
            (
                api_id,
                ResolvedDeparture {
                    api_id,
                    route_id,
                    trip_source_id,
                    date,
                    direction_id,
                },
            )
        })
        .collect();

    api_ids
        .iter()
        .map(|api_id| by_id.get(api_id).cloned().ok_or_else(|| does_not_exist(*api_id)))
        .collect()
}

/// Fares must apply to the route and rider categories must be priced for
/// the chosen fare.
async fn load_tickets(
    conn: &mut AsyncPgConnection,
    route_id: i32,
    selections: &[TicketSelection],
) -> Result<Vec<ResolvedTicket>, BookingError> {
    if selections.is_empty() {
        return Ok(vec![]);
    }

    let fare_api_ids: Vec<Uuid> = selections.iter().map(|selection| selection.ticket_type_id).collect();

    let route_fares: AHashMap<Uuid, (i32, String)> = fares::table
        .inner_join(fare_rules::table.on(fare_rules::fare_id.eq(fares::id)))
        .filter(fare_rules::route_id.eq(route_id))
        .filter(fares::api_id.eq_any(&fare_api_ids))
        .select((fares::api_id, fares::id, fares::source_id))
        .distinct()
        .load::<(Uuid, i32, String)>(conn)
        .await?
        .into_iter()
        .map(|(api_id, id, source_id)| (api_id, (id, source_id)))
        .collect();

    let fare_ids: Vec<i32> = route_fares.values().map(|(id, _)| *id).collect();
    let category_api_ids: Vec<Uuid> = selections.iter().map(|selection| selection.customer_type_id).collect();

    let priced: AHashMap<(i32, Uuid), String> = rider_categories::table
        .inner_join(
            fare_rider_categories::table.on(fare_rider_categories::rider_category_id.eq(rider_categories::id)),
        )
        .filter(fare_rider_categories::fare_id.eq_any(&fare_ids))
        .filter(rider_categories::api_id.eq_any(&category_api_ids))
        .select((
            fare_rider_categories::fare_id,
            rider_categories::api_id,
            rider_categories::source_id,
        ))
        .load::<(i32, Uuid, String)>(conn)
        .await?
        .into_iter()
        .map(|(fare_id, api_id, source_id)| ((fare_id, api_id), source_id))
        .collect();

    selections
        .iter()
        .map(|selection| {
            let (fare_id, fare_source_id) = route_fares
                .get(&selection.ticket_type_id)
                .ok_or_else(|| does_not_exist(selection.ticket_type_id))?;

            let rider_category_source_id = priced
                .get(&(*fare_id, selection.customer_type_id))
                .ok_or_else(|| does_not_exist(selection.customer_type_id))?;

            Ok(ResolvedTicket {
                fare_source_id: fare_source_id.clone(),
                rider_category_source_id: rider_category_source_id.clone(),
            })
        })
        .collect()
}
