// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

//! Booking lifecycle: RESERVED, then CONFIRMED. Retrieving tickets of a
//! confirmed booking reads from the ticketing system and changes nothing.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::errors::BookingError;
use super::responses::{BookingStatus, Confirmation, PassthroughParameters, Reservation};
use super::ticket_request::{ResolvedTicketRequest, TicketRequest, resolve_ticket_request, validate_locale};
use super::ticketing_system::{TicketingClient, TicketingSystemApi};
use crate::models::{Booking, MaasOperator, NewBooking, TicketingSystem};
use crate::schema::maas::{bookings, ticketing_systems};

pub fn new_booking(
    maas_operator_id: i32,
    request: &ResolvedTicketRequest,
    reservation: &Reservation,
) -> Result<NewBooking, BookingError> {
    Ok(NewBooking {
        api_id: Uuid::new_v4(),
        source_id: reservation.id.clone(),
        maas_operator_id,
        ticketing_system_id: request.ticketing_system_id,
        status: BookingStatus::Reserved.as_str().to_string(),
        transaction_id: request.params.transaction_id.clone().unwrap_or_default(),
        ticket_count: request.ticket_count()?,
        route_name: request.route_name(),
    })
}

pub fn ensure_status(booking: &Booking, expected: BookingStatus) -> Result<(), BookingError> {
    if BookingStatus::parse(&booking.status) == Some(expected) {
        Ok(())
    } else {
        Err(BookingError::InvalidStatus {
            api_id: booking.api_id,
            status: booking.status.clone(),
            expected: expected.as_str(),
        })
    }
}

/// The ticketing system may hand back a different id on confirmation. That
/// id replaces the reservation id.
pub fn mark_confirmed(booking: &mut Booking, confirmation: &Confirmation, params: &PassthroughParameters) {
    booking.source_id = confirmation.id.clone();
    booking.status = BookingStatus::Confirmed.as_str().to_string();

    if let Some(transaction_id) = params.transaction_id.as_deref().filter(|id| !id.is_empty()) {
        booking.transaction_id = transaction_id.to_string();
    }
}

pub async fn create_reservation<C: TicketingClient>(
    conn: &mut AsyncPgConnection,
    client: &C,
    maas_operator: &MaasOperator,
    request: &ResolvedTicketRequest,
) -> Result<Booking, BookingError> {
    request.validate()?;

    let reservation = client.reserve(&request.to_reservation_request()).await?;

    let booking = diesel::insert_into(bookings::table)
        .values(new_booking(maas_operator.id, request, &reservation)?)
        .returning(Booking::as_returning())
        .get_result(conn)
        .await?;

    info!(
        "Reserved booking {} ({} tickets) for {}",
        booking.api_id, booking.ticket_count, maas_operator.identifier
    );

    Ok(booking)
}

pub async fn confirm_booking<C: TicketingClient>(
    conn: &mut AsyncPgConnection,
    client: &C,
    booking: &mut Booking,
    params: &PassthroughParameters,
) -> Result<Vec<Value>, BookingError> {
    ensure_status(booking, BookingStatus::Reserved)?;
    validate_locale(params)?;

    let confirmation = client.confirm(&booking.source_id, params).await?;

    mark_confirmed(booking, &confirmation, params);

    let updated = diesel::update(bookings::table.filter(bookings::id.eq(booking.id)))
        .set((
            bookings::source_id.eq(&booking.source_id),
            bookings::status.eq(&booking.status),
            bookings::transaction_id.eq(&booking.transaction_id),
            bookings::updated_at.eq(Utc::now()),
        ))
        .returning(Booking::as_returning())
        .get_result(conn)
        .await?;
    *booking = updated;

    info!("Confirmed booking {}", booking.api_id);

    Ok(confirmation.tickets)
}

pub async fn retrieve_tickets<C: TicketingClient>(
    client: &C,
    booking: &Booking,
    params: &PassthroughParameters,
) -> Result<Vec<Value>, BookingError> {
    let confirmation = client.retrieve(&booking.source_id, params).await?;
    Ok(confirmation.tickets)
}

/// Bookings are only ever visible to the operator that made them.
pub async fn find_booking(
    conn: &mut AsyncPgConnection,
    maas_operator_id: i32,
    api_id: Uuid,
) -> Result<Option<Booking>, diesel::result::Error> {
    bookings::table
        .filter(bookings::api_id.eq(api_id))
        .filter(bookings::maas_operator_id.eq(maas_operator_id))
        .select(Booking::as_select())
        .first(conn)
        .await
        .optional()
}

pub async fn ticketing_api(
    conn: &mut AsyncPgConnection,
    http_client: &reqwest::Client,
    maas_operator: &MaasOperator,
    ticketing_system_id: i32,
) -> Result<TicketingSystemApi, diesel::result::Error> {
    let ticketing_system = ticketing_systems::table
        .filter(ticketing_systems::id.eq(ticketing_system_id))
        .select(TicketingSystem::as_select())
        .first(conn)
        .await?;

    Ok(TicketingSystemApi::new(http_client.clone(), ticketing_system, maas_operator))
}

/// Resolves an operator request, reserves it upstream and stores the booking.
pub async fn book(
    conn: &mut AsyncPgConnection,
    http_client: &reqwest::Client,
    maas_operator: &MaasOperator,
    request: &TicketRequest,
) -> Result<Booking, BookingError> {
    let resolved = resolve_ticket_request(conn, maas_operator.id, request).await?;
    let api = ticketing_api(conn, http_client, maas_operator, resolved.ticketing_system_id).await?;

    create_reservation(conn, &api, maas_operator, &resolved).await
}
