//! Seat availability across ticketing systems.
//!
//! Departures are grouped per ticketing system in the order they were
//! requested. Each group is one upstream call, run with bounded
//! concurrency, and the rows that come back are matched to the requested
//! departures of that same system by trip source id and date.

use ahash::AHashMap;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::errors::{BookingError, TicketingSystemError, TicketingSystemNotBehavingError};
use super::responses::{AvailabilityRow, DepartureKey};
use super::ticketing_system::{TicketingClient, TicketingSystemApi};
use crate::maas::permitted_ticketing_system_ids;
use crate::models::{MaasOperator, TicketingSystem};
use crate::schema::gtfs::{departures, feeds, trips};
use crate::schema::maas::ticketing_systems;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureTarget {
    pub departure_id: Uuid,
    pub ticketing_system_id: i32,
    pub key: DepartureKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartureAvailability {
    pub departure_id: Uuid,
    pub available: u32,
    pub total: Option<u32>,
}

pub fn group_by_ticketing_system(targets: &[DepartureTarget]) -> Vec<(i32, Vec<DepartureKey>)> {
    let mut positions: AHashMap<i32, usize> = AHashMap::new();
    let mut groups: Vec<(i32, Vec<DepartureKey>)> = vec![];

    for target in targets {
        let position = *positions.entry(target.ticketing_system_id).or_insert_with(|| {
            groups.push((target.ticketing_system_id, vec![]));
            groups.len() - 1
        });

        groups[position].1.push(target.key.clone());
    }

    groups
}

/// Rows arrive per ticketing system and only match departures of that
/// system. Requested order is kept, the first row for a (trip, date) pair
/// wins and rows nobody asked for are dropped.
pub fn merge_availability(
    targets: &[DepartureTarget],
    rows: &[(i32, Vec<AvailabilityRow>)],
) -> Vec<DepartureAvailability> {
    let mut by_key: AHashMap<(i32, &str, NaiveDate), &AvailabilityRow> = AHashMap::new();

    for (ticketing_system_id, system_rows) in rows {
        for row in system_rows {
            by_key
                .entry((*ticketing_system_id, row.trip_id.as_str(), row.date))
                .or_insert(row);
        }
    }

    targets
        .iter()
        .filter_map(|target| {
            let row = by_key.get(&(
                target.ticketing_system_id,
                target.key.trip_id.as_str(),
                target.key.date,
            ))?;

            Some(DepartureAvailability {
                departure_id: target.departure_id,
                available: row.available,
                total: row.total,
            })
        })
        .collect()
}

/// One upstream call per ticketing system, at most `max_concurrency` in
/// flight. Any failing system fails the whole request.
pub async fn fetch_availability<C, F>(
    targets: &[DepartureTarget],
    client_for: F,
    max_concurrency: usize,
) -> Result<Vec<DepartureAvailability>, TicketingSystemError>
where
    C: TicketingClient,
    F: Fn(i32) -> Result<C, TicketingSystemError>,
{
    let groups = group_by_ticketing_system(targets);

    debug!(
        "Fetching availability for {} departures from {} ticketing systems",
        targets.len(),
        groups.len()
    );

    let responses: Vec<Result<(i32, Vec<AvailabilityRow>), TicketingSystemError>> = stream::iter(
        groups.into_iter().map(|(ticketing_system_id, keys)| {
            let client = client_for(ticketing_system_id);
            async move {
                let rows = client?.availability(&keys).await?;
                Ok::<_, TicketingSystemError>((ticketing_system_id, rows))
            }
        }),
    )
    .buffered(max_concurrency.max(1))
    .collect()
    .await;

    let rows = responses.into_iter().collect::<Result<Vec<_>, _>>()?;

    Ok(merge_availability(targets, &rows))
}

/// Resolves departure api ids the operator may see, in requested order.
/// Unknown ids and departures of feeds without a ticketing system are left
/// out.
pub async fn load_departure_targets(
    conn: &mut AsyncPgConnection,
    maas_operator_id: i32,
    departure_ids: &[Uuid],
) -> Result<Vec<DepartureTarget>, diesel::result::Error> {
    let permitted = permitted_ticketing_system_ids(conn, maas_operator_id, Utc::now()).await?;

    let rows: Vec<(Uuid, String, NaiveDate, Option<i32>)> = departures::table
        .inner_join(trips::table.on(trips::id.eq(departures::trip_id)))
        .inner_join(feeds::table.on(feeds::id.eq(departures::feed_id)))
        .filter(departures::api_id.eq_any(departure_ids))
        .filter(feeds::ticketing_system_id.eq_any(permitted))
        .select((
            departures::api_id,
            trips::source_id,
            departures::date,
            feeds::ticketing_system_id,
        ))
        .load(conn)
        .await?;

    let mut by_id: AHashMap<Uuid, DepartureTarget> = rows
        .into_iter()
        .filter_map(|(departure_id, trip_id, date, ticketing_system_id)| {
            Some((
                departure_id,
                DepartureTarget {
                    departure_id,
                    ticketing_system_id: ticketing_system_id?,
                    key: DepartureKey { trip_id, date },
                },
            ))
        })
        .collect();

    Ok(departure_ids
        .iter()
        .filter_map(|departure_id| by_id.remove(departure_id))
        .collect())
}

pub async fn departure_availability(
    conn: &mut AsyncPgConnection,
    http_client: &reqwest::Client,
    maas_operator: &MaasOperator,
    departure_ids: &[Uuid],
    max_concurrency: usize,
) -> Result<Vec<DepartureAvailability>, BookingError> {
    let targets = load_departure_targets(conn, maas_operator.id, departure_ids).await?;

    if targets.len() < departure_ids.len() {
        warn!(
            "{} of {} requested departures are not available to operator {}",
            departure_ids.len() - targets.len(),
            departure_ids.len(),
            maas_operator.identifier
        );
    }

    let ids: Vec<i32> = targets.iter().map(|target| target.ticketing_system_id).collect();

    let systems: AHashMap<i32, TicketingSystem> = ticketing_systems::table
        .filter(ticketing_systems::id.eq_any(ids))
        .select(TicketingSystem::as_select())
        .load(conn)
        .await?
        .into_iter()
        .map(|system| (system.id, system))
        .collect();

    let client_for = |ticketing_system_id: i32| {
        systems
            .get(&ticketing_system_id)
            .cloned()
            .map(|system| TicketingSystemApi::new(http_client.clone(), system, maas_operator))
            .ok_or_else(|| {
                TicketingSystemError::NotBehaving(TicketingSystemNotBehavingError::new(
                    format!("ticketing system {} not found", ticketing_system_id),
                    None,
                    "",
                ))
            })
    };

    Ok(fetch_availability(&targets, client_for, max_concurrency).await?)
}
