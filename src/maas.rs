//! Which feeds a MaaS operator may see and book on.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::models::{Feed, Permission};
use crate::schema::gtfs::feeds;
use crate::schema::maas::{permissions, transport_service_providers};

/// A permission without an expiry never lapses.
pub fn permission_is_valid(permission: &Permission, now: DateTime<Utc>) -> bool {
    permission.expires_at.is_none_or(|expires_at| expires_at > now)
}

/// Ticketing systems of providers the operator holds a valid permission for.
pub async fn permitted_ticketing_system_ids(
    conn: &mut AsyncPgConnection,
    maas_operator_id: i32,
    now: DateTime<Utc>,
) -> Result<Vec<i32>, diesel::result::Error> {
    let rows: Vec<(Permission, Option<i32>)> = permissions::table
        .inner_join(
            transport_service_providers::table
                .on(transport_service_providers::id.eq(permissions::transport_service_provider_id)),
        )
        .filter(permissions::maas_operator_id.eq(maas_operator_id))
        .select((
            Permission::as_select(),
            transport_service_providers::ticketing_system_id,
        ))
        .load(conn)
        .await?;

    let mut ids: Vec<i32> = rows
        .into_iter()
        .filter(|(permission, _)| permission_is_valid(permission, now))
        .filter_map(|(_, ticketing_system_id)| ticketing_system_id)
        .collect();

    ids.sort_unstable();
    ids.dedup();

    Ok(ids)
}

pub async fn feeds_for_maas_operator(
    conn: &mut AsyncPgConnection,
    maas_operator_id: i32,
    now: DateTime<Utc>,
) -> Result<Vec<Feed>, diesel::result::Error> {
    let ticketing_system_ids = permitted_ticketing_system_ids(conn, maas_operator_id, now).await?;

    if ticketing_system_ids.is_empty() {
        return Ok(vec![]);
    }

    feeds::table
        .filter(feeds::ticketing_system_id.eq_any(ticketing_system_ids))
        .order(feeds::id)
        .select(Feed::as_select())
        .load(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MaasOperator, NewFeed, TicketingSystem, TransportServiceProvider};
    use crate::schema::maas::{maas_operators, ticketing_systems};
    use chrono::{Duration, TimeZone};
    use diesel_async::AsyncConnection;

    fn permission(expires_at: Option<DateTime<Utc>>) -> Permission {
        Permission {
            id: 1,
            maas_operator_id: 1,
            transport_service_provider_id: 1,
            expires_at,
        }
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2021, 4, 20, 12, 0, 0).unwrap();

        assert!(permission_is_valid(&permission(None), now));
        assert!(permission_is_valid(&permission(Some(now + Duration::seconds(1))), now));
        assert!(!permission_is_valid(&permission(Some(now)), now));
        assert!(!permission_is_valid(&permission(Some(now - Duration::days(1))), now));
    }

    #[tokio::test]
    async fn operators_only_see_permitted_feeds() {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return;
        };

        let mut conn = AsyncPgConnection::establish(&database_url).await.unwrap();
        conn.begin_test_transaction().await.unwrap();

        let now = Utc::now();

        diesel::insert_into(ticketing_systems::table)
            .values(vec![
                TicketingSystem {
                    id: 9001,
                    name: "Ferry tickets".to_string(),
                    api_key: Some("secret".to_string()),
                    bookings_api_url: "https://ferry.example/bookings/".to_string(),
                    availability_api_url: "https://ferry.example/availability/".to_string(),
                },
                TicketingSystem {
                    id: 9002,
                    name: "Bus tickets".to_string(),
                    api_key: Some("secret".to_string()),
                    bookings_api_url: "https://bus.example/bookings/".to_string(),
                    availability_api_url: "https://bus.example/availability/".to_string(),
                },
            ])
            .execute(&mut conn)
            .await
            .unwrap();

        diesel::insert_into(maas_operators::table)
            .values(MaasOperator {
                id: 9001,
                name: "Whim".to_string(),
                identifier: "whim".to_string(),
            })
            .execute(&mut conn)
            .await
            .unwrap();

        diesel::insert_into(transport_service_providers::table)
            .values(vec![
                TransportServiceProvider {
                    id: 9001,
                    name: "Ferry Company".to_string(),
                    ticketing_system_id: Some(9001),
                },
                TransportServiceProvider {
                    id: 9002,
                    name: "Bus Company".to_string(),
                    ticketing_system_id: Some(9002),
                },
            ])
            .execute(&mut conn)
            .await
            .unwrap();

        diesel::insert_into(permissions::table)
            .values(vec![
                Permission {
                    id: 9001,
                    maas_operator_id: 9001,
                    transport_service_provider_id: 9001,
                    expires_at: None,
                },
                Permission {
                    id: 9002,
                    maas_operator_id: 9001,
                    transport_service_provider_id: 9002,
                    expires_at: Some(now - Duration::days(1)),
                },
            ])
            .execute(&mut conn)
            .await
            .unwrap();

        diesel::insert_into(feeds::table)
            .values(vec![
                NewFeed {
                    name: "Ferry".to_string(),
                    url_or_path: "/data/ferry".to_string(),
                    ticketing_system_id: Some(9001),
                },
                NewFeed {
                    name: "Bus".to_string(),
                    url_or_path: "/data/bus".to_string(),
                    ticketing_system_id: Some(9002),
                },
            ])
            .execute(&mut conn)
            .await
            .unwrap();

        let visible = feeds_for_maas_operator(&mut conn, 9001, now).await.unwrap();

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "Ferry");
    }
}
