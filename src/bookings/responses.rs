//! Payloads exchanged with ticketing systems and the classification of
//! their responses into success, business error or malfunction.

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{TicketingSystemError, TicketingSystemNotBehavingError, TicketingSystemRequestError};

pub const MAX_IDENTIFIER_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Reserved,
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Reserved => "RESERVED",
            BookingStatus::Confirmed => "CONFIRMED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RESERVED" => Some(BookingStatus::Reserved),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Reserve,
    Confirm,
    Retrieve,
    Availability,
}

impl Operation {
    /// Error codes the ticketing system may legitimately answer with. Any
    /// other 4xx body counts as a malfunction.
    pub fn error_codes(&self) -> &'static [&'static str] {
        match self {
            Operation::Reserve => &[
                "MAX_CAPACITY_EXCEEDED",
                "MAX_NUMBER_OF_TICKETS_REQUESTED_EXCEEDED",
                "TICKET_SALES_ENDED",
            ],
            Operation::Confirm => &["BOOKING_EXPIRED", "BOOKING_ALREADY_CONFIRMED"],
            Operation::Retrieve => &["BOOKING_NOT_CONFIRMED"],
            Operation::Availability => &[],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Reserve => "reserve",
            Operation::Confirm => "confirm",
            Operation::Retrieve => "retrieve",
            Operation::Availability => "availability",
        }
    }
}

/// Parameters the caller passes through to the ticketing system untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartureKey {
    pub trip_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketKey {
    pub ticket_type_id: String,
    pub customer_type_id: String,
}

/// A reservation as sent upstream, with source ids in place of api ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRequest {
    #[serde(flatten)]
    pub params: PassthroughParameters,
    pub route_id: String,
    pub departures: Vec<DepartureKey>,
    pub tickets: Vec<TicketKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityRequest<'a> {
    pub departures: &'a [DepartureKey],
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Confirmation {
    pub id: String,
    pub status: BookingStatus,
    pub tickets: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AvailabilityRow {
    pub trip_id: String,
    pub date: NaiveDate,
    pub available: u32,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Checks a deserialized success body beyond its shape.
pub trait SuccessBody: DeserializeOwned {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

fn check_identifier(id: &str) -> Result<(), String> {
    if id.is_empty() {
        Err("id is empty".to_string())
    } else if id.chars().count() > MAX_IDENTIFIER_LENGTH {
        Err(format!("id is longer than {} characters", MAX_IDENTIFIER_LENGTH))
    } else {
        Ok(())
    }
}

impl SuccessBody for Reservation {
    fn check(&self) -> Result<(), String> {
        check_identifier(&self.id)?;

        match self.status {
            BookingStatus::Reserved => Ok(()),
            other => Err(format!("status is {}, expected RESERVED", other.as_str())),
        }
    }
}

impl SuccessBody for Confirmation {
    fn check(&self) -> Result<(), String> {
        check_identifier(&self.id)?;

        if self.status != BookingStatus::Confirmed {
            return Err(format!("status is {}, expected CONFIRMED", self.status.as_str()));
        }

        if self.tickets.is_empty() {
            return Err("tickets is empty".to_string());
        }

        Ok(())
    }
}

impl SuccessBody for Vec<AvailabilityRow> {}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: InnerErrorBody,
}

#[derive(Debug, Deserialize)]
struct InnerErrorBody {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// 4xx with an allowed code is a business error, 2xx matching the success
/// shape is a success, and everything else is a malfunction.
pub fn classify_response<T: SuccessBody>(
    operation: Operation,
    status: StatusCode,
    body: &str,
) -> Result<T, TicketingSystemError> {
    let not_behaving = |reason: String| {
        TicketingSystemError::NotBehaving(TicketingSystemNotBehavingError::new(
            format!("{}: {}", operation.name(), reason),
            Some(status),
            body,
        ))
    };

    if status.is_client_error() {
        let parsed: ErrorBody = serde_json::from_str(body)
            .map_err(|err| not_behaving(format!("invalid error body: {}", err)))?;

        if !operation.error_codes().contains(&parsed.error.code.as_str()) {
            return Err(not_behaving(format!(
                "unexpected error code {}",
                parsed.error.code
            )));
        }

        return Err(TicketingSystemError::Request(TicketingSystemRequestError {
            code: parsed.error.code,
            message: parsed.error.message.unwrap_or_default(),
            details: parsed.error.details.unwrap_or_default(),
        }));
    }

    if !status.is_success() {
        return Err(not_behaving("unexpected status".to_string()));
    }

    let parsed: T = serde_json::from_str(body)
        .map_err(|err| not_behaving(format!("invalid success body: {}", err)))?;

    parsed.check().map_err(not_behaving)?;

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(status: u16, body: &str) -> Result<Reservation, TicketingSystemError> {
        classify_response(Operation::Reserve, StatusCode::from_u16(status).unwrap(), body)
    }

    fn confirm(status: u16, body: &str) -> Result<Confirmation, TicketingSystemError> {
        classify_response(Operation::Confirm, StatusCode::from_u16(status).unwrap(), body)
    }

    fn is_not_behaving<T>(result: &Result<T, TicketingSystemError>) -> bool {
        matches!(result, Err(TicketingSystemError::NotBehaving(_)))
    }

    #[test]
    fn reservation_success() {
        let reservation = reserve(201, r#"{"id": "xyz", "status": "RESERVED"}"#).unwrap();

        assert_eq!(reservation.id, "xyz");
        assert_eq!(reservation.status, BookingStatus::Reserved);
    }

    #[test]
    fn reservation_with_wrong_status_is_malfunction() {
        assert!(is_not_behaving(&reserve(201, r#"{"id": "xyz", "status": "BOGUS_STATUS"}"#)));
        assert!(is_not_behaving(&reserve(201, r#"{"id": "xyz", "status": "CONFIRMED"}"#)));
        assert!(is_not_behaving(&reserve(201, r#"{"id": "", "status": "RESERVED"}"#)));

        let long_id = "x".repeat(256);
        let body = format!(r#"{{"id": "{}", "status": "RESERVED"}}"#, long_id);
        assert!(is_not_behaving(&reserve(201, &body)));
    }

    #[test]
    fn allowed_codes_are_business_errors() {
        match reserve(422, r#"{"error": {"code": "MAX_CAPACITY_EXCEEDED"}}"#) {
            Err(TicketingSystemError::Request(err)) => {
                assert_eq!(err.code, "MAX_CAPACITY_EXCEEDED");
                assert_eq!(err.message, "");
                assert_eq!(err.details, "");
            }
            other => panic!("unexpected result {:?}", other),
        }

        match confirm(
            409,
            r#"{"error": {"code": "BOOKING_EXPIRED", "message": "Too late", "details": "15 min"}}"#,
        ) {
            Err(TicketingSystemError::Request(err)) => {
                assert_eq!(err.code, "BOOKING_EXPIRED");
                assert_eq!(err.message, "Too late");
                assert_eq!(err.details, "15 min");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn allow_lists_are_per_operation() {
        let body = r#"{"error": {"code": "MAX_CAPACITY_EXCEEDED"}}"#;

        assert!(matches!(reserve(422, body), Err(TicketingSystemError::Request(_))));
        assert!(is_not_behaving(&confirm(422, body)));

        let retrieve: Result<Confirmation, _> = classify_response(
            Operation::Retrieve,
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": "BOOKING_NOT_CONFIRMED"}}"#,
        );
        assert!(matches!(retrieve, Err(TicketingSystemError::Request(_))));

        let availability: Result<Vec<AvailabilityRow>, _> = classify_response(
            Operation::Availability,
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": "BOOKING_NOT_CONFIRMED"}}"#,
        );
        assert!(is_not_behaving(&availability));
    }

    #[test]
    fn garbage_is_malfunction() {
        assert!(is_not_behaving(&reserve(400, "<html>Bad Request</html>")));
        assert!(is_not_behaving(&reserve(400, r#"{"detail": "nope"}"#)));
        assert!(is_not_behaving(&reserve(500, r#"{"error": {"code": "MAX_CAPACITY_EXCEEDED"}}"#)));
        assert!(is_not_behaving(&reserve(302, "")));
        assert!(is_not_behaving(&reserve(200, "not json")));
    }

    #[test]
    fn malfunction_keeps_raw_response() {
        match reserve(503, "upstream down") {
            Err(TicketingSystemError::NotBehaving(err)) => {
                assert_eq!(err.status, Some(503));
                assert_eq!(err.body, "upstream down");
                assert!(err.reason.starts_with("reserve:"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn confirmation_needs_tickets() {
        let ok = confirm(
            200,
            r#"{"id": "abc", "status": "CONFIRMED", "tickets": [{"id": "t1"}]}"#,
        )
        .unwrap();
        assert_eq!(ok.tickets.len(), 1);

        assert!(is_not_behaving(&confirm(
            200,
            r#"{"id": "abc", "status": "CONFIRMED", "tickets": []}"#
        )));
        assert!(is_not_behaving(&confirm(200, r#"{"id": "abc", "status": "CONFIRMED"}"#)));
        assert!(is_not_behaving(&confirm(
            200,
            r#"{"id": "abc", "status": "RESERVED", "tickets": [{}]}"#
        )));
    }

    #[test]
    fn availability_rows_parse() {
        let rows: Vec<AvailabilityRow> = classify_response(
            Operation::Availability,
            StatusCode::OK,
            r#"[{"trip_id": "morning", "date": "2021-02-15", "available": 3, "total": 40},
                {"trip_id": "evening", "date": "2021-02-01", "available": 0}]"#,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].total, Some(40));
        assert_eq!(rows[1].total, None);
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2021, 2, 1).unwrap());

        let negative: Result<Vec<AvailabilityRow>, _> = classify_response(
            Operation::Availability,
            StatusCode::OK,
            r#"[{"trip_id": "morning", "date": "2021-02-15", "available": -1}]"#,
        );
        assert!(is_not_behaving(&negative));
    }

    #[test]
    fn reservation_request_serializes_flat() {
        let request = ReservationRequest {
            params: PassthroughParameters {
                request_id: Some("req-1".to_string()),
                transaction_id: None,
                locale: Some("fi".to_string()),
            },
            route_id: "kauppatori_suomenlinna".to_string(),
            departures: vec![DepartureKey {
                trip_id: "morning".to_string(),
                date: NaiveDate::from_ymd_opt(2021, 2, 15).unwrap(),
            }],
            tickets: vec![TicketKey {
                ticket_type_id: "single".to_string(),
                customer_type_id: "adult".to_string(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "request_id": "req-1",
                "locale": "fi",
                "route_id": "kauppatori_suomenlinna",
                "departures": [{"trip_id": "morning", "date": "2021-02-15"}],
                "tickets": [{"ticket_type_id": "single", "customer_type_id": "adult"}],
            })
        );
    }
}
