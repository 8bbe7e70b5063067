use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// A known business condition reported by the ticketing system, safe to show
/// to the end user as is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Ticketing system rejected the request: {code} {message}")]
pub struct TicketingSystemRequestError {
    pub code: String,
    pub message: String,
    pub details: String,
}

/// The ticketing system answered with something we can't interpret, or
/// didn't answer at all. `status` is `None` for transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Ticketing system error: {reason} response: ({}) {body}", status_text(.status))]
pub struct TicketingSystemNotBehavingError {
    pub reason: String,
    pub status: Option<u16>,
    pub body: String,
}

fn status_text(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |status| status.to_string())
}

impl TicketingSystemNotBehavingError {
    pub fn new(reason: impl Into<String>, status: Option<StatusCode>, body: &str) -> Self {
        TicketingSystemNotBehavingError {
            reason: reason.into(),
            status: status.map(|status| status.as_u16()),
            body: body.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketingSystemError {
    #[error(transparent)]
    Request(#[from] TicketingSystemRequestError),
    #[error(transparent)]
    NotBehaving(#[from] TicketingSystemNotBehavingError),
}

pub const TICKET_SYSTEM_ERROR_CODE: &str = "TICKET_SYSTEM_ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorDetail,
}

impl TicketingSystemError {
    /// The response body for the presentation layer. Malfunction details are
    /// logged by the client that saw them and never included here.
    pub fn to_error_payload(&self) -> (StatusCode, ErrorPayload) {
        let error = match self {
            TicketingSystemError::Request(err) => ErrorDetail {
                code: err.code.clone(),
                message: err.message.clone(),
                details: err.details.clone(),
            },
            TicketingSystemError::NotBehaving(_) => ErrorDetail {
                code: TICKET_SYSTEM_ERROR_CODE.to_string(),
                message: String::new(),
                details: String::new(),
            },
        };

        (StatusCode::UNPROCESSABLE_ENTITY, ErrorPayload { error })
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error(transparent)]
    Ticketing(#[from] TicketingSystemError),
    #[error("{0}")]
    Validation(String),
    #[error("Booking {api_id} is {status}, expected {expected}")]
    InvalidStatus {
        api_id: uuid::Uuid,
        status: String,
        expected: &'static str,
    },
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Ticketing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::InvalidStatus { .. } => StatusCode::CONFLICT,
            BookingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};

    struct ErrorEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn business_errors_pass_through() {
        let error = TicketingSystemError::Request(TicketingSystemRequestError {
            code: "MAX_CAPACITY_EXCEEDED".to_string(),
            message: "Sold out".to_string(),
            details: "Only 2 seats left".to_string(),
        });

        let (status, payload) = error.to_error_payload();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            serde_json::json!({"error": {
                "code": "MAX_CAPACITY_EXCEEDED",
                "message": "Sold out",
                "details": "Only 2 seats left",
            }})
        );
    }

    #[test]
    fn malfunctions_hide_upstream_detail() {
        let error = TicketingSystemError::NotBehaving(TicketingSystemNotBehavingError::new(
            "response is not JSON",
            Some(StatusCode::BAD_GATEWAY),
            "<html>stack trace</html>",
        ));

        let (status, payload) = error.to_error_payload();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(payload.error.code, TICKET_SYSTEM_ERROR_CODE);
        assert_eq!(payload.error.message, "");
        assert_eq!(payload.error.details, "");
        assert!(error.to_string().contains("(502) <html>stack trace</html>"));
    }

    #[test]
    fn payload_conversion_does_not_log_again() {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorEvents(count.clone()));

        let error = TicketingSystemError::NotBehaving(TicketingSystemNotBehavingError::new(
            "response is not JSON",
            Some(StatusCode::BAD_GATEWAY),
            "",
        ));

        let (_, payload) = tracing::subscriber::with_default(subscriber, || error.to_error_payload());

        assert_eq!(payload.error.code, TICKET_SYSTEM_ERROR_CODE);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let error = BookingError::Validation(
            "Exactly one outbound departure must be selected for this route.".to_string(),
        );

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.to_string(),
            "Exactly one outbound departure must be selected for this route."
        );
    }
}
