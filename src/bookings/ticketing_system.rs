use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::errors::{TicketingSystemError, TicketingSystemNotBehavingError};
use super::responses::{
    AvailabilityRequest, AvailabilityRow, Confirmation, DepartureKey, Operation,
    PassthroughParameters, Reservation, ReservationRequest, SuccessBody, classify_response,
};
use crate::models::{MaasOperator, TicketingSystem};

/// The four calls a ticketing system answers. Implemented over HTTP by
/// [`TicketingSystemApi`] and by fakes in tests.
pub trait TicketingClient {
    fn reserve(
        &self,
        request: &ReservationRequest,
    ) -> impl Future<Output = Result<Reservation, TicketingSystemError>> + Send;

    fn confirm(
        &self,
        identifier: &str,
        params: &PassthroughParameters,
    ) -> impl Future<Output = Result<Confirmation, TicketingSystemError>> + Send;

    fn retrieve(
        &self,
        identifier: &str,
        params: &PassthroughParameters,
    ) -> impl Future<Output = Result<Confirmation, TicketingSystemError>> + Send;

    fn availability(
        &self,
        departures: &[DepartureKey],
    ) -> impl Future<Output = Result<Vec<AvailabilityRow>, TicketingSystemError>> + Send;
}

/// Every request body carries the operator identifier next to the
/// operation's own fields.
#[derive(Serialize)]
struct OperatorPayload<'a, T: Serialize> {
    maas_operator_id: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(timeout)
        .gzip(true)
        .build()
}

#[derive(Debug, Clone)]
pub struct TicketingSystemApi {
    client: reqwest::Client,
    ticketing_system: TicketingSystem,
    maas_operator_id: String,
}

impl TicketingSystemApi {
    pub fn new(
        client: reqwest::Client,
        ticketing_system: TicketingSystem,
        maas_operator: &MaasOperator,
    ) -> Self {
        TicketingSystemApi {
            client,
            ticketing_system,
            maas_operator_id: maas_operator.identifier.clone(),
        }
    }

    fn not_behaving(&self, reason: String) -> TicketingSystemError {
        TicketingSystemError::NotBehaving(TicketingSystemNotBehavingError::new(
            format!("{}: {}", self.ticketing_system.name, reason),
            None,
            "",
        ))
    }

    fn api_key(&self) -> Result<&str, TicketingSystemError> {
        self.ticketing_system
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| self.not_behaving("missing API key".to_string()))
    }

    fn parse_url(&self, url: &str) -> Result<Url, TicketingSystemError> {
        Url::parse(url).map_err(|err| self.not_behaving(format!("invalid URL {}: {}", url, err)))
    }

    /// `{bookings_api_url}/{identifier}/` plus any extra segments, with a
    /// trailing slash. The identifier is percent-encoded as one segment.
    pub fn booking_url(&self, identifier: &str, extra: Option<&str>) -> Result<Url, TicketingSystemError> {
        let mut url = self.parse_url(&self.ticketing_system.bookings_api_url)?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| self.not_behaving("bookings URL cannot be a base".to_string()))?;
            segments.pop_if_empty().push(identifier);
            if let Some(extra) = extra {
                segments.push(extra);
            }
            segments.push("");
        }

        Ok(url)
    }

    fn post<T: Serialize>(&self, url: Url, body: &T) -> Result<reqwest::Request, TicketingSystemError> {
        let payload = OperatorPayload {
            maas_operator_id: &self.maas_operator_id,
            body,
        };

        self.client
            .post(url)
            .bearer_auth(self.api_key()?)
            .json(&payload)
            .build()
            .map_err(|err| self.not_behaving(format!("could not build request: {}", err)))
    }

    pub fn reserve_request(&self, request: &ReservationRequest) -> Result<reqwest::Request, TicketingSystemError> {
        let url = self.parse_url(&self.ticketing_system.bookings_api_url)?;
        self.post(url, request)
    }

    pub fn confirm_request(
        &self,
        identifier: &str,
        params: &PassthroughParameters,
    ) -> Result<reqwest::Request, TicketingSystemError> {
        let url = self.booking_url(identifier, Some("confirm"))?;
        self.post(url, params)
    }

    pub fn retrieve_request(
        &self,
        identifier: &str,
        params: &PassthroughParameters,
    ) -> Result<reqwest::Request, TicketingSystemError> {
        let url = self.booking_url(identifier, None)?;

        self.client
            .get(url)
            .bearer_auth(self.api_key()?)
            .query(&OperatorPayload {
                maas_operator_id: &self.maas_operator_id,
                body: params,
            })
            .build()
            .map_err(|err| self.not_behaving(format!("could not build request: {}", err)))
    }

    pub fn availability_request(&self, departures: &[DepartureKey]) -> Result<reqwest::Request, TicketingSystemError> {
        let url = self.parse_url(&self.ticketing_system.availability_api_url)?;
        self.post(url, &AvailabilityRequest { departures })
    }

    async fn send<T: SuccessBody>(
        &self,
        operation: Operation,
        request: reqwest::Request,
    ) -> Result<T, TicketingSystemError> {
        debug!(
            "{} {} {} on {}",
            operation.name(),
            request.method(),
            request.url(),
            self.ticketing_system.name
        );

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|err| self.not_behaving(format!("{} request failed: {}", operation.name(), err)))?;

        let status = response.status();

        let body = response.text().await.map_err(|err| {
            TicketingSystemError::NotBehaving(TicketingSystemNotBehavingError::new(
                format!("{}: could not read response body: {}", operation.name(), err),
                Some(status),
                "",
            ))
        })?;

        let result = classify_response(operation, status, &body);

        match &result {
            Err(TicketingSystemError::Request(err)) => {
                info!("{} on {}: {}", operation.name(), self.ticketing_system.name, err)
            }
            Err(TicketingSystemError::NotBehaving(err)) => {
                error!("{} on {}: {}", operation.name(), self.ticketing_system.name, err)
            }
            Ok(_) => {}
        }

        result
    }

    fn logged<T>(&self, result: Result<T, TicketingSystemError>) -> Result<T, TicketingSystemError> {
        if let Err(TicketingSystemError::NotBehaving(err)) = &result {
            error!("{}", err);
        }
        result
    }
}

impl TicketingClient for TicketingSystemApi {
    async fn reserve(&self, request: &ReservationRequest) -> Result<Reservation, TicketingSystemError> {
        let request = self.logged(self.reserve_request(request))?;
        self.send(Operation::Reserve, request).await
    }

    async fn confirm(
        &self,
        identifier: &str,
        params: &PassthroughParameters,
    ) -> Result<Confirmation, TicketingSystemError> {
        let request = self.logged(self.confirm_request(identifier, params))?;
        self.send(Operation::Confirm, request).await
    }

    async fn retrieve(
        &self,
        identifier: &str,
        params: &PassthroughParameters,
    ) -> Result<Confirmation, TicketingSystemError> {
        let request = self.logged(self.retrieve_request(identifier, params))?;
        self.send(Operation::Retrieve, request).await
    }

    async fn availability(&self, departures: &[DepartureKey]) -> Result<Vec<AvailabilityRow>, TicketingSystemError> {
        let request = self.logged(self.availability_request(departures))?;
        self.send(Operation::Availability, request).await
    }
}
