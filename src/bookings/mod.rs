//! Ticket sales through external ticketing systems.

pub mod availability;
pub mod booking;
pub mod errors;
pub mod responses;
pub mod ticket_request;
pub mod ticketing_system;

pub use availability::{DepartureAvailability, departure_availability};
pub use booking::{book, confirm_booking, create_reservation, find_booking, retrieve_tickets};
pub use errors::{BookingError, TicketingSystemError, TicketingSystemNotBehavingError, TicketingSystemRequestError};
pub use responses::{BookingStatus, PassthroughParameters};
pub use ticket_request::{CapacitySales, TicketRequest};
pub use ticketing_system::{TicketingClient, TicketingSystemApi, build_http_client};
