//! Reservation backend integration
//!
//! This crate wraps the GET IN v2 reservation API used by the assistant:
//! - **Venues** (`/units`) - list units by name, coordinates, or distance
//! - **Availability** (`/schedules/units`) - schedule and sector lookup, globally or per unit
//! - **Reservations** (`/reservations`) - create, delete, list, and "next" lookups
//!
//! The agent depends only on the [`BookingApi`] trait; [`GetInClient`] is the
//! HTTP implementation and tests substitute in-memory fakes.

pub mod client;
pub mod error;
pub mod models;

pub use client::{BookingApi, GetInClient};
pub use error::BookingError;
pub use models::{
    AvailabilityQuery, ReservationFilters, ReservationPage, ReservationPayload, Unit, UnitPage,
    UnitQuery,
};
