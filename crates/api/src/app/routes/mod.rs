use axum::Router;
use axum::routing::{get, post};

pub mod bookings;
pub mod common;
pub mod payments;
pub mod records;
pub mod reservations;
pub mod search;
pub mod system;

/// Router for all caller-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/records", records::router())
        .nest("/reservations", reservations::router())
        .route("/payments/callback", post(payments::callback))
        .route("/search/trips", get(search::trips))
        .route("/bookings/stay-and-ride", post(bookings::stay_and_ride))
}
