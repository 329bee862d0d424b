use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, BookingService};
use doctor_cell::doctor_routes;
use shared_config::AppConfig;
use shared_database::DocumentStore;

pub fn create_router(
    config: Arc<AppConfig>,
    store: Arc<dyn DocumentStore>,
    bookings: Arc<BookingService>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Hospital appointment API is running!" }))
        .nest("/appointments", appointment_routes(config.clone(), bookings))
        .nest("/doctors", doctor_routes(config, store))
}
