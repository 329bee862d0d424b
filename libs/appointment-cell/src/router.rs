// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};
use crate::services::booking::BookingService;

pub fn appointment_routes(config: Arc<AppConfig>, service: Arc<BookingService>) -> Router {
    let state = AppointmentState { service };

    // All appointment operations require authentication
    Router::new()
        .route(
            "/",
            post(handlers::create_appointment).get(handlers::list_appointments),
        )
        .route("/slots/check", get(handlers::check_slot))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/refund", post(handlers::request_refund))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
