//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{ACTOR_HEADER, admin, admission, reservations, stalls};
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health checks sit at the root; everything else is nested under `/api`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Stall map (read side, anonymous callers allowed)
        .route("/stalls", get(stalls::list_stalls))
        .route("/stalls/:id", get(stalls::get_stall))
        .route("/availability", get(stalls::get_availability))
        .route("/availability/halls", get(stalls::get_hall_summaries))
        // Vendor reservations
        .route("/reservations", post(reservations::create_reservation))
        .route("/reservations/mine", get(reservations::list_my_reservations))
        .route(
            "/reservations/mine/active",
            get(reservations::my_active_count),
        )
        .route("/reservations/reconcile", post(reservations::reconcile))
        .route("/reservations/:id", get(reservations::get_reservation))
        .route(
            "/reservations/:id/confirm",
            post(reservations::confirm_reservation),
        )
        .route(
            "/reservations/:id/cancel",
            post(reservations::cancel_reservation),
        )
        .route(
            "/reservations/:id/stalls/:stall_id",
            delete(reservations::release_stall),
        )
        // Gate
        .route("/admission/verify", post(admission::verify_admission))
        // Staff and administration
        .route("/admin/stalls", post(admin::add_stall))
        .route("/admin/stalls/:id/price", put(admin::update_stall_price))
        .route("/admin/stalls/:id/disabled", put(admin::set_stall_disabled))
        .route("/admin/reservations", get(admin::list_reservations))
        .route(
            "/admin/reservations/:id/payment",
            post(admin::collect_payment),
        )
        .route("/admin/vendors", post(admin::register_vendor))
        .route("/admin/vendors/:id", delete(admin::remove_vendor))
        .route("/admin/vendors/:id/active", get(admin::vendor_activity))
        .route("/admin/audit", get(admin::audit_log));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Browser clients call from another origin and send the actor header.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ACTOR_HEADER)])
}
