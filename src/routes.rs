use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/register", post(handlers::accounts::register))
        .route("/rooms/search", get(handlers::rooms::search))
        .route("/rooms/:id", get(handlers::rooms::detail))
        .route("/rooms/:id/reviews", get(handlers::rooms::reviews))
        .route("/bookings", post(handlers::bookings::create_booking))
        .route("/bookings/history", get(handlers::bookings::history))
        .route("/bookings/:id/cancel", get(handlers::bookings::cancel))
        .route("/payments/vnpay_return", get(handlers::payments::vnpay_return))
        .route("/payments/:id/vnpay", get(handlers::payments::vnpay_checkout))
        .route("/reviews", post(handlers::reviews::create))
        .route("/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/admin/bookings/edit/:id",
            get(handlers::admin::get_booking).post(handlers::admin::update_booking_status),
        )
        .route("/admin/bills", get(handlers::admin::get_bills))
        .route(
            "/admin/rooms",
            get(handlers::admin::get_rooms).post(handlers::admin::create_room),
        )
        .route(
            "/admin/rooms/:id",
            put(handlers::admin::update_room).delete(handlers::admin::delete_room),
        )
        .route("/admin/stats", get(handlers::admin::get_stats))
        .route("/admin/customers", get(handlers::admin::get_customers))
        .route(
            "/admin/staff",
            get(handlers::admin::get_staff_list).post(handlers::admin::create_staff),
        )
        .route(
            "/admin/staff/:id",
            get(handlers::admin::get_staff)
                .put(handlers::admin::update_staff)
                .delete(handlers::admin::delete_staff),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
