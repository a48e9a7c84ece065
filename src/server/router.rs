//! Axum router construction.

use axum::routing::{get, post, put};
use axum::Router;

use crate::server::handlers;
use crate::server::state::SharedState;

/// Build the complete Axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health / registration
        .route("/api/health", get(handlers::health::health_handler))
        .route("/api/register", post(handlers::profiles::register_handler))
        // Profiles API
        .route(
            "/api/profile",
            get(handlers::profiles::get_own_profile_handler)
                .put(handlers::profiles::update_own_profile_handler),
        )
        .route(
            "/api/profiles/:identificator",
            get(handlers::profiles::get_public_profile_handler),
        )
        // Contacts API
        .route(
            "/api/contacts",
            get(handlers::contacts::list_contacts_handler),
        )
        .route(
            "/api/contacts/request",
            post(handlers::contacts::request_contact_handler),
        )
        .route(
            "/api/contacts/:id",
            get(handlers::contacts::get_contact_handler),
        )
        .route(
            "/api/contacts/:id/accept",
            post(handlers::contacts::accept_contact_handler),
        )
        .route(
            "/api/contacts/:id/reject",
            post(handlers::contacts::reject_contact_handler),
        )
        .route(
            "/api/contacts/:id/remove",
            post(handlers::contacts::remove_contact_handler),
        )
        .route(
            "/api/contacts/:id/acknowledge",
            post(handlers::contacts::acknowledge_contact_handler),
        )
        .route(
            "/api/contacts/:id/name",
            put(handlers::contacts::set_custom_name_handler),
        )
        .route(
            "/api/contacts/:id/trust",
            post(handlers::contacts::change_trust_handler),
        )
        .route(
            "/api/contacts/:id/actions/:action_id",
            post(handlers::contacts::mark_action_done_handler)
                .delete(handlers::contacts::undo_action_handler),
        )
        // Status catalog API
        .route(
            "/api/status",
            get(handlers::statuses::list_statuses_handler)
                .post(handlers::statuses::create_status_handler),
        )
        .route(
            "/api/status/:id",
            put(handlers::statuses::update_status_handler)
                .delete(handlers::statuses::delete_status_handler),
        )
        .route(
            "/api/status/:id/actions",
            post(handlers::statuses::create_action_handler),
        )
        .route(
            "/api/status/:id/actions/:action_id",
            put(handlers::statuses::update_action_handler)
                .delete(handlers::statuses::delete_action_handler),
        )
        // WebSocket
        .route("/api/ws", get(handlers::websocket::ws_handler))
        .with_state(state)
}
