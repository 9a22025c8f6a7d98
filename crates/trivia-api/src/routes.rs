use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::middleware::require_session;
use crate::profile::MAX_AVATAR_BYTES;
use crate::state::AppState;
use crate::{auth, dashboard, friends, history, leaderboard, profile, search};

/// Every route of the service. Callers add transport layers (CORS, tracing).
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/avatars/{user_id}/{file}", get(profile::serve_avatar));

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/dashboard/answer", post(dashboard::answer))
        .route("/friends", get(friends::get_friends))
        .route("/friends/requests", post(friends::send))
        .route("/friends/requests/accept", post(friends::accept))
        .route("/friends/requests/reject", post(friends::reject))
        .route("/history", get(history::get_history))
        .route("/leaderboard", get(leaderboard::get_leaderboard))
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route(
            "/profile/avatar",
            put(profile::upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES)),
        )
        .route("/api/user-search", get(search::get_user_search))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
