use axum::{
    Extension, Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;

use trivia_db::Store;
use trivia_types::api::{UserSearchQuery, UserSearchResponse, UserSummary};

use crate::error::{ApiError, StoreResultExt, blocking};
use crate::session::Session;
use crate::state::AppState;

pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_RESULTS: u32 = 10;

/// People the caller could send a friend request to, matched on username or
/// email.
pub fn search_users(
    store: &dyn Store,
    user_id: &str,
    q: Option<&str>,
) -> Result<UserSearchResponse, ApiError> {
    let needle = q.map(str::trim).unwrap_or_default();
    if needle.chars().count() < MIN_QUERY_CHARS {
        return Ok(UserSearchResponse { users: vec![] });
    }

    let users = store
        .search_users(user_id, needle, MAX_RESULTS)
        .or_store("search users")?
        .into_iter()
        .map(|p| UserSummary {
            user_id: p.user_id,
            username: p.username,
            avatar_path: p.avatar_path,
        })
        .collect();

    Ok(UserSearchResponse { users })
}

pub async fn get_user_search(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Query(query), _): WithRejection<Query<UserSearchQuery>, ApiError>,
) -> Result<Json<UserSearchResponse>, ApiError> {
    let store = state.store.clone();
    let user_id = session.user_id.to_string();

    let found = blocking(move || search_users(store.as_ref(), &user_id, query.q.as_deref())).await?;
    Ok(Json(found))
}
