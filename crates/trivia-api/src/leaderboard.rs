use std::collections::BTreeSet;

use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use trivia_db::Store;
use trivia_db::models::LeaderboardRow;
use trivia_types::api::{LeaderboardEntry, LeaderboardResponse};

use crate::error::{ApiError, StoreResultExt, blocking};
use crate::session::Session;
use crate::state::AppState;

pub const GLOBAL_LEADERBOARD_LIMIT: u32 = 20;

/// Top players overall, and the caller ranked among their accepted friends.
pub fn load_leaderboard(store: &dyn Store, user_id: Uuid) -> Result<LeaderboardResponse, ApiError> {
    let uid = user_id.to_string();

    let global = store
        .top_by_points(GLOBAL_LEADERBOARD_LIMIT)
        .or_store("load global leaderboard")?;

    let mut circle: BTreeSet<String> = store
        .accepted_friend_ids(&uid)
        .or_store("load friend ids")?
        .into_iter()
        .collect();
    circle.insert(uid);
    let circle: Vec<String> = circle.into_iter().collect();

    let friends = store.rank_users(&circle).or_store("load friends leaderboard")?;

    Ok(LeaderboardResponse {
        global: global.into_iter().map(entry).collect(),
        friends: friends.into_iter().map(entry).collect(),
        current_user_id: user_id,
    })
}

fn entry(row: LeaderboardRow) -> LeaderboardEntry {
    LeaderboardEntry {
        user_id: row.user_id,
        username: row.username.unwrap_or_default(),
        avatar_path: row.avatar_path,
        points: row.points,
    }
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let store = state.store.clone();
    let board = blocking(move || load_leaderboard(store.as_ref(), session.user_id)).await?;
    Ok(Json(board))
}
