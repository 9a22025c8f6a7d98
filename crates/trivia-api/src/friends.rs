//! Friend requests: `pending` rows created by the requester (`user_id_1`),
//! accepted or deleted by the recipient (`user_id_2`).

use axum::{Extension, Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};
use uuid::Uuid;

use trivia_db::models::{FriendshipListing, FriendshipRow};
use trivia_db::{Store, WriteOutcome};
use trivia_types::api::{
    ActionResponse, FriendEntry, FriendRequestAction, FriendsResponse, SendFriendRequest,
    SendFriendResponse, UserSummary,
};
use trivia_types::models::FriendshipStatus;

use crate::error::{ApiError, StoreResultExt, blocking};
use crate::non_blank;
use crate::session::Session;
use crate::state::AppState;

/// Create a pending request from `requester` to `target_id`. Returns the new
/// request id.
pub fn send_request(
    store: &dyn Store,
    requester: &str,
    target_id: Option<&str>,
) -> Result<String, ApiError> {
    let target = non_blank(target_id)
        .and_then(|t| t.parse::<Uuid>().ok())
        .ok_or_else(|| ApiError::invalid("Invalid target user"))?
        .to_string();
    if target == requester {
        return Err(ApiError::invalid("You cannot send a friend request to yourself."));
    }

    if !store.user_exists(&target).or_store("look up target user")? {
        return Err(ApiError::not_found("User not found."));
    }

    if let Some(existing) = store
        .find_friendship_between(requester, &target)
        .or_store("check existing friendship")?
    {
        return Err(ApiError::conflict(match existing.status {
            FriendshipStatus::Accepted => "You are already friends.",
            FriendshipStatus::Pending => "A friend request already exists.",
        }));
    }

    let id = Uuid::new_v4().to_string();
    match store
        .insert_friend_request(&id, requester, &target)
        .or_store("insert friend request")?
    {
        WriteOutcome::Applied => {
            info!("Friend request {} sent: {} -> {}", id, requester, target);
            Ok(id)
        }
        // Lost a race with a concurrent request for the same pair
        WriteOutcome::Conflict => Err(ApiError::conflict("A friend request already exists.")),
        WriteOutcome::Missing => Err(ApiError::DataIntegrity(format!(
            "friend request insert {} wrote no row",
            id
        ))),
    }
}

pub fn accept_request(
    store: &dyn Store,
    actor: &str,
    request_id: Option<&str>,
) -> Result<(), ApiError> {
    let request = pending_for_recipient(store, actor, request_id, "accept")?;

    match store
        .accept_friend_request(&request.id)
        .or_store("accept friend request")?
    {
        WriteOutcome::Applied => {
            info!("Friend request {} accepted by {}", request.id, actor);
            Ok(())
        }
        _ => Err(changed_underneath(store, &request.id)?),
    }
}

pub fn reject_request(
    store: &dyn Store,
    actor: &str,
    request_id: Option<&str>,
) -> Result<(), ApiError> {
    let request = pending_for_recipient(store, actor, request_id, "reject")?;

    match store
        .delete_friend_request(&request.id)
        .or_store("reject friend request")?
    {
        WriteOutcome::Applied => {
            info!("Friend request {} rejected by {}", request.id, actor);
            Ok(())
        }
        _ => Err(changed_underneath(store, &request.id)?),
    }
}

/// Load a request and check that `actor` may act on it: it exists, `actor`
/// is the recipient and it is still pending.
fn pending_for_recipient(
    store: &dyn Store,
    actor: &str,
    request_id: Option<&str>,
    verb: &str,
) -> Result<FriendshipRow, ApiError> {
    let id = non_blank(request_id)
        .and_then(|id| id.parse::<Uuid>().ok())
        .ok_or_else(|| ApiError::invalid("Invalid request"))?
        .to_string();

    let request = store
        .get_friendship(&id)
        .or_store("load friend request")?
        .ok_or_else(|| ApiError::not_found("Friend request not found."))?;

    if request.user_id_2 != actor {
        warn!("User {} tried to {} friend request {} addressed to someone else", actor, verb, id);
        return Err(ApiError::forbidden(format!(
            "You are not authorized to {} this request.",
            verb
        )));
    }
    if request.status != FriendshipStatus::Pending {
        return Err(ApiError::InvalidState("Request is not pending.".into()));
    }

    Ok(request)
}

/// The conditional write matched nothing: report what happened to the row
/// since it was checked.
fn changed_underneath(store: &dyn Store, id: &str) -> Result<ApiError, ApiError> {
    Ok(match store.get_friendship(id).or_store("reload friend request")? {
        None => ApiError::not_found("Friend request not found."),
        Some(_) => ApiError::InvalidState("Request is not pending.".into()),
    })
}

/// Accepted friends, requests received and requests sent, each seen from
/// `user_id`'s side.
pub fn list_friends(store: &dyn Store, user_id: Uuid) -> Result<FriendsResponse, ApiError> {
    let uid = user_id.to_string();
    let listings = store.list_friendships(&uid).or_store("list friendships")?;

    let mut response = FriendsResponse {
        accepted: vec![],
        pending_received: vec![],
        pending_sent: vec![],
        user_id,
    };

    for listing in listings {
        let status = listing.friendship.status;
        let sent_by_me = listing.friendship.user_id_1 == uid;
        let entry = friend_entry(listing);
        match (status, sent_by_me) {
            (FriendshipStatus::Accepted, _) => response.accepted.push(entry),
            (FriendshipStatus::Pending, false) => response.pending_received.push(entry),
            (FriendshipStatus::Pending, true) => response.pending_sent.push(entry),
        }
    }

    Ok(response)
}

fn friend_entry(listing: FriendshipListing) -> FriendEntry {
    FriendEntry {
        id: listing.friendship.id,
        status: listing.friendship.status,
        user: UserSummary {
            user_id: listing.other_user_id,
            username: listing.other_username.unwrap_or_default(),
            avatar_path: listing.other_avatar_path,
        },
        created_at: listing.friendship.created_at,
    }
}

// -- Handlers --

pub async fn get_friends(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<FriendsResponse>, ApiError> {
    let store = state.store.clone();
    let friends = blocking(move || list_friends(store.as_ref(), session.user_id)).await?;
    Ok(Json(friends))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<SendFriendRequest>, ApiError>,
) -> Result<(StatusCode, Json<SendFriendResponse>), ApiError> {
    let store = state.store.clone();
    let requester = session.user_id.to_string();

    let request_id =
        blocking(move || send_request(store.as_ref(), &requester, req.target_id.as_deref())).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendFriendResponse {
            success: true,
            request_id,
        }),
    ))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<FriendRequestAction>, ApiError>,
) -> Result<Json<ActionResponse>, ApiError> {
    let store = state.store.clone();
    let actor = session.user_id.to_string();

    blocking(move || accept_request(store.as_ref(), &actor, req.request_id.as_deref())).await?;
    Ok(Json(ActionResponse { success: true }))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<FriendRequestAction>, ApiError>,
) -> Result<Json<ActionResponse>, ApiError> {
    let store = state.store.clone();
    let actor = session.user_id.to_string();

    blocking(move || reject_request(store.as_ref(), &actor, req.request_id.as_deref())).await?;
    Ok(Json(ActionResponse { success: true }))
}
