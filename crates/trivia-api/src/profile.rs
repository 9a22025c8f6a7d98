use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use tracing::{debug, info, warn};

use trivia_db::{Store, WriteOutcome};
use trivia_types::api::{ActionResponse, AvatarQuery, ProfileResponse, UpdateProfileRequest};

use crate::error::{ApiError, StoreResultExt, blocking};
use crate::non_blank;
use crate::session::Session;
use crate::state::AppState;
use crate::storage::{self, AvatarStorage};

/// 5 MB upload limit for avatars
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// How long a signed avatar URL stays valid.
const AVATAR_URL_TTL_MINUTES: i64 = 10;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 32;

/// Trimmed username, or the reason it is unacceptable.
pub fn validate_username(raw: Option<&str>) -> Result<&str, ApiError> {
    let username = non_blank(raw).ok_or_else(|| ApiError::invalid("Username is required."))?;
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(ApiError::invalid(format!(
            "Username must be between {} and {} characters.",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
        )));
    }
    Ok(username)
}

pub fn change_username(
    store: &dyn Store,
    user_id: &str,
    raw: Option<&str>,
) -> Result<(), ApiError> {
    let username = validate_username(raw)?;

    match store.update_username(user_id, username).or_store("update username")? {
        WriteOutcome::Applied => Ok(()),
        WriteOutcome::Conflict => Err(ApiError::conflict("Username already taken.")),
        WriteOutcome::Missing => Err(ApiError::not_found("Profile not found.")),
    }
}

async fn profile_response(state: &AppState, user_id: String) -> Result<ProfileResponse, ApiError> {
    let store = state.store.clone();
    let profile = blocking(move || store.get_profile(&user_id).or_store("load profile"))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found."))?;

    let avatar_url = profile.avatar_path.as_deref().map(|path| {
        state.avatars.signed_url(
            path,
            chrono::Duration::minutes(AVATAR_URL_TTL_MINUTES),
            state.clock.now(),
        )
    });

    Ok(ProfileResponse {
        username: profile.username,
        avatar_url,
    })
}

// -- Handlers --

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = profile_response(&state, session.user_id.to_string()).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<Json<ActionResponse>, ApiError> {
    let store = state.store.clone();
    let user_id = session.user_id.to_string();

    blocking(move || change_username(store.as_ref(), &user_id, req.username.as_deref())).await?;
    Ok(Json(ActionResponse { success: true }))
}

/// PUT /profile/avatar: raw image bytes, the Content-Type header picks the
/// stored extension. Replaces any previous avatar.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    headers: HeaderMap,
    WithRejection(bytes, _): WithRejection<Bytes, ApiError>,
) -> Result<Json<ProfileResponse>, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::invalid("Avatar image is empty."));
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::invalid("Avatar must be at most 5 MB."));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let path = AvatarStorage::avatar_path(session.user_id, content_type)
        .ok_or_else(|| ApiError::invalid("Avatar must be a PNG, JPEG, GIF or WebP image."))?;

    let store = state.store.clone();
    let user_id = session.user_id.to_string();
    let previous = blocking(move || store.get_profile(&user_id).or_store("load profile"))
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found."))?
        .avatar_path;

    state
        .avatars
        .put(&path, &bytes)
        .await
        .map_err(|e| ApiError::store("write avatar", e))?;

    let store = state.store.clone();
    let user_id = session.user_id.to_string();
    let stored_path = path.clone();
    let outcome = blocking(move || {
        store
            .update_avatar_path(&user_id, &stored_path)
            .or_store("update avatar path")
    })
    .await?;
    if outcome != WriteOutcome::Applied {
        // Profile vanished after the check; nothing points at the new file
        discard_avatar(&state.avatars, &path).await;
        return Err(ApiError::not_found("Profile not found."));
    }

    if let Some(old) = previous.filter(|old| *old != path) {
        discard_avatar(&state.avatars, &old).await;
    }

    info!("User {} uploaded avatar {} ({} bytes)", session.user_id, path, bytes.len());

    let profile = profile_response(&state, session.user_id.to_string()).await?;
    Ok(Json(profile))
}

async fn discard_avatar(avatars: &AvatarStorage, path: &str) {
    if let Err(e) = avatars.remove(path).await {
        warn!("Failed to remove avatar {}: {:#}", path, e);
    }
}

const INVALID_LINK: &str = "Invalid or expired link.";

/// Rejection for avatar links whose query string does not even parse. Such a
/// link is refused the same way as one with a bad signature.
pub struct InvalidLink;

impl From<QueryRejection> for InvalidLink {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected avatar link query: {}", rejection.body_text());
        InvalidLink
    }
}

impl IntoResponse for InvalidLink {
    fn into_response(self) -> Response {
        ApiError::forbidden(INVALID_LINK).into_response()
    }
}

/// GET /avatars/{user_id}/{file}: public, but only with a valid signature.
pub async fn serve_avatar(
    State(state): State<AppState>,
    Path((owner, file)): Path<(String, String)>,
    WithRejection(Query(query), _): WithRejection<Query<AvatarQuery>, InvalidLink>,
) -> Result<impl IntoResponse, ApiError> {
    let path = format!("{}/{}", owner, file);

    if !state
        .avatars
        .verify(&path, query.expires, &query.sig, state.clock.now())
    {
        return Err(ApiError::forbidden(INVALID_LINK));
    }

    let bytes = state
        .avatars
        .get(&path)
        .await
        .map_err(|e| ApiError::store("read avatar", e))?
        .ok_or_else(|| ApiError::not_found("Avatar not found."))?;

    let content_type = storage::content_type_for(&path).unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
