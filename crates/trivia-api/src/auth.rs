use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};
use uuid::Uuid;

use trivia_db::models::NewAccount;
use trivia_db::{Store, WriteOutcome};
use trivia_types::api::{
    ActionResponse, LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse,
};

use crate::error::{ApiError, StoreResultExt, blocking};
use crate::non_blank;
use crate::profile::validate_username;
use crate::session::{SESSION_COOKIE, Session, SessionService};
use crate::state::AppState;

pub const PASSWORD_MIN_CHARS: usize = 8;

const EMAIL_TAKEN: &str = "A user with this email already exists.";
const USERNAME_TAKEN: &str = "Username already taken.";

/// Validate, hash and store a new account together with its profile and
/// zeroed metrics, then mint a session token for it.
pub fn register_account(
    store: &dyn Store,
    sessions: &dyn SessionService,
    req: &RegisterRequest,
) -> Result<RegisterResponse, ApiError> {
    let email = non_blank(req.email.as_deref());
    let password = req.password.as_deref().filter(|p| !p.is_empty());
    let username = non_blank(req.username.as_deref());
    let (Some(email), Some(password), Some(_)) = (email, password, username) else {
        return Err(ApiError::invalid("All fields are required."));
    };

    if !email.contains('@') {
        return Err(ApiError::invalid("Invalid email address."));
    }
    let username = validate_username(username)?;
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ApiError::invalid(format!(
            "Password must be at least {} characters.",
            PASSWORD_MIN_CHARS
        )));
    }

    if store.get_user_by_email(email).or_store("look up email")?.is_some() {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }
    if store.username_taken(username).or_store("look up username")? {
        return Err(ApiError::conflict(USERNAME_TAKEN));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::store("hash password", anyhow::anyhow!("{}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();
    let id = user_id.to_string();
    let account = NewAccount {
        id: &id,
        email,
        password_hash: &password_hash,
        username,
    };
    match store.create_account(&account).or_store("create account")? {
        WriteOutcome::Applied => {}
        // Someone registered the same email or username in between
        _ => return Err(registration_conflict(store, email)?),
    }

    let token = sessions
        .issue(user_id, username)
        .map_err(|e| ApiError::store("issue token", e))?;

    info!("Registered user {} ({})", username, user_id);
    Ok(RegisterResponse { user_id, token })
}

/// Which uniqueness rule a registration that lost a race ran into. The
/// insert is all-or-nothing, so if the email is free now the username was
/// the clash.
fn registration_conflict(store: &dyn Store, email: &str) -> Result<ApiError, ApiError> {
    let email_taken = store
        .get_user_by_email(email)
        .or_store("recheck email")?
        .is_some();
    Ok(ApiError::conflict(if email_taken { EMAIL_TAKEN } else { USERNAME_TAKEN }))
}

pub fn login_account(
    store: &dyn Store,
    sessions: &dyn SessionService,
    req: &LoginRequest,
) -> Result<LoginResponse, ApiError> {
    let (Some(email), Some(password)) = (
        non_blank(req.email.as_deref()),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::invalid("Email and password are required."));
    };

    let user = store
        .get_user_by_email(email)
        .or_store("look up email")?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        ApiError::DataIntegrity(format!("unparseable password hash for {}: {}", user.id, e))
    })?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            warn!("Failed login for user {}", user.id);
            ApiError::InvalidCredentials
        })?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::DataIntegrity(format!("corrupt user id '{}': {}", user.id, e)))?;
    let profile = store
        .get_profile(&user.id)
        .or_store("load profile")?
        .ok_or_else(|| ApiError::DataIntegrity(format!("no profile row for user {}", user.id)))?;

    let token = sessions
        .issue(user_id, &profile.username)
        .map_err(|e| ApiError::store("issue token", e))?;

    Ok(LoginResponse {
        user_id,
        username: profile.username,
        token,
    })
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let store = state.store.clone();
    let sessions = state.sessions.clone();

    let registered =
        blocking(move || register_account(store.as_ref(), sessions.as_ref(), &req)).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let store = state.store.clone();
    let sessions = state.sessions.clone();

    let login = blocking(move || login_account(store.as_ref(), sessions.as_ref(), &req)).await?;
    let jar = jar.add(session_cookie(login.token.clone()));
    Ok((jar, Json(login)))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<ActionResponse>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(ActionResponse { success: true }))
}

/// Who the session belongs to, with the username as currently stored.
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<MeResponse>, ApiError> {
    let store = state.store.clone();
    let user_id = session.user_id.to_string();
    let profile = blocking(move || store.get_profile(&user_id).or_store("load profile")).await?;

    Ok(Json(MeResponse {
        user_id: session.user_id,
        username: profile.map(|p| p.username).unwrap_or(session.username),
    }))
}
