use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use trivia_types::api::Claims;

/// Cookie that carries the session token for browser clients.
pub const SESSION_COOKIE: &str = "trivia_session";

/// An authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
}

/// Authenticates requests and mints tokens for freshly logged-in users.
pub trait SessionService: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Session>;
    fn issue(&self, user_id: Uuid, username: &str) -> anyhow::Result<String>;
}

/// HS256 JWT sessions, read from the bearer header or the session cookie.
pub struct JwtSessions {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl JwtSessions {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: chrono::Duration::days(30),
        }
    }
}

impl SessionService for JwtSessions {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Session> {
        let token = token_from_headers(headers)?;

        let token_data = decode::<Claims>(&token, &self.decoding, &Validation::default())
            .map_err(|e| debug!("Rejected session token: {}", e))
            .ok()?;

        Some(Session {
            user_id: token_data.claims.sub,
            username: token_data.claims.username,
        })
    }

    fn issue(&self, user_id: Uuid, username: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(auth.token().to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}
