use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Session guard for every protected route: rejects anonymous requests and
/// hands the `Session` to handlers as a request extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = state
        .sessions
        .authenticate(req.headers())
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
