pub mod auth;
pub mod clock;
pub mod dashboard;
pub mod error;
pub mod friends;
pub mod history;
pub mod leaderboard;
pub mod middleware;
pub mod profile;
pub mod routes;
pub mod scoring;
pub mod search;
pub mod session;
pub mod state;
pub mod storage;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};

/// Trimmed value of an optional form field, `None` if absent or blank.
pub(crate) fn non_blank(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|v| !v.is_empty())
}
