use axum::{
    Extension, Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;

use trivia_db::Store;
use trivia_types::api::{HistoryEntry, HistoryQuery, HistoryResponse, Pagination};

use crate::error::{ApiError, StoreResultExt, blocking};
use crate::session::Session;
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Positive integer from a query value; anything else means "use the
/// default".
fn positive_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Requested (page, page size) after defaults and the page-size cap.
pub fn page_params(query: &HistoryQuery) -> (u32, u32) {
    let page = positive_or(query.page.as_deref(), 1);
    let page_size = positive_or(query.page_size.as_deref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    (page, page_size)
}

pub fn paginate(page: u32, page_size: u32, total: u64) -> Pagination {
    let total_pages = total.div_ceil(page_size as u64);
    Pagination {
        page,
        page_size,
        total,
        total_pages,
        has_next: (page as u64) < total_pages,
        has_prev: page > 1,
    }
}

/// The user's answers, newest first, one page at a time.
pub fn load_history(
    store: &dyn Store,
    user_id: &str,
    query: &HistoryQuery,
) -> Result<HistoryResponse, ApiError> {
    let (page, page_size) = page_params(query);
    let offset = (page as u64 - 1) * page_size as u64;

    let history = store
        .answer_history(user_id, offset, page_size)
        .or_store("load answer history")?;

    let answers = history
        .rows
        .into_iter()
        .map(|row| HistoryEntry {
            id: row.id,
            question_id: row.question_id,
            question_text: row.question_text.unwrap_or_default(),
            selected_option_id: row.selected_option_id,
            created_at: row.created_at,
        })
        .collect();

    Ok(HistoryResponse {
        answers,
        pagination: paginate(page, page_size, history.total),
    })
}

pub async fn get_history(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Query(query), _): WithRejection<Query<HistoryQuery>, ApiError>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let store = state.store.clone();
    let user_id = session.user_id.to_string();

    let history = blocking(move || load_history(store.as_ref(), &user_id, &query)).await?;
    Ok(Json(history))
}
