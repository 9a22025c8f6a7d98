use axum::{Extension, Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use trivia_db::models::{MetricsRow, NewAnswer};
use trivia_db::{Store, WriteOutcome};
use trivia_types::api::{
    DashboardResponse, MetricsView, QuestionView, SubmitAnswerRequest, SubmitAnswerResponse,
};

use crate::clock::Clock;
use crate::error::{ApiError, StoreResultExt, blocking};
use crate::non_blank;
use crate::scoring::{self, Standing};
use crate::session::Session;
use crate::state::AppState;

/// One unanswered question (if any are left) plus the user's score.
pub fn load_dashboard(store: &dyn Store, user_id: &str) -> Result<DashboardResponse, ApiError> {
    let question = store
        .pick_unanswered_question(user_id)
        .or_store("pick unanswered question")?
        .map(|q| QuestionView {
            id: q.id,
            text: q.text,
            options: q.options,
        });

    let metrics = load_metrics(store, user_id)?;

    Ok(DashboardResponse {
        no_questions_left: question.is_none(),
        question,
        metrics: MetricsView {
            points: metrics.points,
            current_streak: metrics.current_streak,
        },
    })
}

/// Record an answer, move the streak/points forward and report how everyone
/// else answered.
pub fn submit_answer(
    store: &dyn Store,
    clock: &dyn Clock,
    user_id: &str,
    req: &SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ApiError> {
    let (Some(question_id), Some(option_id)) = (
        non_blank(req.question_id.as_deref()),
        non_blank(req.selected_option_id.as_deref()),
    ) else {
        return Err(ApiError::invalid("Missing question or option."));
    };

    let question = store
        .get_question(question_id)
        .or_store("load question")?
        .ok_or_else(|| ApiError::not_found("Question not found."))?;
    if !question.options.iter().any(|o| o.id == option_id) {
        return Err(ApiError::invalid("That option does not belong to this question."));
    }

    let answer_id = Uuid::new_v4().to_string();
    let answer = NewAnswer {
        id: &answer_id,
        user_id,
        question_id,
        selected_option_id: option_id,
    };
    match store.insert_answer(&answer).or_store("insert answer")? {
        WriteOutcome::Applied => {}
        WriteOutcome::Conflict => {
            return Err(ApiError::conflict("You have already answered this question."));
        }
        WriteOutcome::Missing => {
            return Err(ApiError::DataIntegrity(format!(
                "answer insert for user {} wrote no row",
                user_id
            )));
        }
    }

    let metrics = load_metrics(store, user_id)?;
    let next = scoring::advance(Standing::from(&metrics), clock.today());
    let updated = MetricsRow {
        user_id: metrics.user_id,
        points: next.points,
        current_streak: next.current_streak,
        last_answered_date: next.last_answered_date,
    };
    if store.update_metrics(&updated).or_store("update metrics")? != WriteOutcome::Applied {
        return Err(ApiError::DataIntegrity(format!(
            "metrics row for user {} vanished during update",
            user_id
        )));
    }

    let counts = store.answer_counts(question_id).or_store("count answers")?;

    info!(
        "User {} answered {} (points={}, streak={})",
        user_id, question_id, updated.points, updated.current_streak
    );

    Ok(SubmitAnswerResponse {
        success: true,
        feedback: scoring::feedback_fractions(&counts),
    })
}

fn load_metrics(store: &dyn Store, user_id: &str) -> Result<MetricsRow, ApiError> {
    store
        .get_metrics(user_id)
        .or_store("load metrics")?
        .ok_or_else(|| ApiError::DataIntegrity(format!("no metrics row for user {}", user_id)))
}

// -- Handlers --

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let store = state.store.clone();
    let user_id = session.user_id.to_string();

    let dashboard = blocking(move || load_dashboard(store.as_ref(), &user_id)).await?;
    Ok(Json(dashboard))
}

pub async fn answer(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    WithRejection(Json(req), _): WithRejection<Json<SubmitAnswerRequest>, ApiError>,
) -> Result<Json<SubmitAnswerResponse>, ApiError> {
    let store = state.store.clone();
    let clock = state.clock.clone();
    let user_id = session.user_id.to_string();

    let outcome =
        blocking(move || submit_answer(store.as_ref(), clock.as_ref(), &user_id, &req)).await?;
    Ok(Json(outcome))
}
