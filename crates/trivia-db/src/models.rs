//! Database row types. These map directly to SQLite rows and stay distinct
//! from the trivia-types wire models to keep the DB layer independent.

use chrono::NaiveDate;
use trivia_types::models::{FriendshipStatus, QuestionOption};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

/// Everything written when an account is registered.
pub struct NewAccount<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub username: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub avatar_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsRow {
    pub user_id: String,
    pub points: u32,
    pub current_streak: u32,
    pub last_answered_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

pub struct NewAnswer<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub question_id: &'a str,
    pub selected_option_id: &'a str,
}

pub struct AnswerHistoryRow {
    pub id: String,
    pub question_id: String,
    /// `None` when the question row no longer resolves.
    pub question_text: Option<String>,
    pub selected_option_id: String,
    pub created_at: String,
}

pub struct HistoryPage {
    pub rows: Vec<AnswerHistoryRow>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendshipRow {
    pub id: String,
    pub user_id_1: String,
    pub user_id_2: String,
    pub status: FriendshipStatus,
    pub created_at: String,
}

/// A friendship joined with the profile of the side that is not the viewer.
pub struct FriendshipListing {
    pub friendship: FriendshipRow,
    pub other_user_id: String,
    pub other_username: Option<String>,
    pub other_avatar_path: Option<String>,
}

/// Metrics joined with profile; profile columns are `None` when the join
/// does not resolve.
pub struct LeaderboardRow {
    pub user_id: String,
    pub username: Option<String>,
    pub avatar_path: Option<String>,
    pub points: u32,
}
