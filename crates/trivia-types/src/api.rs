use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FriendshipStatus, QuestionOption};

// -- JWT Claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Errors --

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub username: String,
}

// -- Dashboard --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsView {
    pub points: u32,
    pub current_streak: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub question: Option<QuestionView>,
    pub metrics: MetricsView,
    pub no_questions_left: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitAnswerRequest {
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub selected_option_id: Option<String>,
}

/// Feedback maps option id to the share of all answers that picked it.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub success: bool,
    pub feedback: BTreeMap<String, f64>,
}

// -- History --

/// Raw query parameters; values that do not parse fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub question_id: String,
    pub question_text: String,
    pub selected_option_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub answers: Vec<HistoryEntry>,
    pub pagination: Pagination,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequest {
    #[serde(default)]
    pub target_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendRequestAction {
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: String,
    pub username: String,
    pub avatar_path: Option<String>,
}

/// A friendship row seen from the caller's side: `user` is always the
/// other party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendEntry {
    pub id: String,
    pub status: FriendshipStatus,
    pub user: UserSummary,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendsResponse {
    pub accepted: Vec<FriendEntry>,
    pub pending_received: Vec<FriendEntry>,
    pub pending_sent: Vec<FriendEntry>,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendFriendResponse {
    pub success: bool,
    pub request_id: String,
}

// -- Leaderboard --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub avatar_path: Option<String>,
    pub points: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub global: Vec<LeaderboardEntry>,
    pub friends: Vec<LeaderboardEntry>,
    pub current_user_id: Uuid,
}

// -- Profile --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    pub expires: i64,
    pub sig: String,
}

// -- User search --

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSearchResponse {
    pub users: Vec<UserSummary>,
}
