use anyhow::Result;

use crate::models::{
    FriendshipListing, FriendshipRow, HistoryPage, LeaderboardRow, MetricsRow, NewAccount,
    NewAnswer, ProfileRow, QuestionRow, UserRow,
};
use trivia_types::models::NewQuestion;

/// Result of a single-statement write whose failure modes callers must tell
/// apart from an outright store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// A uniqueness constraint rejected the write.
    Conflict,
    /// No row matched the statement's filter.
    Missing,
}

/// The relational data service the request handlers talk to.
///
/// Every method is one statement (account creation is the single exception
/// and runs in one transaction). Implementations report uniqueness
/// violations through `WriteOutcome::Conflict`; every other failure is an
/// `Err`.
pub trait Store: Send + Sync {
    // -- Accounts --

    fn create_account(&self, account: &NewAccount<'_>) -> Result<WriteOutcome>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>>;
    fn user_exists(&self, user_id: &str) -> Result<bool>;

    // -- Profiles --

    fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>>;
    fn username_taken(&self, username: &str) -> Result<bool>;
    fn update_username(&self, user_id: &str, username: &str) -> Result<WriteOutcome>;
    fn update_avatar_path(&self, user_id: &str, avatar_path: &str) -> Result<WriteOutcome>;

    // -- Questions --

    fn insert_questions(&self, questions: &[NewQuestion]) -> Result<usize>;
    fn get_question(&self, question_id: &str) -> Result<Option<QuestionRow>>;
    /// Any one question the user has not answered yet, in random order.
    fn pick_unanswered_question(&self, user_id: &str) -> Result<Option<QuestionRow>>;

    // -- Answers & metrics --

    fn insert_answer(&self, answer: &NewAnswer<'_>) -> Result<WriteOutcome>;
    fn get_metrics(&self, user_id: &str) -> Result<Option<MetricsRow>>;
    fn update_metrics(&self, metrics: &MetricsRow) -> Result<WriteOutcome>;
    /// Per-option answer counts for one question.
    fn answer_counts(&self, question_id: &str) -> Result<Vec<(String, u64)>>;
    fn answer_history(&self, user_id: &str, offset: u64, limit: u32) -> Result<HistoryPage>;

    // -- Friendships --

    /// The row for the unordered pair, in either direction.
    fn find_friendship_between(&self, a: &str, b: &str) -> Result<Option<FriendshipRow>>;
    fn get_friendship(&self, id: &str) -> Result<Option<FriendshipRow>>;
    fn insert_friend_request(&self, id: &str, requester: &str, target: &str) -> Result<WriteOutcome>;
    /// Flips a pending row to accepted; `Missing` if the row is gone or no
    /// longer pending.
    fn accept_friend_request(&self, id: &str) -> Result<WriteOutcome>;
    /// Deletes a pending row; `Missing` if the row is gone or no longer
    /// pending.
    fn delete_friend_request(&self, id: &str) -> Result<WriteOutcome>;
    fn list_friendships(&self, user_id: &str) -> Result<Vec<FriendshipListing>>;
    fn accepted_friend_ids(&self, user_id: &str) -> Result<Vec<String>>;

    // -- Leaderboard & search --

    fn top_by_points(&self, limit: u32) -> Result<Vec<LeaderboardRow>>;
    fn rank_users(&self, user_ids: &[String]) -> Result<Vec<LeaderboardRow>>;
    /// Profiles whose username or email contains `needle`, excluding the
    /// caller and anyone with a pending or accepted friendship with them.
    fn search_users(&self, user_id: &str, needle: &str, limit: u32) -> Result<Vec<ProfileRow>>;
}
