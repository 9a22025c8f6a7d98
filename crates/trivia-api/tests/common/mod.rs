#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use trivia_api::clock::Clock;
use trivia_api::session::JwtSessions;
use trivia_api::storage::AvatarStorage;
use trivia_api::{AppState, AppStateInner};
use trivia_db::models::{
    FriendshipListing, FriendshipRow, HistoryPage, LeaderboardRow, MetricsRow, NewAccount,
    NewAnswer, ProfileRow, QuestionRow, UserRow,
};
use trivia_db::{Database, Store, WriteOutcome};
use trivia_types::models::{NewQuestion, QuestionOption};

pub const SECRET: &str = "integration-test-secret";

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A clock that only moves when told to.
pub struct FixedClock {
    timestamp: AtomicI64,
}

impl FixedClock {
    /// Midnight UTC of `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self {
            timestamp: AtomicI64::new(midnight(date)),
        }
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.timestamp.store(midnight(date), Ordering::SeqCst);
    }
}

fn midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp.load(Ordering::SeqCst), 0).unwrap()
    }
}

pub fn db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().unwrap())
}

/// Create an account straight through the store (no password hashing) and
/// return its id.
pub fn user(db: &Database, username: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let email = format!("{}@example.com", username);
    let outcome = db
        .create_account(&NewAccount {
            id: &id,
            email: &email,
            password_hash: "not-a-real-hash",
            username,
        })
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Applied);
    id
}

pub fn set_metrics(db: &Database, user_id: &str, points: u32, streak: u32, last: Option<NaiveDate>) {
    db.update_metrics(&MetricsRow {
        user_id: user_id.to_string(),
        points,
        current_streak: streak,
        last_answered_date: last,
    })
    .unwrap();
}

/// Questions `ids`, each with options `a`, `b` and `c`.
pub fn seed_questions(db: &Database, ids: &[&str]) {
    let questions: Vec<NewQuestion> = ids
        .iter()
        .map(|id| NewQuestion {
            id: id.to_string(),
            text: format!("Question {}", id),
            options: ["a", "b", "c"]
                .iter()
                .map(|o| QuestionOption {
                    id: o.to_string(),
                    label: o.to_uppercase(),
                })
                .collect(),
        })
        .collect();
    db.insert_questions(&questions).unwrap();
}

pub struct TestApp {
    pub state: AppState,
    pub db: Arc<Database>,
    pub clock: Arc<FixedClock>,
    pub sessions: Arc<JwtSessions>,
    _avatar_dir: tempfile::TempDir,
}

pub async fn app_with_store(store: Arc<dyn Store>, db: Arc<Database>) -> TestApp {
    let avatar_dir = tempfile::tempdir().unwrap();
    let avatars = AvatarStorage::new(avatar_dir.path().to_path_buf(), SECRET)
        .await
        .unwrap();
    let clock = Arc::new(FixedClock::on(day(2024, 1, 1)));
    let sessions = Arc::new(JwtSessions::new(SECRET));

    let state: AppState = Arc::new(AppStateInner {
        store,
        sessions: sessions.clone(),
        clock: clock.clone(),
        avatars,
    });

    TestApp {
        state,
        db,
        clock,
        sessions,
        _avatar_dir: avatar_dir,
    }
}

pub async fn app() -> TestApp {
    let db = db();
    app_with_store(db.clone(), db).await
}

/// A data service that is down. Every call fails with a detail that must
/// never reach a client.
pub struct BrokenStore;

pub const BROKEN_DETAIL: &str = "connection refused by 10.0.0.5:5432";

fn down<T>() -> Result<T> {
    Err(anyhow!(BROKEN_DETAIL))
}

impl Store for BrokenStore {
    fn create_account(&self, _: &NewAccount<'_>) -> Result<WriteOutcome> { down() }
    fn get_user_by_email(&self, _: &str) -> Result<Option<UserRow>> { down() }
    fn user_exists(&self, _: &str) -> Result<bool> { down() }
    fn get_profile(&self, _: &str) -> Result<Option<ProfileRow>> { down() }
    fn username_taken(&self, _: &str) -> Result<bool> { down() }
    fn update_username(&self, _: &str, _: &str) -> Result<WriteOutcome> { down() }
    fn update_avatar_path(&self, _: &str, _: &str) -> Result<WriteOutcome> { down() }
    fn insert_questions(&self, _: &[NewQuestion]) -> Result<usize> { down() }
    fn get_question(&self, _: &str) -> Result<Option<QuestionRow>> { down() }
    fn pick_unanswered_question(&self, _: &str) -> Result<Option<QuestionRow>> { down() }
    fn insert_answer(&self, _: &NewAnswer<'_>) -> Result<WriteOutcome> { down() }
    fn get_metrics(&self, _: &str) -> Result<Option<MetricsRow>> { down() }
    fn update_metrics(&self, _: &MetricsRow) -> Result<WriteOutcome> { down() }
    fn answer_counts(&self, _: &str) -> Result<Vec<(String, u64)>> { down() }
    fn answer_history(&self, _: &str, _: u64, _: u32) -> Result<HistoryPage> { down() }
    fn find_friendship_between(&self, _: &str, _: &str) -> Result<Option<FriendshipRow>> { down() }
    fn get_friendship(&self, _: &str) -> Result<Option<FriendshipRow>> { down() }
    fn insert_friend_request(&self, _: &str, _: &str, _: &str) -> Result<WriteOutcome> { down() }
    fn accept_friend_request(&self, _: &str) -> Result<WriteOutcome> { down() }
    fn delete_friend_request(&self, _: &str) -> Result<WriteOutcome> { down() }
    fn list_friendships(&self, _: &str) -> Result<Vec<FriendshipListing>> { down() }
    fn accepted_friend_ids(&self, _: &str) -> Result<Vec<String>> { down() }
    fn top_by_points(&self, _: u32) -> Result<Vec<LeaderboardRow>> { down() }
    fn rank_users(&self, _: &[String]) -> Result<Vec<LeaderboardRow>> { down() }
    fn search_users(&self, _: &str, _: &str, _: u32) -> Result<Vec<ProfileRow>> { down() }
}

/// The real database, except that the first `blind_lookups` existence checks
/// (friendship pair, email, username) see nothing. Reproduces a request that
/// loses a race to a concurrent one between its check and its insert.
pub struct RacingStore {
    pub inner: Arc<Database>,
    blind_lookups: AtomicUsize,
}

impl RacingStore {
    pub fn new(inner: Arc<Database>, blind_lookups: usize) -> Self {
        Self {
            inner,
            blind_lookups: AtomicUsize::new(blind_lookups),
        }
    }

    fn blind(&self) -> bool {
        self.blind_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Store for RacingStore {
    fn create_account(&self, a: &NewAccount<'_>) -> Result<WriteOutcome> { self.inner.create_account(a) }
    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        if self.blind() { return Ok(None); }
        self.inner.get_user_by_email(email)
    }
    fn user_exists(&self, id: &str) -> Result<bool> { self.inner.user_exists(id) }
    fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> { self.inner.get_profile(id) }
    fn username_taken(&self, username: &str) -> Result<bool> {
        if self.blind() { return Ok(false); }
        self.inner.username_taken(username)
    }
    fn update_username(&self, id: &str, u: &str) -> Result<WriteOutcome> { self.inner.update_username(id, u) }
    fn update_avatar_path(&self, id: &str, p: &str) -> Result<WriteOutcome> { self.inner.update_avatar_path(id, p) }
    fn insert_questions(&self, q: &[NewQuestion]) -> Result<usize> { self.inner.insert_questions(q) }
    fn get_question(&self, id: &str) -> Result<Option<QuestionRow>> { self.inner.get_question(id) }
    fn pick_unanswered_question(&self, id: &str) -> Result<Option<QuestionRow>> { self.inner.pick_unanswered_question(id) }
    fn insert_answer(&self, a: &NewAnswer<'_>) -> Result<WriteOutcome> { self.inner.insert_answer(a) }
    fn get_metrics(&self, id: &str) -> Result<Option<MetricsRow>> { self.inner.get_metrics(id) }
    fn update_metrics(&self, m: &MetricsRow) -> Result<WriteOutcome> { self.inner.update_metrics(m) }
    fn answer_counts(&self, id: &str) -> Result<Vec<(String, u64)>> { self.inner.answer_counts(id) }
    fn answer_history(&self, id: &str, offset: u64, limit: u32) -> Result<HistoryPage> { self.inner.answer_history(id, offset, limit) }
    fn find_friendship_between(&self, a: &str, b: &str) -> Result<Option<FriendshipRow>> {
        if self.blind() { return Ok(None); }
        self.inner.find_friendship_between(a, b)
    }
    fn get_friendship(&self, id: &str) -> Result<Option<FriendshipRow>> { self.inner.get_friendship(id) }
    fn insert_friend_request(&self, id: &str, r: &str, t: &str) -> Result<WriteOutcome> { self.inner.insert_friend_request(id, r, t) }
    fn accept_friend_request(&self, id: &str) -> Result<WriteOutcome> { self.inner.accept_friend_request(id) }
    fn delete_friend_request(&self, id: &str) -> Result<WriteOutcome> { self.inner.delete_friend_request(id) }
    fn list_friendships(&self, id: &str) -> Result<Vec<FriendshipListing>> { self.inner.list_friendships(id) }
    fn accepted_friend_ids(&self, id: &str) -> Result<Vec<String>> { self.inner.accepted_friend_ids(id) }
    fn top_by_points(&self, limit: u32) -> Result<Vec<LeaderboardRow>> { self.inner.top_by_points(limit) }
    fn rank_users(&self, ids: &[String]) -> Result<Vec<LeaderboardRow>> { self.inner.rank_users(ids) }
    fn search_users(&self, id: &str, n: &str, limit: u32) -> Result<Vec<ProfileRow>> { self.inner.search_users(id, n, limit) }
}
