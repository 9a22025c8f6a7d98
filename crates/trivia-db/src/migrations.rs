use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            username    TEXT NOT NULL UNIQUE,
            avatar_path TEXT
        );

        CREATE TABLE IF NOT EXISTS user_metrics (
            user_id             TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            points              INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
            current_streak      INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
            last_answered_date  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_user_metrics_points
            ON user_metrics(points DESC);

        CREATE TABLE IF NOT EXISTS questions (
            id          TEXT PRIMARY KEY,
            text        TEXT NOT NULL,
            options     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS answers (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL REFERENCES users(id),
            question_id         TEXT NOT NULL REFERENCES questions(id),
            selected_option_id  TEXT NOT NULL,
            created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE(user_id, question_id)
        );

        CREATE INDEX IF NOT EXISTS idx_answers_question
            ON answers(question_id);

        CREATE INDEX IF NOT EXISTS idx_answers_user_created
            ON answers(user_id, created_at);

        CREATE TABLE IF NOT EXISTS friendships (
            id          TEXT PRIMARY KEY,
            user_id_1   TEXT NOT NULL REFERENCES users(id),
            user_id_2   TEXT NOT NULL REFERENCES users(id),
            status      TEXT NOT NULL CHECK (status IN ('pending', 'accepted')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (user_id_1 <> user_id_2)
        );

        -- One row per unordered pair, whichever side asked first
        CREATE UNIQUE INDEX IF NOT EXISTS idx_friendships_pair
            ON friendships(min(user_id_1, user_id_2), max(user_id_1, user_id_2));

        CREATE INDEX IF NOT EXISTS idx_friendships_user_2
            ON friendships(user_id_2, status);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
