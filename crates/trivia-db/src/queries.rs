use crate::Database;
use crate::models::{
    AnswerHistoryRow, FriendshipListing, FriendshipRow, HistoryPage, LeaderboardRow, MetricsRow,
    NewAccount, NewAnswer, ProfileRow, QuestionRow, UserRow,
};
use crate::store::{Store, WriteOutcome};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use trivia_types::models::{FriendshipStatus, NewQuestion, QuestionOption};

impl Store for Database {
    // -- Accounts --

    fn create_account(&self, account: &NewAccount<'_>) -> Result<WriteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // Returning before commit drops `tx`, rolling back earlier inserts
            let user = tx.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (account.id, account.email, account.password_hash),
            );
            if write_outcome(user)? == WriteOutcome::Conflict {
                return Ok(WriteOutcome::Conflict);
            }

            let profile = tx.execute(
                "INSERT INTO profiles (user_id, username) VALUES (?1, ?2)",
                (account.id, account.username),
            );
            if write_outcome(profile)? == WriteOutcome::Conflict {
                return Ok(WriteOutcome::Conflict);
            }

            tx.execute("INSERT INTO user_metrics (user_id) VALUES (?1)", [account.id])?;

            tx.commit()?;
            Ok(WriteOutcome::Applied)
        })
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password, created_at FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    fn user_exists(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [user_id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Profiles --

    fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, username, avatar_path FROM profiles WHERE user_id = ?1",
                [user_id],
                read_profile,
            )
            .optional()
        })
    }

    fn username_taken(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM profiles WHERE username = ?1", [username], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn update_username(&self, user_id: &str, username: &str) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "UPDATE profiles SET username = ?2 WHERE user_id = ?1",
                (user_id, username),
            ))
        })
    }

    fn update_avatar_path(&self, user_id: &str, avatar_path: &str) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "UPDATE profiles SET avatar_path = ?2 WHERE user_id = ?1",
                (user_id, avatar_path),
            ))
        })
    }

    // -- Questions --

    fn insert_questions(&self, questions: &[NewQuestion]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO questions (id, text, options) VALUES (?1, ?2, ?3)",
                )?;
                for q in questions {
                    let options = serde_json::to_string(&q.options)?;
                    inserted += stmt.execute((&q.id, &q.text, &options))?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    fn get_question(&self, question_id: &str) -> Result<Option<QuestionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, text, options FROM questions WHERE id = ?1",
                [question_id],
                read_question,
            )
            .optional()
        })
    }

    fn pick_unanswered_question(&self, user_id: &str) -> Result<Option<QuestionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT q.id, q.text, q.options
                 FROM questions q
                 WHERE NOT EXISTS (
                     SELECT 1 FROM answers a
                     WHERE a.question_id = q.id AND a.user_id = ?1
                 )
                 ORDER BY RANDOM()
                 LIMIT 1",
                [user_id],
                read_question,
            )
            .optional()
        })
    }

    // -- Answers & metrics --

    fn insert_answer(&self, answer: &NewAnswer<'_>) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "INSERT INTO answers (id, user_id, question_id, selected_option_id)
                 VALUES (?1, ?2, ?3, ?4)",
                (answer.id, answer.user_id, answer.question_id, answer.selected_option_id),
            ))
        })
    }

    fn get_metrics(&self, user_id: &str) -> Result<Option<MetricsRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, points, current_streak, last_answered_date
                 FROM user_metrics WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(MetricsRow {
                        user_id: row.get(0)?,
                        points: row.get(1)?,
                        current_streak: row.get(2)?,
                        last_answered_date: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    fn update_metrics(&self, metrics: &MetricsRow) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "UPDATE user_metrics
                 SET points = ?2, current_streak = ?3, last_answered_date = ?4
                 WHERE user_id = ?1",
                rusqlite::params![
                    metrics.user_id,
                    metrics.points,
                    metrics.current_streak,
                    metrics.last_answered_date,
                ],
            ))
        })
    }

    fn answer_counts(&self, question_id: &str) -> Result<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT selected_option_id, COUNT(*) FROM answers
                 WHERE question_id = ?1
                 GROUP BY selected_option_id",
            )?;
            let rows = stmt
                .query_map([question_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn answer_history(&self, user_id: &str, offset: u64, limit: u32) -> Result<HistoryPage> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM answers WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT a.id, a.question_id, q.text, a.selected_option_id, a.created_at
                 FROM answers a
                 LEFT JOIN questions q ON q.id = a.question_id
                 WHERE a.user_id = ?1
                 ORDER BY a.created_at DESC, a.rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset as i64], |row| {
                    Ok(AnswerHistoryRow {
                        id: row.get(0)?,
                        question_id: row.get(1)?,
                        question_text: row.get(2)?,
                        selected_option_id: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(HistoryPage {
                rows,
                total: total as u64,
            })
        })
    }

    // -- Friendships --

    fn find_friendship_between(&self, a: &str, b: &str) -> Result<Option<FriendshipRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id_1, user_id_2, status, created_at FROM friendships
                 WHERE (user_id_1 = ?1 AND user_id_2 = ?2)
                    OR (user_id_1 = ?2 AND user_id_2 = ?1)
                 LIMIT 1",
                (a, b),
                read_friendship,
            )
            .optional()
        })
    }

    fn get_friendship(&self, id: &str) -> Result<Option<FriendshipRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id_1, user_id_2, status, created_at FROM friendships WHERE id = ?1",
                [id],
                read_friendship,
            )
            .optional()
        })
    }

    fn insert_friend_request(&self, id: &str, requester: &str, target: &str) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "INSERT INTO friendships (id, user_id_1, user_id_2, status) VALUES (?1, ?2, ?3, ?4)",
                (id, requester, target, FriendshipStatus::Pending.as_str()),
            ))
        })
    }

    fn accept_friend_request(&self, id: &str) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "UPDATE friendships SET status = ?2 WHERE id = ?1 AND status = ?3",
                (
                    id,
                    FriendshipStatus::Accepted.as_str(),
                    FriendshipStatus::Pending.as_str(),
                ),
            ))
        })
    }

    fn delete_friend_request(&self, id: &str) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            write_outcome(conn.execute(
                "DELETE FROM friendships WHERE id = ?1 AND status = ?2",
                (id, FriendshipStatus::Pending.as_str()),
            ))
        })
    }

    fn list_friendships(&self, user_id: &str) -> Result<Vec<FriendshipListing>> {
        self.with_conn(|conn| query_friendships(conn, user_id))
    }

    fn accepted_friend_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT CASE WHEN user_id_1 = ?1 THEN user_id_2 ELSE user_id_1 END
                 FROM friendships
                 WHERE (user_id_1 = ?1 OR user_id_2 = ?1) AND status = ?2",
            )?;
            let ids = stmt
                .query_map((user_id, FriendshipStatus::Accepted.as_str()), |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    // -- Leaderboard & search --

    fn top_by_points(&self, limit: u32) -> Result<Vec<LeaderboardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.user_id, p.username, p.avatar_path, m.points
                 FROM user_metrics m
                 LEFT JOIN profiles p ON p.user_id = m.user_id
                 ORDER BY m.points DESC, m.rowid ASC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], read_leaderboard)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn rank_users(&self, user_ids: &[String]) -> Result<Vec<LeaderboardRow>> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT m.user_id, p.username, p.avatar_path, m.points
                 FROM user_metrics m
                 LEFT JOIN profiles p ON p.user_id = m.user_id
                 WHERE m.user_id IN ({})
                 ORDER BY m.points DESC, m.rowid ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(user_ids.iter()), read_leaderboard)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn search_users(&self, user_id: &str, needle: &str, limit: u32) -> Result<Vec<ProfileRow>> {
        let pattern = like_pattern(needle);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"SELECT p.user_id, p.username, p.avatar_path
                  FROM profiles p
                  JOIN users u ON u.id = p.user_id
                  WHERE (p.username LIKE ?2 ESCAPE '\' OR u.email LIKE ?2 ESCAPE '\')
                    AND p.user_id <> ?1
                    AND NOT EXISTS (
                        SELECT 1 FROM friendships f
                        WHERE (f.user_id_1 = ?1 AND f.user_id_2 = p.user_id)
                           OR (f.user_id_2 = ?1 AND f.user_id_1 = p.user_id)
                    )
                  ORDER BY p.username
                  LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, pattern, limit], read_profile)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_friendships(conn: &Connection, user_id: &str) -> Result<Vec<FriendshipListing>> {
    // Join the profile of whichever side is not the viewer
    let mut stmt = conn.prepare(
        "SELECT f.id, f.user_id_1, f.user_id_2, f.status, f.created_at,
                CASE WHEN f.user_id_1 = ?1 THEN f.user_id_2 ELSE f.user_id_1 END AS other_id,
                p.username, p.avatar_path
         FROM friendships f
         LEFT JOIN profiles p
             ON p.user_id = CASE WHEN f.user_id_1 = ?1 THEN f.user_id_2 ELSE f.user_id_1 END
         WHERE f.user_id_1 = ?1 OR f.user_id_2 = ?1
         ORDER BY f.created_at DESC, f.rowid DESC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(FriendshipListing {
                friendship: read_friendship(row)?,
                other_user_id: row.get(5)?,
                other_username: row.get(6)?,
                other_avatar_path: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn read_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        avatar_path: row.get(2)?,
    })
}

fn read_question(row: &Row<'_>) -> rusqlite::Result<QuestionRow> {
    let raw: String = row.get(2)?;
    let options: Vec<QuestionOption> = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(QuestionRow {
        id: row.get(0)?,
        text: row.get(1)?,
        options,
    })
}

fn read_friendship(row: &Row<'_>) -> rusqlite::Result<FriendshipRow> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<FriendshipStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(FriendshipRow {
        id: row.get(0)?,
        user_id_1: row.get(1)?,
        user_id_2: row.get(2)?,
        status,
        created_at: row.get(4)?,
    })
}

fn read_leaderboard(row: &Row<'_>) -> rusqlite::Result<LeaderboardRow> {
    Ok(LeaderboardRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        avatar_path: row.get(2)?,
        points: row.get(3)?,
    })
}

/// Substring LIKE pattern with the wildcard characters of `needle` escaped
/// (escape character `\`).
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

fn write_outcome(result: rusqlite::Result<usize>) -> Result<WriteOutcome> {
    match result {
        Ok(0) => Ok(WriteOutcome::Missing),
        Ok(_) => Ok(WriteOutcome::Applied),
        Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
        Err(e) => Err(e.into()),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
