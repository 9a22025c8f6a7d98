//! Streak and points bookkeeping for answer submission.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use trivia_db::models::MetricsRow;

/// The scoring-relevant part of a user's metrics row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub points: u32,
    pub current_streak: u32,
    pub last_answered_date: Option<NaiveDate>,
}

impl From<&MetricsRow> for Standing {
    fn from(row: &MetricsRow) -> Self {
        Self {
            points: row.points,
            current_streak: row.current_streak,
            last_answered_date: row.last_answered_date,
        }
    }
}

/// Standing after one more answer submitted on `today`.
///
/// The first answer of a calendar day earns a point; the streak grows when
/// yesterday was the previous answer day and restarts at 1 after a gap. A
/// second answer on the same day changes nothing. A stored date in the future
/// (clock skew) also changes nothing and keeps the later date.
pub fn advance(standing: Standing, today: NaiveDate) -> Standing {
    let Some(last) = standing.last_answered_date else {
        return Standing {
            points: standing.points.saturating_add(1),
            current_streak: 1,
            last_answered_date: Some(today),
        };
    };

    match (today - last).num_days() {
        0 => standing,
        1 => Standing {
            points: standing.points.saturating_add(1),
            current_streak: standing.current_streak.saturating_add(1),
            last_answered_date: Some(today),
        },
        days if days > 1 => Standing {
            points: standing.points.saturating_add(1),
            current_streak: 1,
            last_answered_date: Some(today),
        },
        days => {
            warn!(
                "Last answer date {} is {} day(s) after today {}; leaving metrics unchanged",
                last, -days, today
            );
            standing
        }
    }
}

/// Share of all answers that picked each option. Empty when nobody answered.
pub fn feedback_fractions(counts: &[(String, u64)]) -> BTreeMap<String, f64> {
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return BTreeMap::new();
    }

    counts
        .iter()
        .map(|(option_id, n)| (option_id.clone(), *n as f64 / total as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn standing(points: u32, streak: u32, last: Option<NaiveDate>) -> Standing {
        Standing {
            points,
            current_streak: streak,
            last_answered_date: last,
        }
    }

    #[test]
    fn first_answer_starts_streak() {
        let next = advance(standing(0, 0, None), day(2024, 3, 1));
        assert_eq!(next, standing(1, 1, Some(day(2024, 3, 1))));
    }

    #[test]
    fn consecutive_day_extends_streak() {
        let next = advance(standing(5, 3, Some(day(2024, 1, 1))), day(2024, 1, 2));
        assert_eq!(next, standing(6, 4, Some(day(2024, 1, 2))));
    }

    #[test]
    fn same_day_changes_nothing() {
        let before = standing(6, 4, Some(day(2024, 1, 2)));
        assert_eq!(advance(before, day(2024, 1, 2)), before);
    }

    #[test]
    fn gap_resets_streak_but_still_scores() {
        let next = advance(standing(6, 4, Some(day(2024, 1, 2))), day(2024, 1, 10));
        assert_eq!(next, standing(7, 1, Some(day(2024, 1, 10))));
    }

    #[test]
    fn month_and_year_boundaries_count_as_consecutive() {
        let next = advance(standing(1, 1, Some(day(2023, 12, 31))), day(2024, 1, 1));
        assert_eq!(next.current_streak, 2);
        let next = advance(standing(1, 1, Some(day(2024, 2, 28))), day(2024, 2, 29));
        assert_eq!(next.current_streak, 2);
    }

    #[test]
    fn future_last_date_is_left_alone() {
        let before = standing(9, 2, Some(day(2024, 5, 3)));
        assert_eq!(advance(before, day(2024, 5, 1)), before);
    }

    #[test]
    fn fractions_sum_to_one() {
        let counts = vec![("a".to_string(), 3), ("b".to_string(), 1), ("c".to_string(), 2)];
        let feedback = feedback_fractions(&counts);
        assert_eq!(feedback.len(), 3);
        assert!((feedback["a"] - 0.5).abs() < 1e-9);
        let sum: f64 = feedback.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_answers_means_no_feedback() {
        assert!(feedback_fractions(&[]).is_empty());
        assert!(feedback_fractions(&[("a".to_string(), 0)]).is_empty());
    }
}
