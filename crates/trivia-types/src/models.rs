use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One selectable answer of a question. Stored as part of the question's
/// JSON `options` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
}

/// A question as loaded from a seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
}

/// Friendship rows only ever hold these two states; a rejected request is
/// deleted rather than marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown friendship status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for FriendshipStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_rendering() {
        for status in [FriendshipStatus::Pending, FriendshipStatus::Accepted] {
            assert_eq!(status.as_str().parse::<FriendshipStatus>(), Ok(status));
        }
        let err = "rejected".parse::<FriendshipStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("rejected".into()));
        assert_eq!(err.to_string(), "unknown friendship status 'rejected'");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&FriendshipStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
    }
}
