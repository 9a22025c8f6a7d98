use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder secrets that must never sign real sessions.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub avatar_dir: PathBuf,
    pub questions_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("TRIVIA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TRIVIA_JWT_SECRET is unset or still a placeholder; set it in .env");
        }

        let db_path = std::env::var("TRIVIA_DB_PATH")
            .unwrap_or_else(|_| "trivia.db".into())
            .into();
        let host = std::env::var("TRIVIA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("TRIVIA_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("TRIVIA_PORT must be a port number")?;
        let avatar_dir = std::env::var("TRIVIA_AVATAR_DIR")
            .unwrap_or_else(|_| "./avatars".into())
            .into();
        let questions_file = std::env::var("TRIVIA_QUESTIONS_FILE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            avatar_dir,
            questions_file,
        })
    }
}
