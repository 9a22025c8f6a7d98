mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use trivia_api::clock::SystemClock;
use trivia_api::session::JwtSessions;
use trivia_api::storage::AvatarStorage;
use trivia_api::{AppState, AppStateInner};
use trivia_db::{Database, Store};
use trivia_types::models::NewQuestion;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trivia=debug,trivia_api=debug,trivia_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;
    if let Some(path) = &config.questions_file {
        seed_questions(&db, path)?;
    }

    let avatars = AvatarStorage::new(config.avatar_dir.clone(), &config.jwt_secret).await?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        store: Arc::new(db),
        sessions: Arc::new(JwtSessions::new(&config.jwt_secret)),
        clock: Arc::new(SystemClock),
        avatars,
    });

    let app = trivia_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Trivia server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load a JSON array of questions and insert the ones not already present.
fn seed_questions(db: &Database, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading questions file {}", path.display()))?;
    let questions: Vec<NewQuestion> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing questions file {}", path.display()))?;

    let inserted = db.insert_questions(&questions)?;
    info!(
        "Seeded {} new question(s) from {} ({} in file)",
        inserted,
        path.display(),
        questions.len()
    );
    Ok(())
}
