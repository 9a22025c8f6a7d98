use std::sync::Arc;

use trivia_db::Store;

use crate::clock::Clock;
use crate::session::SessionService;
use crate::storage::AvatarStorage;

pub type AppState = Arc<AppStateInner>;

/// Collaborators every handler may reach. All of them are injected so tests
/// can swap in in-memory or failing fakes.
pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionService>,
    pub clock: Arc<dyn Clock>,
    pub avatars: AvatarStorage,
}
