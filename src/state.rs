//! Application state shared by all handlers.

use std::sync::Arc;

use crate::config::Settings;
use crate::db::DbPool;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared costing.db connection
    pub db: DbPool,

    /// Resolved configuration
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(db: DbPool, settings: Settings) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
        }
    }
}
