use std::sync::Arc;
use sqlx::{Pool, Sqlite};
use crate::config::Config;
use crate::crypto::SessionIssuer;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Sqlite>,
    pub sessions: Arc<SessionIssuer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool<Sqlite>, config: Arc<Config>) -> Self {
        let sessions = Arc::new(SessionIssuer::new(config.secret_key.as_bytes()));
        Self { db, sessions, config }
    }
}
