pub mod models;
pub mod users;
pub mod messages;

pub use models::{
    MessageDetail, NewMessage, NewUser, ReadReceipt, ReceivedMessage, SentMessage, User,
    UserProfile, UserSummary,
};
pub use users::UserRepository;
pub use messages::MessageRepository;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::error::AppError;

/// Open the pool and bring the schema up to date.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::crypto::HashParams;

    pub const FAST_HASH: HashParams = HashParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    /// Single-connection in-memory database; every pooled connection to
    /// `:memory:` would otherwise see its own empty database.
    pub async fn test_pool() -> Pool<Sqlite> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    pub fn new_user(username: &str, password: &str) -> NewUser {
        let mut first_name = username.to_string();
        if let Some(first) = first_name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }

        NewUser {
            username: username.to_string(),
            password: password.to_string(),
            first_name,
            last_name: "Tester".to_string(),
            phone: "555-0100".to_string(),
        }
    }
}
