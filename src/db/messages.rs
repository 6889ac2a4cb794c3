use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Sqlite};

use crate::db::is_foreign_key_violation;
use crate::db::models::{
    MessageDetail, NewMessage, ReadReceipt, ReceivedMessage, SentMessage, UserSummary,
};
use crate::error::AppError;

pub struct MessageRepository;

/// One message joined with a single counterpart.
#[derive(FromRow)]
struct CounterpartRow {
    id: i64,
    body: String,
    sent_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
    username: String,
    first_name: String,
    last_name: String,
    phone: String,
}

impl CounterpartRow {
    fn counterpart(&self) -> UserSummary {
        UserSummary {
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
        }
    }
}

impl From<CounterpartRow> for SentMessage {
    fn from(row: CounterpartRow) -> Self {
        SentMessage {
            to_user: row.counterpart(),
            id: row.id,
            body: row.body,
            sent_at: row.sent_at,
            read_at: row.read_at,
        }
    }
}

impl From<CounterpartRow> for ReceivedMessage {
    fn from(row: CounterpartRow) -> Self {
        ReceivedMessage {
            from_user: row.counterpart(),
            id: row.id,
            body: row.body,
            sent_at: row.sent_at,
            read_at: row.read_at,
        }
    }
}

#[derive(FromRow)]
struct DetailRow {
    id: i64,
    body: String,
    sent_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
    from_username: String,
    from_first_name: String,
    from_last_name: String,
    from_phone: String,
    to_username: String,
    to_first_name: String,
    to_last_name: String,
    to_phone: String,
}

impl From<DetailRow> for MessageDetail {
    fn from(row: DetailRow) -> Self {
        MessageDetail {
            id: row.id,
            body: row.body,
            sent_at: row.sent_at,
            read_at: row.read_at,
            from_user: UserSummary {
                username: row.from_username,
                first_name: row.from_first_name,
                last_name: row.from_last_name,
                phone: row.from_phone,
            },
            to_user: UserSummary {
                username: row.to_username,
                first_name: row.to_first_name,
                last_name: row.to_last_name,
                phone: row.to_phone,
            },
        }
    }
}

impl MessageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        from_username: &str,
        to_username: &str,
        body: &str,
    ) -> Result<NewMessage, AppError> {
        let sent_at = Utc::now();

        let message = sqlx::query_as::<_, NewMessage>(
            r#"
INSERT INTO messages (from_username, to_username, body, sent_at)
VALUES (?, ?, ?, ?)
RETURNING id, from_username, to_username, body, sent_at
            "#,
        )
        .bind(from_username)
        .bind(to_username)
        .bind(body)
        .bind(sent_at)
        .fetch_one(pool)
        .await;

        match message {
            Ok(message) => Ok(message),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(Self::missing_party(pool, from_username, to_username).await)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Name the party a foreign-key failure was about.
    async fn missing_party(
        pool: &Pool<Sqlite>,
        from_username: &str,
        to_username: &str,
    ) -> AppError {
        for username in [from_username, to_username] {
            let exists: Result<Option<(String,)>, sqlx::Error> =
                sqlx::query_as("SELECT username FROM users WHERE username = ?")
                    .bind(username)
                    .fetch_optional(pool)
                    .await;

            match exists {
                Ok(Some(_)) => continue,
                Ok(None) => return AppError::NotFound(format!("User '{}' not found", username)),
                Err(e) => return AppError::Database(e),
            }
        }

        AppError::NotFound("Sender or recipient not found".to_string())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<MessageDetail, AppError> {
        let row = sqlx::query_as::<_, DetailRow>(
            r#"
SELECT m.id, m.body, m.sent_at, m.read_at,
       f.username AS from_username, f.first_name AS from_first_name,
       f.last_name AS from_last_name, f.phone AS from_phone,
       t.username AS to_username, t.first_name AS to_first_name,
       t.last_name AS to_last_name, t.phone AS to_phone
FROM messages m
JOIN users f ON f.username = m.from_username
JOIN users t ON t.username = m.to_username
WHERE m.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into())
    }

    /// Record that a message was read.
    ///
    /// Idempotent: once `read_at` is set it never changes, and repeated calls
    /// return the original timestamp. Identity is not checked here.
    pub async fn mark_read(pool: &Pool<Sqlite>, id: i64) -> Result<ReadReceipt, AppError> {
        sqlx::query_as::<_, ReadReceipt>(
            r#"
UPDATE messages
SET read_at = COALESCE(read_at, ?)
WHERE id = ?
RETURNING id, read_at
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))
    }

    pub async fn messages_from(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Vec<SentMessage>, AppError> {
        let rows = sqlx::query_as::<_, CounterpartRow>(
            r#"
SELECT m.id, m.body, m.sent_at, m.read_at,
       u.username, u.first_name, u.last_name, u.phone
FROM messages m
JOIN users u ON u.username = m.to_username
WHERE m.from_username = ?
ORDER BY m.id ASC
            "#,
        )
        .bind(username)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(SentMessage::from).collect())
    }

    pub async fn messages_to(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Vec<ReceivedMessage>, AppError> {
        let rows = sqlx::query_as::<_, CounterpartRow>(
            r#"
SELECT m.id, m.body, m.sent_at, m.read_at,
       u.username, u.first_name, u.last_name, u.phone
FROM messages m
JOIN users u ON u.username = m.from_username
WHERE m.to_username = ?
ORDER BY m.id ASC
            "#,
        )
        .bind(username)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(ReceivedMessage::from).collect())
    }
}
