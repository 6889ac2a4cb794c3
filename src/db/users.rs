use chrono::{DateTime, Utc};
use sqlx::{Executor, Pool, Sqlite};

use crate::crypto::{hash_password, verify_password, HashParams};
use crate::db::models::{NewUser, User, UserProfile, UserSummary};
use crate::db::is_unique_violation;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    /// Store a new user with a salted hash of their password.
    pub async fn register(
        pool: &Pool<Sqlite>,
        new_user: NewUser,
        params: &HashParams,
    ) -> Result<User, AppError> {
        let password_hash = Self::hash(&new_user, params).await?;
        Self::insert(pool, &new_user, &password_hash).await
    }

    /// Register and record the first login in one transaction, so an
    /// account never exists without its login stamp.
    pub async fn register_and_login(
        pool: &Pool<Sqlite>,
        new_user: NewUser,
        params: &HashParams,
    ) -> Result<User, AppError> {
        let password_hash = Self::hash(&new_user, params).await?;

        let mut tx = pool.begin().await?;
        let mut user = Self::insert(&mut *tx, &new_user, &password_hash).await?;
        user.last_login_at = Some(Self::stamp_login(&mut *tx, &user.username).await?);
        tx.commit().await?;

        Ok(user)
    }

    async fn hash(new_user: &NewUser, params: &HashParams) -> Result<String, AppError> {
        let password = new_user.password.clone();
        let params = *params;
        tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
    }

    async fn insert<'e, E>(
        executor: E,
        new_user: &NewUser,
        password_hash: &str,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (username, password, first_name, last_name, phone, join_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING username, password, first_name, last_name, phone, join_at, last_login_at
            "#,
        )
        .bind(&new_user.username)
        .bind(password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.phone)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateIdentity(format!(
                    "Username '{}' is already taken",
                    new_user.username
                ))
            } else {
                AppError::Database(e)
            }
        })
    }

    /// Check a password against the stored hash.
    ///
    /// Unknown usernames fail with `InvalidCredentials`; a wrong password
    /// returns `Ok(false)`. Callers report both the same way.
    pub async fn authenticate(
        pool: &Pool<Sqlite>,
        username: &str,
        password: &str,
    ) -> Result<bool, AppError> {
        let stored: Option<(String,)> =
            sqlx::query_as("SELECT password FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(pool)
                .await?;

        let (stored,) = stored.ok_or(AppError::InvalidCredentials)?;

        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
    }

    pub async fn touch_login(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<DateTime<Utc>, AppError> {
        Self::stamp_login(pool, username).await
    }

    async fn stamp_login<'e, E>(executor: E, username: &str) -> Result<DateTime<Utc>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "UPDATE users SET last_login_at = ? WHERE username = ? RETURNING last_login_at",
        )
        .bind(Utc::now())
        .bind(username)
        .fetch_optional(executor)
        .await?;

        row.map(|(at,)| at)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
    }

    pub async fn list_all(pool: &Pool<Sqlite>) -> Result<Vec<UserSummary>, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT username, first_name, last_name, phone FROM users ORDER BY username",
        )
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    pub async fn get_profile(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<UserProfile, AppError> {
        sqlx::query_as::<_, UserProfile>(
            r#"
SELECT username, first_name, last_name, phone, join_at, last_login_at
FROM users
WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_user, test_pool, FAST_HASH};

    #[tokio::test]
    async fn test_register_stores_hash_only() {
        let pool = test_pool().await;
        let user = UserRepository::register(&pool, new_user("alice", "pw1"), &FAST_HASH)
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert_ne!(user.password, "pw1");
        assert!(user.last_login_at.is_none());

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let pool = test_pool().await;
        UserRepository::register(&pool, new_user("alice", "pw1"), &FAST_HASH)
            .await
            .unwrap();

        let mut second = new_user("alice", "other");
        second.first_name = "Impostor".to_string();
        let err = UserRepository::register(&pool, second, &FAST_HASH)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateIdentity(_)));

        let profile = UserRepository::get_profile(&pool, "alice").await.unwrap();
        assert_eq!(profile.first_name, "Alice");
        assert!(UserRepository::authenticate(&pool, "alice", "pw1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_registration_one_wins() {
        let pool = test_pool().await;
        let (a, b) = tokio::join!(
            UserRepository::register(&pool, new_user("race", "pw1"), &FAST_HASH),
            UserRepository::register(&pool, new_user("race", "pw2"), &FAST_HASH),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::DuplicateIdentity(_)))));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let pool = test_pool().await;
        UserRepository::register(&pool, new_user("alice", "pw1"), &FAST_HASH)
            .await
            .unwrap();

        assert!(UserRepository::authenticate(&pool, "alice", "pw1").await.unwrap());
        assert!(!UserRepository::authenticate(&pool, "alice", "nope").await.unwrap());

        let err = UserRepository::authenticate(&pool, "ghost", "pw1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_touch_login() {
        let pool = test_pool().await;
        UserRepository::register(&pool, new_user("alice", "pw1"), &FAST_HASH)
            .await
            .unwrap();

        let at = UserRepository::touch_login(&pool, "alice").await.unwrap();
        let profile = UserRepository::get_profile(&pool, "alice").await.unwrap();
        assert_eq!(profile.last_login_at, Some(at));

        let err = UserRepository::touch_login(&pool, "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_register_and_login_stamps_first_login() {
        let pool = test_pool().await;
        let user = UserRepository::register_and_login(
            &pool,
            new_user("alice", "pw1"),
            &FAST_HASH,
        )
        .await
        .unwrap();

        assert!(user.last_login_at.is_some());
        let profile = UserRepository::get_profile(&pool, "alice").await.unwrap();
        assert_eq!(profile.last_login_at, user.last_login_at);
    }

    #[tokio::test]
    async fn test_register_and_login_duplicate_leaves_first_untouched() {
        let pool = test_pool().await;
        UserRepository::register(&pool, new_user("alice", "pw1"), &FAST_HASH)
            .await
            .unwrap();

        let err = UserRepository::register_and_login(
            &pool,
            new_user("alice", "pw2"),
            &FAST_HASH,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateIdentity(_)));

        // The failed transaction must not have stamped the existing account
        let profile = UserRepository::get_profile(&pool, "alice").await.unwrap();
        assert!(profile.last_login_at.is_none());
        assert!(UserRepository::authenticate(&pool, "alice", "pw1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_all_and_profile() {
        let pool = test_pool().await;
        for name in ["bob", "alice"] {
            UserRepository::register(&pool, new_user(name, "pw"), &FAST_HASH)
                .await
                .unwrap();
        }

        let users = UserRepository::list_all(&pool).await.unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        let err = UserRepository::get_profile(&pool, "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
