use crate::crypto::HashParams;
use crate::error::AppError;

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub secret_key: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub hash_params: HashParams,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret_key = std::env::var("SECRET_KEY")
            .map_err(|_| AppError::Config("SECRET_KEY must be set".to_string()))?;
        if secret_key.is_empty() {
            return Err(AppError::Config("SECRET_KEY must not be empty".to_string()));
        }

        Ok(Config {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", "8080")?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://messagely.db".to_string()),
            secret_key,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parse_var("DB_MIN_CONNECTIONS", "5")?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "30")?,
            hash_params: check_hash_params(HashParams {
                memory_kib: parse_var("HASH_MEMORY_KIB", "19456")?,
                iterations: parse_var("HASH_ITERATIONS", "2")?,
                parallelism: parse_var("HASH_PARALLELISM", "1")?,
            })?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn check_hash_params(params: HashParams) -> Result<HashParams, AppError> {
    params
        .argon2_params()
        .map_err(|e| AppError::Config(format!("Invalid HASH_* settings: {}", e)))?;
    Ok(params)
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}
