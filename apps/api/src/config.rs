use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub pg_host: String,
    pub pg_port: u16,
    pub pg_user: String,
    pub pg_password: String,
    pub pg_database: String,
    /// PEM-encoded public key used to verify Clerk session tokens.
    pub clerk_jwt_key: String,
    /// Shared secret for verifying Clerk webhook signatures (`whsec_...`).
    pub clerk_webhook_secret: String,
    /// Optional HTTP Basic credentials for the /metrics scrape endpoint.
    /// Both must be set for the endpoint to be gated.
    pub metrics_username: Option<String>,
    pub metrics_password: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            pg_host: std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string()),
            pg_port: std::env::var("PGPORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse::<u16>()
                .context("PGPORT must be a valid port number")?,
            pg_user: require_env("PGUSER")?,
            pg_password: require_env("PGPASSWORD")?,
            pg_database: require_env("PGDATABASE")?,
            clerk_jwt_key: require_env("CLERK_JWT_KEY")?,
            clerk_webhook_secret: require_env("CLERK_WEBHOOK_SECRET")?,
            metrics_username: std::env::var("METRICS_USERNAME").ok(),
            metrics_password: std::env::var("METRICS_PASSWORD").ok(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
