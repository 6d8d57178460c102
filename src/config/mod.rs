use std::env;

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
    pub reset_token_expiry_mins: i64,
    pub pbkdf2_iterations: u32,
    pub api_key: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            api_key: env::var("API_KEY")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "ics-api".into()),
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "ics-clients".into()),
            access_token_expiry_mins: env_parse("ACCESS_TOKEN_EXPIRY_MINUTES", 60),
            refresh_token_expiry_days: env_parse("REFRESH_TOKEN_EXPIRY_DAYS", 7),
            reset_token_expiry_mins: env_parse("RESET_TOKEN_EXPIRY_MINUTES", 60),
            pbkdf2_iterations: env_parse("PBKDF2_ITERATIONS", 10_000),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env_parse("SERVER_PORT", 3000),
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_expiry_mins)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiry_days)
    }

    pub fn reset_token_ttl(&self) -> Duration {
        Duration::minutes(self.reset_token_expiry_mins)
    }

    /// Fixed configuration for unit tests; no environment required.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: String::new(),
            jwt_secret: "test-secret-test-secret-test-secret".into(),
            jwt_issuer: "ics-api".into(),
            jwt_audience: "ics-clients".into(),
            access_token_expiry_mins: 60,
            refresh_token_expiry_days: 7,
            reset_token_expiry_mins: 60,
            // Low count keeps the hashing tests fast.
            pbkdf2_iterations: 1_000,
            api_key: "test-api-key".into(),
            admin_email: None,
            admin_password: None,
            server_host: "127.0.0.1".into(),
            server_port: 0,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
