use std::time::Duration;

use anyhow::Context;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub login_limit: RateLimitConfig,
    pub reset_limit: RateLimitConfig,
    /// Reverse proxies in front of the service. When non-zero, the client is
    /// the `X-Forwarded-For` entry that many positions from the right.
    pub trusted_proxy_hops: usize,
    pub rate_limit_purge_secs: u64,
}

const LOGIN_LIMIT_MESSAGE: &str = "Too many login attempts. Please try again after 15 minutes.";
const RESET_LIMIT_MESSAGE: &str =
    "Too many password reset requests. Please try again after 15 minutes.";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT_SECS", 30),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "hostel-auth".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "hostel-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
        };

        Ok(Self {
            database,
            jwt,
            login_limit: limit_from_env("LOGIN", LOGIN_LIMIT_MESSAGE),
            reset_limit: limit_from_env("RESET", RESET_LIMIT_MESSAGE),
            trusted_proxy_hops: env_parse("TRUSTED_PROXY_HOPS", 0),
            rate_limit_purge_secs: env_parse("RATE_LIMIT_PURGE_SECS", 60),
        })
    }
}

fn limit_from_env(prefix: &str, default_message: &str) -> RateLimitConfig {
    RateLimitConfig {
        window: Duration::from_secs(env_parse(&format!("{prefix}_RATE_LIMIT_WINDOW_SECS"), 15 * 60)),
        max: env_parse(&format!("{prefix}_RATE_LIMIT_MAX"), 5),
        message: std::env::var(format!("{prefix}_RATE_LIMIT_MESSAGE"))
            .unwrap_or_else(|_| default_message.to_string()),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
