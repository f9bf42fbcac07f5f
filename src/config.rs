use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::core::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Disabled,
    Jwt,
}

impl AuthMode {
    fn from_env(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            "jwt" | "bearer" => Ok(Self::Jwt),
            _ => Err(anyhow::anyhow!("AUTH_MODE must be one of: disabled, jwt")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub plan_hash_key: String,
    pub index_name: String,
    pub events_topic: String,
    pub flush_store_on_startup: bool,
    pub auth: AuthConfig,
    pub retry: RetryPolicy,
    pub outbox_relay_interval_ms: u64,
    pub index_replay_interval_ms: u64,
    pub index_shards: usize,
    pub cascade_page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            plan_hash_key: "plan".to_string(),
            index_name: "plans".to_string(),
            events_topic: "plan_operations".to_string(),
            flush_store_on_startup: false,
            auth: AuthConfig {
                mode: AuthMode::Disabled,
                jwt_secret: None,
                jwt_issuer: None,
                jwt_audience: None,
            },
            retry: RetryPolicy::default(),
            outbox_relay_interval_ms: 1_000,
            index_replay_interval_ms: 1_000,
            index_shards: 5,
            cascade_page_size: 100,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let auth_mode = AuthMode::from_env(&env_or("AUTH_MODE", "jwt"))?;
        let jwt_secret = env::var("AUTH_JWT_SECRET").ok().filter(|s| !s.is_empty());
        if auth_mode == AuthMode::Jwt && jwt_secret.is_none() {
            anyhow::bail!("AUTH_JWT_SECRET is required when AUTH_MODE=jwt");
        }

        Ok(Self {
            host: env_or("APP_HOST", &defaults.host),
            port: parse_env("APP_PORT", defaults.port)?,
            plan_hash_key: env_or("PLAN_HASH_KEY", &defaults.plan_hash_key),
            index_name: env_or("PLAN_INDEX_NAME", &defaults.index_name),
            events_topic: env_or("PLAN_EVENTS_TOPIC", &defaults.events_topic),
            flush_store_on_startup: parse_env("FLUSH_STORE_ON_STARTUP", false)?,
            auth: AuthConfig {
                mode: auth_mode,
                jwt_secret,
                jwt_issuer: env::var("AUTH_JWT_ISSUER").ok(),
                jwt_audience: env::var("AUTH_JWT_AUDIENCE").ok(),
            },
            retry: RetryPolicy {
                max_attempts: parse_env("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                initial_backoff_ms: parse_env(
                    "RETRY_INITIAL_BACKOFF_MS",
                    defaults.retry.initial_backoff_ms,
                )?,
                max_backoff_ms: parse_env("RETRY_MAX_BACKOFF_MS", defaults.retry.max_backoff_ms)?,
            },
            outbox_relay_interval_ms: parse_env(
                "OUTBOX_RELAY_INTERVAL_MS",
                defaults.outbox_relay_interval_ms,
            )?,
            index_replay_interval_ms: parse_env(
                "INDEX_REPLAY_INTERVAL_MS",
                defaults.index_replay_interval_ms,
            )?,
            index_shards: parse_env("INDEX_SHARDS", defaults.index_shards)?,
            cascade_page_size: parse_env("CASCADE_PAGE_SIZE", defaults.cascade_page_size)?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
