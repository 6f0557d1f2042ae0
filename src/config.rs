// src/config.rs
//
// Environment-variable configuration. Loaded once at startup; immutable for
// the process lifetime. Malformed values fail the load, semantic problems are
// collected by `validate()` so the operator sees every issue at once.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use thiserror::Error;

pub const DEFAULT_URL: &str = "https://iranleague.ir/fa/MatchSchedule/1/1";
pub const DEFAULT_TIMEZONE: &str = "Asia/Tehran";

/// Language the exported team-name labels are taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Fa,
    En,
}

#[derive(Debug, Error)]
#[error("unknown language '{0}', expected FA or EN")]
pub struct ParseLanguageError(String);

impl FromStr for Language {
    type Err = ParseLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FA" => Ok(Language::Fa),
            "EN" => Ok(Language::En),
            other => Err(ParseLanguageError(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Fa => f.write_str("FA"),
            Language::En => f.write_str("EN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

/// Everything the scrape pipeline needs: target page, HTTP client knobs,
/// label language, cadence and kickoff timezone.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub user_agent: String,
    pub language: Language,
    pub update_interval_minutes: u64,
    pub timezone: Tz,
}

impl ScrapeConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
    pub auth: AuthConfig,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from the environment, applying defaults for unset
    /// variables. Fails on values that do not parse at all.
    pub fn from_env() -> Result<Self> {
        let timezone_name = env_or("TIMEZONE", DEFAULT_TIMEZONE);
        let timezone = Tz::from_str(&timezone_name)
            .map_err(|e| anyhow!("environment variable TIMEZONE is not a valid zone: {e}"))?;

        Ok(Self {
            http: HttpConfig {
                host: env_or("HTTP_HOST", "0.0.0.0"),
                port: parse_env("HTTP_PORT", 8000)?,
            },
            scrape: ScrapeConfig {
                url: env_or("CRAWLER_URL", DEFAULT_URL),
                connect_timeout: parse_secs_env("CRAWLER_CONNECT_TIMEOUT", 5.0)?,
                read_timeout: parse_secs_env("CRAWLER_READ_TIMEOUT", 10.0)?,
                max_retries: parse_env("CRAWLER_MAX_RETRIES", 3)?,
                backoff_factor: parse_env("CRAWLER_RETRY_BACKOFF", 0.5)?,
                user_agent: env_or(
                    "CRAWLER_USER_AGENT",
                    concat!("IranLeagueExporter/", env!("CARGO_PKG_VERSION")),
                ),
                language: parse_env("LABEL_LANG", Language::En)?,
                update_interval_minutes: parse_env("UPDATE_INTERVAL", 30)?,
                timezone,
            },
            auth: AuthConfig {
                username: env_or("AUTH_USERNAME", ""),
                password: env_or("AUTH_PASSWORD", ""),
            },
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }

    /// Semantic checks, all collected so startup can report every problem.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.auth.is_configured() {
            errors.push(
                "authentication not configured: AUTH_USERNAME and AUTH_PASSWORD required"
                    .to_string(),
            );
        }
        if self.scrape.update_interval_minutes < 1 {
            errors.push("UPDATE_INTERVAL must be at least 1 minute".to_string());
        }
        if self.http.port == 0 {
            errors.push("HTTP_PORT must be between 1 and 65535".to_string());
        }
        if self.scrape.connect_timeout.is_zero() {
            errors.push("CRAWLER_CONNECT_TIMEOUT must be positive".to_string());
        }
        if self.scrape.read_timeout.is_zero() {
            errors.push("CRAWLER_READ_TIMEOUT must be positive".to_string());
        }
        if self.scrape.backoff_factor < 0.0 {
            errors.push("CRAWLER_RETRY_BACKOFF must not be negative".to_string());
        }

        errors
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("environment variable {key} has an invalid value")),
        Err(_) => Ok(default),
    }
}

/// Seconds-valued variable parsed as f64; negative values are rejected here,
/// zero is left for `validate()` to flag.
fn parse_secs_env(key: &str, default: f64) -> Result<Duration> {
    let secs: f64 = parse_env(key, default)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| anyhow!("environment variable {key} has an invalid value: {e}"))
}
