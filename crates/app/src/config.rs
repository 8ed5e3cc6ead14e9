use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: Option<String>,
    pub request_timeout: Duration,
    pub max_page_size: u32,
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidSocket(String),
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("{0} must be set")]
    Missing(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let http_addr_raw = env.string("CODEFORUM_HTTP_ADDR", "127.0.0.1:8080");
        let http_addr = http_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidSocket(http_addr_raw.clone()))?;
        let request_timeout_secs = env.number("CODEFORUM_REQUEST_TIMEOUT_SECS", 15u64)?;
        let cors_allow_origins = env
            .optional("CODEFORUM_CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            http_addr,
            database_url: env.optional("CODEFORUM_DATABASE_URL"),
            db_max_connections: env.number("CODEFORUM_DB_MAX_CONNECTIONS", 5u32)?,
            jwt_secret: env.optional("CODEFORUM_JWT_SECRET"),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_page_size: env.number("CODEFORUM_MAX_PAGE_SIZE", 100u32)?,
            cors_allow_origins,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("CODEFORUM_DATABASE_URL"))
    }

    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::Missing("CODEFORUM_JWT_SECRET"))
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &'static str, default: &'static str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        let value = (self.0)(key)?;
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn number<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(key, raw)),
            None => Ok(default),
        }
    }
}

/// Copies `.env` entries into the process environment without overriding
/// variables that are already set.
pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in contents.lines().filter_map(parse_dotenv_line) {
        if std::env::var_os(&key).is_none() {
            // Safety: invoked during startup before any threads are spawned.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), dotenv_value(value.trim())))
}

fn dotenv_value(raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return if quote == '"' {
                inner.replace("\\n", "\n").replace("\\\"", "\"")
            } else {
                inner.to_string()
            };
        }
    }
    match raw.split_once(" #") {
        Some((value, _comment)) => value.trim_end().to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{parse_dotenv_line, AppConfig, ConfigError};

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.http_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.max_page_size, 100);
        assert!(config.cors_allow_origins.is_empty());
        assert!(matches!(
            config.require_jwt_secret(),
            Err(ConfigError::Missing("CODEFORUM_JWT_SECRET"))
        ));
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("CODEFORUM_HTTP_ADDR", "0.0.0.0:9000"),
            ("CODEFORUM_DATABASE_URL", "postgres://localhost/forum"),
            ("CODEFORUM_JWT_SECRET", " s3cret "),
            ("CODEFORUM_MAX_PAGE_SIZE", "50"),
            ("CODEFORUM_CORS_ALLOW_ORIGINS", "https://a.example, ,https://b.example"),
        ])
        .unwrap();
        assert_eq!(config.http_addr.port(), 9000);
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/forum");
        assert_eq!(config.require_jwt_secret().unwrap(), "s3cret");
        assert_eq!(config.max_page_size, 50);
        assert_eq!(
            config.cors_allow_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            config(&[("CODEFORUM_HTTP_ADDR", "localhost")]),
            Err(ConfigError::InvalidSocket(_))
        ));
        assert!(matches!(
            config(&[("CODEFORUM_DB_MAX_CONNECTIONS", "many")]),
            Err(ConfigError::InvalidNumber("CODEFORUM_DB_MAX_CONNECTIONS", _))
        ));
    }

    #[test]
    fn dotenv_lines() {
        assert_eq!(
            parse_dotenv_line("export FOO=bar"),
            Some(("FOO".to_string(), "bar".to_string()))
        );
        assert_eq!(
            parse_dotenv_line(r#"FOO="two\nlines""#),
            Some(("FOO".to_string(), "two\nlines".to_string()))
        );
        assert_eq!(
            parse_dotenv_line("FOO='kept # hash'"),
            Some(("FOO".to_string(), "kept # hash".to_string()))
        );
        assert_eq!(
            parse_dotenv_line("FOO=bar # trailing"),
            Some(("FOO".to_string(), "bar".to_string()))
        );
        assert!(parse_dotenv_line("# comment").is_none());
        assert!(parse_dotenv_line("=value").is_none());
    }
}
