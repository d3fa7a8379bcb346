//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ANTHROPIC_API_KEY` - Anthropic API key for the chat model
//!
//! ## Optional
//! - `SHOPTALK_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPTALK_PORT` - Listen port (default: 3000)
//! - `DATABASE_URL` - `SQLite` connection string (default: sqlite://shoptalk.db)
//! - `ANTHROPIC_MODEL` - Model ID (default: claude-sonnet-4-20250514)
//! - `LOG_FORMAT` - `json` for structured log output (read at startup)

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_DATABASE_URL: &str = "sqlite://shoptalk.db";

/// Substrings that mark a secret as a placeholder, matched case-insensitively.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "changeme",
    "your-",
    "placeholder",
    "example",
    "sample",
    "dummy",
    "secret",
    "password",
    "xxx",
    "not-a-real",
];

/// Failures while assembling [`ServerConfig`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingEnvVar(String),
    #[error("environment variable {0} is invalid: {1}")]
    InvalidEnvVar(String, String),
    #[error("refusing insecure value for {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub host: IpAddr,
    /// Port the listener binds to.
    pub port: u16,
    /// `SQLite` connection string.
    pub database_url: String,
    /// Chat model configuration.
    pub model: ModelConfig,
}

/// Chat model API configuration.
///
/// Implements `Debug` manually so the key never reaches a log line.
#[derive(Clone)]
pub struct ModelConfig {
    /// Anthropic API key.
    pub api_key: SecretString,
    /// Model ID, e.g. claude-sonnet-4-20250514.
    pub model: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing, a value
    /// fails to parse, or the API key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real env vars win either way.
        let _ = dotenvy::dotenv();

        Ok(Self {
            host: parsed_or("SHOPTALK_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parsed_or("SHOPTALK_PORT", 3000)?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            model: ModelConfig::from_env()?,
        })
    }

    /// The address to bind the listener to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ModelConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: secret_from_env("ANTHROPIC_API_KEY")?,
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Read an env var and parse it, falling back to `default` when unset.
fn parsed_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Read a required env var, vet it, and wrap it in a `SecretString`.
fn secret_from_env(key: &str) -> Result<SecretString, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    check_secret(key, &value)?;
    Ok(SecretString::from(value))
}

/// Reject secrets that are placeholders or too uniform to be real keys.
fn check_secret(var_name: &str, value: &str) -> Result<(), ConfigError> {
    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(**p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("looks like a placeholder (contains {pattern:?})"),
        ));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy {entropy:.2} bits/char is below the {MIN_ENTROPY_BITS_PER_CHAR} minimum; use a real key"
            ),
        ));
    }

    Ok(())
}

/// Shannon entropy of the byte distribution, in bits per byte.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let freq = s.bytes().fold(HashMap::<u8, u32>::new(), |mut acc, b| {
        *acc.entry(b).or_default() += 1;
        acc
    });

    let total = f64::from(freq.values().sum::<u32>());
    freq.values().fold(0.0, |acc, &count| {
        let p = f64::from(count) / total;
        acc - p * p.log2()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_of_uniform_input_is_zero() {
        assert!(shannon_entropy("").abs() < f64::EPSILON);
        assert!(shannon_entropy("aaaaaaa").abs() < f64::EPSILON);
    }

    #[test]
    fn test_entropy_of_even_split_is_one_bit() {
        assert!((shannon_entropy("abab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_check_secret_rejects_placeholders() {
        let err = check_secret("TEST_VAR", "your-api-key-here").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));

        let err = check_secret("TEST_VAR", "CHANGEME-0192837465").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_check_secret_rejects_uniform_values() {
        assert!(check_secret("TEST_VAR", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_err());
    }

    #[test]
    fn test_check_secret_accepts_high_entropy_keys() {
        assert!(check_secret("TEST_VAR", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            model: ModelConfig {
                api_key: SecretString::from("sk-ant-test"),
                model: DEFAULT_MODEL.to_string(),
            },
        };

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_model_config_debug_redacts_key() {
        let config = ModelConfig {
            api_key: SecretString::from("sk-ant-super-secret-key"),
            model: DEFAULT_MODEL.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains(DEFAULT_MODEL));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-ant-super-secret-key"));
    }
}
