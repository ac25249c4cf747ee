//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DAILY_DISH_REMOTE_URL` - Base URL of the remote document store
//! - `DAILY_DISH_REMOTE_API_KEY` - Bearer token for the remote store (high entropy)
//! - `DAILY_DISH_SMTP_HOST` - SMTP relay hostname
//! - `DAILY_DISH_SMTP_USERNAME` - SMTP username
//! - `DAILY_DISH_SMTP_PASSWORD` - SMTP password (high entropy)
//! - `DAILY_DISH_SMTP_FROM` - From address for outbound codes
//!
//! ## Optional
//! - `DAILY_DISH_LOCAL_PATH` - Local store file (default: daily_dish_state.json)
//! - `DAILY_DISH_LOCAL_QUOTA_BYTES` - Local store byte quota (default: 5 MiB)
//! - `DAILY_DISH_SMTP_PORT` - SMTP port (default: 587)
//! - `DAILY_DISH_CHALLENGE_TTL_MINUTES` - Passcode lifetime (default: 10)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default local store quota, sized like a browser origin quota.
const DEFAULT_LOCAL_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Default passcode lifetime in minutes.
const DEFAULT_CHALLENGE_TTL_MINUTES: u64 = 10;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Remote document store connection.
    pub remote: RemoteStoreConfig,
    /// Local fallback store location and quota.
    pub local: LocalStoreConfig,
    /// SMTP relay for passcode delivery.
    pub smtp: SmtpConfig,
    /// Passcode lifetime.
    pub challenge_ttl: Duration,
}

/// Remote document store configuration.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// Base URL documents are addressed under.
    pub base_url: Url,
    /// Bearer token (secret).
    pub api_key: SecretString,
}

/// Local fallback store configuration.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    /// Store file path.
    pub path: PathBuf,
    /// Byte quota; exceeding it is fatal for the session.
    pub quota_bytes: usize,
}

/// SMTP relay configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay hostname.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Username.
    pub username: String,
    /// Password (secret).
    pub password: SecretString,
    /// From address on outbound mail.
    pub from_address: String,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid,
    /// or if secrets fail validation (placeholder detection, entropy
    /// check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let remote = RemoteStoreConfig::from_env()?;
        let local = LocalStoreConfig::from_env()?;
        let smtp = SmtpConfig::from_env()?;

        let ttl_minutes = get_env_or_default(
            "DAILY_DISH_CHALLENGE_TTL_MINUTES",
            &DEFAULT_CHALLENGE_TTL_MINUTES.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("DAILY_DISH_CHALLENGE_TTL_MINUTES".to_string(), e.to_string())
        })?;

        Ok(Self {
            remote,
            local,
            smtp,
            challenge_ttl: Duration::from_secs(ttl_minutes * 60),
        })
    }
}

impl RemoteStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_required_env("DAILY_DISH_REMOTE_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DAILY_DISH_REMOTE_URL".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            api_key: get_validated_secret("DAILY_DISH_REMOTE_API_KEY")?,
        })
    }
}

impl LocalStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let path = PathBuf::from(get_env_or_default(
            "DAILY_DISH_LOCAL_PATH",
            "daily_dish_state.json",
        ));
        let quota_bytes = get_env_or_default(
            "DAILY_DISH_LOCAL_QUOTA_BYTES",
            &DEFAULT_LOCAL_QUOTA_BYTES.to_string(),
        )
        .parse::<usize>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("DAILY_DISH_LOCAL_QUOTA_BYTES".to_string(), e.to_string())
        })?;

        Ok(Self { path, quota_bytes })
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = get_env_or_default("DAILY_DISH_SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DAILY_DISH_SMTP_PORT".to_string(), e.to_string())
            })?;

        Ok(Self {
            host: get_required_env("DAILY_DISH_SMTP_HOST")?,
            port,
            username: get_required_env("DAILY_DISH_SMTP_USERNAME")?,
            password: get_validated_secret("DAILY_DISH_SMTP_PASSWORD")?,
            from_address: get_required_env("DAILY_DISH_SMTP_FROM")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        // High-entropy random string
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SmtpConfig {
            host: "smtp.example.net".to_string(),
            port: 587,
            username: "codes@dailydish.app".to_string(),
            password: SecretString::from("super_secret_smtp_password"),
            from_address: "codes@dailydish.app".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.example.net"));
        assert!(!debug_output.contains("super_secret_smtp_password"));
    }
}
