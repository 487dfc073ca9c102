//! Service configuration.
//!
//! Read once at startup. The signing secret has no default: [`AccountConfig::from_env`]
//! fails without `JWT_SECRET`.

use crate::models::ConfigError;
use std::time::Duration;

/// Name of the environment variable holding the token signing secret.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// TTL policy and backend settings for [`crate::RSessionManager`].
#[derive(Clone)]
pub struct AccountConfig {
    pub jwt_secret: String,
    /// Access token lifetime, also the TTL of its active-token index entry.
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// TTL of profile snapshots written by login, profile reads and updates.
    pub profile_ttl: Duration,
    /// TTL of the snapshot and email keys warmed at registration.
    pub registration_cache_ttl: Duration,
    /// Window of the login attempt counter.
    pub rate_window: Duration,
    /// Reject tokens when the active-token index cannot be reached, instead of
    /// falling back to signature and expiry checks.
    pub fail_closed: bool,
    pub redis_url: Option<String>,
    /// Prefix prepended to every Redis key.
    pub redis_prefix: String,
    pub port: u16,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("profile_ttl", &self.profile_ttl)
            .field("registration_cache_ttl", &self.registration_cache_ttl)
            .field("rate_window", &self.rate_window)
            .field("fail_closed", &self.fail_closed)
            .field("redis_url", &self.redis_url)
            .field("redis_prefix", &self.redis_prefix)
            .field("port", &self.port)
            .finish()
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_ttl: Duration::from_secs(60 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            profile_ttl: Duration::from_secs(24 * 60 * 60),
            registration_cache_ttl: Duration::from_secs(10 * 60),
            rate_window: Duration::from_secs(60),
            fail_closed: false,
            redis_url: None,
            redis_prefix: String::new(),
            port: 8080,
        }
    }
}

impl AccountConfig {
    /// Defaults with the given signing secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Self::default()
        }
    }

    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup(JWT_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;

        let defaults = Self::default();
        Ok(Self {
            jwt_secret,
            access_token_ttl: secs(&lookup, "ACCESS_TOKEN_TTL_SECS")?
                .unwrap_or(defaults.access_token_ttl),
            refresh_token_ttl: secs(&lookup, "REFRESH_TOKEN_TTL_SECS")?
                .unwrap_or(defaults.refresh_token_ttl),
            profile_ttl: secs(&lookup, "PROFILE_CACHE_TTL_SECS")?.unwrap_or(defaults.profile_ttl),
            registration_cache_ttl: secs(&lookup, "REGISTRATION_CACHE_TTL_SECS")?
                .unwrap_or(defaults.registration_cache_ttl),
            rate_window: secs(&lookup, "RATE_WINDOW_SECS")?.unwrap_or(defaults.rate_window),
            fail_closed: flag(&lookup, "AUTH_FAIL_CLOSED")?.unwrap_or(defaults.fail_closed),
            redis_url: lookup("REDIS_URL").filter(|s| !s.is_empty()),
            redis_prefix: lookup("R_ACCOUNT_PREFIX").unwrap_or(defaults.redis_prefix),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64>(lookup, name)?.map(Duration::from_secs))
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn secret_is_required() {
        let err = AccountConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(JWT_SECRET_ENV));
    }

    #[test]
    fn defaults_fill_unset_values() {
        let config = AccountConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.access_token_ttl, Duration::from_secs(3600));
        assert_eq!(config.profile_ttl, Duration::from_secs(86400));
        assert_eq!(config.registration_cache_ttl, Duration::from_secs(600));
        assert!(!config.fail_closed);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AccountConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_TTL_SECS", "120"),
            ("AUTH_FAIL_CLOSED", "true"),
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.access_token_ttl, Duration::from_secs(120));
        assert!(config.fail_closed);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = AccountConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("PROFILE_CACHE_TTL_SECS", "a day"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "PROFILE_CACHE_TTL_SECS",
                ..
            }
        ));
    }

    #[test]
    fn debug_redacts_the_secret() {
        let config = AccountConfig::with_secret("hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
