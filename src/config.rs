//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::verification::CodeChannel;
use crate::wizard::registry::{DEFAULT_FINISHED_TTL, DEFAULT_IDLE_TTL};

/// Phones that bypass the real code-delivery gateway in development.
pub const DEFAULT_TEST_PHONES: [&str; 3] = ["+79999999999", "+79991111111", "+79990000000"];

/// The only code accepted for a test phone.
pub const DEFAULT_TEST_CODE: &str = "1234";

/// Wizard service configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Base URL of the backend that delivers codes and calculates tariffs.
    pub api_base_url: String,
    /// Origin used when building shareable invite and quote links.
    pub share_base_url: String,
    /// Port the HTTP surface listens on.
    pub listen_port: u16,
    /// Channel used for the first code send.
    pub default_channel: CodeChannel,
    /// Development phones answered locally with `test_code`.
    pub test_phones: Vec<String>,
    pub test_code: String,
    /// Timeout applied to every outgoing backend request.
    pub http_timeout: Duration,
    /// Idle time after which an abandoned wizard is dropped.
    pub session_ttl: Duration,
    /// Grace period for finished wizards and the completion screen.
    pub finished_session_ttl: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            share_base_url: "http://localhost:5173".to_string(),
            listen_port: 8080,
            default_channel: CodeChannel::Sms,
            test_phones: DEFAULT_TEST_PHONES.iter().map(|p| p.to_string()).collect(),
            test_code: DEFAULT_TEST_CODE.to_string(),
            http_timeout: Duration::from_secs(15),
            session_ttl: DEFAULT_IDLE_TTL,
            finished_session_ttl: DEFAULT_FINISHED_TTL,
        }
    }
}

impl WizardConfig {
    /// Build configuration from `PARCEL_WIZARD_*` environment variables.
    ///
    /// Unset variables keep their defaults. Unparseable values are logged
    /// and replaced by the default as well.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_base_url = lookup("PARCEL_WIZARD_API_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let share_base_url = lookup("PARCEL_WIZARD_SHARE_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.share_base_url);

        let listen_port = parse_or_default(
            &lookup,
            "PARCEL_WIZARD_LISTEN_PORT",
            defaults.listen_port,
        );

        let default_channel = parse_or_default(
            &lookup,
            "PARCEL_WIZARD_DEFAULT_CHANNEL",
            defaults.default_channel,
        );

        let test_phones: Vec<String> = match lookup("PARCEL_WIZARD_TEST_PHONES") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.test_phones,
        };

        let test_code = lookup("PARCEL_WIZARD_TEST_CODE").unwrap_or(defaults.test_code);

        let timeout_secs: u64 = parse_or_default(
            &lookup,
            "PARCEL_WIZARD_HTTP_TIMEOUT_SECS",
            defaults.http_timeout.as_secs(),
        );

        let session_ttl_secs: u64 = parse_or_default(
            &lookup,
            "PARCEL_WIZARD_SESSION_TTL_SECS",
            defaults.session_ttl.as_secs(),
        );

        let finished_ttl_secs: u64 = parse_or_default(
            &lookup,
            "PARCEL_WIZARD_FINISHED_TTL_SECS",
            defaults.finished_session_ttl.as_secs(),
        );

        Self {
            api_base_url,
            share_base_url,
            listen_port,
            default_channel,
            test_phones,
            test_code,
            http_timeout: Duration::from_secs(timeout_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
            finished_session_ttl: Duration::from_secs(finished_ttl_secs),
        }
    }

    /// Whether the development test-phone bypass is active.
    pub fn test_phones_enabled(&self) -> bool {
        !self.test_phones.is_empty()
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match parse_value(key, &raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("{}; using default", e);
            default
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = WizardConfig::from_lookup(|_| None);
        assert_eq!(config.api_base_url, "http://127.0.0.1:8000/api");
        assert_eq!(config.share_base_url, "http://localhost:5173");
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.default_channel, CodeChannel::Sms);
        assert_eq!(config.test_phones.len(), 3);
        assert_eq!(config.test_code, "1234");
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.session_ttl, Duration::from_secs(7200));
        assert_eq!(config.finished_session_ttl, Duration::from_secs(600));
        assert!(config.test_phones_enabled());
    }

    #[test]
    fn overrides_are_applied() {
        let config = WizardConfig::from_lookup(lookup_from(&[
            ("PARCEL_WIZARD_API_BASE_URL", "https://api.example.ru/api/"),
            ("PARCEL_WIZARD_LISTEN_PORT", "9090"),
            ("PARCEL_WIZARD_DEFAULT_CHANNEL", "telegram"),
            ("PARCEL_WIZARD_TEST_PHONES", ""),
            ("PARCEL_WIZARD_HTTP_TIMEOUT_SECS", "3"),
            ("PARCEL_WIZARD_SESSION_TTL_SECS", "900"),
            ("PARCEL_WIZARD_FINISHED_TTL_SECS", "30"),
        ]));
        assert_eq!(config.api_base_url, "https://api.example.ru/api");
        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.default_channel, CodeChannel::Telegram);
        assert!(!config.test_phones_enabled());
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(config.session_ttl, Duration::from_secs(900));
        assert_eq!(config.finished_session_ttl, Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = WizardConfig::from_lookup(lookup_from(&[
            ("PARCEL_WIZARD_LISTEN_PORT", "not-a-port"),
            ("PARCEL_WIZARD_DEFAULT_CHANNEL", "pigeon"),
            ("PARCEL_WIZARD_SESSION_TTL_SECS", "-5"),
        ]));
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.session_ttl, Duration::from_secs(7200));
        assert_eq!(config.default_channel, CodeChannel::Sms);
    }

    #[test]
    fn parse_value_reports_key() {
        let err = parse_value::<u16>("PARCEL_WIZARD_LISTEN_PORT", "x").unwrap_err();
        assert!(err.to_string().contains("PARCEL_WIZARD_LISTEN_PORT"));
    }
}
