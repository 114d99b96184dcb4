//! Server configuration.
//!
//! [`ServerConfig::default`] suits tests and local development;
//! [`ServerConfig::from_env`] layers `VERSO_*` environment variables on top.

use std::time::Duration;

use thiserror::Error;

/// Default bound on one router dispatch.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted `Content-Length` (8 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Largest request head we buffer before rejecting the request (64 KiB).
pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

const ENV_DEFAULT_VERSION: &str = "VERSO_DEFAULT_VERSION";
const ENV_EXPOSE_INTERNAL_ERRORS: &str = "VERSO_EXPOSE_INTERNAL_ERRORS";
const ENV_REQUEST_TIMEOUT_MS: &str = "VERSO_REQUEST_TIMEOUT_MS";
const ENV_MAX_BODY_BYTES: &str = "VERSO_MAX_BODY_BYTES";

/// A configuration value could not be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Settings shared by the listener and every request it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Version used when neither the URL nor `X-Version` names one.
    pub default_version: Option<u32>,
    /// Forward internal error messages to clients. When off, 500 replies
    /// carry a fixed message and the detail only goes to the log.
    pub expose_internal_errors: bool,
    /// Bound on one router dispatch, body reads included. `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub max_body_bytes: usize,
    pub max_head_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_version: None,
            expose_internal_errors: true,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the `VERSO_*` environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a variable is set but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a variable is set but unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DEFAULT_VERSION) {
            config.default_version = Some(parse(ENV_DEFAULT_VERSION, &raw)?);
        }
        if let Some(raw) = lookup(ENV_EXPOSE_INTERNAL_ERRORS) {
            config.expose_internal_errors = parse_bool(ENV_EXPOSE_INTERNAL_ERRORS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let millis: u64 = parse(ENV_REQUEST_TIMEOUT_MS, &raw)?;
            config.request_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(raw) = lookup(ENV_MAX_BODY_BYTES) {
            config.max_body_bytes = parse(ENV_MAX_BODY_BYTES, &raw)?;
        }

        Ok(config)
    }

    /// Sets the default protocol version.
    #[must_use]
    pub fn default_version(mut self, version: u32) -> Self {
        self.default_version = Some(version);
        self
    }

    #[must_use]
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_owned(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.default_version, None);
        assert!(config.expose_internal_errors);
    }

    #[test]
    fn variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("VERSO_DEFAULT_VERSION", "4"),
            ("VERSO_EXPOSE_INTERNAL_ERRORS", "false"),
            ("VERSO_REQUEST_TIMEOUT_MS", "250"),
            ("VERSO_MAX_BODY_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.default_version, Some(4));
        assert!(!config.expose_internal_errors);
        assert_eq!(config.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn zero_timeout_disables_the_bound() {
        let config =
            ServerConfig::from_lookup(lookup(&[("VERSO_REQUEST_TIMEOUT_MS", "0")])).unwrap();
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = ServerConfig::from_lookup(lookup(&[("VERSO_DEFAULT_VERSION", "v2")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "VERSO_DEFAULT_VERSION", ref value } if value == "v2"
        ));

        assert!(
            ServerConfig::from_lookup(lookup(&[("VERSO_EXPOSE_INTERNAL_ERRORS", "maybe")]))
                .is_err()
        );
    }
}
