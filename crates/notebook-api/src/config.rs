use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use notebook_core::config::{SupabaseConfig, DEFAULT_STORAGE_BUCKET};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration for the API server.
///
/// Writes go through the service-role key when one is configured; otherwise
/// the anon key is used and row-level security applies.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub supabase: SupabaseConfig,
    pub service_role_key: Option<String>,
    pub supabase_jwks_url: String,
    pub supabase_jwt_issuer: String,
    pub supabase_jwt_audience: String,
    pub jwks_cache_ttl: Duration,
    pub auth_clock_skew: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("supabase", &self.supabase)
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("supabase_jwks_url", &self.supabase_jwks_url)
            .field("supabase_jwt_issuer", &self.supabase_jwt_issuer)
            .field("supabase_jwt_audience", &self.supabase_jwt_audience)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "NOTEBOOK_API_BIND_ADDR", "127.0.0.1:8080");

        let supabase_url = required_trimmed(&lookup, "SUPABASE_URL")?;
        let supabase_anon_key = required_trimmed(&lookup, "SUPABASE_ANON_KEY")?;
        let bucket = value_or_default(&lookup, "SUPABASE_STORAGE_BUCKET", DEFAULT_STORAGE_BUCKET);
        let supabase = SupabaseConfig::new(supabase_url, supabase_anon_key, bucket)
            .map_err(|error| ConfigError::Invalid(error.to_string()))?;

        let service_role_key = optional_trimmed(&lookup, "SUPABASE_SERVICE_ROLE_KEY");

        let default_jwks = format!("{}/.well-known/jwks.json", supabase.auth_url());
        let supabase_jwks_url = value_or_default(&lookup, "SUPABASE_JWKS_URL", &default_jwks);
        if !supabase_jwks_url.starts_with("http://") && !supabase_jwks_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "SUPABASE_JWKS_URL must start with http:// or https://".to_string(),
            ));
        }

        let supabase_jwt_issuer =
            value_or_default(&lookup, "SUPABASE_JWT_ISSUER", &supabase.auth_url());
        let supabase_jwt_audience =
            value_or_default(&lookup, "SUPABASE_JWT_AUDIENCE", "authenticated");

        let jwks_cache_ttl_secs = value_or_default(&lookup, "SUPABASE_JWKS_CACHE_TTL_SECS", "300")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "SUPABASE_JWKS_CACHE_TTL_SECS must be an integer >= 30".to_string(),
                )
            })?;
        if jwks_cache_ttl_secs < 30 {
            return Err(ConfigError::Invalid(
                "SUPABASE_JWKS_CACHE_TTL_SECS must be >= 30".to_string(),
            ));
        }

        let auth_clock_skew_secs = value_or_default(&lookup, "AUTH_CLOCK_SKEW_SECS", "60")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "AUTH_CLOCK_SKEW_SECS must be an integer in [0, 300]".to_string(),
                )
            })?;
        if auth_clock_skew_secs > 300 {
            return Err(ConfigError::Invalid(
                "AUTH_CLOCK_SKEW_SECS must be in [0, 300]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            supabase,
            service_role_key,
            supabase_jwks_url,
            supabase_jwt_issuer,
            supabase_jwt_audience,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
        })
    }

    /// Bearer token for server-side PostgREST writes.
    #[must_use]
    pub fn write_bearer(&self) -> &str {
        self.service_role_key
            .as_deref()
            .unwrap_or_else(|| self.supabase.anon_key())
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(map: &HashMap<&str, &str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    fn minimum() -> HashMap<&'static str, &'static str> {
        let mut map = HashMap::new();
        map.insert("SUPABASE_URL", "https://project.supabase.co");
        map.insert("SUPABASE_ANON_KEY", "public-anon-key");
        map
    }

    #[test]
    fn config_requires_minimum_secrets() {
        let map: HashMap<&str, &str> = HashMap::new();
        let err = from_map(&map).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));
    }

    #[test]
    fn config_derives_jwks_and_issuer_from_project_url() {
        let config = from_map(&minimum()).unwrap();
        assert_eq!(
            config.supabase_jwks_url,
            "https://project.supabase.co/auth/v1/.well-known/jwks.json"
        );
        assert_eq!(
            config.supabase_jwt_issuer,
            "https://project.supabase.co/auth/v1"
        );
        assert_eq!(config.supabase_jwt_audience, "authenticated");
    }

    #[test]
    fn write_bearer_prefers_service_role_key() {
        let mut map = minimum();
        map.insert("SUPABASE_SERVICE_ROLE_KEY", "sensitive-service-role");
        let config = from_map(&map).unwrap();
        assert_eq!(config.write_bearer(), "sensitive-service-role");

        let without = from_map(&minimum()).unwrap();
        assert_eq!(without.write_bearer(), "public-anon-key");
    }

    #[test]
    fn config_redacts_service_role_key_in_debug() {
        let mut map = minimum();
        map.insert("SUPABASE_SERVICE_ROLE_KEY", "sensitive-service-role");
        let config = from_map(&map).unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-service-role"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
