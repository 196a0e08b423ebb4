//! Supabase project configuration.
//!
//! Explicitly constructed and passed to the store and repositories; there is
//! deliberately no lazily-initialized global client instance.

use std::env;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const ENV_URL: &str = "SUPABASE_URL";
const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_BUCKET: &str = "SUPABASE_STORAGE_BUCKET";

/// Bucket holding note attachment payloads.
pub const DEFAULT_STORAGE_BUCKET: &str = "note-attachments";

/// Public project endpoint configuration.
///
/// Only safe-to-ship values: the project URL and the anonymous API key. A
/// service-role key, when one is used server-side, travels separately as a
/// bearer token and is never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    url: String,
    anon_key: String,
    bucket: String,
}

impl SupabaseConfig {
    /// Build a validated configuration.
    pub fn new(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let url = normalize_text_option(Some(url.into())).ok_or_else(|| {
            Error::InvalidConfiguration("Supabase URL must not be empty".to_string())
        })?;
        if !is_http_url(&url) {
            return Err(Error::InvalidConfiguration(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }

        let anon_key = normalize_text_option(Some(anon_key.into())).ok_or_else(|| {
            Error::InvalidConfiguration("Supabase anon key must not be empty".to_string())
        })?;
        let bucket = normalize_text_option(Some(bucket.into())).ok_or_else(|| {
            Error::InvalidConfiguration("Storage bucket must not be empty".to_string())
        })?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            bucket,
        })
    }

    /// Load configuration from `SUPABASE_URL`, `SUPABASE_ANON_KEY`, and the
    /// optional `SUPABASE_STORAGE_BUCKET` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = normalize_text_option(lookup(ENV_URL))
            .ok_or_else(|| Error::InvalidConfiguration(format!("{ENV_URL} is required")))?;
        let anon_key = normalize_text_option(lookup(ENV_ANON_KEY))
            .ok_or_else(|| Error::InvalidConfiguration(format!("{ENV_ANON_KEY} is required")))?;
        let bucket = normalize_text_option(lookup(ENV_BUCKET))
            .unwrap_or_else(|| DEFAULT_STORAGE_BUCKET.to_string());

        Self::new(url, anon_key, bucket)
    }

    /// Project base URL, without a trailing slash.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Anonymous API key sent with every request.
    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Attachment storage bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// PostgREST endpoint root.
    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    /// GoTrue auth endpoint root.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url)
    }

    /// Object storage endpoint root.
    #[must_use]
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.url)
    }
}
