use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::error::AppError;

/// Identity established from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Access-token verification seam; the router only depends on this.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError>;
}

/// Verifies Supabase-issued RS256 access tokens against the project JWKS.
///
/// Keys are cached for `jwks_cache_ttl`; an unknown `kid` inside the TTL is
/// rejected rather than triggering a refetch, so a rotated key is picked up
/// on the next cache expiry.
pub struct SupabaseJwtVerifier {
    client: reqwest::Client,
    config: Arc<AppConfig>,
    cache: RwLock<JwksCache>,
}

impl SupabaseJwtVerifier {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            cache: RwLock::new(JwksCache::default()),
        }
    }

    async fn find_key(&self, kid: &str) -> Result<DecodingKey, AppError> {
        let ttl = self.config.jwks_cache_ttl;
        if let Some(key) = self.cache.read().await.fresh_key(kid, ttl) {
            return Ok(key);
        }

        let mut cache = self.cache.write().await;
        // Another task may have refetched while this one waited on the lock.
        if let Some(key) = cache.fresh_key(kid, ttl) {
            return Ok(key);
        }

        cache.keys = fetch_jwks(&self.client, &self.config.supabase_jwks_url).await?;
        cache.fetched_at = Some(Instant::now());

        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Signing key not found in Supabase JWKS"))
    }
}

#[async_trait]
impl TokenVerifier for SupabaseJwtVerifier {
    async fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let header = decode_header(token).map_err(|error| {
            AppError::unauthorized(format!("Token header decode failed: {}", sanitize(&error)))
        })?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::unauthorized("Token header missing `kid`"))?;

        let key = self.find_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.set_issuer(&[self.config.supabase_jwt_issuer.as_str()]);

        let decoded = decode::<SupabaseClaims>(token, &key, &validation).map_err(|error| {
            AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
        })?;

        if !audience_matches(
            decoded.claims.aud.as_ref(),
            &self.config.supabase_jwt_audience,
        ) {
            return Err(AppError::unauthorized("Token audience is not allowed"));
        }
        if decoded.claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        if decoded.claims.role.as_deref() != Some("authenticated") {
            return Err(AppError::unauthorized("Token role is not allowed"));
        }
        decoded.claims.check_freshness(self.config.auth_clock_skew)?;

        Ok(AuthenticatedUser {
            user_id: decoded.claims.sub,
            email: decoded.claims.email,
        })
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[derive(Default)]
struct JwksCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl JwksCache {
    /// The key for `kid`, only while the cached key set is within `ttl`.
    fn fresh_key(&self, kid: &str, ttl: Duration) -> Option<DecodingKey> {
        let fetched_at = self.fetched_at?;
        if fetched_at.elapsed() > ttl {
            return None;
        }
        self.keys.get(kid).cloned()
    }
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: Option<String>,
    #[serde(rename = "use")]
    use_: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

impl Jwk {
    /// RSA signature keys only; anything else in the document is skipped.
    fn into_signing_key(self) -> Result<Option<(String, DecodingKey)>, AppError> {
        if self.kty.as_deref() != Some("RSA") {
            return Ok(None);
        }
        if self.use_.as_deref().is_some_and(|usage| usage != "sig") {
            return Ok(None);
        }
        let (Some(kid), Some(n), Some(e)) = (self.kid, self.n, self.e) else {
            return Ok(None);
        };

        let key = DecodingKey::from_rsa_components(&n, &e).map_err(|error| {
            AppError::external(format!("Invalid JWKS RSA key: {}", sanitize(&error)))
        })?;
        Ok(Some((kid, key)))
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    aud: Option<Value>,
    role: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
}

impl SupabaseClaims {
    /// Reject expired, future-dated, or not-yet-valid tokens, within
    /// `clock_skew` of tolerance in either direction.
    fn check_freshness(&self, clock_skew: Duration) -> Result<(), AppError> {
        let now = chrono::Utc::now().timestamp();
        let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

        let exp = self
            .exp
            .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
        if exp <= now.saturating_sub(skew) {
            return Err(AppError::unauthorized("Token is expired"));
        }

        let iat = self
            .iat
            .ok_or_else(|| AppError::unauthorized("Token missing `iat` claim"))?;
        if iat > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token `iat` is in the future"));
        }

        if let Some(nbf) = self.nbf {
            if nbf > now.saturating_add(skew) {
                return Err(AppError::unauthorized("Token is not yet valid"));
            }
        }

        Ok(())
    }
}

async fn fetch_jwks(
    client: &reqwest::Client,
    jwks_url: &str,
) -> Result<HashMap<String, DecodingKey>, AppError> {
    let response = client
        .get(jwks_url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|error| {
            AppError::external(format!("JWKS request failed: {}", sanitize(&error)))
        })?;

    if !response.status().is_success() {
        return Err(AppError::external(format!(
            "JWKS request failed with HTTP {}",
            response.status().as_u16()
        )));
    }

    let document = response.json::<JwksDocument>().await.map_err(|error| {
        AppError::external(format!("JWKS JSON parse failed: {}", sanitize(&error)))
    })?;

    let mut keys = HashMap::new();
    for jwk in document.keys {
        if let Some((kid, key)) = jwk.into_signing_key()? {
            keys.insert(kid, key);
        }
    }

    if keys.is_empty() {
        return Err(AppError::external(
            "JWKS did not include any usable RSA signing keys",
        ));
    }

    Ok(keys)
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    match aud {
        Some(Value::String(value)) => value == expected,
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|value| value == expected),
        _ => false,
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_extractor_accepts_standard_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_extractor_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn audience_matches_string_or_array() {
        assert!(audience_matches(
            Some(&Value::String("authenticated".to_string())),
            "authenticated"
        ));
        assert!(audience_matches(
            Some(&Value::Array(vec![
                Value::String("anon".to_string()),
                Value::String("authenticated".to_string())
            ])),
            "authenticated"
        ));
        assert!(!audience_matches(
            Some(&Value::String("anon".to_string())),
            "authenticated"
        ));
    }

    #[test]
    fn claims_freshness_requires_exp_and_iat() {
        let claims = SupabaseClaims {
            sub: "user".to_string(),
            aud: Some(Value::String("authenticated".to_string())),
            role: Some("authenticated".to_string()),
            email: None,
            exp: None,
            iat: None,
            nbf: None,
        };
        let err = claims.check_freshness(Duration::from_secs(60)).unwrap_err();
        assert!(err.to_string().contains("missing `exp`"));
    }

    #[test]
    fn claims_freshness_rejects_future_iat() {
        let now = chrono::Utc::now().timestamp();
        let claims = SupabaseClaims {
            sub: "user".to_string(),
            aud: Some(Value::String("authenticated".to_string())),
            role: Some("authenticated".to_string()),
            email: None,
            exp: Some(now + 300),
            iat: Some(now + 120),
            nbf: None,
        };
        let err = claims.check_freshness(Duration::from_secs(30)).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn non_rsa_and_incomplete_jwks_entries_are_skipped() {
        let ec_key = Jwk {
            kid: Some("ec-1".to_string()),
            kty: Some("EC".to_string()),
            use_: Some("sig".to_string()),
            n: None,
            e: None,
        };
        assert!(ec_key.into_signing_key().unwrap().is_none());

        let missing_kid = Jwk {
            kid: None,
            kty: Some("RSA".to_string()),
            use_: Some("sig".to_string()),
            n: Some("AQAB".to_string()),
            e: Some("AQAB".to_string()),
        };
        assert!(missing_kid.into_signing_key().unwrap().is_none());

        let encryption_key = Jwk {
            kid: Some("enc-1".to_string()),
            kty: Some("RSA".to_string()),
            use_: Some("enc".to_string()),
            n: Some("AQAB".to_string()),
            e: Some("AQAB".to_string()),
        };
        assert!(encryption_key.into_signing_key().unwrap().is_none());
    }
}
