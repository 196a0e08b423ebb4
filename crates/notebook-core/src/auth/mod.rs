//! Supabase GoTrue auth client.
//!
//! Password sign-in/sign-up, session refresh/restore, sign-out, and the
//! OAuth authorize URL used for the Google redirect flow. Profile rows are
//! not written here; the repository layer upserts them after auth succeeds.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::SupabaseConfig;

const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Identity and provider metadata for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    /// `full_name` from provider metadata, when present.
    pub display_name: Option<String>,
    /// `avatar_url` from provider metadata, when present.
    pub avatar_url: Option<String>,
}

/// An authenticated session with its tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Outcome of a sign-up attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The project auto-confirms accounts; the user is signed in.
    SignedIn(AuthSession),
    /// Email confirmation is pending; no session yet.
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Session storage error: {0}")]
    SessionStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Durable storage for the current session.
///
/// The platform clients back this with their native secure store; tests and
/// the server use [`MemorySessionStore`].
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Process-local session store.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<AuthSession>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        self.slot
            .lock()
            .map(|slot| slot.clone())
            .map_err(|_| AuthError::SessionStorage("session slot poisoned".to_string()))
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        *self
            .slot
            .lock()
            .map_err(|_| AuthError::SessionStorage("session slot poisoned".to_string()))? =
            Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        *self
            .slot
            .lock()
            .map_err(|_| AuthError::SessionStorage("session slot poisoned".to_string()))? = None;
        Ok(())
    }
}

/// Authentication operations the repository layer depends on.
///
/// [`SupabaseAuthClient`] is the production implementation; tests substitute
/// a canned one so the flows around auth stay exercisable offline.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome>;
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;
    async fn restore_session(&self) -> AuthResult<Option<AuthSession>>;
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;
    fn current_user(&self) -> AuthResult<Option<AuthUser>>;
    fn oauth_authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String;
}

/// GoTrue client bound to one Supabase project.
#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(config: &SupabaseConfig, store: S) -> AuthResult<Self> {
        Ok(Self {
            auth_url: config.auth_url(),
            anon_key: config.anon_key().to_string(),
            client: Client::builder().build()?,
            store,
        })
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// A failed refresh clears the stored session instead of erroring, so a
    /// stale token degrades to the signed-out state.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored.is_expired() {
            return Ok(Some(stored));
        }

        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        match response.into_session()? {
            Some(session) => {
                self.store.save_session(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        // An already-invalid token still counts as signed out.
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        Ok(())
    }

    /// Identity of the persisted session, if any. Does not refresh.
    pub fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        Ok(self.store.load_session()?.map(|session| session.user))
    }

    /// Browser URL starting the OAuth redirect flow for `provider`.
    #[must_use]
    pub fn oauth_authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        let mut url = format!(
            "{}/authorize?provider={}",
            self.auth_url,
            urlencoding::encode(provider)
        );
        if let Some(redirect_to) = redirect_to {
            url.push_str("&redirect_to=");
            url.push_str(&urlencoding::encode(redirect_to));
        }
        url
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<GoTrueResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<GoTrueResponse>().await?)
    }
}

#[async_trait]
impl<S: SessionPersistence> AuthGateway for SupabaseAuthClient<S> {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        Self::sign_up(self, email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        Self::sign_in(self, email, password).await
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        Self::restore_session(self).await
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        Self::sign_out(self, access_token).await
    }

    fn current_user(&self) -> AuthResult<Option<AuthUser>> {
        Self::current_user(self)
    }

    fn oauth_authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        Self::oauth_authorize_url(self, provider, redirect_to)
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

/// Token response from GoTrue; sign-up nests the session one level deeper.
#[derive(Debug, Deserialize)]
struct GoTrueResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<GoTrueUser>,
    session: Option<Box<GoTrueResponse>>,
}

impl GoTrueResponse {
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|s| s.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|s| s.refresh_token.clone()));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|s| s.expires_at))
            .or_else(|| {
                self.expires_in
                    .or_else(|| nested.as_ref().and_then(|s| s.expires_in))
                    .map(|expires_in| unix_timestamp_now().saturating_add(expires_in))
            });
        let user = self
            .user
            .or_else(|| nested.and_then(|s| s.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            // A user without tokens means the account awaits confirmation.
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(value: GoTrueUser) -> Self {
        let metadata_field = |name: &str| {
            value
                .user_metadata
                .as_ref()
                .and_then(|metadata| metadata.get(name))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        };

        Self {
            id: value.id,
            email: value.email,
            display_name: metadata_field("full_name"),
            avatar_url: metadata_field("avatar_url"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GoTrueErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn unix_timestamp_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
        })
}
