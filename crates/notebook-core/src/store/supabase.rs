//! Supabase-backed [`RemoteStore`] over PostgREST and Storage.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::SupabaseConfig;
use crate::error::{Error, Result};
use crate::models::{Attachment, Note, NoteChanges, User};

use super::RemoteStore;

/// Remote store client for one Supabase project.
///
/// Every request carries the project's `apikey` plus a bearer token: the
/// session access token on clients, the service-role key on the server, or
/// the anon key when neither applies.
#[derive(Clone)]
pub struct SupabaseStore {
    config: SupabaseConfig,
    client: Client,
    bearer: String,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let bearer = config.anon_key().to_string();
        Ok(Self {
            config,
            client: Client::builder().build()?,
            bearer,
        })
    }

    /// Replace the bearer token, e.g. with a session access token after
    /// sign-in or a service-role key on the server.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = token.into();
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.config.rest_url(), table)
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.config.storage_url(),
            self.config.bucket(),
            encode_object_path(path)
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.config.anon_key())
            .bearer_auth(&self.bearer)
    }

    /// Send a PostgREST request expecting rows back.
    async fn fetch_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>> {
        let response = self.authed(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    /// Send a PostgREST request expecting exactly one row back.
    async fn fetch_row<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        missing: impl FnOnce() -> String,
    ) -> Result<T> {
        self.fetch_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(missing()))
    }

    /// Send a request where only the status matters.
    async fn expect_success(&self, request: RequestBuilder) -> Result<()> {
        let response = self.authed(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    async fn list_notes(&self, owner_id: &str) -> Result<Vec<Note>> {
        let owner = eq(owner_id);
        let request = self.client.get(self.table_url("notes")).query(&[
            ("select", "*"),
            ("user_id", owner.as_str()),
            ("order", "created_at.desc"),
        ]);
        self.fetch_rows(request).await
    }

    async fn get_note(&self, id: &str) -> Result<Note> {
        let id_filter = eq(id);
        let request = self
            .client
            .get(self.table_url("notes"))
            .query(&[("select", "*"), ("id", id_filter.as_str())]);
        self.fetch_row(request, || format!("note {id}")).await
    }

    async fn insert_note(&self, note: &Note) -> Result<Note> {
        let request = self
            .client
            .post(self.table_url("notes"))
            .header("Prefer", "return=representation")
            .json(note);
        self.fetch_row(request, || "inserted note row".to_string())
            .await
    }

    async fn update_note(&self, id: &str, changes: &NoteChanges) -> Result<Note> {
        let request = self
            .client
            .patch(self.table_url("notes"))
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(changes);
        self.fetch_row(request, || format!("note {id}")).await
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table_url("notes"))
            .query(&[("id", eq(id))]);
        self.expect_success(request).await
    }

    async fn list_attachments(&self, note_id: &str) -> Result<Vec<Attachment>> {
        let note_filter = eq(note_id);
        let request = self
            .client
            .get(self.table_url("attachments"))
            .query(&[("select", "*"), ("note_id", note_filter.as_str())]);
        self.fetch_rows(request).await
    }

    async fn insert_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
        let request = self
            .client
            .post(self.table_url("attachments"))
            .header("Prefer", "return=representation")
            .json(attachment);
        self.fetch_row(request, || "inserted attachment row".to_string())
            .await
    }

    async fn delete_attachment(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table_url("attachments"))
            .query(&[("id", eq(id))]);
        self.expect_success(request).await
    }

    async fn upload_object(
        &self,
        path: &str,
        bytes: &[u8],
        mime_type: Option<&str>,
    ) -> Result<()> {
        let mut request = self
            .client
            .post(self.object_url(path))
            .body(bytes.to_vec());
        if let Some(mime_type) = mime_type {
            request = request.header("Content-Type", mime_type);
        }
        self.expect_success(request)
            .await
            .map_err(|error| Error::Storage(format!("upload of {path} failed: {error}")))
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        let request = self.client.delete(self.object_url(path));
        self.expect_success(request)
            .await
            .map_err(|error| Error::Storage(format!("delete of {path} failed: {error}")))
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.config.storage_url(),
            self.config.bucket(),
            encode_object_path(path)
        )
    }

    async fn upsert_user(&self, user: &User) -> Result<User> {
        let request = self
            .client
            .post(self.table_url("users"))
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .json(user);
        self.fetch_row(request, || format!("user {}", user.id)).await
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        let id_filter = eq(id);
        let request = self
            .client
            .get(self.table_url("users"))
            .query(&[("select", "*"), ("id", id_filter.as_str())]);
        self.fetch_row(request, || format!("user {id}")).await
    }
}

/// PostgREST equality filter value.
fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Percent-encode an object key, keeping `/` separators.
fn encode_object_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let compact = crate::util::compact_text(body);
    if compact.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact, status.as_u16())
    }
}
