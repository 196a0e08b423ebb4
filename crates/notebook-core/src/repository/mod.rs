//! Repository layer.
//!
//! Translates application intents into one or more remote store calls and
//! normalizes every outcome into the uniform `Result`. Nothing escapes this
//! boundary as a panic; multi-step operations encode the cleanup ordering
//! the remote schema relies on (storage objects before rows).

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::auth::{AuthGateway, AuthSession, SignUpOutcome};
use crate::error::{Error, Result};
use crate::models::{Attachment, Note, NoteChanges, NoteWithAttachments, User};
use crate::store::RemoteStore;

/// Storage key for an attachment payload: `{note_id}/{timestamp}_{file_name}`.
///
/// The timestamp component makes same-name uploads to one note distinct
/// without any remote coordination step.
#[must_use]
pub fn object_path(note_id: &str, timestamp_ms: i64, file_name: &str) -> String {
    format!("{note_id}/{timestamp_ms}_{file_name}")
}

/// Note and attachment operations against the remote store.
pub struct NotesRepository<R> {
    store: R,
    last_upload_ms: AtomicI64,
}

impl<R: RemoteStore> NotesRepository<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            last_upload_ms: AtomicI64::new(0),
        }
    }

    /// All notes owned by `owner_id`, newest first.
    pub async fn notes(&self, owner_id: &str) -> Result<Vec<Note>> {
        self.store.list_notes(owner_id).await
    }

    /// A note joined with its attachments.
    ///
    /// A failing attachment listing degrades to an empty list rather than
    /// failing the whole read; the note itself is the primary payload.
    pub async fn note_with_attachments(&self, note_id: &str) -> Result<NoteWithAttachments> {
        let note = self.store.get_note(note_id).await?;
        let attachments = match self.store.list_attachments(note_id).await {
            Ok(attachments) => attachments,
            Err(error) => {
                tracing::warn!("Failed to list attachments for note {note_id}: {error}");
                Vec::new()
            }
        };
        Ok(NoteWithAttachments { note, attachments })
    }

    /// Persist a draft. Validation happens before any remote call.
    pub async fn create_note(&self, note: &Note) -> Result<Note> {
        note.validate()?;
        self.store.insert_note(note).await
    }

    /// Update a persisted note's title and content.
    pub async fn update_note(&self, note: &Note) -> Result<Note> {
        note.validate()?;
        let id = note
            .id
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Cannot update an unsaved note".to_string()))?;
        self.store.update_note(id, &NoteChanges::from(note)).await
    }

    /// Delete a note and its attachments.
    ///
    /// Storage objects are removed first, best effort: an individual object
    /// deletion failure is logged and skipped, never aborting the note
    /// delete. The note delete itself cascades the attachment rows; if it
    /// fails, the whole operation fails and already-deleted objects stay
    /// gone.
    pub async fn delete_note(&self, note_id: &str) -> Result<()> {
        let attachments = self.store.list_attachments(note_id).await?;
        for attachment in &attachments {
            if let Err(error) = self.store.delete_object(&attachment.file_path).await {
                tracing::warn!(
                    "Failed to delete storage object {}: {error}",
                    attachment.file_path
                );
            }
        }

        self.store.delete_note(note_id).await
    }

    /// Upload an attachment payload and insert its record.
    ///
    /// The parent note must already be persisted; callers enforce that, this
    /// layer only requires a note id. If the record insert fails after a
    /// successful upload the object is left orphaned in storage — accepted,
    /// there is no compensating delete.
    pub async fn upload_attachment(
        &self,
        note_id: &str,
        bytes: &[u8],
        file_name: &str,
        mime_type: Option<&str>,
    ) -> Result<Attachment> {
        if note_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Attachment note_id cannot be empty".to_string(),
            ));
        }

        let file_path = object_path(note_id, self.next_upload_timestamp(), file_name);
        let attachment = Attachment::new(
            note_id,
            file_name,
            &file_path,
            i64::try_from(bytes.len()).unwrap_or(i64::MAX),
            mime_type.map(ToOwned::to_owned),
        )?;

        self.store
            .upload_object(&file_path, bytes, mime_type)
            .await?;
        self.store.insert_attachment(&attachment).await
    }

    /// Delete an attachment's object, then its record.
    ///
    /// A failed object deletion is logged and ignored; the record is removed
    /// regardless, so a stuck object can end up orphaned — accepted.
    pub async fn delete_attachment(&self, attachment: &Attachment) -> Result<()> {
        let id = attachment
            .id
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("Cannot delete an unsaved attachment".to_string()))?;

        if let Err(error) = self.store.delete_object(&attachment.file_path).await {
            tracing::warn!(
                "Failed to delete storage object {}: {error}",
                attachment.file_path
            );
        }

        self.store.delete_attachment(id).await
    }

    /// Public URL for an attachment's storage path.
    #[must_use]
    pub fn attachment_url(&self, file_path: &str) -> String {
        self.store.public_url(file_path)
    }

    /// Millisecond timestamp for storage paths, strictly increasing within
    /// this process so back-to-back uploads never collide.
    fn next_upload_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_upload_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .map_or(now, |last| now.max(last + 1))
    }
}

/// Sign-in/sign-up flows plus the profile row they maintain.
pub struct AuthRepository<A, R> {
    auth: A,
    store: R,
}

impl<A: AuthGateway, R: RemoteStore> AuthRepository<A, R> {
    pub fn new(auth: A, store: R) -> Self {
        Self { auth, store }
    }

    /// Password sign-in, followed by an unconditional profile upsert.
    ///
    /// The upsert keeps the `users` row in step with provider metadata; its
    /// failure is logged and swallowed because the auth success is the
    /// primary signal of success.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self.auth.sign_in(email, password).await?;
        self.upsert_profile(&session).await;
        Ok(session)
    }

    /// Password sign-up; upserts the profile when a session is issued.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let outcome = self.auth.sign_up(email, password).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.upsert_profile(session).await;
        }
        Ok(outcome)
    }

    /// URL starting the Google OAuth redirect flow.
    #[must_use]
    pub fn google_oauth_url(&self, redirect_to: Option<&str>) -> String {
        self.auth.oauth_authorize_url("google", redirect_to)
    }

    /// Sign out the current session, if any.
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.auth.restore_session().await? {
            self.auth.sign_out(&session.access_token).await?;
        }
        Ok(())
    }

    /// Identifier of the signed-in user, if a session is persisted.
    pub fn current_user_id(&self) -> Result<Option<String>> {
        Ok(self.auth.current_user()?.map(|user| user.id))
    }

    /// Fetch a profile row.
    pub async fn user_profile(&self, user_id: &str) -> Result<User> {
        self.store.get_user(user_id).await
    }

    async fn upsert_profile(&self, session: &AuthSession) {
        let user = User::from_provider(
            session.user.id.clone(),
            session.user.email.clone(),
            session.user.display_name.clone(),
            session.user.avatar_url.clone(),
        );
        if let Err(error) = self.store.upsert_user(&user).await {
            tracing::warn!("Profile upsert failed for {}: {error}", user.id);
        }
    }
}
