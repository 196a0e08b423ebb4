//! In-memory [`RemoteStore`] implementation.
//!
//! Mirrors the remote schema closely enough to exercise the repository and
//! view-state layers without a network: server-assigned ids (UUID v7, so
//! creation order is recoverable), RFC 3339 timestamps, and the cascade
//! delete from notes to attachment rows. Object payloads live in a map keyed
//! by storage path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Attachment, Note, NoteChanges, User};

use super::RemoteStore;

#[derive(Default)]
struct Inner {
    notes: HashMap<String, Note>,
    attachments: HashMap<String, Attachment>,
    users: HashMap<String, User>,
    objects: HashMap<String, Vec<u8>>,
}

/// Process-local store used by tests and local development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored object payloads.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Whether a payload exists under `path`.
    #[must_use]
    pub fn has_object(&self, path: &str) -> bool {
        self.lock().objects.contains_key(path)
    }

    /// Number of attachment rows across all notes.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.lock().attachments.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only happens after a panic in another test thread.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_notes(&self, owner_id: &str) -> Result<Vec<Note>> {
        let inner = self.lock();
        let mut notes: Vec<Note> = inner
            .notes
            .values()
            .filter(|note| note.user_id == owner_id)
            .cloned()
            .collect();
        // created_at descending; UUID v7 ids break ties in creation order.
        notes.sort_by(|a, b| (&b.created_at, &b.id).cmp(&(&a.created_at, &a.id)));
        Ok(notes)
    }

    async fn get_note(&self, id: &str) -> Result<Note> {
        self.lock()
            .notes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("note {id}")))
    }

    async fn insert_note(&self, note: &Note) -> Result<Note> {
        let mut stored = note.clone();
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        stored.id = Some(id.clone());
        stored.created_at = Some(now.clone());
        stored.updated_at = Some(now);

        self.lock().notes.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_note(&self, id: &str, changes: &NoteChanges) -> Result<Note> {
        let mut inner = self.lock();
        let note = inner
            .notes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("note {id}")))?;
        note.title.clone_from(&changes.title);
        note.content.clone_from(&changes.content);
        note.updated_at = Some(Utc::now().to_rfc3339());
        Ok(note.clone())
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.notes.remove(id).is_none() {
            return Err(Error::NotFound(format!("note {id}")));
        }
        // Cascade: attachment rows go with the note, unconditionally.
        inner
            .attachments
            .retain(|_, attachment| attachment.note_id != id);
        Ok(())
    }

    async fn list_attachments(&self, note_id: &str) -> Result<Vec<Attachment>> {
        let inner = self.lock();
        let mut attachments: Vec<Attachment> = inner
            .attachments
            .values()
            .filter(|attachment| attachment.note_id == note_id)
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(attachments)
    }

    async fn insert_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
        let mut inner = self.lock();
        if !inner.notes.contains_key(attachment.note_id.as_str()) {
            return Err(Error::Api(format!(
                "foreign key violation: note {} does not exist (409)",
                attachment.note_id
            )));
        }

        let mut stored = attachment.clone();
        let id = Uuid::now_v7().to_string();
        stored.id = Some(id.clone());
        stored.created_at = Some(Utc::now().to_rfc3339());
        inner.attachments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_attachment(&self, id: &str) -> Result<()> {
        if self.lock().attachments.remove(id).is_none() {
            return Err(Error::NotFound(format!("attachment {id}")));
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        path: &str,
        bytes: &[u8],
        _mime_type: Option<&str>,
    ) -> Result<()> {
        self.lock().objects.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        if self.lock().objects.remove(path).is_none() {
            return Err(Error::Storage(format!("object {path} does not exist")));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://note-attachments/{path}")
    }

    async fn upsert_user(&self, user: &User) -> Result<User> {
        let mut inner = self.lock();
        let now = Utc::now().to_rfc3339();
        let mut stored = user.clone();
        match inner.users.get(&user.id) {
            Some(existing) => {
                stored.created_at.clone_from(&existing.created_at);
                stored.updated_at = Some(now);
            }
            None => {
                stored.created_at = Some(now.clone());
                stored.updated_at = Some(now);
            }
        }
        inner.users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        self.lock()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }
}
