//! Remote store client.
//!
//! A thin async contract over the backend's relational tables (`notes`,
//! `attachments`, `users`) and its object-storage bucket. Calls map one to
//! one onto network round trips: no caching, no internal retries; retry
//! policy, if any, belongs to the caller.

mod memory;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Attachment, Note, NoteChanges, User};

/// CRUD and object-storage operations against the remote backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Notes owned by `owner_id`, newest first.
    async fn list_notes(&self, owner_id: &str) -> Result<Vec<Note>>;

    /// Fetch a single note by id.
    async fn get_note(&self, id: &str) -> Result<Note>;

    /// Insert a note; the returned row carries the server-assigned id and
    /// timestamps.
    async fn insert_note(&self, note: &Note) -> Result<Note>;

    /// Apply `changes` to the note with `id` and return the updated row.
    async fn update_note(&self, id: &str, changes: &NoteChanges) -> Result<Note>;

    /// Delete a note row; attachment rows cascade remotely.
    async fn delete_note(&self, id: &str) -> Result<()>;

    /// Attachment rows referencing `note_id`.
    async fn list_attachments(&self, note_id: &str) -> Result<Vec<Attachment>>;

    /// Insert an attachment record.
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<Attachment>;

    /// Delete a single attachment record.
    async fn delete_attachment(&self, id: &str) -> Result<()>;

    /// Upload object bytes under `path` in the attachment bucket.
    async fn upload_object(&self, path: &str, bytes: &[u8], mime_type: Option<&str>)
        -> Result<()>;

    /// Delete the object stored under `path`.
    async fn delete_object(&self, path: &str) -> Result<()>;

    /// Public URL for `path`. A pure mapping; no access check is performed.
    fn public_url(&self, path: &str) -> String;

    /// Insert-or-update a profile row keyed by `user.id`.
    async fn upsert_user(&self, user: &User) -> Result<User>;

    /// Fetch a profile row by id.
    async fn get_user(&self, id: &str) -> Result<User>;
}
