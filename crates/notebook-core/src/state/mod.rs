//! View-state controllers.
//!
//! Observable single-writer slots over [`tokio::sync::watch`]: the
//! repository call path is the only writer, any number of consumers
//! subscribe and re-render on change, last value wins. State is only
//! mutated after the repository reports success; failures set the error
//! slot and leave everything else untouched.

use crate::auth::{AuthGateway, SignUpOutcome};
use crate::models::{Attachment, Note, NoteWithAttachments, User};
use crate::repository::{AuthRepository, NotesRepository};
use crate::store::RemoteStore;

use tokio::sync::watch;

/// A single-writer observable slot.
///
/// `publish` replaces the value unconditionally; `subscribe` hands out a
/// receiver that observes every replacement (coalesced to the latest under
/// load, which is all a renderer needs).
pub struct ValueCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> ValueCell<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            tx: watch::Sender::new(initial),
        }
    }

    /// Replace the current value, waking all subscribers.
    pub fn publish(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Snapshot of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Observe future replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Default> Default for ValueCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Authentication flow state, matched exhaustively by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
    /// The OAuth flow continues in a browser at this URL.
    OAuthRedirect(String),
    SignedOut,
}

/// State for the note list screen.
pub struct NotesController<R> {
    repo: NotesRepository<R>,
    notes: ValueCell<Vec<Note>>,
    loading: ValueCell<bool>,
    error: ValueCell<Option<String>>,
}

impl<R: RemoteStore> NotesController<R> {
    pub fn new(repo: NotesRepository<R>) -> Self {
        Self {
            repo,
            notes: ValueCell::default(),
            loading: ValueCell::default(),
            error: ValueCell::default(),
        }
    }

    pub async fn load_notes(&self, owner_id: &str) {
        self.loading.publish(true);
        self.error.publish(None);

        match self.repo.notes(owner_id).await {
            Ok(notes) => self.notes.publish(notes),
            Err(error) => self.error.publish(Some(error.to_string())),
        }
        self.loading.publish(false);
    }

    pub async fn refresh_notes(&self, owner_id: &str) {
        self.load_notes(owner_id).await;
    }

    #[must_use]
    pub fn notes(&self) -> &ValueCell<Vec<Note>> {
        &self.notes
    }

    #[must_use]
    pub fn loading(&self) -> &ValueCell<bool> {
        &self.loading
    }

    #[must_use]
    pub fn error(&self) -> &ValueCell<Option<String>> {
        &self.error
    }
}

/// State for a single note-edit session.
///
/// One `NoteWithAttachments` slot replaced wholesale, plus loading, error,
/// and save/delete success flags. Attachment add/remove mutate the in-memory
/// set optimistically instead of re-fetching, so the displayed list can
/// trail a concurrent mutation elsewhere.
pub struct NoteDetailController<R> {
    repo: NotesRepository<R>,
    note: ValueCell<Option<NoteWithAttachments>>,
    loading: ValueCell<bool>,
    error: ValueCell<Option<String>>,
    save_success: ValueCell<bool>,
    delete_success: ValueCell<bool>,
}

impl<R: RemoteStore> NoteDetailController<R> {
    pub fn new(repo: NotesRepository<R>) -> Self {
        Self {
            repo,
            note: ValueCell::default(),
            loading: ValueCell::default(),
            error: ValueCell::default(),
            save_success: ValueCell::default(),
            delete_success: ValueCell::default(),
        }
    }

    pub async fn load_note(&self, note_id: &str) {
        self.loading.publish(true);
        self.error.publish(None);

        match self.repo.note_with_attachments(note_id).await {
            Ok(loaded) => self.note.publish(Some(loaded)),
            Err(error) => self.error.publish(Some(error.to_string())),
        }
        self.loading.publish(false);
    }

    pub async fn create_note(&self, note: &Note) {
        self.loading.publish(true);
        self.error.publish(None);

        match self.repo.create_note(note).await {
            Ok(created) => {
                self.note.publish(Some(NoteWithAttachments::bare(created)));
                self.save_success.publish(true);
            }
            Err(error) => {
                self.error.publish(Some(error.to_string()));
                self.save_success.publish(false);
            }
        }
        self.loading.publish(false);
    }

    pub async fn update_note(&self, note: &Note) {
        self.loading.publish(true);
        self.error.publish(None);

        match self.repo.update_note(note).await {
            Ok(updated) => {
                let attachments = self
                    .note
                    .get()
                    .map(|current| current.attachments)
                    .unwrap_or_default();
                self.note.publish(Some(NoteWithAttachments {
                    note: updated,
                    attachments,
                }));
                self.save_success.publish(true);
            }
            Err(error) => {
                self.error.publish(Some(error.to_string()));
                self.save_success.publish(false);
            }
        }
        self.loading.publish(false);
    }

    pub async fn delete_note(&self, note_id: &str) {
        self.loading.publish(true);
        self.error.publish(None);

        match self.repo.delete_note(note_id).await {
            Ok(()) => self.delete_success.publish(true),
            Err(error) => {
                self.error.publish(Some(error.to_string()));
                self.delete_success.publish(false);
            }
        }
        self.loading.publish(false);
    }

    /// Upload a file against the currently loaded note.
    ///
    /// Rejected before any remote call unless the current note is persisted;
    /// on success the attachment is appended to the in-memory set.
    pub async fn upload_attachment(&self, bytes: &[u8], file_name: &str, mime_type: Option<&str>) {
        self.error.publish(None);

        let Some(note_id) = self.note.get().and_then(|current| current.note.id) else {
            self.error
                .publish(Some("Save the note before attaching files".to_string()));
            return;
        };

        match self
            .repo
            .upload_attachment(&note_id, bytes, file_name, mime_type)
            .await
        {
            Ok(attachment) => {
                if let Some(mut current) = self.note.get() {
                    current.attachments.push(attachment);
                    self.note.publish(Some(current));
                }
            }
            Err(error) => self.error.publish(Some(error.to_string())),
        }
    }

    /// Delete an attachment; on success it is filtered out of the in-memory
    /// set.
    pub async fn delete_attachment(&self, attachment: &Attachment) {
        self.error.publish(None);

        match self.repo.delete_attachment(attachment).await {
            Ok(()) => {
                if let Some(mut current) = self.note.get() {
                    current.attachments.retain(|kept| kept.id != attachment.id);
                    self.note.publish(Some(current));
                }
            }
            Err(error) => self.error.publish(Some(error.to_string())),
        }
    }

    #[must_use]
    pub fn note(&self) -> &ValueCell<Option<NoteWithAttachments>> {
        &self.note
    }

    #[must_use]
    pub fn loading(&self) -> &ValueCell<bool> {
        &self.loading
    }

    #[must_use]
    pub fn error(&self) -> &ValueCell<Option<String>> {
        &self.error
    }

    #[must_use]
    pub fn save_success(&self) -> &ValueCell<bool> {
        &self.save_success
    }

    #[must_use]
    pub fn delete_success(&self) -> &ValueCell<bool> {
        &self.delete_success
    }
}

/// State for the authentication screens.
pub struct AuthController<A, R> {
    repo: AuthRepository<A, R>,
    auth_state: ValueCell<AuthState>,
    profile: ValueCell<Option<User>>,
}

impl<A: AuthGateway, R: RemoteStore> AuthController<A, R> {
    pub fn new(repo: AuthRepository<A, R>) -> Self {
        Self {
            repo,
            auth_state: ValueCell::default(),
            profile: ValueCell::default(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) {
        self.auth_state.publish(AuthState::Loading);

        match self.repo.sign_in(email, password).await {
            Ok(session) => {
                self.load_profile(&session.user.id).await;
                self.auth_state.publish(AuthState::Success);
            }
            Err(error) => self.auth_state.publish(AuthState::Error(error.to_string())),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) {
        self.auth_state.publish(AuthState::Loading);

        match self.repo.sign_up(email, password).await {
            Ok(SignUpOutcome::SignedIn(session)) => {
                self.load_profile(&session.user.id).await;
                self.auth_state.publish(AuthState::Success);
            }
            Ok(SignUpOutcome::ConfirmationRequired) => {
                self.auth_state.publish(AuthState::Error(
                    "Check your inbox to confirm the account before signing in".to_string(),
                ));
            }
            Err(error) => self.auth_state.publish(AuthState::Error(error.to_string())),
        }
    }

    /// Publish the browser URL for the Google OAuth redirect flow.
    pub fn sign_in_with_google(&self, redirect_to: Option<&str>) {
        self.auth_state.publish(AuthState::Loading);
        let url = self.repo.google_oauth_url(redirect_to);
        self.auth_state.publish(AuthState::OAuthRedirect(url));
    }

    pub async fn sign_out(&self) {
        if let Err(error) = self.repo.sign_out().await {
            tracing::warn!("Sign-out failed: {error}");
        }
        self.profile.publish(None);
        self.auth_state.publish(AuthState::SignedOut);
    }

    async fn load_profile(&self, user_id: &str) {
        // Auth already succeeded; a missing profile only blanks the slot.
        match self.repo.user_profile(user_id).await {
            Ok(user) => self.profile.publish(Some(user)),
            Err(_) => self.profile.publish(None),
        }
    }

    #[must_use]
    pub fn auth_state(&self) -> &ValueCell<AuthState> {
        &self.auth_state
    }

    #[must_use]
    pub fn profile(&self) -> &ValueCell<Option<User>> {
        &self.profile
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::models::{Attachment, NoteChanges, User};
    use crate::store::{MemoryStore, RemoteStore};

    use super::*;

    /// Store delegating to [`MemoryStore`] but failing note updates, to
    /// exercise the no-partial-mutation guarantee.
    #[derive(Clone)]
    struct UpdateFailsStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl RemoteStore for UpdateFailsStore {
        async fn list_notes(&self, owner_id: &str) -> Result<Vec<Note>> {
            self.inner.list_notes(owner_id).await
        }
        async fn get_note(&self, id: &str) -> Result<Note> {
            self.inner.get_note(id).await
        }
        async fn insert_note(&self, note: &Note) -> Result<Note> {
            self.inner.insert_note(note).await
        }
        async fn update_note(&self, _id: &str, _changes: &NoteChanges) -> Result<Note> {
            Err(Error::Api("connection reset by peer (502)".to_string()))
        }
        async fn delete_note(&self, id: &str) -> Result<()> {
            self.inner.delete_note(id).await
        }
        async fn list_attachments(&self, note_id: &str) -> Result<Vec<Attachment>> {
            self.inner.list_attachments(note_id).await
        }
        async fn insert_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
            self.inner.insert_attachment(attachment).await
        }
        async fn delete_attachment(&self, id: &str) -> Result<()> {
            self.inner.delete_attachment(id).await
        }
        async fn upload_object(
            &self,
            path: &str,
            bytes: &[u8],
            mime_type: Option<&str>,
        ) -> Result<()> {
            self.inner.upload_object(path, bytes, mime_type).await
        }
        async fn delete_object(&self, path: &str) -> Result<()> {
            self.inner.delete_object(path).await
        }
        fn public_url(&self, path: &str) -> String {
            self.inner.public_url(path)
        }
        async fn upsert_user(&self, user: &User) -> Result<User> {
            self.inner.upsert_user(user).await
        }
        async fn get_user(&self, id: &str) -> Result<User> {
            self.inner.get_user(id).await
        }
    }

    #[test]
    fn value_cell_publish_and_observe() {
        let cell = ValueCell::new(0_u32);
        let mut rx = cell.subscribe();
        cell.publish(7);
        assert_eq!(cell.get(), 7);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 7);
    }

    #[tokio::test]
    async fn groceries_scenario_end_to_end() {
        let controller = NoteDetailController::new(NotesRepository::new(MemoryStore::new()));

        controller
            .create_note(&Note::draft("user-1", "Groceries", "Milk, eggs"))
            .await;
        assert!(controller.save_success().get());
        assert_eq!(controller.error().get(), None);

        let current = controller.note().get().expect("note published");
        let id = current.note.id.clone().expect("assigned id");

        controller.load_note(&id).await;
        let loaded = controller.note().get().expect("note reloaded");
        assert_eq!(loaded.note.id.as_deref(), Some(id.as_str()));
        assert_eq!(loaded.note.title, "Groceries");
        assert_eq!(loaded.note.content, "Milk, eggs");
        assert!(loaded.attachments.is_empty());
    }

    #[tokio::test]
    async fn failed_update_leaves_note_state_unchanged() {
        let store = UpdateFailsStore {
            inner: MemoryStore::new(),
        };
        let controller = NoteDetailController::new(NotesRepository::new(store));

        controller
            .create_note(&Note::draft("user-1", "Original", "Before"))
            .await;
        let before = controller.note().get().expect("note published");

        let mut edited = before.note.clone();
        edited.title = "Changed".to_string();
        edited.content = "After".to_string();
        controller.update_note(&edited).await;

        assert_eq!(controller.note().get(), Some(before));
        assert!(!controller.save_success().get());
        assert!(controller.error().get().is_some());
    }

    #[tokio::test]
    async fn draft_upload_is_rejected_before_any_store_call() {
        let store = MemoryStore::new();
        let controller = NoteDetailController::new(NotesRepository::new(store.clone()));

        // No note loaded at all.
        controller.upload_attachment(b"data", "file.txt", None).await;
        assert!(controller.error().get().is_some());
        assert_eq!(store.object_count(), 0);
        assert_eq!(store.attachment_count(), 0);
    }

    #[tokio::test]
    async fn upload_appends_to_in_memory_attachment_set() {
        let store = MemoryStore::new();
        let controller = NoteDetailController::new(NotesRepository::new(store.clone()));

        controller
            .create_note(&Note::draft("user-1", "t", "c"))
            .await;
        controller
            .upload_attachment(b"data", "photo.png", Some("image/png"))
            .await;

        let current = controller.note().get().expect("note present");
        assert_eq!(current.attachments.len(), 1);
        assert_eq!(current.attachments[0].file_name, "photo.png");
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn delete_attachment_filters_in_memory_set() {
        let store = MemoryStore::new();
        let controller = NoteDetailController::new(NotesRepository::new(store.clone()));

        controller
            .create_note(&Note::draft("user-1", "t", "c"))
            .await;
        controller.upload_attachment(b"data", "a.txt", None).await;
        controller.upload_attachment(b"data", "b.txt", None).await;

        let current = controller.note().get().expect("note present");
        let victim = current.attachments[0].clone();
        controller.delete_attachment(&victim).await;

        let after = controller.note().get().expect("note present");
        assert_eq!(after.attachments.len(), 1);
        assert!(after.attachments.iter().all(|kept| kept.id != victim.id));
        assert_eq!(store.attachment_count(), 1);
    }

    #[tokio::test]
    async fn delete_note_sets_success_flag() {
        let controller = NoteDetailController::new(NotesRepository::new(MemoryStore::new()));
        controller
            .create_note(&Note::draft("user-1", "t", "c"))
            .await;
        let id = controller.note().get().unwrap().note.id.unwrap();

        controller.delete_note(&id).await;
        assert!(controller.delete_success().get());
        assert_eq!(controller.error().get(), None);
    }

    #[tokio::test]
    async fn notes_controller_publishes_owner_scoped_list() {
        let store = MemoryStore::new();
        let repo = NotesRepository::new(store.clone());
        repo.create_note(&Note::draft("user-1", "mine", "c"))
            .await
            .unwrap();
        repo.create_note(&Note::draft("user-2", "theirs", "c"))
            .await
            .unwrap();

        let controller = NotesController::new(NotesRepository::new(store));
        controller.load_notes("user-1").await;

        let notes = controller.notes().get();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "mine");
        assert!(!controller.loading().get());
    }
}
