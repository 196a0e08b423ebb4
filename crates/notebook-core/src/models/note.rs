//! Note model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::attachment::Attachment;

/// A note row as stored in the remote `notes` table.
///
/// `id` and the timestamps are assigned by the remote store; a freshly
/// drafted note carries `None` for all three until the first successful
/// insert. The owner (`user_id`) never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Server-assigned identifier, absent for drafts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning user's identifier.
    pub user_id: String,
    /// Note title.
    pub title: String,
    /// Note body.
    pub content: String,
    /// Server-assigned creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Server-assigned last-update timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Note {
    /// Create a local draft that has not been persisted yet.
    #[must_use]
    pub fn draft(
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            title: title.into(),
            content: content.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether this note has been persisted to the remote store.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Validate the fields a caller controls, before any remote call.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Note user_id cannot be empty".to_string(),
            ));
        }
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Title and content are required.".to_string(),
            ));
        }
        Ok(())
    }
}

/// The mutable subset of a note sent on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteChanges {
    /// New title.
    pub title: String,
    /// New body.
    pub content: String,
}

impl From<&Note> for NoteChanges {
    fn from(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            content: note.content.clone(),
        }
    }
}

/// A note joined with its attachments, assembled for display. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteWithAttachments {
    /// The note row.
    pub note: Note,
    /// Attachment rows referencing the note.
    pub attachments: Vec<Attachment>,
}

impl NoteWithAttachments {
    /// Wrap a note that has no attachments loaded.
    #[must_use]
    pub const fn bare(note: Note) -> Self {
        Self {
            note,
            attachments: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_has_no_server_fields() {
        let note = Note::draft("user-1", "Groceries", "Milk, eggs");
        assert!(note.id.is_none());
        assert!(note.created_at.is_none());
        assert!(note.updated_at.is_none());
        assert!(!note.is_persisted());
    }

    #[test]
    fn test_validate_rejects_empty_title_or_content() {
        let no_title = Note::draft("user-1", "  ", "body");
        assert!(no_title.validate().is_err());

        let no_content = Note::draft("user-1", "title", "");
        assert!(no_content.validate().is_err());

        let ok = Note::draft("user-1", "title", "body");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_owner() {
        let note = Note::draft("", "title", "body");
        assert!(note.validate().is_err());
    }

    #[test]
    fn test_serialize_skips_absent_server_fields() {
        let note = Note::draft("user-1", "title", "body");
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("created_at").is_none());
        assert_eq!(json["title"], "title");
    }

    #[test]
    fn test_deserialize_wire_row() {
        let json = r#"{
            "id": "abc",
            "user_id": "user-1",
            "title": "t",
            "content": "c",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.id.as_deref(), Some("abc"));
        assert!(note.is_persisted());
    }
}
