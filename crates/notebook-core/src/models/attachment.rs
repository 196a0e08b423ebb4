//! Attachment model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An attachment row referencing a persisted note.
///
/// The binary payload lives in object storage under `file_path`; this row
/// only carries metadata. Attachments are created after their parent note is
/// persisted and never outlive it in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Server-assigned identifier, absent until inserted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Parent note identifier.
    pub note_id: String,
    /// Original file name.
    pub file_name: String,
    /// Object storage key, `{note_id}/{timestamp}_{file_name}`.
    pub file_path: String,
    /// Payload size in bytes.
    pub file_size: i64,
    /// Content MIME type, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Server-assigned creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Attachment {
    /// Build a new attachment record for insertion.
    pub fn new(
        note_id: impl Into<String>,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        file_size: i64,
        mime_type: Option<String>,
    ) -> Result<Self> {
        let note_id = note_id.into().trim().to_string();
        let file_name = file_name.into().trim().to_string();
        let file_path = file_path.into().trim().to_string();

        if note_id.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment note_id cannot be empty".to_string(),
            ));
        }
        if file_name.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment file_name cannot be empty".to_string(),
            ));
        }
        if file_path.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment file_path cannot be empty".to_string(),
            ));
        }
        if file_size < 0 {
            return Err(Error::InvalidInput(
                "Attachment file_size cannot be negative".to_string(),
            ));
        }

        Ok(Self {
            id: None,
            note_id,
            file_name,
            file_path,
            file_size,
            mime_type: mime_type
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            created_at: None,
        })
    }
}
