//! Data models shared across the notes sync core.

mod attachment;
mod note;
mod user;

pub use attachment::Attachment;
pub use note::{Note, NoteChanges, NoteWithAttachments};
pub use user::User;
