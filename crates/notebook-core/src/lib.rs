//! notebook-core - Core library for Notebook
//!
//! This crate contains the shared models, the remote store client, the
//! repository layer, and the view-state controllers used by every Notebook
//! surface (API server, desktop, mobile).

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod state;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{Attachment, Note, NoteWithAttachments, User};
