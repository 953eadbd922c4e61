//! Core domain types and shared logic for the Folio document store.
//!
//! This crate defines the data model shared by the other crates:
//! - Document identifiers and input sanitising
//! - The version retention policy
//! - Application configuration

pub mod config;
pub mod document;
pub mod error;
pub mod retention;

pub use document::{DocumentId, sanitize_file_name, sanitize_user_id};
pub use error::{Error, Result};
pub use retention::RetentionPolicy;

/// Maximum length of a document ID, in characters.
pub const MAX_DOCUMENT_ID_LEN: usize = 47;

/// Maximum length of a stored display name, in characters.
pub const MAX_FILE_NAME_LEN: usize = 240;

/// Maximum length of a user ID, in characters.
pub const MAX_USER_ID_LEN: usize = 48;

/// Number of versions kept per document unless configured otherwise.
pub const DEFAULT_RETAINED_VERSIONS: u32 = 5;
