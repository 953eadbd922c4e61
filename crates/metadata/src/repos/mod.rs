//! Repository traits for metadata operations.

pub mod documents;
pub mod versions;

pub use documents::{DocumentRepo, DocumentTx};
pub use versions::VersionRepo;
