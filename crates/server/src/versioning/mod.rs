//! Version assignment and upload coordination.
//!
//! The [`UploadCoordinator`] is the only writer of document versions. It
//! serializes uploads per document, commits metadata before content and
//! applies the retention window afterwards.

pub mod coordinator;
pub mod error;
pub mod locks;

pub use coordinator::{DownloadTarget, UploadCoordinator, VersionSelector, VersionStatus};
pub use error::{VersioningError, VersioningResult};
pub use locks::{DocumentLockGuard, DocumentLocks};
