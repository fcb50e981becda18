//! File metadata lookups for target registration.
//!
//! The parser stats each target when it is first registered to decide
//! whether the file exists and, if so, when it changed. The lookup goes
//! through [`FileMetaProvider`] so tests and embedders can supply a fixed
//! view of the filesystem.

use camino::Utf8Path;
use time::OffsetDateTime;

/// Supplies existence and modification-time information for target paths.
pub trait FileMetaProvider {
    /// Whether a file exists at `path`.
    fn exists(&self, path: &Utf8Path) -> bool;

    /// Modification time of the file at `path`, `None` when unavailable.
    fn mtime(&self, path: &Utf8Path) -> Option<OffsetDateTime>;
}

/// [`FileMetaProvider`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileMeta;

impl FileMetaProvider for SystemFileMeta {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }

    fn mtime(&self, path: &Utf8Path) -> Option<OffsetDateTime> {
        let modified = path.as_std_path().metadata().ok()?.modified().ok()?;
        Some(OffsetDateTime::from(modified))
    }
}
