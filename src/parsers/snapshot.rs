//! # Database Snapshots
//!
//! Browsers keep their history databases open and locked while running, so sources are
//! never queried in place. A [`Snapshot`] copies the file into a private temporary
//! directory and removes it again when dropped, whatever path the caller exits through.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::parsers::browser::Browser;

/// Copies a source file to a destination path. Injected so tests can simulate failures.
pub trait SnapshotCopier: Send + Sync {
    fn copy(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

/// Plain filesystem copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsCopier;

impl SnapshotCopier for FsCopier {
    fn copy(&self, source: &Path, destination: &Path) -> io::Result<()> {
        std::fs::copy(source, destination).map(|_| ())
    }
}

/// A transient private copy of a history database.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    _dir: TempDir,
}

impl Snapshot {
    /// Copy `source` into a fresh directory named after the process and the browser.
    pub fn create(
        copier: &dyn SnapshotCopier,
        browser: Browser,
        source: &Path,
    ) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("histocarve_{}_{}_", std::process::id(), browser.key()))
            .tempdir()?;
        let path = dir.path().join(format!("{}_history.db", browser.key()));
        copier.copy(source, &path)?;
        Ok(Self { path, _dir: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use std::sync::Mutex;

    #[derive(Default)]
    struct FailingCopier {
        attempted: Mutex<Option<PathBuf>>,
    }

    impl SnapshotCopier for FailingCopier {
        fn copy(&self, _source: &Path, destination: &Path) -> io::Result<()> {
            std::fs::write(destination, b"partial")?;
            *self.attempted.lock().unwrap() = Some(destination.to_path_buf());
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn snapshot_is_removed_on_drop() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("History");
        std::fs::write(&source, b"SQLite format 3\0").expect("write");

        let snapshot = Snapshot::create(&FsCopier, Browser::Chrome, &source).expect("snapshot");
        let copy = snapshot.path().to_path_buf();
        assert!(copy.exists());
        assert_ne!(copy, source);
        let file_name = copy.parent().and_then(|p| p.file_name()).expect("dir name");
        assert!(file_name.to_string_lossy().contains("chrome"));
        drop(snapshot);
        assert!(!copy.exists());
        assert!(source.exists());
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("History");
        std::fs::write(&source, b"data").expect("write");

        let copier = FailingCopier::default();
        let err = Snapshot::create(&copier, Browser::Opera, &source).expect_err("copy fails");
        assert_eq!(err.to_string(), "disk full");
        let attempted = copier.attempted.lock().unwrap().clone().expect("copy attempted");
        assert!(!attempted.exists());
        assert!(!attempted.parent().expect("dir").exists());
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = Snapshot::create(&FsCopier, Browser::Edge, &dir.path().join("nope"))
            .expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
