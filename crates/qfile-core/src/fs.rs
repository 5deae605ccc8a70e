//! Filesystem utilities for blob and scratch directories.

use std::fs;
use std::io;
use std::path::Path;

/// Create `path` and any missing parents, readable only by the current user
/// on Unix.
///
/// Existing directories are left as they are.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or if it
/// cannot be created.
pub fn create_private_dir_all(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

/// Flush a directory entry to disk after a rename into it.
///
/// Best-effort: platforms that cannot open directories are ignored.
pub fn sync_dir(path: &Path) {
    #[cfg(unix)]
    {
        if let Ok(dir) = fs::File::open(path) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
