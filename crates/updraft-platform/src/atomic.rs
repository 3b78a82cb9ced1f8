//! Crash-safe whole-file writes: temp file in the destination directory, then rename.
//!
//! The target is either absent, the old version, or the new version; never a partial write.

use std::{io, path::Path};

/// Write `data` to `dest` atomically. Creates the parent directory if needed.
///
/// Blocking; call from a blocking context.
///
/// # Errors
///
/// Returns an error if the temp file cannot be created, written, or renamed over `dest`.
pub fn write_atomic(dest: &Path, data: &[u8]) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::other("atomic write: destination has no parent directory"))?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    io::Write::write_all(&mut tmp, data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
