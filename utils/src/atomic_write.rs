//! Crash-safe whole-file rewrites.
//!
//! The new content goes to a temp file next to the target, is fsynced, and is then
//! renamed over the target. Readers and restarted processes see the old file or the
//! new one, never a torn write. Where rename cannot replace an existing file, the old
//! file is moved to `<name>.bak` first and [`recover_bak_file`] undoes a crash in
//! that window.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("bak")
}

/// Put `<name>.bak` back in place when the target itself is missing.
pub fn recover_bak_file(path: &Path) {
    let backup = backup_path(path);
    if path.exists() || !backup.exists() {
        return;
    }
    match fs::rename(&backup, path) {
        Ok(()) => tracing::warn!(
            path = %path.display(),
            "Recovered .bak file from interrupted atomic write"
        ),
        Err(e) => tracing::warn!(path = %path.display(), "Failed to recover .bak file: {e}"),
    }
}

/// Replace `path` with whatever `fill` writes.
///
/// If `fill` fails, the temp file is dropped and `path` keeps its old content.
pub fn atomic_write_with<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        fill(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup = backup_path(path);
        let _ = fs::remove_file(&backup);
        fs::rename(path, &backup)?;
        if let Err(retry) = err.file.persist(path) {
            let _ = fs::rename(&backup, path);
            return Err(retry.error);
        }
        if let Err(e) = fs::remove_file(&backup) {
            tracing::warn!(path = %backup.display(), "Failed to remove .bak after atomic write: {e}");
        }
    }

    sync_dir(dir);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(path = %dir.display(), "directory sync failed: {e}");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
