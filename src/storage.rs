//! Durable file output
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::FleetMapError;

/// Replace `path` with `contents`.
///
/// The data goes to a temporary file next to the target, is synced to disk
/// and then renamed over the target, so readers see either the old or the
/// new file, never a truncated one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), FleetMapError> {
    let persist_error = |e: io::Error| FleetMapError::Persist {
        path: path.to_path_buf(),
        origin: e.to_string(),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(persist_error)?;
    file.write_all(contents).map_err(persist_error)?;
    file.as_file().sync_all().map_err(persist_error)?;
    keep_permissions(path, file.as_file()).map_err(persist_error)?;
    file.persist(path).map_err(|e| persist_error(e.error))?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Temporary files are private to the owner; the outputs are meant to be
/// served, so carry over the old file's mode or use a world-readable one.
fn keep_permissions(target: &Path, file: &fs::File) -> io::Result<()> {
    match fs::metadata(target) {
        Ok(meta) => file.set_permissions(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => default_permissions(file),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn default_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
