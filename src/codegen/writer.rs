//! Idempotent file writes.

use std::io;
use std::path::Path;

/// Write `contents` to `path` unless the file already holds exactly that.
///
/// Returns whether a write happened. Parent directories are created as needed.
pub async fn write_if_changed(path: &Path, contents: &str) -> io::Result<bool> {
    match tokio::fs::read(path).await {
        Ok(existing) if existing == contents.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(true)
}
