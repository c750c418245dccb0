use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::ElsaError;

/// Replaces `path` with `contents` through a temporary file in the same directory, so
/// readers never see a partial file. Returns `false` when the file already held
/// exactly `contents` and was left untouched.
pub fn write_atomic(path: &Path, contents: &str) -> Result<bool, ElsaError> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    let dir = path
        .parent()
        .ok_or_else(|| ElsaError::InvalidPath(format!("{} has no parent", path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| ElsaError::Io(err.error))?;
    Ok(true)
}
