//! Loading and saving the annotated call-history dump.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::info;

use crate::error::{LoadError, SaveError};
use crate::model::{LeakDump, DUMP_FORMAT_VERSION};

pub fn load(path: &Path) -> Result<LeakDump, LoadError> {
    let body = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io { path: path.to_path_buf(), source },
    })?;
    let dump: LeakDump = serde_json::from_str(&body)
        .map_err(|source| LoadError::Corrupt { path: path.to_path_buf(), source })?;
    if dump.version != DUMP_FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            found: dump.version,
            supported: DUMP_FORMAT_VERSION,
        });
    }
    info!("Loaded call history from {}", path.display());
    Ok(dump)
}

/// Write `dump` as pretty JSON. The file is replaced atomically: a sibling
/// temp file is written first and then renamed over `path`.
pub fn save(path: &Path, dump: &LeakDump) -> Result<(), SaveError> {
    let body = serde_json::to_string_pretty(dump)?;
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, body).map_err(|source| SaveError::Io { path: tmp.clone(), source })?;
    fs::rename(&tmp, path).map_err(|source| SaveError::Io { path: path.to_path_buf(), source })?;
    info!("Saved call history to {}", path.display());
    Ok(())
}
