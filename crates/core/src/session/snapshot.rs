use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use super::Session;
use crate::editor::EditorViews;
use crate::error::SaveError;
use crate::persist;

const DEFAULT_DUMP_NAME: &str = "dump.json";

impl<E: EditorViews> Session<E> {
    /// Persist the in-memory state next to the loaded dump (or into `dir`)
    /// as `<name>.<HHMMSS.ffffff>.autosave`. Used when an internal invariant
    /// breaks; the dirty flag is left untouched.
    pub fn write_emergency_snapshot(&mut self, dir: Option<&Path>) -> Result<PathBuf, SaveError> {
        self.sync_dump();
        let base = self
            .source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_DUMP_NAME.to_string());
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => self
                .source_path
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let stamp = Local::now().format("%H%M%S%.6f");
        let path = dir.join(format!("{base}.{stamp}.autosave"));
        persist::save(&path, &self.dump)?;
        info!("Dumped session to {}", path.display());
        Ok(path)
    }
}
