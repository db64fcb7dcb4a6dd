//! Symbol archive: line-location metadata, symbols, and the disassembly and
//! source text the editor views show.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;
use crate::model::{Address, SymbolInfo};

/// Per-address line metadata file inside an archive.
pub const IP_INFO_FILE: &str = "ipinfo.json";
/// Image and symbol table file inside an archive.
pub const SYMBOLS_FILE: &str = "allsyms.json";

/// Where an address shows up in disassembly and source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortInfo {
    /// Disassembly file, `<binary>.asm`.
    pub asm_file: String,
    /// Zero-based disassembly line; absent when the address has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asm_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_file: Option<String>,
    /// One-based source line.
    #[serde(default)]
    pub src_line: u32,
}

pub type ShortInfoMap = BTreeMap<Address, ShortInfo>;

/// Read access to an opened archive.
pub trait SymbolArchive {
    /// Text of a file stored in the archive.
    fn read_text(&self, name: &str) -> Result<String, ArchiveError>;

    fn short_info(&self) -> &ShortInfoMap;

    fn symbols(&self) -> &SymbolInfo;
}

/// An archive unpacked into a directory. Absolute file names recorded during
/// analysis are resolved relative to the archive root.
#[derive(Debug, Clone)]
pub struct DirArchive {
    root: PathBuf,
    short_info: ShortInfoMap,
    symbols: SymbolInfo,
}

impl DirArchive {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ArchiveError::NotFound(root));
        }

        let short_info: ShortInfoMap = read_json(&root.join(IP_INFO_FILE))?;
        let symbols: SymbolInfo = read_json(&root.join(SYMBOLS_FILE))?;
        info!(
            "Opened archive {} ({} addresses, {} symbols)",
            root.display(),
            short_info.len(),
            symbols.symbols.len()
        );
        Ok(Self { root, short_info, symbols })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArchiveError> {
    let body = std::fs::read_to_string(path).map_err(|err| ArchiveError::Unreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|err| ArchiveError::Unreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

impl SymbolArchive for DirArchive {
    fn read_text(&self, name: &str) -> Result<String, ArchiveError> {
        std::fs::read_to_string(self.resolve(name))
            .map_err(|_| ArchiveError::MissingFile(name.to_string()))
    }

    fn short_info(&self) -> &ShortInfoMap {
        &self.short_info
    }

    fn symbols(&self) -> &SymbolInfo {
        &self.symbols
    }
}

/// Archive held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    pub files: HashMap<String, String>,
    pub short_info: ShortInfoMap,
    pub symbols: SymbolInfo,
}

impl MemoryArchive {
    pub fn new(short_info: ShortInfoMap, symbols: SymbolInfo) -> Self {
        Self { files: HashMap::new(), short_info, symbols }
    }

    pub fn with_file(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(name.into(), text.into());
        self
    }
}

impl SymbolArchive for MemoryArchive {
    fn read_text(&self, name: &str) -> Result<String, ArchiveError> {
        self.files.get(name).cloned().ok_or_else(|| ArchiveError::MissingFile(name.to_string()))
    }

    fn short_info(&self) -> &ShortInfoMap {
        &self.short_info
    }

    fn symbols(&self) -> &SymbolInfo {
        &self.symbols
    }
}
