//! Core data model: addresses, leak records and their triage metadata.
//!
//! The raw call-history dump (as persisted on disk) lives in [`dump`]; symbol
//! and image information supplied by the archive lives in [`symbols`]. The
//! in-memory trees built from them are in `crate::tree`.

pub mod dump;
pub mod symbols;

pub use dump::{CallContext, CallHistory, LeakDump, LeakRecord, DUMP_FORMAT_VERSION};
pub use symbols::{Image, Symbol, SymbolInfo};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A global instruction address (image base plus offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Error returned when an address string cannot be parsed.
#[derive(Debug, Error)]
#[error("Invalid address '{0}'. Expected hex (0x...) or decimal")]
pub struct ParseAddressError(String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed.map(Address).map_err(|_| ParseAddressError(s.to_string()))
    }
}

/// Triage classification of a leak.
///
/// Variants are declared in ascending severity so the derived `Ord` matches
/// the numeric codes returned by [`LeakFlag::code`]. `Missing` marks leaks
/// that never received metadata and sorts below every real class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakFlag {
    Missing,
    DontCare,
    NoLeak,
    Investigate,
    Leak,
}

impl LeakFlag {
    /// Classes the severity filter can toggle. `Missing` is always visible.
    pub const FILTERABLE: [LeakFlag; 4] =
        [LeakFlag::NoLeak, LeakFlag::Investigate, LeakFlag::Leak, LeakFlag::DontCare];

    /// Numeric severity code.
    pub fn code(self) -> i8 {
        match self {
            LeakFlag::Missing => -1,
            LeakFlag::DontCare => 0,
            LeakFlag::NoLeak => 1,
            LeakFlag::Investigate => 2,
            LeakFlag::Leak => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeakFlag::Missing => "missing",
            LeakFlag::DontCare => "dont_care",
            LeakFlag::NoLeak => "no_leak",
            LeakFlag::Investigate => "investigate",
            LeakFlag::Leak => "leak",
        }
    }
}

impl fmt::Display for LeakFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Invalid flag '{0}'. Allowed: no_leak, investigate, leak, dont_care, missing")]
pub struct ParseFlagError(String);

impl FromStr for LeakFlag {
    type Err = ParseFlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "missing" => Ok(LeakFlag::Missing),
            "dont_care" | "dontcare" => Ok(LeakFlag::DontCare),
            "no_leak" | "noleak" => Ok(LeakFlag::NoLeak),
            "investigate" => Ok(LeakFlag::Investigate),
            "leak" => Ok(LeakFlag::Leak),
            _ => Err(ParseFlagError(s.to_string())),
        }
    }
}

/// Mutable triage state attached to a leak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakMeta {
    pub flag: LeakFlag,
    #[serde(default)]
    pub comment: String,
}

impl Default for LeakMeta {
    fn default() -> Self {
        Self { flag: LeakFlag::Investigate, comment: String::new() }
    }
}

/// Precomputed leakage statistics for one leak. Opaque to the engine apart
/// from the three accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeakStatus {
    #[serde(default)]
    pub max_leak_normalized: f64,
    #[serde(default)]
    pub generic: bool,
    #[serde(default)]
    pub specific: bool,
}

impl LeakStatus {
    /// Normalized leakage in `[0, 1]`.
    pub fn max_leak_normalized(&self) -> f64 {
        self.max_leak_normalized.clamp(0.0, 1.0)
    }

    pub fn is_generic_leak(&self) -> bool {
        self.generic
    }

    pub fn is_specific_leak(&self) -> bool {
        self.specific
    }

    /// Fold another occurrence into this one, keeping the worst case.
    pub fn merge(&mut self, other: &LeakStatus) {
        self.max_leak_normalized = self.max_leak_normalized.max(other.max_leak_normalized);
        self.generic |= other.generic;
        self.specific |= other.specific;
    }
}

/// Leak subtype tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakKind {
    Data,
    ControlFlow,
}

impl LeakKind {
    pub fn label(&self) -> &'static str {
        match self {
            LeakKind::Data => "DataLeak",
            LeakKind::ControlFlow => "CFLeak",
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid leak kind '{0}'. Allowed: data, cf")]
pub struct ParseKindError(String);

impl FromStr for LeakKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "data" | "dataleak" => Ok(LeakKind::Data),
            "cf" | "control_flow" | "controlflow" | "cfleak" => Ok(LeakKind::ControlFlow),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// Stable identity of a logical leak inside one node or function aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeakKey {
    pub kind: LeakKind,
    pub ip: Address,
}

impl LeakKey {
    pub fn new(kind: LeakKind, ip: Address) -> Self {
        Self { kind, ip }
    }
}

/// A data or control-flow leak held by a call node or a function aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Leak {
    pub kind: LeakKind,
    pub ip: Address,
    pub status: LeakStatus,
    /// Created lazily by the correlation pass.
    pub meta: Option<LeakMeta>,
}

impl Leak {
    pub fn from_record(kind: LeakKind, record: &LeakRecord) -> Self {
        Self { kind, ip: record.ip, status: record.status.clone(), meta: record.meta.clone() }
    }

    pub fn key(&self) -> LeakKey {
        LeakKey::new(self.kind, self.ip)
    }

    /// Current flag, `Missing` while no metadata exists.
    pub fn flag(&self) -> LeakFlag {
        self.meta.as_ref().map(|m| m.flag).unwrap_or(LeakFlag::Missing)
    }

    pub fn comment(&self) -> &str {
        self.meta.as_ref().map(|m| m.comment.as_str()).unwrap_or("")
    }

    pub fn meta_mut(&mut self) -> &mut LeakMeta {
        self.meta.get_or_insert_with(LeakMeta::default)
    }

    /// One-line label used in leak lists, e.g. `DataLeak: 0x110`.
    pub fn label(&self, symbols: &SymbolInfo) -> String {
        format!("{}: {:#x}", self.kind.label(), symbols.local_ip(self.ip))
    }
}
