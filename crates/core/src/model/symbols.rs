use serde::{Deserialize, Serialize};

use super::Address;

/// A loaded binary image (executable or shared library).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Full path of the binary as recorded during analysis.
    pub name: String,
    pub lower: Address,
    /// Exclusive upper bound.
    pub upper: Address,
    /// Position-independent images report addresses relative to `lower`.
    #[serde(default)]
    pub dynamic: bool,
}

impl Image {
    pub fn contains(&self, ip: Address) -> bool {
        self.lower <= ip && ip < self.upper
    }

    /// Last path component, used as a display label.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A symbol covering `[address, address + size)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub address: Address,
    #[serde(default)]
    pub size: u64,
    pub name: String,
    #[serde(default = "default_symbol_kind")]
    pub kind: String,
}

fn default_symbol_kind() -> String {
    "FUNC".to_string()
}

impl Symbol {
    fn contains(&self, ip: Address) -> bool {
        let end = self.address.0.saturating_add(self.size.max(1));
        self.address <= ip && ip.0 < end
    }
}

/// Symbol table shipped with the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}

impl SymbolInfo {
    pub fn image_for(&self, ip: Address) -> Option<&Image> {
        self.images.iter().find(|img| img.contains(ip))
    }

    pub fn symbol_for(&self, ip: Address) -> Option<&Symbol> {
        self.symbols.iter().find(|sym| sym.contains(ip))
    }

    /// Offset inside a dynamic image, or the address itself.
    pub fn local_ip(&self, ip: Address) -> u64 {
        match self.image_for(ip) {
            Some(img) if img.dynamic => ip.0 - img.lower.0,
            _ => ip.0,
        }
    }

    /// Display label for a call context entered at `ip`:
    /// `(+off) name(kind)` for dynamic images, `name(kind)` otherwise, and
    /// the hex address when no symbol covers it.
    pub fn context_name(&self, ip: Address) -> String {
        let Some(sym) = self.symbol_for(ip) else {
            return format!("{ip}");
        };
        match self.image_for(ip) {
            Some(img) if img.dynamic => {
                format!("(+{:x}) {}({})", ip.0 - img.lower.0, sym.name, sym.kind)
            }
            _ => format!("{}({})", sym.name, sym.kind),
        }
    }

    /// Bare function name for `ip`, used in call paths.
    pub fn function_name(&self, ip: Address) -> String {
        self.symbol_for(ip).map(|s| s.name.clone()).unwrap_or_else(|| format!("{ip}"))
    }
}
