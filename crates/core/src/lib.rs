//! leakscope-core
//!
//! Correlation and navigation engine for side-channel leak reports.
//!
//! A recorded call hierarchy annotated with data and control-flow leaks is
//! turned into a call tree, flattened into a per-library view, and
//! correlated with the disassembly and source lines of a symbol archive.
//! On top of that sit severity filtering, subtree collapsing, worst-case
//! flag aggregation across call contexts and a back/forward history of leak
//! selections.
//!
//! Frontends drive everything through [`session::Session`].

pub mod aggregate;
pub mod archive;
pub mod config;
pub mod editor;
pub mod error;
pub mod filter;
pub mod index;
pub mod model;
pub mod nav;
pub mod persist;
pub mod session;
pub mod tree;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
