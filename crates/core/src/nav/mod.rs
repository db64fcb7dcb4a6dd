//! Navigation across leak selections.

pub mod history;

pub use history::{NavigationEntry, NavigationHistory};
