//! In-memory trees built from a loaded dump, and the collapse engine that
//! decides which call-tree subtrees stay expanded under the current filter.

pub mod call;
pub mod collapse;
pub mod library;

pub use call::{CallNode, CallTree, NodeIdx};
pub use collapse::{collapse, CollapseState};
pub use library::{FunctionLeak, FunctionRef, LibHierarchy, LibNode, Library};
