//! Decides which call-tree subtrees stay expanded under the current filter.

use crate::filter::SeverityFilter;
use crate::tree::{CallTree, NodeIdx};

/// Per-node result of a collapse pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseState {
    active: Vec<bool>,
}

impl CollapseState {
    /// Everything expanded, as after loading a file.
    pub fn expanded(tree: &CallTree) -> Self {
        Self { active: vec![true; tree.len()] }
    }

    /// Whether the node's subtree holds at least one leak passing the filter.
    pub fn has_active_leaks(&self, idx: NodeIdx) -> bool {
        self.active.get(idx).copied().unwrap_or(false)
    }

    /// The root is a container and is always expanded.
    pub fn is_expanded(&self, idx: NodeIdx) -> bool {
        idx == 0 || self.has_active_leaks(idx)
    }
}

/// Bottom-up pass over the whole tree. A node is active when one of its own
/// leaks passes `filter` or any child is active. Returns the root's value and
/// the per-node state.
///
/// Must run after the filter has settled; it reads the filter but never
/// changes it.
pub fn collapse(tree: &CallTree, filter: &SeverityFilter) -> (bool, CollapseState) {
    let mut state = CollapseState { active: vec![false; tree.len()] };
    let Some(root) = tree.root() else {
        return (false, state);
    };
    let active = evaluate_subtree(tree, root, filter, &mut state);
    (active, state)
}

/// Evaluate the subtree rooted at `idx` into `state` and return its value.
///
/// Document order puts every child after its parent, so walking the
/// subtree's arena range backwards visits children before parents.
pub fn evaluate_subtree(
    tree: &CallTree,
    idx: NodeIdx,
    filter: &SeverityFilter,
    state: &mut CollapseState,
) -> bool {
    let end = tree.subtree_end(idx);
    if state.active.len() < tree.len() {
        state.active.resize(tree.len(), false);
    }
    for current in (idx..end).rev() {
        let node = tree.node(current);
        let own = node.leaks().any(|leak| filter.is_leak_active(leak));
        let below = node.children.iter().any(|&child| state.active[child]);
        state.active[current] = own || below;
    }
    state.active[idx]
}
