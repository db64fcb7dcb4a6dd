//! Call tree: one node per dynamic call context, each holding its leaks.
//!
//! Nodes live in an arena (`Vec<CallNode>`) and are created in pre-order, so
//! arena order is document order: parents precede children and siblings
//! keep their child-key order. Lookups by id and the collapse engine rely on
//! that.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};

use crate::model::{CallContext, CallHistory, Leak, LeakKey, LeakKind, SymbolInfo};

/// Process-wide id counter; ids keep growing across rebuilds. Each build
/// reserves one contiguous block so ids follow document order.
static NEXT_CALL_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Arena position of a node inside one [`CallTree`].
pub type NodeIdx = usize;

#[derive(Debug, Clone)]
pub struct CallNode {
    /// Globally unique, stable for the node's lifetime.
    pub id: u64,
    /// Display label derived from the callee.
    pub name: String,
    /// Bare callee function name, used for call paths.
    pub function: String,
    pub context: Option<CallContext>,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub data_leaks: BTreeMap<LeakKey, Leak>,
    pub cf_leaks: BTreeMap<LeakKey, Leak>,
    /// Child keys leading from the raw root to this node's raw record.
    pub raw_path: Vec<String>,
}

impl CallNode {
    fn new(name: String, function: String, parent: Option<NodeIdx>) -> Self {
        Self {
            id: 0,
            name,
            function,
            context: None,
            parent,
            children: Vec::new(),
            data_leaks: BTreeMap::new(),
            cf_leaks: BTreeMap::new(),
            raw_path: Vec::new(),
        }
    }

    pub fn leaks_of(&self, kind: LeakKind) -> &BTreeMap<LeakKey, Leak> {
        match kind {
            LeakKind::Data => &self.data_leaks,
            LeakKind::ControlFlow => &self.cf_leaks,
        }
    }

    fn leaks_of_mut(&mut self, kind: LeakKind) -> &mut BTreeMap<LeakKey, Leak> {
        match kind {
            LeakKind::Data => &mut self.data_leaks,
            LeakKind::ControlFlow => &mut self.cf_leaks,
        }
    }

    /// Data leaks first, then control-flow leaks, each in key order.
    pub fn leaks(&self) -> impl Iterator<Item = &Leak> {
        self.data_leaks.values().chain(self.cf_leaks.values())
    }

    pub fn leaks_mut(&mut self) -> impl Iterator<Item = &mut Leak> {
        self.data_leaks.values_mut().chain(self.cf_leaks.values_mut())
    }

    pub fn leak(&self, key: &LeakKey) -> Option<&Leak> {
        self.leaks_of(key.kind).get(key)
    }

    pub fn leak_mut(&mut self, key: &LeakKey) -> Option<&mut Leak> {
        self.leaks_of_mut(key.kind).get_mut(key)
    }

    pub fn leak_count(&self) -> usize {
        self.data_leaks.len() + self.cf_leaks.len()
    }
}

/// The dynamic call hierarchy. Empty when the dump had no recording.
#[derive(Debug, Clone, Default)]
pub struct CallTree {
    nodes: Vec<CallNode>,
}

impl CallTree {
    /// Build the tree from a raw call history.
    ///
    /// The raw root becomes a leak-free container. Only its first child (in
    /// key order) is followed as the entry chain; everything below it is
    /// materialized depth-first with children visited in ascending key order.
    pub fn build(history: Option<&CallHistory>, symbols: &SymbolInfo) -> Self {
        let mut tree = CallTree::default();
        let Some(root_history) = history else {
            debug!("No call history recorded; call tree is empty");
            return tree;
        };

        tree.nodes.push(CallNode::new("Call Hierarchy".to_string(), String::new(), None));
        let mut stack: Vec<(&CallHistory, NodeIdx, Vec<String>)> = root_history
            .children
            .iter()
            .next()
            .map(|(key, entry)| (entry, 0, vec![key.clone()]))
            .into_iter()
            .collect();
        while let Some((raw, parent, raw_path)) = stack.pop() {
            let Some(context) = raw.context else {
                warn!("Skipping call history node without context at {}", raw_path.join("/"));
                continue;
            };

            let mut node = CallNode::new(
                symbols.context_name(context.callee),
                symbols.function_name(context.callee),
                Some(parent),
            );
            node.context = Some(context);
            for record in &raw.data_leaks {
                let leak = Leak::from_record(LeakKind::Data, record);
                node.data_leaks.insert(leak.key(), leak);
            }
            for record in &raw.cf_leaks {
                let leak = Leak::from_record(LeakKind::ControlFlow, record);
                node.cf_leaks.insert(leak.key(), leak);
            }

            let idx = tree.nodes.len();
            tree.nodes[parent].children.push(idx);
            for (key, child) in raw.children.iter().rev() {
                let mut child_path = raw_path.clone();
                child_path.push(key.clone());
                stack.push((child, idx, child_path));
            }
            node.raw_path = raw_path;
            tree.nodes.push(node);
        }

        let base = NEXT_CALL_NODE_ID.fetch_add(tree.nodes.len() as u64, Ordering::Relaxed);
        for (offset, node) in tree.nodes.iter_mut().enumerate() {
            node.id = base + offset as u64;
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> Option<NodeIdx> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn node(&self, idx: NodeIdx) -> &CallNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIdx) -> &mut CallNode {
        &mut self.nodes[idx]
    }

    pub fn get(&self, idx: NodeIdx) -> Option<&CallNode> {
        self.nodes.get(idx)
    }

    /// All nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &CallNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn leak(&self, idx: NodeIdx, key: &LeakKey) -> Option<&Leak> {
        self.nodes.get(idx).and_then(|n| n.leak(key))
    }

    pub fn leak_mut(&mut self, idx: NodeIdx, key: &LeakKey) -> Option<&mut Leak> {
        self.nodes.get_mut(idx).and_then(|n| n.leak_mut(key))
    }

    /// One past the last descendant of `idx` in document order, so the
    /// subtree occupies `idx..subtree_end(idx)`.
    pub fn subtree_end(&self, idx: NodeIdx) -> NodeIdx {
        let mut last = idx;
        while let Some(&child) = self.nodes[last].children.last() {
            last = child;
        }
        last + 1
    }

    /// First node with `id` in document order, starting at `start` and
    /// wrapping around to the beginning of the tree.
    pub fn find_by_id(&self, id: u64, start: Option<NodeIdx>) -> Option<NodeIdx> {
        let len = self.nodes.len();
        let start = start.filter(|s| *s < len).unwrap_or(0);
        (start..len).chain(0..start).find(|&idx| self.nodes[idx].id == id)
    }

    /// `/`-joined function names from the entry frame down to `idx`.
    pub fn call_path(&self, idx: NodeIdx) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            let node = &self.nodes[current];
            if node.parent.is_none() {
                break;
            }
            names.push(node.function.as_str());
            cursor = node.parent;
        }
        names.reverse();
        names.join("/")
    }
}
