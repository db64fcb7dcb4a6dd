//! Filter-aware leak views and severity reconciliation across contexts.
//!
//! A call node reports each leak's own flag. A function aggregate reports
//! the worst flag found across every call context the address occurs in.

use crate::filter::SeverityFilter;
use crate::index::LeakIndex;
use crate::model::{Leak, LeakFlag, LeakKey};
use crate::tree::{CallTree, FunctionRef, LibHierarchy, NodeIdx};

/// Where a leak list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakOwner {
    CallNode(NodeIdx),
    Function(FunctionRef),
}

/// Read-only view over the session structures for one query.
#[derive(Clone, Copy)]
pub struct LeakAggregator<'a> {
    pub tree: &'a CallTree,
    pub libs: &'a LibHierarchy,
    pub index: &'a LeakIndex,
    pub filter: &'a SeverityFilter,
}

impl<'a> LeakAggregator<'a> {
    pub fn new(
        tree: &'a CallTree,
        libs: &'a LibHierarchy,
        index: &'a LeakIndex,
        filter: &'a SeverityFilter,
    ) -> Self {
        Self { tree, libs, index, filter }
    }

    /// Leaks of `node` passing the filter, as `(control_flow, data)`.
    pub fn filtered_leaks(&self, node: NodeIdx) -> (Vec<&'a Leak>, Vec<&'a Leak>) {
        let Some(n) = self.tree.get(node) else {
            return (Vec::new(), Vec::new());
        };
        let keep = |leak: &&Leak| self.filter.is_leak_active(leak);
        let cf = n.cf_leaks.values().filter(keep).collect();
        let data = n.data_leaks.values().filter(keep).collect();
        (cf, data)
    }

    /// Highest normalized leakage among the node's filtered leaks.
    pub fn max_leak_percentage(&self, node: NodeIdx) -> Option<f64> {
        let (cf, data) = self.filtered_leaks(node);
        cf.iter()
            .chain(data.iter())
            .map(|leak| leak.status.max_leak_normalized())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }

    /// Effective flag of the leak `key` as seen from `owner`.
    ///
    /// `None` means unknown: the node lacks the leak, or the aggregate has no
    /// call context holding it.
    pub fn max_priority(&self, owner: LeakOwner, key: &LeakKey) -> Option<LeakFlag> {
        match owner {
            LeakOwner::CallNode(node) => self.tree.leak(node, key).map(Leak::flag),
            LeakOwner::Function(_) => {
                let info = self.index.get(key.ip)?;
                info.call_contexts
                    .iter()
                    .filter_map(|&ctx| self.tree.leak(ctx, key))
                    .map(Leak::flag)
                    .max()
            }
        }
    }

    /// Call contexts of `key` whose own record passes the filter.
    pub fn visible_contexts(&self, key: &LeakKey) -> Vec<NodeIdx> {
        let Some(info) = self.index.get(key.ip) else {
            return Vec::new();
        };
        info.call_contexts
            .iter()
            .copied()
            .filter(|&ctx| {
                self.tree.leak(ctx, key).is_some_and(|leak| self.filter.is_leak_active(leak))
            })
            .collect()
    }

    /// Whether an aggregate leak is shown: some occurrence passes the filter,
    /// or, without occurrences, the address's fallback metadata does.
    pub fn is_aggregate_visible(&self, key: &LeakKey) -> bool {
        match self.index.get(key.ip) {
            Some(info) if info.call_contexts.is_empty() => self.filter.is_active(&info.meta),
            Some(_) => !self.visible_contexts(key).is_empty(),
            None => true,
        }
    }

    /// Visible aggregate leaks of a function, data leaks first.
    pub fn function_leaks(&self, function: FunctionRef) -> Vec<&'a Leak> {
        let Some(f) = self.libs.get_function(function) else {
            return Vec::new();
        };
        f.leaks().filter(|leak| self.is_aggregate_visible(&leak.key())).collect()
    }

    /// Leaks of `owner` passing the filter in list order: data leaks, then
    /// control-flow leaks, each in key order.
    pub fn leak_list(&self, owner: LeakOwner) -> Vec<&'a Leak> {
        match owner {
            LeakOwner::CallNode(node) => {
                let (cf, data) = self.filtered_leaks(node);
                data.into_iter().chain(cf).collect()
            }
            LeakOwner::Function(function) => self.function_leaks(function),
        }
    }
}

/// Render a leakage value as `12.5%`; blank when absent or zero.
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) if v > 0.0 => format!("{:.1}%", v * 100.0),
        _ => String::new(),
    }
}
