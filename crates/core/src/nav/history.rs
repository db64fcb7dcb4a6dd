//! Back/forward history of finalized leak selections.

use crate::config::DEFAULT_HISTORY_LIMIT;
use crate::model::{Address, LeakKey, LeakKind};

/// One finalized selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationEntry {
    /// Selected through the call tree (or the context list) rather than the
    /// library tree or an editor.
    pub came_from_call_view: bool,
    pub leak_kind: LeakKind,
    pub leak_address: Address,
    /// Index into the address's call contexts; only set for call-view entries.
    pub context_index: Option<usize>,
}

impl NavigationEntry {
    pub fn from_call_view(key: LeakKey, context_index: usize) -> Self {
        Self {
            came_from_call_view: true,
            leak_kind: key.kind,
            leak_address: key.ip,
            context_index: Some(context_index),
        }
    }

    pub fn from_library_view(key: LeakKey) -> Self {
        Self {
            came_from_call_view: false,
            leak_kind: key.kind,
            leak_address: key.ip,
            context_index: None,
        }
    }

    pub fn key(&self) -> LeakKey {
        LeakKey::new(self.leak_kind, self.leak_address)
    }
}

/// Linear undo/redo list. Recording after going back discards the forward
/// branch.
#[derive(Debug, Clone)]
pub struct NavigationHistory {
    entries: Vec<NavigationEntry>,
    cursor: Option<usize>,
    limit: usize,
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl NavigationHistory {
    /// A limit of zero is treated as one.
    pub fn with_limit(limit: usize) -> Self {
        Self { entries: Vec::new(), cursor: None, limit: limit.max(1) }
    }

    pub fn record(&mut self, entry: NavigationEntry) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(entry);
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn back(&mut self) -> Option<NavigationEntry> {
        let cursor = self.cursor.filter(|&c| c > 0)?;
        self.cursor = Some(cursor - 1);
        self.current()
    }

    pub fn forward(&mut self) -> Option<NavigationEntry> {
        let cursor = self.cursor.filter(|&c| c + 1 < self.entries.len())?;
        self.cursor = Some(cursor + 1);
        self.current()
    }

    pub fn current(&self) -> Option<NavigationEntry> {
        self.cursor.and_then(|c| self.entries.get(c)).copied()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }
}
