//! Selection resolver: turns clicks on trees, leak lists, context lists and
//! editor lines into a consistent selection, and records it in the history.

use log::{debug, error};

use super::Session;
use crate::aggregate::LeakOwner;
use crate::editor::{EditorAnchor, EditorViews, Marker, ViewKind};
use crate::model::{Address, CallContext, LeakFlag, LeakKey, LeakMeta};
use crate::nav::NavigationEntry;
use crate::tree::{collapse, FunctionRef, LibNode, NodeIdx};

/// Outcome of a selection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A concrete call-context leak is selected.
    Resolved { node: NodeIdx, key: LeakKey },
    /// Several visible contexts; the user has to pick one.
    Ambiguous(Vec<ContextChoice>),
    /// The leak is hidden by the current filter.
    Filtered,
    /// Nothing selectable at the given position.
    Invalid,
}

/// One entry of the disambiguation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChoice {
    pub node: NodeIdx,
    pub path: String,
    pub flag: LeakFlag,
}

/// One row of the leak list.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakListItem {
    pub key: LeakKey,
    pub label: String,
    /// Own flag for call nodes, worst flag across contexts for functions.
    pub flag: Option<LeakFlag>,
    pub leakage: f64,
}

impl<E: EditorViews> Session<E> {
    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("Status: {message}");
        self.view.status = Some(message);
    }

    /// Rebuild the leak list for `owner` and refresh the margin markers of
    /// its rows.
    fn show_leak_list(&mut self, owner: LeakOwner) {
        let items: Vec<LeakListItem> = {
            let agg = self.aggregator();
            agg.leak_list(owner)
                .into_iter()
                .map(|leak| LeakListItem {
                    key: leak.key(),
                    label: leak.label(&self.symbols),
                    flag: agg.max_priority(owner, &leak.key()),
                    leakage: leak.status.max_leak_normalized(),
                })
                .collect()
        };
        for item in &items {
            if let Some(flag) = item.flag {
                self.mark_address(item.key.ip, Marker::Flag(flag));
            }
        }
        self.view.owner = Some(owner);
        self.view.leak_list = items;
    }

    fn mark_address(&mut self, address: Address, marker: Marker) {
        let Some(info) = self.index.get(address) else {
            return;
        };
        for anchor in [info.asm, info.src].into_iter().flatten() {
            self.editor.mark_line(anchor.view, anchor.line, marker);
        }
    }

    /// Jump both editors to `address`, or to the empty placeholder for
    /// missing anchors. Returns the owning function.
    fn focus_address(&mut self, address: Address) -> Option<FunctionRef> {
        let (asm, src, owner) = match self.index.get(address) {
            Some(info) => (info.asm, info.src, info.owning_function),
            None => (None, None, None),
        };
        self.editor.focus(ViewKind::Disassembly, asm);
        self.editor.focus(ViewKind::Source, src);
        owner
    }

    fn is_listed(&self, key: LeakKey) -> bool {
        self.view.leak_list.iter().any(|item| item.key == key)
    }

    /// First listed leak at `address`; data leaks come before control-flow
    /// leaks in every list.
    fn first_listed_at(&self, address: Address) -> Option<LeakKey> {
        self.view.leak_list.iter().find(|item| item.key.ip == address).map(|item| item.key)
    }

    /// Whether the record of `key` held by `node` passes the filter.
    fn is_context_visible(&self, node: NodeIdx, key: &LeakKey) -> bool {
        self.tree.leak(node, key).is_some_and(|leak| self.filter.is_leak_active(leak))
    }

    fn report_filtered(&mut self) -> Selection {
        debug!("Selected leak is filtered");
        self.set_status("Selected leak is filtered!");
        Selection::Filtered
    }

    /// Select a call-tree node by id.
    pub fn click_call_node(&mut self, id: u64) -> bool {
        let Some(node) = self.tree.find_by_id(id, self.view.selected_node) else {
            debug!("[CallView] Clicked: invalid id {id}");
            self.set_status("Invalid call tree position");
            return false;
        };
        self.view.came_from_call_view = true;
        self.view.selected_node = Some(node);
        self.view.selected_function = None;
        self.view.selected_leak = None;
        self.show_leak_list(LeakOwner::CallNode(node));
        self.go_to_callee();
        true
    }

    /// Select a library-tree entry by id. Libraries only change the
    /// highlighted row; functions list their aggregate leaks.
    pub fn click_function(&mut self, id: u64) -> bool {
        let start = self.view.selected_function.map(LibNode::Function);
        match self.libs.find_by_id(id, start) {
            Some(LibNode::Function(function)) => {
                self.view.came_from_call_view = false;
                self.view.selected_function = Some(function);
                self.view.selected_node = None;
                self.view.selected_leak = None;
                self.show_leak_list(LeakOwner::Function(function));
                true
            }
            Some(LibNode::Library(li)) => {
                debug!("[LibView] Clicked: library {}", self.libs.libraries[li].short_name());
                true
            }
            None => {
                debug!("[LibView] Clicked: invalid id {id}");
                self.set_status("Invalid library tree position");
                false
            }
        }
    }

    /// Select a leak from the current leak list.
    pub fn click_leak(&mut self, key: LeakKey) -> Selection {
        if !self.is_listed(key) {
            debug!("[LeakView] Clicked: {} {} not in leak list", key.kind.label(), key.ip);
            self.set_status("Leak is not in the current list");
            return Selection::Invalid;
        }
        self.record_selection(key);
        self.resolve(Some(key))
    }

    /// Select a leak of the current list by row.
    pub fn click_leak_row(&mut self, row: usize) -> Selection {
        match self.view.leak_list.get(row).map(|item| item.key) {
            Some(key) => self.click_leak(key),
            None => {
                debug!("[LeakView] Clicked: invalid row {row}");
                self.set_status("Leak is not in the current list");
                Selection::Invalid
            }
        }
    }

    /// Select the leak shown at an editor line.
    pub fn click_editor(&mut self, kind: ViewKind, anchor: EditorAnchor) -> Selection {
        let Some(address) = self.index.address_at(kind, anchor) else {
            debug!("[{kind:?}] Clicked line {} without leak", anchor.line);
            self.set_status("No leak at this line");
            return Selection::Invalid;
        };
        self.view.came_from_call_view = false;
        let Some(function) = self.index.get(address).and_then(|info| info.owning_function) else {
            return Selection::Invalid;
        };
        self.view.selected_function = Some(function);
        self.show_leak_list(LeakOwner::Function(function));
        let key = self.first_listed_at(address);
        let selection = self.resolve(key);
        if let Selection::Resolved { key, .. } = selection {
            self.record_selection(key);
        }
        selection
    }

    /// Finalize a disambiguation choice.
    pub fn choose_context(&mut self, choice: usize) -> Selection {
        let (Some(pending), Some(node)) =
            (self.view.pending_leak, self.view.context_choices.get(choice).map(|c| c.node))
        else {
            debug!("[CallList] Clicked: invalid index {choice}");
            self.set_status("Invalid context choice");
            return Selection::Invalid;
        };
        self.view.came_from_call_view = true;
        self.view.selected_node = Some(node);
        self.show_leak_list(LeakOwner::CallNode(node));
        if !self.view.leak_list.iter().any(|item| item.key == pending) {
            debug!("[CallList] Leak is empty. Try to refresh views");
            self.set_status("Selected leak is not available in this context");
            return Selection::Invalid;
        }
        self.view.selected_function = self.focus_address(pending.ip);
        self.view.selected_leak = Some(pending);
        self.view.pending_leak = None;
        self.view.context_choices.clear();
        self.record_selection(pending);
        Selection::Resolved { node, key: pending }
    }

    /// Settle a selection of `key` given the current origin.
    fn resolve(&mut self, key: Option<LeakKey>) -> Selection {
        let Some(key) = key else {
            return self.report_filtered();
        };
        let Some(contexts) = self.index.get(key.ip).map(|info| info.call_contexts.clone()) else {
            self.set_status(format!("No information for {}", key.ip));
            return Selection::Invalid;
        };

        if self.view.came_from_call_view {
            let Some(node) = self.view.selected_node else {
                return Selection::Invalid;
            };
            if !self.is_context_visible(node, &key) {
                return self.report_filtered();
            }
            self.view.selected_function = self.focus_address(key.ip);
            self.view.selected_leak = Some(key);
            return Selection::Resolved { node, key };
        }

        match contexts.as_slice() {
            [] => {
                self.focus_address(key.ip);
                self.set_status("Selected leak has no call context");
                Selection::Invalid
            }
            [node] => {
                let node = *node;
                if !self.is_context_visible(node, &key) {
                    return self.report_filtered();
                }
                self.view.selected_node = Some(node);
                self.view.selected_function = self.focus_address(key.ip);
                self.view.selected_leak = Some(key);
                Selection::Resolved { node, key }
            }
            _ => {
                let choices: Vec<ContextChoice> = {
                    let agg = self.aggregator();
                    agg.visible_contexts(&key)
                        .into_iter()
                        .map(|node| ContextChoice {
                            node,
                            path: self.tree.call_path(node),
                            flag: self
                                .tree
                                .leak(node, &key)
                                .map_or(LeakFlag::Missing, |l| l.flag()),
                        })
                        .collect()
                };
                self.view.selected_function =
                    self.index.get(key.ip).and_then(|info| info.owning_function);
                self.view.selected_leak = None;
                self.view.pending_leak = Some(key);
                self.view.context_choices = choices.clone();
                if choices.is_empty() {
                    self.set_status("All call contexts of the selected leak are filtered");
                    return Selection::Filtered;
                }
                Selection::Ambiguous(choices)
            }
        }
    }

    fn record_selection(&mut self, key: LeakKey) {
        let entry = if self.view.came_from_call_view {
            let position = self.view.selected_node.and_then(|node| {
                self.index.get(key.ip).and_then(|info| info.context_position(node))
            });
            let Some(position) = position else {
                error!("Selected call node is not a context of {}; not recording", key.ip);
                return;
            };
            NavigationEntry::from_call_view(key, position)
        } else {
            NavigationEntry::from_library_view(key)
        };
        debug!(
            "[Record] Entry: {} {} {}",
            entry.came_from_call_view,
            entry.leak_kind.label(),
            entry.leak_address
        );
        self.history.record(entry);
    }

    /// Re-run a recorded selection against the current filter.
    fn restore(&mut self, entry: NavigationEntry) -> Selection {
        self.view.came_from_call_view = entry.came_from_call_view;
        let Some(info) = self.index.get(entry.leak_address) else {
            return Selection::Invalid;
        };
        let owner = if entry.came_from_call_view {
            let node = entry.context_index.and_then(|i| info.call_contexts.get(i)).copied();
            let Some(node) = node else {
                error!("History entry for {} points past its contexts", entry.leak_address);
                return Selection::Invalid;
            };
            self.view.selected_node = Some(node);
            LeakOwner::CallNode(node)
        } else {
            let Some(function) = info.owning_function else {
                return Selection::Invalid;
            };
            self.view.selected_function = Some(function);
            LeakOwner::Function(function)
        };
        self.show_leak_list(owner);
        let key = entry.key();
        let listed = self.is_listed(key).then_some(key);
        self.resolve(listed)
    }

    pub fn back(&mut self) -> Option<Selection> {
        let entry = self.history.back()?;
        Some(self.restore(entry))
    }

    pub fn forward(&mut self) -> Option<Selection> {
        let entry = self.history.forward()?;
        Some(self.restore(entry))
    }

    /// Restore the current history entry, e.g. after a filter change.
    pub fn replay_current(&mut self) -> Option<Selection> {
        let entry = self.history.current()?;
        Some(self.restore(entry))
    }

    /// Toggle one filter class, recompute collapse state and replay the
    /// current selection. `None` if nothing changed or nothing to replay.
    pub fn set_filter(&mut self, flag: LeakFlag, enabled: bool) -> Option<Selection> {
        if self.filter.is_flag_active(flag) == enabled || !self.filter.set(flag, enabled) {
            return None;
        }
        let (_, state) = collapse(&self.tree, &self.filter);
        self.collapse = state;
        debug!("Update filter");
        self.replay_current()
    }

    pub fn go_to_caller(&mut self) -> bool {
        self.go_to_context(|ctx| ctx.caller, "Caller")
    }

    pub fn go_to_callee(&mut self) -> bool {
        self.go_to_context(|ctx| ctx.callee, "Callee")
    }

    fn go_to_context(
        &mut self,
        pick: impl Fn(&CallContext) -> Address,
        what: &str,
    ) -> bool {
        let context =
            self.view.selected_node.and_then(|n| self.tree.get(n)).and_then(|n| n.context);
        let Some(context) = context else {
            debug!("[goTo{what}] Invalid index");
            self.set_status("No call context selected");
            return false;
        };
        let address = pick(&context);
        if self.index.contains(address) {
            self.focus_address(address);
            true
        } else {
            debug!("[goTo{what}] {address} not in leak index");
            self.editor.focus(ViewKind::Disassembly, None);
            self.editor.focus(ViewKind::Source, None);
            self.set_status(format!("{what} {address} has no line information"));
            false
        }
    }

    /// Set the flag of the selected call-context leak.
    pub fn set_flag(&mut self, flag: LeakFlag) -> bool {
        if flag == LeakFlag::Missing {
            self.set_status("Cannot assign the untriaged flag");
            return false;
        }
        let changed = self.edit_selected(|meta| meta.flag = flag);
        if let (true, Some(key)) = (changed, self.view.selected_leak) {
            self.mark_address(key.ip, Marker::Flag(flag));
        }
        changed
    }

    /// Set the comment of the selected call-context leak.
    pub fn set_comment(&mut self, comment: impl Into<String>) -> bool {
        let comment = comment.into();
        self.edit_selected(|meta| meta.comment = comment)
    }

    fn edit_selected(&mut self, edit: impl FnOnce(&mut LeakMeta)) -> bool {
        let (Some(node), Some(key)) = (self.view.selected_node, self.view.selected_leak) else {
            self.set_status("No leak selected");
            return false;
        };
        let Some(leak) = self.tree.leak_mut(node, &key) else {
            self.set_status("Selected leak is not part of the selected call context");
            return false;
        };
        edit(leak.meta_mut());
        self.dirty = true;
        if let Some(owner) = self.view.owner {
            self.show_leak_list(owner);
        }
        self.set_status("Editing");
        true
    }
}
