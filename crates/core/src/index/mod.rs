//! Leak index: per-address correlation between leaks, editor lines, the
//! owning function aggregate and every call context the address occurs in.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use log::{debug, error, info};

use crate::archive::{ShortInfo, ShortInfoMap};
use crate::editor::{EditorAnchor, EditorViews, Marker, ViewId, ViewKind};
use crate::error::IndexError;
use crate::model::{Address, LeakFlag, LeakMeta};
use crate::tree::{CallTree, FunctionRef, LibHierarchy, NodeIdx};

/// Correlation record for one instruction address.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressInfo {
    pub address: Address,
    pub asm: Option<EditorAnchor>,
    pub src: Option<EditorAnchor>,
    /// Aggregate in the library hierarchy; `None` for context-only entries.
    pub owning_function: Option<FunctionRef>,
    /// Nodes holding a leak at this address, in document order.
    pub call_contexts: Vec<NodeIdx>,
    /// Fallback metadata for addresses without call contexts.
    pub meta: LeakMeta,
}

impl AddressInfo {
    pub fn anchor(&self, kind: ViewKind) -> Option<EditorAnchor> {
        match kind {
            ViewKind::Disassembly => self.asm,
            ViewKind::Source => self.src,
        }
    }

    /// Position of `node` in `call_contexts`.
    pub fn context_position(&self, node: NodeIdx) -> Option<usize> {
        self.call_contexts.iter().position(|&n| n == node)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeakIndex {
    infos: BTreeMap<Address, AddressInfo>,
    by_anchor: HashMap<(ViewKind, EditorAnchor), Address>,
}

/// Views opened during one correlation pass, keyed by file. A failed open is
/// remembered so it is attempted only once.
struct ViewCache<'e, E: EditorViews> {
    editor: &'e mut E,
    opened: HashMap<(ViewKind, String), Option<ViewId>>,
}

impl<'e, E: EditorViews> ViewCache<'e, E> {
    fn view(&mut self, kind: ViewKind, file: &str) -> Option<ViewId> {
        if let Some(cached) = self.opened.get(&(kind, file.to_string())) {
            return *cached;
        }
        let view = match self.editor.is_already_open(kind, file) {
            Some(id) => Some(id),
            None => match self.editor.open_view(kind, file) {
                Ok(id) => Some(id),
                Err(err) => {
                    debug!("{err}");
                    None
                }
            },
        };
        self.opened.insert((kind, file.to_string()), view);
        view
    }

    fn anchors(&mut self, short: &ShortInfo) -> (Option<EditorAnchor>, Option<EditorAnchor>) {
        let asm = short.asm_line.and_then(|line| {
            self.view(ViewKind::Disassembly, &short.asm_file)
                .map(|view| EditorAnchor { view, line })
        });
        let src = short.src_file.as_deref().and_then(|file| {
            self.view(ViewKind::Source, file)
                .map(|view| EditorAnchor { view, line: short.src_line.saturating_sub(1) })
        });
        (asm, src)
    }

    fn mark(&mut self, anchors: [Option<EditorAnchor>; 2], marker: Marker) {
        for anchor in anchors.into_iter().flatten() {
            self.editor.mark_line(anchor.view, anchor.line, marker);
        }
    }
}

impl LeakIndex {
    /// Run the correlation pass.
    ///
    /// 1. Every leak of every function aggregate gets an [`AddressInfo`] with
    ///    its editor anchors. An address unknown to `short_info` means dump
    ///    and archive do not belong together and aborts the pass.
    /// 2. The call tree is walked in document order; each leak gets default
    ///    metadata if it has none and its node is appended to the address's
    ///    call contexts.
    /// 3. Archive addresses still missing get a context-only entry so
    ///    caller/callee navigation always resolves.
    pub fn build<E: EditorViews>(
        tree: &mut CallTree,
        libs: &LibHierarchy,
        short_info: &ShortInfoMap,
        editor: &mut E,
    ) -> Result<Self, IndexError> {
        let mut index = LeakIndex::default();
        let mut views = ViewCache { editor, opened: HashMap::new() };

        for (li, lib) in libs.libraries.iter().enumerate() {
            views.view(ViewKind::Disassembly, &lib.asm_file());
            for (fi, function) in lib.functions.iter().enumerate() {
                let fref = FunctionRef { library: li, function: fi };
                for leak in function.leaks() {
                    let Entry::Vacant(slot) = index.infos.entry(leak.ip) else {
                        continue;
                    };
                    let Some(short) = short_info.get(&leak.ip) else {
                        error!("Cannot find {} in archive line info", leak.ip);
                        return Err(IndexError::InvalidFileCombination { address: leak.ip });
                    };
                    let (asm, src) = views.anchors(short);
                    views.mark([asm, src], Marker::Flag(LeakFlag::Investigate));
                    for (kind, anchor) in [(ViewKind::Disassembly, asm), (ViewKind::Source, src)] {
                        if let Some(anchor) = anchor {
                            index.by_anchor.insert((kind, anchor), leak.ip);
                        }
                    }
                    slot.insert(AddressInfo {
                        address: leak.ip,
                        asm,
                        src,
                        owning_function: Some(fref),
                        call_contexts: Vec::new(),
                        meta: LeakMeta::default(),
                    });
                }
            }
        }

        let mut worst: BTreeMap<Address, LeakFlag> = BTreeMap::new();
        for idx in 0..tree.len() {
            for leak in tree.node_mut(idx).leaks_mut() {
                let flag = leak.meta_mut().flag;
                let Some(info) = index.infos.get_mut(&leak.ip) else {
                    continue;
                };
                if info.call_contexts.last() != Some(&idx) {
                    info.call_contexts.push(idx);
                }
                let slot = worst.entry(leak.ip).or_insert(flag);
                *slot = (*slot).max(flag);
            }
        }
        for (address, flag) in worst {
            if let Some(info) = index.infos.get(&address) {
                views.mark([info.asm, info.src], Marker::Flag(flag));
            }
        }

        let mut completed = 0usize;
        for (address, short) in short_info {
            if index.infos.contains_key(address) {
                continue;
            }
            let (asm, src) = views.anchors(short);
            views.mark([asm, src], Marker::ContextMarker);
            index.infos.insert(
                *address,
                AddressInfo {
                    address: *address,
                    asm,
                    src,
                    owning_function: None,
                    call_contexts: Vec::new(),
                    meta: LeakMeta::default(),
                },
            );
            completed += 1;
        }

        info!(
            "Correlated {} addresses ({} context-only)",
            index.infos.len(),
            completed
        );
        Ok(index)
    }

    pub fn get(&self, address: Address) -> Option<&AddressInfo> {
        self.infos.get(&address)
    }

    pub fn get_mut(&mut self, address: Address) -> Option<&mut AddressInfo> {
        self.infos.get_mut(&address)
    }

    pub fn contains(&self, address: Address) -> bool {
        self.infos.contains_key(&address)
    }

    /// Leak address shown at an editor line.
    pub fn address_at(&self, kind: ViewKind, anchor: EditorAnchor) -> Option<Address> {
        self.by_anchor.get(&(kind, anchor)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressInfo> {
        self.infos.values()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
