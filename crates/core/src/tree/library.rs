//! Library hierarchy: the same leaks as the call tree, flattened per binary
//! image and per function entry, independent of the dynamic call path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{Address, Leak, LeakKey, LeakKind, SymbolInfo};
use crate::tree::CallTree;

static NEXT_LIB_NODE_ID: AtomicU64 = AtomicU64::new(0);

const UNKNOWN_IMAGE: &str = "<unknown>";

/// Aggregate of every leak observed inside one function, across contexts.
#[derive(Debug, Clone)]
pub struct FunctionLeak {
    pub id: u64,
    pub entry: Address,
    pub name: String,
    pub data_leaks: BTreeMap<LeakKey, Leak>,
    pub cf_leaks: BTreeMap<LeakKey, Leak>,
}

impl FunctionLeak {
    pub fn leaks(&self) -> impl Iterator<Item = &Leak> {
        self.data_leaks.values().chain(self.cf_leaks.values())
    }

    fn leaks_of_mut(&mut self, kind: LeakKind) -> &mut BTreeMap<LeakKey, Leak> {
        match kind {
            LeakKind::Data => &mut self.data_leaks,
            LeakKind::ControlFlow => &mut self.cf_leaks,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Library {
    pub id: u64,
    /// Full binary path; disassembly lives at `<name>.asm` in the archive.
    pub name: String,
    pub lower: Address,
    pub functions: Vec<FunctionLeak>,
}

impl Library {
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn asm_file(&self) -> String {
        format!("{}.asm", self.name)
    }
}

/// Position of a function aggregate inside a [`LibHierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub library: usize,
    pub function: usize,
}

/// A node of the library tree, as returned by id lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibNode {
    Library(usize),
    Function(FunctionRef),
}

#[derive(Debug, Clone, Default)]
pub struct LibHierarchy {
    pub libraries: Vec<Library>,
}

impl LibHierarchy {
    /// Group every call-node leak by the image and function of the node's
    /// callee. Repeated logical leaks merge into one aggregate whose status
    /// is the worst case over all occurrences.
    pub fn flatten(tree: &CallTree, symbols: &SymbolInfo) -> Self {
        type Functions = BTreeMap<Address, FunctionLeak>;
        let mut grouped: BTreeMap<(Address, String), Functions> = BTreeMap::new();

        for (_, node) in tree.iter() {
            let Some(context) = node.context else {
                continue;
            };
            if node.leak_count() == 0 {
                continue;
            }
            let image_key = match symbols.image_for(context.callee) {
                Some(img) => (img.lower, img.name.clone()),
                None => (Address(u64::MAX), UNKNOWN_IMAGE.to_string()),
            };
            let function = grouped
                .entry(image_key)
                .or_default()
                .entry(context.callee)
                .or_insert_with(|| FunctionLeak {
                    id: 0,
                    entry: context.callee,
                    name: symbols.context_name(context.callee),
                    data_leaks: BTreeMap::new(),
                    cf_leaks: BTreeMap::new(),
                });
            for leak in node.leaks() {
                function
                    .leaks_of_mut(leak.kind)
                    .entry(leak.key())
                    .and_modify(|existing| existing.status.merge(&leak.status))
                    .or_insert_with(|| Leak { meta: None, ..leak.clone() });
            }
        }

        let count: usize = grouped.values().map(|functions| functions.len() + 1).sum();
        let mut next_id = NEXT_LIB_NODE_ID.fetch_add(count as u64, Ordering::Relaxed);
        let mut libraries = Vec::with_capacity(grouped.len());
        for ((lower, name), functions) in grouped {
            let id = next_id;
            next_id += 1;
            let mut library =
                Library { id, name, lower, functions: Vec::with_capacity(functions.len()) };
            for mut function in functions.into_values() {
                function.id = next_id;
                next_id += 1;
                library.functions.push(function);
            }
            libraries.push(library);
        }

        Self { libraries }
    }

    pub fn function(&self, fref: FunctionRef) -> &FunctionLeak {
        &self.libraries[fref.library].functions[fref.function]
    }

    pub fn get_function(&self, fref: FunctionRef) -> Option<&FunctionLeak> {
        self.libraries.get(fref.library).and_then(|l| l.functions.get(fref.function))
    }

    /// Function aggregates in document order.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionRef, &FunctionLeak)> {
        self.libraries.iter().enumerate().flat_map(|(li, lib)| {
            lib.functions
                .iter()
                .enumerate()
                .map(move |(fi, f)| (FunctionRef { library: li, function: fi }, f))
        })
    }

    /// Libraries and their functions flattened in document order.
    fn document_order(&self) -> Vec<(u64, LibNode)> {
        let mut order = Vec::new();
        for (li, lib) in self.libraries.iter().enumerate() {
            order.push((lib.id, LibNode::Library(li)));
            for (fi, f) in lib.functions.iter().enumerate() {
                order.push((f.id, LibNode::Function(FunctionRef { library: li, function: fi })));
            }
        }
        order
    }

    /// First node with `id` in document order starting at `start`, wrapping.
    pub fn find_by_id(&self, id: u64, start: Option<LibNode>) -> Option<LibNode> {
        let order = self.document_order();
        let start = start.and_then(|s| order.iter().position(|(_, n)| *n == s)).unwrap_or(0);
        let len = order.len();
        (start..len).chain(0..start).map(|i| order[i]).find(|(nid, _)| *nid == id).map(|(_, n)| n)
    }
}
