//! A loaded analysis: dump, trees, leak index, filter, history and the
//! editor they are correlated with, rebuilt together on every (re)load.

mod selection;
mod snapshot;

pub use selection::{ContextChoice, LeakListItem, Selection};

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::aggregate::{LeakAggregator, LeakOwner};
use crate::archive::{DirArchive, ShortInfoMap, SymbolArchive};
use crate::config::ViewerConfig;
use crate::editor::{EditorViews, TextViews};
use crate::error::{SaveError, SessionError};
use crate::filter::SeverityFilter;
use crate::index::LeakIndex;
use crate::model::{LeakDump, LeakKey, LeakKind, SymbolInfo};
use crate::nav::NavigationHistory;
use crate::persist;
use crate::tree::{collapse, CallTree, CollapseState, FunctionRef, LibHierarchy, NodeIdx};

/// Selection state shown by a frontend.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Current selection went through the call tree or the context list.
    pub came_from_call_view: bool,
    pub selected_node: Option<NodeIdx>,
    pub selected_function: Option<FunctionRef>,
    /// Owner of `leak_list`.
    pub owner: Option<LeakOwner>,
    pub leak_list: Vec<LeakListItem>,
    /// Leak whose contexts are listed in `context_choices`.
    pub pending_leak: Option<LeakKey>,
    pub context_choices: Vec<ContextChoice>,
    pub selected_leak: Option<LeakKey>,
    pub status: Option<String>,
}

pub struct Session<E: EditorViews> {
    dump: LeakDump,
    symbols: SymbolInfo,
    tree: CallTree,
    libs: LibHierarchy,
    index: LeakIndex,
    filter: SeverityFilter,
    collapse: CollapseState,
    history: NavigationHistory,
    editor: E,
    view: ViewState,
    dirty: bool,
    source_path: Option<PathBuf>,
}

impl<E: EditorViews> Session<E> {
    pub fn open(
        dump: LeakDump,
        short_info: &ShortInfoMap,
        symbols: SymbolInfo,
        editor: E,
        config: &ViewerConfig,
    ) -> Result<Self, SessionError> {
        Self::assemble(
            dump,
            short_info,
            symbols,
            editor,
            SeverityFilter::from_config(&config.filter),
            NavigationHistory::with_limit(config.history_limit),
        )
    }

    fn assemble(
        dump: LeakDump,
        short_info: &ShortInfoMap,
        symbols: SymbolInfo,
        mut editor: E,
        filter: SeverityFilter,
        history: NavigationHistory,
    ) -> Result<Self, SessionError> {
        let mut tree = CallTree::build(dump.root.as_ref(), &symbols);
        let libs = LibHierarchy::flatten(&tree, &symbols);
        let index = LeakIndex::build(&mut tree, &libs, short_info, &mut editor)?;
        let (_, collapse) = collapse(&tree, &filter);
        info!(
            "Session ready: {} call nodes, {} libraries, {} indexed addresses",
            tree.len(),
            libs.libraries.len(),
            index.len()
        );
        Ok(Self {
            dump,
            symbols,
            tree,
            libs,
            index,
            filter,
            collapse,
            history,
            editor,
            view: ViewState::default(),
            dirty: false,
            source_path: None,
        })
    }

    /// Replace every structure with ones built from new inputs. The filter
    /// is kept, history starts empty and the source path is cleared. On error
    /// the session is unchanged.
    pub fn reload(
        &mut self,
        dump: LeakDump,
        short_info: &ShortInfoMap,
        symbols: SymbolInfo,
        editor: E,
    ) -> Result<(), SessionError> {
        if self.dirty {
            warn!("Reloading with unsaved changes");
        }
        let mut history = self.history.clone();
        history.reset();
        let rebuilt = Self::assemble(dump, short_info, symbols, editor, self.filter, history)?;
        *self = rebuilt;
        info!("Reloaded session");
        Ok(())
    }

    pub fn dump(&self) -> &LeakDump {
        &self.dump
    }

    pub fn symbols(&self) -> &SymbolInfo {
        &self.symbols
    }

    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    pub fn libs(&self) -> &LibHierarchy {
        &self.libs
    }

    pub fn index(&self) -> &LeakIndex {
        &self.index
    }

    pub fn filter(&self) -> &SeverityFilter {
        &self.filter
    }

    pub fn collapse_state(&self) -> &CollapseState {
        &self.collapse
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn status(&self) -> Option<&str> {
        self.view.status.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn set_source_path(&mut self, path: impl Into<PathBuf>) {
        self.source_path = Some(path.into());
    }

    pub fn aggregator(&self) -> LeakAggregator<'_> {
        LeakAggregator::new(&self.tree, &self.libs, &self.index, &self.filter)
    }

    /// `/`-joined function names leading to `node`.
    pub fn call_path(&self, node: NodeIdx) -> String {
        self.tree.call_path(node)
    }

    /// Copy every call-tree leak's metadata into the raw dump, matching
    /// records by node path and leak address.
    fn sync_dump(&mut self) {
        let Some(raw_root) = self.dump.root.as_mut() else {
            return;
        };
        for (_, node) in self.tree.iter() {
            if node.parent.is_none() {
                continue;
            }
            let Some(raw) = raw_root.descendant_mut(&node.raw_path) else {
                warn!("No raw record for call node {} at {}", node.id, node.raw_path.join("/"));
                continue;
            };
            for leak in node.leaks() {
                let records = match leak.kind {
                    LeakKind::Data => &mut raw.data_leaks,
                    LeakKind::ControlFlow => &mut raw.cf_leaks,
                };
                for record in records.iter_mut().filter(|r| r.ip == leak.ip) {
                    record.meta = leak.meta.clone();
                }
            }
        }
    }

    /// Write the annotated dump to `path` and make it the session's file.
    pub fn save(&mut self, path: &Path) -> Result<(), SaveError> {
        self.sync_dump();
        persist::save(path, &self.dump)?;
        self.dirty = false;
        self.source_path = Some(path.to_path_buf());
        self.view.status = Some(format!("Saved {}", path.display()));
        Ok(())
    }

    /// Save back to the file the session was loaded from.
    pub fn save_in_place(&mut self) -> Result<Option<PathBuf>, SaveError> {
        let Some(path) = self.source_path.clone() else {
            return Ok(None);
        };
        self.save(&path)?;
        Ok(Some(path))
    }
}

/// Open a dump file and an unpacked archive directory.
///
/// The dump is read first so that input failures map to the call-history
/// exit codes before the archive is touched.
pub fn open_files(
    dump_path: &Path,
    archive_path: &Path,
    config: &ViewerConfig,
) -> Result<Session<TextViews<DirArchive>>, SessionError> {
    let dump = persist::load(dump_path)?;
    let archive = DirArchive::open(archive_path)?;
    let short_info = archive.short_info().clone();
    let symbols = archive.symbols().clone();
    let mut session = Session::open(dump, &short_info, symbols, TextViews::new(archive), config)?;
    session.set_source_path(dump_path);
    Ok(session)
}
