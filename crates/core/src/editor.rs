//! Editor collaborator: the disassembly and source views leaks are
//! correlated with.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::archive::SymbolArchive;
use crate::model::LeakFlag;

pub type ViewId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Disassembly,
    Source,
}

/// A line inside an open view. Lines are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorAnchor {
    pub view: ViewId,
    pub line: u32,
}

/// Margin symbol shown next to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Flag(LeakFlag),
    /// Address known only as a call target, without triage state.
    ContextMarker,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("File not found: {0}")]
    NotFound(String),
}

/// What the correlation and selection logic needs from an editor.
pub trait EditorViews {
    fn open_view(&mut self, kind: ViewKind, file: &str) -> Result<ViewId, EditorError>;

    fn is_already_open(&self, kind: ViewKind, file: &str) -> Option<ViewId>;

    /// Replace the marker on `line`.
    fn mark_line(&mut self, view: ViewId, line: u32, marker: Marker);

    /// Show `anchor` in the views of `kind`, or the empty placeholder.
    fn focus(&mut self, kind: ViewKind, anchor: Option<EditorAnchor>);
}

#[derive(Debug, Clone)]
pub struct TextView {
    pub kind: ViewKind,
    pub file: String,
    pub lines: Vec<String>,
    pub markers: BTreeMap<u32, Marker>,
}

/// Headless views backed by archive text.
#[derive(Debug)]
pub struct TextViews<A: SymbolArchive> {
    archive: A,
    views: Vec<TextView>,
    asm_focus: Option<EditorAnchor>,
    src_focus: Option<EditorAnchor>,
}

impl<A: SymbolArchive> TextViews<A> {
    pub fn new(archive: A) -> Self {
        Self { archive, views: Vec::new(), asm_focus: None, src_focus: None }
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn view(&self, id: ViewId) -> Option<&TextView> {
        self.views.get(id)
    }

    pub fn views(&self) -> &[TextView] {
        &self.views
    }

    pub fn focused(&self, kind: ViewKind) -> Option<EditorAnchor> {
        match kind {
            ViewKind::Disassembly => self.asm_focus,
            ViewKind::Source => self.src_focus,
        }
    }

    pub fn line_text(&self, anchor: EditorAnchor) -> Option<&str> {
        self.views.get(anchor.view)?.lines.get(anchor.line as usize).map(String::as_str)
    }

    pub fn marker(&self, anchor: EditorAnchor) -> Option<Marker> {
        self.views.get(anchor.view)?.markers.get(&anchor.line).copied()
    }
}

impl<A: SymbolArchive> EditorViews for TextViews<A> {
    fn open_view(&mut self, kind: ViewKind, file: &str) -> Result<ViewId, EditorError> {
        if let Some(id) = self.is_already_open(kind, file) {
            return Ok(id);
        }
        let text = self.archive.read_text(file).map_err(|_| {
            debug!("{kind:?} file not found: {file}");
            EditorError::NotFound(file.to_string())
        })?;
        self.views.push(TextView {
            kind,
            file: file.to_string(),
            lines: text.lines().map(str::to_string).collect(),
            markers: BTreeMap::new(),
        });
        Ok(self.views.len() - 1)
    }

    fn is_already_open(&self, kind: ViewKind, file: &str) -> Option<ViewId> {
        self.views.iter().position(|v| v.kind == kind && v.file == file)
    }

    fn mark_line(&mut self, view: ViewId, line: u32, marker: Marker) {
        if let Some(v) = self.views.get_mut(view) {
            v.markers.insert(line, marker);
        }
    }

    fn focus(&mut self, kind: ViewKind, anchor: Option<EditorAnchor>) {
        match kind {
            ViewKind::Disassembly => self.asm_focus = anchor,
            ViewKind::Source => self.src_focus = anchor,
        }
    }
}
