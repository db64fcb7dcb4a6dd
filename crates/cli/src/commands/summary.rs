use anyhow::{Context, Result};
use leakscope_core::aggregate::format_percentage;
use leakscope_core::config::ViewerConfig;
use serde::Serialize;

use crate::commands::{open_session, CliSession};

/// One visible row of the call tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallRow {
    pub id: u64,
    pub depth: usize,
    pub name: String,
    pub data_leaks: usize,
    pub cf_leaks: usize,
    /// Rendered max leakage, empty when none.
    pub leakage: String,
    pub expanded: bool,
}

/// Rows of the call tree below the root container, in document order.
/// Children of collapsed nodes are left out.
pub fn collect_call_rows(session: &CliSession) -> Vec<CallRow> {
    let tree = session.tree();
    let state = session.collapse_state();
    let agg = session.aggregator();
    let mut rows = Vec::new();
    let mut depths = vec![0usize; tree.len()];

    let mut idx = 1;
    while idx < tree.len() {
        let node = tree.node(idx);
        let depth = node.parent.map_or(0, |p| depths[p] + 1);
        depths[idx] = depth;
        let (cf, data) = agg.filtered_leaks(idx);
        let expanded = state.is_expanded(idx);
        rows.push(CallRow {
            id: node.id,
            depth: depth.saturating_sub(1),
            name: node.name.clone(),
            data_leaks: data.len(),
            cf_leaks: cf.len(),
            leakage: format_percentage(agg.max_leak_percentage(idx)),
            expanded,
        });
        idx = if expanded { idx + 1 } else { tree.subtree_end(idx) };
    }
    rows
}

/// Print the call tree with per-node leak counts.
pub fn summary_command(dump: &str, archive: &str, config: &ViewerConfig, json: bool) -> Result<()> {
    let session = open_session(dump, archive, config)?;
    let rows = collect_call_rows(&session);

    if json {
        let serialized =
            serde_json::to_string_pretty(&rows).context("Failed to serialize call tree to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Call Hierarchy ({} nodes):", session.tree().len().saturating_sub(1));
    if rows.is_empty() {
        println!("  (empty)");
        return Ok(());
    }
    for row in rows {
        let marker = if row.expanded { "-" } else { "+" };
        let indent = "  ".repeat(row.depth + 1);
        let mut line = format!("{}{} {} [id {}]", indent, marker, row.name, row.id);
        if row.data_leaks > 0 {
            line.push_str(&format!(" D:{}", row.data_leaks));
        }
        if row.cf_leaks > 0 {
            line.push_str(&format!(" CF:{}", row.cf_leaks));
        }
        if !row.leakage.is_empty() {
            line.push_str(&format!(" {}", row.leakage));
        }
        println!("{line}");
    }
    Ok(())
}
