use anyhow::{Context, Result};
use leakscope_core::config::ViewerConfig;
use leakscope_core::session::Selection;
use serde::Serialize;

use crate::commands::{
    flag_label, open_session, parse_address, parse_kind, select_from_library, CliSession,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContextRow {
    /// Index to pass to `triage --context`.
    pub choice: usize,
    pub node_id: u64,
    pub path: String,
    pub flag: String,
}

/// Contexts a user would be offered after selecting `address` in the
/// library view. A single context resolves immediately and is reported as
/// the only row.
pub fn collect_context_rows(
    session: &mut CliSession,
    address: &str,
    kind: Option<&str>,
) -> Result<Vec<ContextRow>> {
    let address = parse_address(address)?;
    let kind = kind.map(parse_kind).transpose()?;
    let rows = match select_from_library(session, address, kind)? {
        Selection::Resolved { node, key } => {
            let tree = session.tree();
            vec![ContextRow {
                choice: 0,
                node_id: tree.node(node).id,
                path: tree.call_path(node),
                flag: flag_label(tree.leak(node, &key).map(|l| l.flag())).to_string(),
            }]
        }
        Selection::Ambiguous(choices) => choices
            .into_iter()
            .enumerate()
            .map(|(choice, c)| ContextRow {
                choice,
                node_id: session.tree().node(c.node).id,
                path: c.path,
                flag: c.flag.to_string(),
            })
            .collect(),
        Selection::Filtered | Selection::Invalid => Vec::new(),
    };
    Ok(rows)
}

/// Print the call contexts a leak address occurs in.
pub fn contexts_command(
    dump: &str,
    archive: &str,
    config: &ViewerConfig,
    address: &str,
    kind: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut session = open_session(dump, archive, config)?;
    let rows = collect_context_rows(&mut session, address, kind)?;

    if json {
        let serialized =
            serde_json::to_string_pretty(&rows).context("Failed to serialize contexts to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Contexts for {} ({}):", address, rows.len());
    if rows.is_empty() {
        println!("  ({})", session.status().unwrap_or("none"));
        return Ok(());
    }
    for row in rows {
        println!("  [{}] {} ({}) [id {}]", row.choice, row.path, row.flag, row.node_id);
    }
    Ok(())
}
