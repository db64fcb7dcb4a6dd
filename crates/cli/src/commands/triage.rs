use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use leakscope_core::config::ViewerConfig;
use leakscope_core::model::LeakFlag;
use leakscope_core::session::Selection;

use crate::commands::{open_session, parse_address, parse_kind, select_from_library};

/// Edits requested by `triage`.
#[derive(Debug, Clone, Default)]
pub struct TriageEdit {
    /// `data` or `cf`; the first listed leak at the address when absent.
    pub kind: Option<String>,
    pub context: Option<usize>,
    pub flag: Option<String>,
    pub comment: Option<String>,
    /// Output dump; defaults to overwriting the input.
    pub out: Option<String>,
}

/// Set the flag and/or comment of one call-context leak and save the dump.
pub fn triage_command(
    dump: &str,
    archive: &str,
    config: &ViewerConfig,
    address: &str,
    edit: TriageEdit,
) -> Result<()> {
    if edit.flag.is_none() && edit.comment.is_none() {
        bail!("Nothing to do: pass --flag and/or --comment");
    }
    // The session refuses flags a user may not assign.
    let flag = edit.flag.as_deref().map(str::parse::<LeakFlag>).transpose()?;
    let kind = edit.kind.as_deref().map(parse_kind).transpose()?;
    let address = parse_address(address)?;
    let mut session = open_session(dump, archive, config)?;

    let (node, key) = match select_from_library(&mut session, address, kind)? {
        Selection::Resolved { node, key } => (node, key),
        Selection::Ambiguous(choices) => {
            let Some(choice) = edit.context else {
                bail!(
                    "Leak {address} occurs in {} call contexts; \
                     pick one with --context (see `contexts`)",
                    choices.len()
                );
            };
            match session.choose_context(choice) {
                Selection::Resolved { node, key } => (node, key),
                _ => bail!("Invalid context {choice} for {address} ({} available)", choices.len()),
            }
        }
        Selection::Filtered | Selection::Invalid => {
            return Err(anyhow!(
                "Cannot select leak {address}: {}",
                session.status().unwrap_or("not selectable")
            ));
        }
    };

    if let Some(flag) = flag {
        if !session.set_flag(flag) {
            bail!("Cannot set flag of {address}: {}", session.status().unwrap_or("refused"));
        }
    }
    if let Some(comment) = edit.comment {
        if !session.set_comment(comment) {
            bail!("Cannot set comment of {address}: {}", session.status().unwrap_or("refused"));
        }
    }

    let out = edit.out.unwrap_or_else(|| dump.to_string());
    session
        .save(Path::new(&out))
        .with_context(|| format!("Failed to save call history to {out}"))?;

    println!("Updated {} {} in {}", key.kind.label(), address, session.call_path(node));
    println!("  Saved: {}", out);
    Ok(())
}
