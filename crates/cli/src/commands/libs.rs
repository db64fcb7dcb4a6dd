use anyhow::{Context, Result};
use leakscope_core::aggregate::LeakOwner;
use leakscope_core::config::ViewerConfig;
use serde::Serialize;

use crate::commands::{flag_label, open_session, CliSession};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LibLeakRow {
    pub address: String,
    pub label: String,
    /// Worst flag across call contexts, or `unknown`.
    pub max_priority: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionRow {
    pub id: u64,
    pub name: String,
    pub leaks: Vec<LibLeakRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LibraryRow {
    pub id: u64,
    pub name: String,
    pub functions: Vec<FunctionRow>,
}

/// The library hierarchy with filtered aggregate leaks.
pub fn collect_library_rows(session: &CliSession) -> Vec<LibraryRow> {
    let agg = session.aggregator();
    let symbols = session.symbols();
    let mut libraries: Vec<LibraryRow> = session
        .libs()
        .libraries
        .iter()
        .map(|lib| LibraryRow {
            id: lib.id,
            name: lib.short_name().to_string(),
            functions: Vec::new(),
        })
        .collect();

    for (fref, function) in session.libs().functions() {
        let owner = LeakOwner::Function(fref);
        let leaks = agg
            .function_leaks(fref)
            .into_iter()
            .map(|leak| LibLeakRow {
                address: leak.ip.to_string(),
                label: leak.label(symbols),
                max_priority: flag_label(agg.max_priority(owner, &leak.key())).to_string(),
            })
            .collect();
        libraries[fref.library].functions.push(FunctionRow {
            id: function.id,
            name: function.name.clone(),
            leaks,
        });
    }
    libraries
}

/// Print leaks grouped by library and function.
pub fn libs_command(dump: &str, archive: &str, config: &ViewerConfig, json: bool) -> Result<()> {
    let session = open_session(dump, archive, config)?;
    let libraries = collect_library_rows(&session);

    if json {
        let serialized = serde_json::to_string_pretty(&libraries)
            .context("Failed to serialize library hierarchy to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Libraries ({}):", libraries.len());
    if libraries.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for lib in libraries {
        println!("  - {} [id {}]", lib.name, lib.id);
        for function in lib.functions {
            println!("    - {} [id {}]", function.name, function.id);
            for leak in function.leaks {
                println!("      {} ({}) [{}]", leak.label, leak.address, leak.max_priority);
            }
        }
    }
    Ok(())
}
