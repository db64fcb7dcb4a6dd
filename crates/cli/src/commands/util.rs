use std::path::Path;

use anyhow::{anyhow, bail, Result};
use leakscope_core::archive::DirArchive;
use leakscope_core::config::{resolve_viewer_config, ConfigLayout, ViewerConfig};
use leakscope_core::editor::{EditorViews, TextViews};
use leakscope_core::model::{Address, LeakFlag, LeakKey, LeakKind};
use leakscope_core::session::{open_files, Selection, Session};

pub type CliSession = Session<TextViews<DirArchive>>;

/// Load the viewer config from `--config` or `.leakscope/config.json` under
/// the current directory.
pub fn load_config(explicit: Option<&str>) -> Result<ViewerConfig> {
    let cwd = std::env::current_dir()?;
    resolve_viewer_config(&ConfigLayout::new(cwd), explicit.map(Path::new))
}

/// Open a session over a dump file and an archive directory. Session errors
/// are passed through unwrapped so the caller can map them to exit codes.
pub fn open_session(dump: &str, archive: &str, config: &ViewerConfig) -> Result<CliSession> {
    Ok(open_files(Path::new(dump), Path::new(archive), config)?)
}

pub fn parse_address(raw: &str) -> Result<Address> {
    Ok(raw.parse::<Address>()?)
}

/// Parse a triage flag a user may assign or filter on.
pub fn validate_flag(raw: &str) -> Result<LeakFlag> {
    let flag: LeakFlag = raw.parse()?;
    if flag == LeakFlag::Missing {
        bail!("Invalid flag '{raw}'. Allowed: no_leak, investigate, leak, dont_care");
    }
    Ok(flag)
}

pub fn parse_kind(raw: &str) -> Result<LeakKind> {
    Ok(raw.parse::<LeakKind>()?)
}

/// Key of the listed leak at `address`. Without an explicit kind the first
/// listed row wins, which is the data leak when both kinds share the address.
pub fn listed_key<E: EditorViews>(
    session: &Session<E>,
    address: Address,
    kind: Option<LeakKind>,
) -> LeakKey {
    match kind {
        Some(kind) => LeakKey::new(kind, address),
        None => session
            .view()
            .leak_list
            .iter()
            .map(|item| item.key)
            .find(|key| key.ip == address)
            .unwrap_or(LeakKey::new(LeakKind::Data, address)),
    }
}

/// Select the leak at `address` through the library view, the way a click on
/// its function and then on the leak would.
pub fn select_from_library(
    session: &mut CliSession,
    address: Address,
    kind: Option<LeakKind>,
) -> Result<Selection> {
    let info = session.index().get(address).ok_or_else(|| anyhow!("Unknown address {address}"))?;
    let function = info
        .owning_function
        .ok_or_else(|| anyhow!("Address {address} is not a leak (call target only)"))?;
    let id = session.libs().function(function).id;
    session.click_function(id);
    let key = listed_key(session, address, kind);
    Ok(session.click_leak(key))
}

/// Short text for a flag that may be unknown.
pub fn flag_label(flag: Option<LeakFlag>) -> &'static str {
    flag.map(|f| f.as_str()).unwrap_or("unknown")
}
