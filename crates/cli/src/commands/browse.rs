use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use leakscope_core::config::ViewerConfig;
use leakscope_core::editor::{EditorAnchor, EditorViews, ViewKind};
use leakscope_core::error::InternalAssertion;
use leakscope_core::session::{Selection, Session};
use log::error;

use crate::commands::{
    flag_label, listed_key, open_session, parse_address, parse_kind, validate_flag, CliSession,
};

/// What to do after a command hit an internal invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InternalErrorPolicy {
    /// Stop with the internal-assertion exit code.
    Abort,
    /// Keep going; views may be degraded.
    Continue,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `f` against the session. If it panics, dump the session to an
/// emergency snapshot, then either fail with [`InternalAssertion`] or report
/// `Ok(None)` so the caller can continue.
pub fn guarded<E, T>(
    session: &mut Session<E>,
    policy: InternalErrorPolicy,
    autosave_dir: Option<&Path>,
    f: impl FnOnce(&mut Session<E>) -> T,
) -> Result<Option<T>>
where
    E: EditorViews,
{
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *session))) {
        Ok(value) => Ok(Some(value)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Internal assertion: {message}");
            let snapshot = match session.write_emergency_snapshot(autosave_dir) {
                Ok(path) => Some(path),
                Err(err) => {
                    error!("Failed to write emergency snapshot: {err}");
                    None
                }
            };
            let failure = InternalAssertion { message, snapshot };
            match policy {
                InternalErrorPolicy::Abort => Err(failure.into()),
                InternalErrorPolicy::Continue => {
                    error!("{failure}; continuing");
                    Ok(None)
                }
            }
        }
    }
}

fn describe_selection<E: EditorViews>(session: &Session<E>, selection: &Selection) -> String {
    match selection {
        Selection::Resolved { node, key } => {
            let tree = session.tree();
            let flag = tree.leak(*node, key).map(|l| l.flag());
            format!(
                "selected {} {} in {} [{}]",
                key.kind.label(),
                key.ip,
                tree.call_path(*node),
                flag_label(flag)
            )
        }
        Selection::Ambiguous(choices) => {
            let mut text = format!("{} contexts:", choices.len());
            for (i, choice) in choices.iter().enumerate() {
                text.push_str(&format!("\n  [{}] {} ({})", i, choice.path, choice.flag));
            }
            text
        }
        Selection::Filtered => {
            format!("filtered: {}", session.status().unwrap_or("selection is filtered"))
        }
        Selection::Invalid => {
            format!("invalid: {}", session.status().unwrap_or("nothing selected"))
        }
    }
}

fn describe_leak_list<E: EditorViews>(session: &Session<E>) -> String {
    let items = &session.view().leak_list;
    let mut text = format!("{} leaks:", items.len());
    for item in items {
        text.push_str(&format!("\n  {} ({}) [{}]", item.label, item.key.ip, flag_label(item.flag)));
    }
    text
}

fn describe_focus<E: EditorViews>(session: &Session<E>, ok: bool) -> String {
    if ok {
        "editors moved".to_string()
    } else {
        format!("no location: {}", session.status().unwrap_or("unknown"))
    }
}

fn parse_view_kind(raw: &str) -> Result<ViewKind> {
    match raw {
        "asm" | "disassembly" => Ok(ViewKind::Disassembly),
        "src" | "source" => Ok(ViewKind::Source),
        other => Err(anyhow!("Unknown view '{other}'. Use asm or src")),
    }
}

fn parse_switch(raw: &str) -> Result<bool> {
    match raw {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(anyhow!("Expected on/off, got '{other}'")),
    }
}

/// Execute one browse command line and return the text to print, or `None`
/// on `quit`.
pub fn execute_line<E: EditorViews>(
    session: &mut Session<E>,
    line: &str,
) -> Result<Option<String>> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').map_or((line, ""), |(c, r)| (c, r.trim()));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let output = match command {
        "" => String::new(),
        "quit" | "exit" => return Ok(None),
        "node" => {
            let id = args.first().context("usage: node <id>")?.parse::<u64>()?;
            if session.click_call_node(id) {
                describe_leak_list(session)
            } else {
                format!("invalid: {}", session.status().unwrap_or("unknown node"))
            }
        }
        "func" => {
            let id = args.first().context("usage: func <id>")?.parse::<u64>()?;
            if session.click_function(id) {
                describe_leak_list(session)
            } else {
                format!("invalid: {}", session.status().unwrap_or("unknown function"))
            }
        }
        "leak" => {
            let usage = "usage: leak <address> [data|cf]";
            let address = parse_address(args.first().context(usage)?)?;
            let kind = args.get(1).map(|raw| parse_kind(raw)).transpose()?;
            let key = listed_key(session, address, kind);
            let selection = session.click_leak(key);
            describe_selection(session, &selection)
        }
        "line" => {
            let [kind, view, line] = args.as_slice() else {
                return Err(anyhow!("usage: line <asm|src> <view> <line>"));
            };
            let anchor = EditorAnchor { view: view.parse()?, line: line.parse()? };
            let selection = session.click_editor(parse_view_kind(kind)?, anchor);
            describe_selection(session, &selection)
        }
        "choose" => {
            let choice = args.first().context("usage: choose <index>")?.parse::<usize>()?;
            let selection = session.choose_context(choice);
            describe_selection(session, &selection)
        }
        "back" => match session.back() {
            Some(selection) => describe_selection(session, &selection),
            None => "history exhausted".to_string(),
        },
        "forward" => match session.forward() {
            Some(selection) => describe_selection(session, &selection),
            None => "history exhausted".to_string(),
        },
        "filter" => {
            let [flag, state] = args.as_slice() else {
                return Err(anyhow!("usage: filter <flag> <on|off>"));
            };
            let flag = validate_flag(flag)?;
            match session.set_filter(flag, parse_switch(state)?) {
                Some(selection) => describe_selection(session, &selection),
                None => format!("filter {flag} unchanged or nothing selected"),
            }
        }
        "flag" => {
            let flag = validate_flag(args.first().context("usage: flag <flag>")?)?;
            if session.set_flag(flag) {
                format!("flag set to {flag}")
            } else {
                format!("invalid: {}", session.status().unwrap_or("no leak selected"))
            }
        }
        "comment" => {
            if session.set_comment(rest) {
                "comment updated".to_string()
            } else {
                format!("invalid: {}", session.status().unwrap_or("no leak selected"))
            }
        }
        "caller" => {
            let ok = session.go_to_caller();
            describe_focus(session, ok)
        }
        "callee" => {
            let ok = session.go_to_callee();
            describe_focus(session, ok)
        }
        "save" => {
            let saved = match args.first() {
                Some(path) => {
                    session.save(Path::new(path))?;
                    Some(PathBuf::from(path))
                }
                None => session.save_in_place()?,
            };
            match saved {
                Some(path) => format!("saved {}", path.display()),
                None => "no file to save to; use save <path>".to_string(),
            }
        }
        "status" => session.status().unwrap_or("").to_string(),
        other => format!("unknown command: {other}"),
    };
    Ok(Some(output))
}

/// Line-based session loop. Command errors are printed and do not end the
/// loop; internal assertions follow `policy`.
pub fn browse_loop<E, R, W>(
    session: &mut Session<E>,
    input: R,
    mut output: W,
    policy: InternalErrorPolicy,
    autosave_dir: Option<&Path>,
) -> Result<()>
where
    E: EditorViews,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line.context("Failed to read command")?;
        let outcome = guarded(session, policy, autosave_dir, |s| execute_line(s, &line))?;
        match outcome {
            Some(Ok(Some(text))) => {
                if !text.is_empty() {
                    writeln!(output, "{text}")?;
                }
            }
            Some(Ok(None)) => break,
            Some(Err(err)) => writeln!(output, "error: {err:#}")?,
            None => writeln!(output, "error: internal assertion, see log")?,
        }
    }
    if session.is_dirty() {
        writeln!(output, "warning: unsaved changes")?;
    }
    Ok(())
}

/// Interactive browse over stdin/stdout.
pub fn browse_command(
    dump: &str,
    archive: &str,
    config: &ViewerConfig,
    policy: InternalErrorPolicy,
) -> Result<()> {
    let mut session: CliSession = open_session(dump, archive, config)?;
    let autosave_dir = config.autosave_dir.as_deref().map(Path::new);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    browse_loop(&mut session, stdin.lock(), stdout.lock(), policy, autosave_dir)
}
