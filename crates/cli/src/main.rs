use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use leakscope::commands::{
    browse_command, contexts_command, libs_command, load_config, summary_command,
    triage_command, InternalErrorPolicy, TriageEdit,
};
use leakscope::{log_level, setup_logging};
use leakscope_core::error::{InternalAssertion, SessionError};

/// Terminal frontend for browsing and triaging side-channel leak reports.
///
/// All substantive logic lives in `leakscope-core` (exposed in code as
/// `leakscope_core`); this binary parses arguments, configures logging and
/// prints results.
#[derive(Parser, Debug)]
#[command(
    name = "leakscope",
    version,
    about = "Browse and triage side-channel leak reports",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Viewer config file (JSON or YAML). Defaults to `.leakscope/config.json`.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// The two input files every command needs.
#[derive(Args, Debug)]
struct Inputs {
    /// Call-history dump (JSON).
    #[arg(long)]
    dump: String,

    /// Unpacked symbol archive directory.
    #[arg(long)]
    archive: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the call tree with leak counts and max leakage.
    ///
    /// Subtrees without leaks passing the configured filter are collapsed.
    Summary {
        #[command(flatten)]
        inputs: Inputs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print leaks grouped by library and function, with the worst flag
    /// across all call contexts.
    Libs {
        #[command(flatten)]
        inputs: Inputs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the call contexts a leak address occurs in.
    Contexts {
        #[command(flatten)]
        inputs: Inputs,

        /// Leak address (hex with 0x prefix, or decimal).
        #[arg(long)]
        address: String,

        /// Leak kind at the address: data or cf. Defaults to the first listed.
        #[arg(long)]
        kind: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Set the flag and/or comment of a leak in one call context and save.
    Triage {
        #[command(flatten)]
        inputs: Inputs,

        /// Leak address (hex with 0x prefix, or decimal).
        #[arg(long)]
        address: String,

        /// Leak kind at the address: data or cf. Defaults to the first listed.
        #[arg(long)]
        kind: Option<String>,

        /// Context index from `contexts`, required when the leak occurs in
        /// several contexts.
        #[arg(long)]
        context: Option<usize>,

        /// New flag: no_leak, investigate, leak or dont_care.
        #[arg(long)]
        flag: Option<String>,

        /// New comment.
        #[arg(long)]
        comment: Option<String>,

        /// Write the annotated dump here instead of overwriting the input.
        #[arg(long)]
        out: Option<String>,
    },

    /// Interactive line-based session over stdin.
    Browse {
        #[command(flatten)]
        inputs: Inputs,

        /// Behavior after an internal error (a snapshot is written either way).
        #[arg(long, value_enum, default_value_t = InternalErrorPolicy::Abort)]
        on_internal_error: InternalErrorPolicy,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    setup_logging(log_level(cli.verbose, config.log_level.as_deref()))?;

    match cli.command {
        Command::Summary { inputs, json } => {
            summary_command(&inputs.dump, &inputs.archive, &config, json)?
        }
        Command::Libs { inputs, json } => {
            libs_command(&inputs.dump, &inputs.archive, &config, json)?
        }
        Command::Contexts { inputs, address, kind, json } => contexts_command(
            &inputs.dump,
            &inputs.archive,
            &config,
            &address,
            kind.as_deref(),
            json,
        )?,
        Command::Triage { inputs, address, kind, context, flag, comment, out } => triage_command(
            &inputs.dump,
            &inputs.archive,
            &config,
            &address,
            TriageEdit { kind, context, flag, comment, out },
        )?,
        Command::Browse { inputs, on_internal_error } => {
            browse_command(&inputs.dump, &inputs.archive, &config, on_internal_error)?
        }
    }

    Ok(())
}

/// Exit code for a failed run: input and consistency failures keep their
/// dedicated codes, everything else exits with 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(session_err) = err.downcast_ref::<SessionError>() {
        return session_err.exit_code().code();
    }
    if let Some(assertion) = err.downcast_ref::<InternalAssertion>() {
        return assertion.exit_code().code();
    }
    1
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}
