//! CLI struct definitions for the `switchboard` binary.
//!
//! All clap-derived types live here. Command handling lives in `lib.rs`.

use crate::core::access::Invoker;
use crate::core::reply::ConsoleFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "switchboard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Command dispatch for chat bots: resolve, authorize, pipe, and export commands."
)]
pub(crate) struct Cli {
    /// Directory holding `switchboard.toml`.
    #[clap(long, global = true, default_value = ".")]
    pub dir: PathBuf,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Dispatch one free-text invocation, e.g. `switchboard run "say hi | upper"`.
    Run(RunCli),
    /// Dispatch a structured call the way a slash-command platform would.
    Call(CallCli),
    /// List the commands an invoker may run.
    List(ListCli),
    /// Print the exported structured schema.
    Schema(SchemaCli),
    /// Read prefixed messages from stdin, one per line.
    Repl(ReplCli),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for ConsoleFormat {
    fn from(f: OutputFormat) -> Self {
        match f {
            OutputFormat::Text => ConsoleFormat::Text,
            OutputFormat::Json => ConsoleFormat::Json,
        }
    }
}

#[derive(clap::Args, Debug)]
pub(crate) struct InvokerArgs {
    /// Invoker identity used for access checks.
    #[clap(long = "as", default_value = "cli")]
    pub id: String,
    /// Capability held by the invoker (repeatable).
    #[clap(long = "cap")]
    pub capabilities: Vec<String>,
}

impl InvokerArgs {
    pub fn invoker(&self) -> Invoker {
        self.capabilities
            .iter()
            .fold(Invoker::new(self.id.clone()), |inv, cap| inv.with_capability(cap.clone()))
    }
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunCli {
    /// Invocation text; the prefix is optional here.
    pub invocation: String,
    #[clap(flatten)]
    pub invoker: InvokerArgs,
    /// File to attach (repeatable).
    #[clap(long = "attach")]
    pub attachments: Vec<PathBuf>,
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct CallCli {
    /// Exported command name, e.g. `calc-add` or `todo`.
    pub name: String,
    /// Option value as `name=value` (repeatable).
    #[clap(long = "opt", value_parser = parse_option)]
    pub options: Vec<(String, String)>,
    #[clap(flatten)]
    pub invoker: InvokerArgs,
    #[clap(long = "attach")]
    pub attachments: Vec<PathBuf>,
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ListCli {
    #[clap(flatten)]
    pub invoker: InvokerArgs,
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SchemaCli {
    #[clap(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ReplCli {
    #[clap(flatten)]
    pub invoker: InvokerArgs,
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

fn parse_option(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_capabilities() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "run",
            "secret",
            "--as",
            "owner",
            "--cap",
            "admin",
            "--cap",
            "ops",
        ])
        .unwrap();
        let Command::Run(run) = cli.command else {
            panic!("expected run");
        };
        let invoker = run.invoker.invoker();
        assert_eq!(invoker.id, "owner");
        assert_eq!(invoker.capabilities.len(), 2);
    }

    #[test]
    fn call_options_need_equals() {
        assert_eq!(
            parse_option("a=2").unwrap(),
            ("a".to_string(), "2".to_string())
        );
        assert!(parse_option("novalue").is_err());
        assert!(Cli::try_parse_from(["switchboard", "call", "calc-add", "--opt", "bad"]).is_err());
    }
}
