//! Switchboard: command dispatch for chat bots.
//!
//! A bot gets messages as free text (`!say hello | upper`) or as structured
//! slash-command payloads. Switchboard turns both into one canonical
//! [`Invocation`](core::invocation::Invocation), resolves it against an immutable
//! registry of command descriptors, checks access, binds typed arguments, and runs
//! the command body, chaining stages through a tag-checked pipe.
//!
//! # Architecture
//!
//! - [`core::registry`]: descriptor tree, built once and frozen. Duplicate names are
//!   rejected at registration.
//! - [`core::invocation`]: the text and structured adapters.
//! - [`core::resolve`]: root match, subcommand descent, argument binding.
//! - [`core::access`]: whitelist, blacklist and capability rules shared by dispatch
//!   and listing.
//! - [`core::pipeline`]: stage splitting and sequential execution.
//! - [`core::deploy`]: merge/split export for structured platforms.
//! - [`core::dispatch`]: the entry point adapters call.
//! - [`plugins`]: built-in command sets, registered through [`subsystems`].
//!
//! Rich reply rendering, persistence, and platform SDKs are left to adapters.

pub mod cli;
pub mod core;
pub mod plugins;
pub mod subsystems;

use crate::cli::{CallCli, Cli, Command, InvokerArgs, OutputFormat, ReplCli, RunCli};
use crate::core::config::{self, Config};
use crate::core::deploy;
use crate::core::dispatch::Dispatcher;
use crate::core::envelope::PipeEnvelope;
use crate::core::error::SwitchboardError;
use crate::core::invocation::{Invocation, StructuredCall};
use crate::core::listing;
use crate::core::registry::{Registry, RegistryBuilder};
use crate::core::reply::{ConsoleReply, ReplySink};
use crate::core::value::{Attachment, Value};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Registry with every built-in plugin plus the shortcuts and access overrides
/// from `config`.
pub fn build_registry(config: &Config) -> Result<Registry, SwitchboardError> {
    let mut builder = RegistryBuilder::new();
    subsystems::register_builtins(&mut builder)?;
    builder.apply_config(config)?;
    builder.build()
}

#[derive(Serialize)]
struct SchemaDocument<'a> {
    fingerprint: String,
    commands: &'a [deploy::ExportedCommand],
}

pub async fn run() -> Result<ExitCode, SwitchboardError> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.dir)?;
    let registry = Arc::new(build_registry(&config)?);
    let dispatcher = Dispatcher::with_config(Arc::clone(&registry), &config);

    match cli.command {
        Command::Run(args) => run_once(&dispatcher, args).await,
        Command::Call(args) => call_once(&dispatcher, args).await,
        Command::List(args) => {
            let entries = dispatcher.visible_commands(&args.invoker.invoker());
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
                OutputFormat::Text => println!("{}", listing::render(&entries, dispatcher.prefix())),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema(args) => {
            let exports = registry.exports();
            match args.format {
                OutputFormat::Json => {
                    let doc = SchemaDocument {
                        fingerprint: deploy::fingerprint(exports),
                        commands: exports,
                    };
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
                OutputFormat::Text => println!("{}", deploy::render_text(exports)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Repl(args) => repl(&dispatcher, args).await,
    }
}

fn read_attachments(paths: &[PathBuf]) -> Result<Vec<Attachment>, SwitchboardError> {
    paths
        .iter()
        .map(|path| -> Result<Attachment, SwitchboardError> {
            let bytes = fs::read(path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(Attachment::new(name, bytes))
        })
        .collect()
}

fn exit_code(envelope: &PipeEnvelope) -> ExitCode {
    if envelope.error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_once(dispatcher: &Dispatcher, args: RunCli) -> Result<ExitCode, SwitchboardError> {
    let mut invocation = dispatcher
        .parse_message(&args.invocation)
        .unwrap_or_else(|| Invocation::text(args.invocation.trim()));
    invocation.attachments = read_attachments(&args.attachments)?;

    let sink = ConsoleReply::new(args.format.into());
    let envelope = dispatcher
        .handle(invocation, &args.invoker.invoker(), &sink)
        .await;
    Ok(exit_code(&envelope))
}

async fn call_once(dispatcher: &Dispatcher, args: CallCli) -> Result<ExitCode, SwitchboardError> {
    let mut call = StructuredCall::new(args.name);
    for (name, value) in args.options {
        call.options.insert(name, Value::Text(value));
    }
    call.attachments = read_attachments(&args.attachments)?;

    let sink = ConsoleReply::new(args.format.into());
    let invoker = args.invoker.invoker();
    let envelope = match dispatcher.normalize(call) {
        Ok(invocation) => dispatcher.handle(invocation, &invoker, &sink).await,
        Err(e) => {
            let envelope = e.to_envelope();
            if let Err(e) = sink.reply(&envelope).await {
                warn!(error = %e, "failed to deliver reply");
            }
            envelope
        }
    };
    Ok(exit_code(&envelope))
}

async fn repl(dispatcher: &Dispatcher, args: ReplCli) -> Result<ExitCode, SwitchboardError> {
    let ReplCli { invoker, format } = args;
    let invoker = InvokerArgs::invoker(&invoker);
    let sink = ConsoleReply::new(format.into());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(invocation) = dispatcher.parse_message(&line) else {
            debug!(line = %line, "ignoring message without prefix");
            continue;
        };
        dispatcher.handle(invocation, &invoker, &sink).await;
    }
    Ok(ExitCode::SUCCESS)
}
