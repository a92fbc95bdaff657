//! Pipe-chained execution.
//!
//! A text invocation is split on the pipe delimiter (outside quotes) into stages.
//! Stages are resolved lazily, each right before it runs, so a later stage that
//! fails to resolve only surfaces once everything before it has run. A stage whose
//! result carries `error: true` ends the chain and is what the invoker sees.

use crate::core::access::Invoker;
use crate::core::envelope::{PipeData, PipeEnvelope, Tag};
use crate::core::error::DispatchError;
use crate::core::handler::{CommandContext, CommandHandler};
use crate::core::invocation::Invocation;
use crate::core::option::Args;
use crate::core::registry::Registry;
use crate::core::resolve::{self, Target};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

const LEGACY_PREFIX: &str = "cmd:";

/// Byte offsets of every delimiter that sits outside quotes.
fn delimiter_positions(text: &str, delimiter: char) -> Vec<usize> {
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => escaped = true,
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (c, None) if c == delimiter => out.push(i),
            _ => {}
        }
    }
    out
}

/// Split on unquoted delimiters. Quotes and escapes stay in the stage text verbatim;
/// an unterminated quote runs to the end of the input.
pub fn split_stages(text: &str, delimiter: char) -> Result<Vec<&str>, DispatchError> {
    let mut stages = Vec::new();
    let mut start = 0;
    for pos in delimiter_positions(text, delimiter) {
        stages.push(&text[start..pos]);
        start = pos + delimiter.len_utf8();
    }
    stages.push(&text[start..]);

    let stages: Vec<&str> = stages.into_iter().map(str::trim).collect();
    if let Some(i) = stages.iter().position(|s| s.is_empty()) {
        return Err(DispatchError::MalformedPipeline {
            reason: format!("stage {} of {} is empty", i + 1, stages.len()),
        });
    }
    Ok(stages)
}

pub fn has_pipe(text: &str, delimiter: char) -> bool {
    !delimiter_positions(text, delimiter).is_empty()
}

/// Break an invocation into per-stage invocations. Structured payloads and text
/// without a delimiter come back as a single untouched stage. Attachments go to
/// the first stage only.
pub fn stage_invocations(
    invocation: Invocation,
    delimiter: char,
) -> Result<Vec<Invocation>, DispatchError> {
    if !invocation.is_text() || !has_pipe(&invocation.body, delimiter) {
        return Ok(vec![invocation]);
    }
    let stages = split_stages(&invocation.body, delimiter)?;
    let mut out: Vec<Invocation> = stages.iter().map(|s| Invocation::text(*s)).collect();
    if let Some(first) = out.first_mut() {
        first.attachments = invocation.attachments.clone();
    }
    Ok(out)
}

/// Shared state for one dispatch.
#[derive(Debug, Clone)]
pub struct Execution<'a> {
    pub registry: &'a Arc<Registry>,
    pub invoker: &'a Invoker,
    pub env: &'a Arc<BTreeMap<String, String>>,
}

struct Upstream {
    command: String,
    produces: BTreeSet<Tag>,
    data: Option<PipeData>,
}

impl Execution<'_> {
    /// Run stages in order, feeding each result to the next.
    pub async fn run(&self, stages: Vec<Invocation>) -> Result<PipeEnvelope, DispatchError> {
        let total = stages.len();
        let mut upstream: Option<Upstream> = None;
        let mut last = PipeEnvelope::silent();

        for (i, stage) in stages.iter().enumerate() {
            let target = resolve::resolve_target(self.registry, stage)?;
            let command = target.display();
            debug!(stage = i + 1, of = total, command = %command, "stage resolved");

            let piped = match &upstream {
                Some(up) => Some(check_compatible(up, &target)?),
                None => None,
            };

            self.authorize(&target, &command)?;
            let args = resolve::bind_args(&target, stage)?;

            let envelope = self
                .invoke(&target, command.clone(), args, piped, i + 1 < total)
                .await?;
            if envelope.error {
                debug!(stage = i + 1, command = %command, "stage returned an error, stopping");
                return Ok(envelope);
            }

            upstream = Some(Upstream {
                command,
                produces: target.leaf.pipe_produces.clone(),
                data: envelope.data.clone(),
            });
            last = envelope;
        }
        Ok(last)
    }

    fn authorize(&self, target: &Target<'_>, command: &str) -> Result<(), DispatchError> {
        let decision = self.registry.decide(&target.path, self.invoker);
        if decision.allowed {
            return Ok(());
        }
        let reason = decision
            .reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "denied".to_string());
        warn!(command = %command, invoker = %self.invoker.id, reason = %reason, "access denied");
        Err(DispatchError::AccessDenied {
            command: command.to_string(),
            reason,
        })
    }

    async fn invoke(
        &self,
        target: &Target<'_>,
        command: String,
        args: Args,
        piped: Option<PipeData>,
        will_be_piped: bool,
    ) -> Result<PipeEnvelope, DispatchError> {
        let Some(handler) = target.leaf.handler.as_ref() else {
            return Err(DispatchError::HandlerFailure {
                command,
                message: "no handler registered".to_string(),
            });
        };
        let ctx = CommandContext {
            invoker: self.invoker.clone(),
            command: command.clone(),
            args,
            env: Arc::clone(self.env),
            piped,
            will_be_piped,
            registry: Arc::clone(self.registry),
        };
        run_isolated(handler, ctx, command).await
    }
}

/// Run a handler so that neither an `Err` nor a panic escapes the dispatcher.
async fn run_isolated(
    handler: &Arc<dyn CommandHandler>,
    ctx: CommandContext,
    command: String,
) -> Result<PipeEnvelope, DispatchError> {
    match AssertUnwindSafe(handler.run(ctx)).catch_unwind().await {
        Ok(Ok(envelope)) => Ok(envelope),
        Ok(Err(e)) => {
            error!(command = %command, error = %format!("{e:#}"), "handler failed");
            Err(DispatchError::HandlerFailure {
                command,
                message: format!("{e:#}"),
            })
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(command = %command, panic = %message, "handler panicked");
            Err(DispatchError::HandlerFailure { command, message })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Upstream must produce at least one tag the downstream accepts. On success returns
/// the data the downstream stage gets to see.
fn check_compatible(up: &Upstream, target: &Target<'_>) -> Result<PipeData, DispatchError> {
    let accepts = &target.leaf.pipe_accepts;
    let shared: Vec<&Tag> = up.produces.intersection(accepts).collect();
    if shared.is_empty() {
        return Err(DispatchError::PipeIncompatible {
            upstream: up.command.clone(),
            produces: up.produces.iter().map(Tag::to_string).collect(),
            downstream: target.display(),
            accepts: accepts.iter().map(Tag::to_string).collect(),
        });
    }

    let data = up.data.clone().unwrap_or_default();
    // A legacy name-based link passes everything through.
    if shared.iter().any(|t| t.as_str().starts_with(LEGACY_PREFIX)) {
        return Ok(data);
    }
    Ok(data.into_iter().filter(|(t, _)| accepts.contains(t)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn splits_outside_quotes() {
        let stages = split_stages(r#"say "a | b" | upper"#, '|').unwrap();
        assert_eq!(stages, vec![r#"say "a | b""#, "upper"]);

        let stages = split_stages("say 'x|y' | tail -n 1 | upper", '|').unwrap();
        assert_eq!(stages, vec!["say 'x|y'", "tail -n 1", "upper"]);
    }

    #[test]
    fn escaped_delimiter_is_literal() {
        let stages = split_stages(r"say a \| b", '|').unwrap();
        assert_eq!(stages, vec![r"say a \| b"]);
        assert!(!has_pipe(r"say a \| b", '|'));
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let stages = split_stages(r#"say "open | still quoted"#, '|').unwrap();
        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn empty_stage_is_malformed() {
        for text in ["say hi |", "| upper", "say hi || upper", "say hi |   | upper"] {
            let err = split_stages(text, '|').unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedPipeline, "{text}");
        }
    }

    #[test]
    fn custom_delimiter() {
        let stages = split_stages("say hi > upper", '>').unwrap();
        assert_eq!(stages, vec!["say hi", "upper"]);
        assert!(!has_pipe("say a|b", '>'));
    }

    #[test]
    fn attachments_go_to_first_stage() {
        use crate::core::value::Attachment;
        let inv = Invocation::text("inspect | upper").with_attachment(Attachment::new("a.txt", vec![1]));
        let stages = stage_invocations(inv, '|').unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].attachments.len(), 1);
        assert!(stages[1].attachments.is_empty());
        assert_eq!(stages[1].body, "upper");
    }

    #[test]
    fn single_stage_is_untouched() {
        let inv = Invocation::text("say  spaced   out ");
        let stages = stage_invocations(inv.clone(), '|').unwrap();
        assert_eq!(stages, vec![inv]);
    }
}
