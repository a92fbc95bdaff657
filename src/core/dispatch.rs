//! Dispatch entry point.
//!
//! Every path through here ends in exactly one [`PipeEnvelope`]; handler errors and
//! panics are converted, never propagated. Each dispatch runs inside its own span
//! tagged with a fresh ULID so interleaved concurrent dispatches stay readable in logs.

use crate::core::access::Invoker;
use crate::core::config::Config;
use crate::core::envelope::PipeEnvelope;
use crate::core::error::DispatchError;
use crate::core::invocation::{self, Invocation, StructuredCall};
use crate::core::listing::{self, ListingEntry};
use crate::core::pipeline::{self, Execution};
use crate::core::registry::Registry;
use crate::core::reply::ReplySink;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use ulid::Ulid;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    prefix: String,
    delimiter: char,
    env: Arc<BTreeMap<String, String>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, &Config::default())
    }

    pub fn with_config(registry: Arc<Registry>, config: &Config) -> Self {
        Self {
            registry,
            prefix: config.prefix.clone(),
            delimiter: config.pipe_delimiter,
            env: Arc::new(config.env.clone()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Text adapter. `None` means the message is not addressed to us.
    pub fn parse_message(&self, raw: &str) -> Option<Invocation> {
        Invocation::from_message(raw, &self.prefix)
    }

    /// Structured adapter.
    pub fn normalize(&self, call: StructuredCall) -> Result<Invocation, DispatchError> {
        invocation::normalize_structured(&self.registry, call)
    }

    pub async fn dispatch(
        &self,
        invocation: Invocation,
        invoker: &Invoker,
    ) -> Result<PipeEnvelope, DispatchError> {
        let span = info_span!("dispatch", id = %Ulid::new(), invoker = %invoker.id);
        async {
            debug!(body = %invocation.body, source = ?invocation.source, "dispatching");
            let stages = pipeline::stage_invocations(invocation, self.delimiter)?;
            let execution = Execution {
                registry: &self.registry,
                invoker,
                env: &self.env,
            };
            let result = execution.run(stages).await;
            match &result {
                Ok(envelope) => info!(error = envelope.error, "dispatch complete"),
                Err(e) => info!(kind = ?e.kind(), "dispatch rejected"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Dispatch and report through `sink`. Every failure becomes the same
    /// `{error: true, message}` reply.
    pub async fn handle(
        &self,
        invocation: Invocation,
        invoker: &Invoker,
        sink: &dyn ReplySink,
    ) -> PipeEnvelope {
        let envelope = self.outcome(invocation, invoker).await;
        if let Err(e) = sink.reply(&envelope).await {
            warn!(error = %e, "failed to deliver reply");
        }
        envelope
    }

    /// Post `placeholder` first, then edit it into the final result.
    pub async fn handle_progressive(
        &self,
        invocation: Invocation,
        invoker: &Invoker,
        sink: &dyn ReplySink,
        placeholder: &str,
    ) -> PipeEnvelope {
        let handle = match sink.reply(&PipeEnvelope::ok(placeholder)).await {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(error = %e, "failed to post placeholder");
                None
            }
        };
        let envelope = self.outcome(invocation, invoker).await;
        let delivered = match handle {
            Some(h) => sink.edit(h, &envelope).await,
            None => sink.reply(&envelope).await.map(|_| ()),
        };
        if let Err(e) = delivered {
            warn!(error = %e, "failed to deliver reply");
        }
        envelope
    }

    pub fn visible_commands(&self, invoker: &Invoker) -> Vec<ListingEntry> {
        listing::visible_commands(&self.registry, invoker)
    }

    async fn outcome(&self, invocation: Invocation, invoker: &Invoker) -> PipeEnvelope {
        match self.dispatch(invocation, invoker).await {
            Ok(envelope) => envelope,
            Err(e) => e.to_envelope(),
        }
    }
}
