//! Command bodies and the context they run with.

use crate::core::access::Invoker;
use crate::core::envelope::{CommandResponse, PipeData, Tag};
use crate::core::option::Args;
use crate::core::registry::Registry;
use crate::core::value::Value;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Everything a command body gets to see for one execution.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub invoker: Invoker,
    /// Canonical space-separated path of the resolved leaf, e.g. `case upper`.
    pub command: String,
    pub args: Args,
    /// Environment/guild configuration, read-only.
    pub env: Arc<BTreeMap<String, String>>,
    /// Upstream stage data, restricted to the tags this command accepts.
    pub piped: Option<PipeData>,
    /// True when another stage will consume this result.
    pub will_be_piped: bool,
    pub registry: Arc<Registry>,
}

impl CommandContext {
    pub fn piped_value(&self, tag: &Tag) -> Option<&Value> {
        self.piped.as_ref().and_then(|d| d.get(tag))
    }

    pub fn piped_text(&self) -> Option<String> {
        self.piped_value(&Tag::TEXT).map(|v| v.to_string())
    }

    /// Piped text wins over the named text argument when both exist.
    pub fn text_input(&self, arg: &str) -> Option<String> {
        self.piped_text()
            .or_else(|| self.args.str(arg).map(str::to_string))
    }
}

/// A command body. Returning `Err` (or panicking) is reported as a handler failure;
/// business-level failures should return `CommandResponse::fail` instead.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: CommandContext) -> anyhow::Result<CommandResponse>;
}

pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<CommandResponse>> + Send,
{
    async fn run(&self, ctx: CommandContext) -> anyhow::Result<CommandResponse> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as a shared handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CommandResponse>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
