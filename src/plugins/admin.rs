//! Restricted commands and a small in-memory todo list.
//!
//! `secret` is whitelisted to `owner` by default; a `[access.secret]` table in
//! `switchboard.toml` replaces that policy. Todo items live only as long as the
//! registry does.

use crate::core::access::AccessPolicy;
use crate::core::descriptor::CommandDescriptor;
use crate::core::envelope::{PipeEnvelope, Tag};
use crate::core::error::SwitchboardError;
use crate::core::extract::ArgTemplate;
use crate::core::handler::{CommandContext, handler_fn};
use crate::core::option::OptionSpec;
use crate::core::registry::RegistryBuilder;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const OWNER_ID: &str = "owner";

type TodoStore = Arc<Mutex<BTreeMap<String, Vec<String>>>>;

pub fn register(builder: &mut RegistryBuilder) -> Result<(), SwitchboardError> {
    builder.register(secret())?;
    builder.register(todo(TodoStore::default()))?;
    Ok(())
}

fn secret() -> CommandDescriptor {
    CommandDescriptor::new("secret")
        .describe("Show the environment the dispatcher runs with")
        .tag(Tag::ELEVATED)
        .access(AccessPolicy::whitelist([OWNER_ID]))
        .handler(handler_fn(|ctx: CommandContext| async move {
            if ctx.env.is_empty() {
                return Ok(PipeEnvelope::ok("no environment configured"));
            }
            let lines: Vec<String> = ctx.env.iter().map(|(k, v)| format!("{k} = {v}")).collect();
            Ok(PipeEnvelope::ok(lines.join("\n")))
        }))
}

fn todo(store: TodoStore) -> CommandDescriptor {
    let add_store = Arc::clone(&store);
    let add = CommandDescriptor::new("add")
        .describe("Add an item to your todo list")
        .alias("new")
        .root_alias("remember")
        .option(OptionSpec::string("item").required())
        .template(ArgTemplate::remainder("item"))
        .accepts(Tag::TEXT)
        .handler(handler_fn(move |ctx: CommandContext| {
            let store = Arc::clone(&add_store);
            async move {
                let Some(item) = ctx.text_input("item") else {
                    return Ok(PipeEnvelope::fail("nothing to add"));
                };
                let mut items = store
                    .lock()
                    .map_err(|_| anyhow::anyhow!("todo store poisoned"))?;
                let list = items.entry(ctx.invoker.id.clone()).or_default();
                list.push(item.clone());
                Ok(PipeEnvelope::ok(format!("added #{}: {item}", list.len())))
            }
        }));

    let list = CommandDescriptor::new("list")
        .describe("Show your todo list")
        .alias("ls")
        .pipable_to("tail")
        .pipable_to("head")
        .produces(Tag::TEXT)
        .handler(handler_fn(move |ctx: CommandContext| {
            let store = Arc::clone(&store);
            async move {
                let items = store
                    .lock()
                    .map_err(|_| anyhow::anyhow!("todo store poisoned"))?;
                let Some(list) = items.get(&ctx.invoker.id).filter(|l| !l.is_empty()) else {
                    return Ok(PipeEnvelope::ok("your todo list is empty"));
                };
                let text = list
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{}. {item}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(PipeEnvelope::ok(text.clone()).with_data(Tag::TEXT, text))
            }
        }));

    CommandDescriptor::new("todo")
        .describe("Personal todo list")
        .merge(vec![add, list])
        .default_child("list")
}
