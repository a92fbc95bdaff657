//! Commands about the bot itself.

use crate::core::descriptor::CommandDescriptor;
use crate::core::envelope::{PipeEnvelope, Tag};
use crate::core::error::SwitchboardError;
use crate::core::extract::ArgTemplate;
use crate::core::handler::{CommandContext, handler_fn};
use crate::core::listing;
use crate::core::option::OptionSpec;
use crate::core::registry::{self, RegistryBuilder};

pub fn register(builder: &mut RegistryBuilder) -> Result<(), SwitchboardError> {
    builder.register(help())?;
    builder.register(ping())?;
    Ok(())
}

fn help() -> CommandDescriptor {
    CommandDescriptor::new("help")
        .describe("List the commands you can use, or describe one")
        .alias("commands")
        .tag(Tag::UTILITY)
        .option(OptionSpec::string("command").describe("Command path, e.g. `case upper`"))
        .template(ArgTemplate::remainder("command"))
        .produces(Tag::TEXT)
        .handler(handler_fn(|ctx: CommandContext| async move {
            let visible = listing::visible_commands(&ctx.registry, &ctx.invoker);
            let Some(wanted) = ctx.args.str("command") else {
                let text = listing::render(&visible, "");
                return Ok(PipeEnvelope::ok(text.clone()).with_data(Tag::TEXT, text));
            };

            // Only describe what the listing would show.
            let Some(entry) = visible.iter().find(|e| e.path == wanted) else {
                return Ok(PipeEnvelope::fail(format!("no command named '{wanted}'")));
            };
            let Some(path) = ctx.registry.find(&entry.path) else {
                return Ok(PipeEnvelope::fail(format!("no command named '{wanted}'")));
            };
            let Some(leaf) = path.last() else {
                return Ok(PipeEnvelope::fail(format!("no command named '{wanted}'")));
            };

            let mut lines = vec![registry::display_path(&path)];
            if !leaf.description.is_empty() {
                lines.push(leaf.description.clone());
            }
            if !leaf.aliases.is_empty() {
                lines.push(format!("aliases: {}", leaf.aliases.join(", ")));
            }
            for opt in &leaf.options {
                let marker = if opt.required { "required" } else { "optional" };
                let mut line = format!("  {} ({:?}, {marker})", opt.name, opt.kind);
                if !opt.choices.is_empty() {
                    line.push_str(&format!(" one of: {}", opt.choice_labels().join(", ")));
                }
                lines.push(line);
            }
            let text = lines.join("\n");
            Ok(PipeEnvelope::ok(text.clone()).with_data(Tag::TEXT, text))
        }))
}

fn ping() -> CommandDescriptor {
    CommandDescriptor::new("ping")
        .describe("Check that the dispatcher is alive")
        .tag(Tag::UTILITY)
        .handler(handler_fn(|_ctx: CommandContext| async { Ok(PipeEnvelope::ok("pong")) }))
}
