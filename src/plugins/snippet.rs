use crate::core::descriptor::CommandDescriptor;
use crate::core::envelope::{PipeEnvelope, Tag};
use crate::core::error::SwitchboardError;
use crate::core::extract::ArgTemplate;
use crate::core::handler::{CommandContext, handler_fn};
use crate::core::option::OptionSpec;
use crate::core::registry::RegistryBuilder;

pub fn register(builder: &mut RegistryBuilder) -> Result<(), SwitchboardError> {
    builder.register(code())?;
    builder.register(inspect())?;
    Ok(())
}

/// `code <lang>` followed by a multi-line body. Indentation of the body is kept.
fn code() -> CommandDescriptor {
    CommandDescriptor::new("code")
        .describe("Format a code snippet")
        .tag(Tag::new("snippet"))
        .option(OptionSpec::string("lang").required())
        .option(OptionSpec::string("source").required())
        .template(ArgTemplate::two_segment("lang", "source"))
        .produces(Tag::TEXT)
        .handler(handler_fn(|ctx: CommandContext| async move {
            let lang = ctx.args.str("lang").unwrap_or_default();
            let source = ctx.args.str("source").unwrap_or_default();
            let lines = source.lines().count();
            Ok(PipeEnvelope::ok(format!("```{lang}\n{source}\n```\n({lines} lines)"))
                .with_data(Tag::TEXT, source))
        }))
}

fn inspect() -> CommandDescriptor {
    CommandDescriptor::new("inspect")
        .describe("Describe the first attached file")
        .tag(Tag::ATTACHMENT)
        .option(OptionSpec::attachment("file").required())
        .template(ArgTemplate::first_attachment("file"))
        .produces(Tag::TEXT)
        .produces(Tag::ATTACHMENT)
        .handler(handler_fn(|ctx: CommandContext| async move {
            let Some(file) = ctx.args.attachment("file").cloned() else {
                return Ok(PipeEnvelope::fail("no file attached"));
            };
            let kind = file.content_type.as_deref().unwrap_or("unknown type");
            let summary = format!("{}: {} bytes, {kind}", file.filename, file.bytes.len());
            Ok(PipeEnvelope::ok(summary.clone())
                .with_data(Tag::TEXT, summary)
                .with_data(Tag::ATTACHMENT, file))
        }))
}
