//! Text utilities. All of them produce `input_text`, and the ones that transform
//! text also accept it, so they chain freely: `!list a b c | tail -n 1 | upper`.

use crate::core::descriptor::CommandDescriptor;
use crate::core::envelope::{PipeEnvelope, Tag};
use crate::core::error::SwitchboardError;
use crate::core::extract::ArgTemplate;
use crate::core::handler::{CommandContext, handler_fn};
use crate::core::option::OptionSpec;
use crate::core::registry::RegistryBuilder;

const DEFAULT_LINES: i64 = 10;

pub fn register(builder: &mut RegistryBuilder) -> Result<(), SwitchboardError> {
    builder.register(say())?;
    builder.register(list())?;
    builder.register(window("head", Window::Head))?;
    builder.register(window("tail", Window::Tail))?;
    builder.register(replace())?;
    builder.register(case())?;
    Ok(())
}

fn text_reply(text: String) -> PipeEnvelope {
    PipeEnvelope::ok(text.clone()).with_data(Tag::TEXT, text)
}

fn say() -> CommandDescriptor {
    CommandDescriptor::new("say")
        .describe("Repeat the given text")
        .alias("echo")
        .tag(Tag::UTILITY)
        .option(OptionSpec::string("text").required().describe("What to say"))
        .template(ArgTemplate::remainder("text"))
        .produces(Tag::TEXT)
        .handler(handler_fn(|ctx: CommandContext| async move {
            let text = ctx.args.str("text").unwrap_or_default().to_string();
            Ok(text_reply(text))
        }))
}

fn list() -> CommandDescriptor {
    CommandDescriptor::new("list")
        .describe("Print each item on its own line")
        .tag(Tag::UTILITY)
        .option(OptionSpec::string("items").required().describe("Space or comma separated items"))
        .template(ArgTemplate::remainder("items"))
        .produces(Tag::TEXT)
        .handler(handler_fn(|ctx: CommandContext| async move {
            let items = ctx.args.str("items").unwrap_or_default();
            let lines: Vec<&str> = items
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            Ok(text_reply(lines.join("\n")))
        }))
}

#[derive(Debug, Clone, Copy)]
enum Window {
    Head,
    Tail,
}

impl Window {
    fn take(self, text: &str, n: usize) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let n = n.min(lines.len());
        let kept = match self {
            Window::Head => &lines[..n],
            Window::Tail => &lines[lines.len() - n..],
        };
        kept.join("\n")
    }
}

fn window(name: &'static str, which: Window) -> CommandDescriptor {
    let describe = match which {
        Window::Head => "Keep the first N lines of piped text",
        Window::Tail => "Keep the last N lines of piped text",
    };
    CommandDescriptor::new(name)
        .describe(describe)
        .tag(Tag::UTILITY)
        .option(OptionSpec::string("flag").choices(["-n"]))
        .option(OptionSpec::integer("count").describe("Number of lines (default 10)"))
        .template(ArgTemplate::first_token("flag", "count"))
        .accepts(Tag::TEXT)
        .produces(Tag::TEXT)
        .handler(handler_fn(move |ctx: CommandContext| async move {
            let Some(text) = ctx.piped_text() else {
                return Ok(PipeEnvelope::fail(format!(
                    "{} needs text piped into it, e.g. `list a b c | {}`",
                    ctx.command, ctx.command
                )));
            };
            let count = ctx.args.integer("count").unwrap_or(DEFAULT_LINES);
            if count < 0 {
                return Ok(PipeEnvelope::fail("line count cannot be negative"));
            }
            Ok(text_reply(which.take(&text, count as usize)))
        }))
}

fn replace() -> CommandDescriptor {
    CommandDescriptor::new("replace")
        .describe("Replace every occurrence of a word in piped text")
        .tag(Tag::UTILITY)
        .option(OptionSpec::string("from").required())
        .option(OptionSpec::string("to"))
        .option(OptionSpec::string("text"))
        .template(ArgTemplate::first_token("from", "to"))
        .accepts(Tag::TEXT)
        .produces(Tag::TEXT)
        .handler(handler_fn(|ctx: CommandContext| async move {
            let Some(text) = ctx.text_input("text") else {
                return Ok(PipeEnvelope::fail("replace needs text to work on"));
            };
            let from = ctx.args.str("from").unwrap_or_default();
            let to = ctx.args.str("to").unwrap_or_default();
            Ok(text_reply(text.replace(from, to)))
        }))
}

fn case_leaf(name: &'static str, upper: bool) -> CommandDescriptor {
    CommandDescriptor::new(name)
        .describe(if upper {
            "Convert text to upper case"
        } else {
            "Convert text to lower case"
        })
        .root_alias(name)
        .option(OptionSpec::string("text"))
        .template(ArgTemplate::remainder("text"))
        .accepts(Tag::TEXT)
        .produces(Tag::TEXT)
        .handler(handler_fn(move |ctx: CommandContext| async move {
            let Some(text) = ctx.text_input("text") else {
                return Ok(PipeEnvelope::fail(format!("{} needs some text", ctx.command)));
            };
            let out = if upper {
                text.to_uppercase()
            } else {
                text.to_lowercase()
            };
            Ok(text_reply(out))
        }))
}

fn case() -> CommandDescriptor {
    CommandDescriptor::new("case")
        .describe("Change letter case")
        .tag(Tag::UTILITY)
        .merge(vec![case_leaf("upper", true), case_leaf("lower", false)])
}
